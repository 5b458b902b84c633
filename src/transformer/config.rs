//! Configuration for the transformer.
//!
//! Settings can be loaded from a TOML or JSON file, or from environment
//! variables prefixed with `SCHEMER_`. Missing settings take their defaults.

use log::debug;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::error::{TransformError, TransformResult};

/// Prefix of the environment variables read by [`TransformerConfig::from_env`].
pub const ENV_PREFIX: &str = "SCHEMER";

/// Configuration for a [`super::Transformer`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformerConfig {
    /// Execution context pooling
    pub pool: PoolConfig,
    /// Script engine settings
    pub script: ScriptConfig,
}

/// Execution context pool settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of idle contexts kept for reuse. `None` keeps all of
    /// them.
    pub max_idle_contexts: Option<usize>,
    /// Contexts created and preloaded whenever a script is installed
    pub prewarm_contexts: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle_contexts: None,
            prewarm_contexts: 0,
        }
    }
}

/// Script engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    /// Maximum nesting of script function calls
    pub max_call_depth: usize,
    /// Forward `console.log` output to the `log` facade
    pub log_console_output: bool,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            max_call_depth: 128,
            log_console_output: true,
        }
    }
}

impl TransformerConfig {
    /// Loads configuration from a `.toml` or `.json` file and validates it.
    pub fn from_file<P: AsRef<Path>>(path: P) -> TransformResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TransformError::configuration(format!("Failed to read config file: {}", e))
        })?;

        let config: TransformerConfig = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(&content).map_err(|e| {
                TransformError::configuration(format!("Failed to parse TOML config: {}", e))
            })?,
            Some("json") => serde_json::from_str(&content).map_err(|e| {
                TransformError::configuration(format!("Failed to parse JSON config: {}", e))
            })?,
            _ => {
                return Err(TransformError::configuration(
                    "Unsupported config file format (only JSON and TOML supported)",
                ))
            }
        };

        config.validate()?;
        debug!("Loaded transformer configuration from {}", path.display());
        Ok(config)
    }

    /// Loads configuration from `SCHEMER_*` environment variables.
    pub fn from_env() -> TransformResult<Self> {
        Self::from_env_with_prefix(ENV_PREFIX)
    }

    /// Loads configuration from environment variables named
    /// `<prefix>_MAX_IDLE_CONTEXTS`, `<prefix>_PREWARM_CONTEXTS`,
    /// `<prefix>_MAX_CALL_DEPTH` and `<prefix>_LOG_CONSOLE_OUTPUT`.
    pub fn from_env_with_prefix(prefix: &str) -> TransformResult<Self> {
        let mut config = TransformerConfig::default();

        if let Some(val) = env_setting(prefix, "MAX_IDLE_CONTEXTS") {
            config.pool.max_idle_contexts = Some(parse_setting(prefix, "MAX_IDLE_CONTEXTS", &val)?);
        }
        if let Some(val) = env_setting(prefix, "PREWARM_CONTEXTS") {
            config.pool.prewarm_contexts = parse_setting(prefix, "PREWARM_CONTEXTS", &val)?;
        }
        if let Some(val) = env_setting(prefix, "MAX_CALL_DEPTH") {
            config.script.max_call_depth = parse_setting(prefix, "MAX_CALL_DEPTH", &val)?;
        }
        if let Some(val) = env_setting(prefix, "LOG_CONSOLE_OUTPUT") {
            config.script.log_console_output = parse_setting(prefix, "LOG_CONSOLE_OUTPUT", &val)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> TransformResult<()> {
        if self.script.max_call_depth == 0 {
            return Err(TransformError::configuration_key(
                "Maximum call depth must be greater than 0",
                "script.max_call_depth",
            ));
        }
        if let Some(max_idle) = self.pool.max_idle_contexts {
            if self.pool.prewarm_contexts > max_idle {
                return Err(TransformError::configuration_key(
                    format!(
                        "Cannot prewarm {} contexts when at most {} are kept idle",
                        self.pool.prewarm_contexts, max_idle
                    ),
                    "pool.prewarm_contexts",
                ));
            }
        }
        Ok(())
    }
}

fn env_setting(prefix: &str, name: &str) -> Option<String> {
    std::env::var(format!("{}_{}", prefix, name)).ok()
}

fn parse_setting<T: std::str::FromStr>(prefix: &str, name: &str, value: &str) -> TransformResult<T> {
    value.trim().parse::<T>().map_err(|_| {
        TransformError::configuration_key(
            format!("Invalid value '{}' for {}_{}", value, prefix, name),
            name.to_lowercase(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TransformerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pool.max_idle_contexts, None);
        assert!(config.script.max_call_depth > 0);
    }

    #[test]
    fn test_config_validation() {
        let mut config = TransformerConfig::default();
        config.script.max_call_depth = 0;
        assert!(config.validate().is_err());

        let mut config = TransformerConfig::default();
        config.pool.max_idle_contexts = Some(1);
        config.pool.prewarm_contexts = 2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml() {
        let config: TransformerConfig = toml::from_str("[script]\nmax_call_depth = 16\n").unwrap();
        assert_eq!(config.script.max_call_depth, 16);
        assert!(config.script.log_console_output);
        assert_eq!(config.pool, PoolConfig::default());
    }

    #[test]
    fn test_from_env_with_prefix() {
        std::env::set_var("SCHEMER_UNIT_MAX_CALL_DEPTH", "32");
        std::env::set_var("SCHEMER_UNIT_MAX_IDLE_CONTEXTS", "4");
        let config = TransformerConfig::from_env_with_prefix("SCHEMER_UNIT").unwrap();
        assert_eq!(config.script.max_call_depth, 32);
        assert_eq!(config.pool.max_idle_contexts, Some(4));

        std::env::set_var("SCHEMER_UNIT_BAD_LOG_CONSOLE_OUTPUT", "sometimes");
        assert!(TransformerConfig::from_env_with_prefix("SCHEMER_UNIT_BAD").is_err());
    }
}
