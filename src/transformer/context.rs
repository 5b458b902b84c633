//! A single script execution context and the bindings a transformation sees.

use log::{debug, info};
use std::sync::Arc;

use super::config::ScriptConfig;
use crate::refs::prepare_refs;
use crate::schema::{FieldType, Schema};
use crate::script::{NativeFunction, ScriptError, ScriptRuntime, ENTRY_POINT};
use crate::value::{Record, Value};

/// Log target for script `console.log` output.
pub const SCRIPT_LOG_TARGET: &str = "schemer::script";

/// One script runtime plus its load state.
///
/// `generation` identifies the script installation the context belongs to.
/// A context is ready once the script of that generation has been preloaded.
pub struct ExecutionContext<R: ScriptRuntime> {
    runtime: R,
    ready: bool,
    generation: u64,
}

impl<R: ScriptRuntime> ExecutionContext<R> {
    pub fn new(config: &ScriptConfig, generation: u64) -> Self {
        debug!("Creating execution context for script generation {}", generation);
        let mut runtime = R::create(config);
        runtime.register_native("console.log", console_log::<R>(config.log_console_output));
        runtime.register_native("prepareRefs", prepare_refs_native::<R>());
        Self {
            runtime,
            ready: false,
            generation,
        }
    }

    /// Loads `program` into the runtime. The context is ready only if this
    /// succeeds.
    pub fn preload_script(&mut self, program: &R::Program) -> Result<(), ScriptError> {
        self.ready = false;
        self.runtime.preload(program)?;
        self.ready = true;
        debug!("Preloaded script generation {} into context", self.generation);
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn runtime_mut(&mut self) -> &mut R {
        &mut self.runtime
    }

    /// Binds the per-call globals: `env` and the staged `source` record.
    pub fn bind(&mut self, env: &Record, source: &Record, schema: Option<&Schema>) {
        self.runtime.set_global("env", R::import(&Value::Map(env.clone())));

        let mut staged = R::import(&Value::Map(source.clone()));
        if let Some(schema) = schema {
            stage_time_fields::<R>(&mut staged, source, schema);
        }
        self.runtime.set_global("source", staged);
    }

    /// Calls the entry point and exports its result.
    pub fn execute(&mut self) -> Result<Option<Value>, ScriptError> {
        let result = self.runtime.call(ENTRY_POINT)?;
        Ok(R::export(&result))
    }
}

/// Replaces coarse-precision time fields with the runtime's native date,
/// recursing into nested map fields. Nanosecond fields stay opaque
/// timestamps.
fn stage_time_fields<R: ScriptRuntime>(object: &mut R::Value, record: &Record, schema: &Schema) {
    for (name, definition) in &schema.fields {
        match (&definition.field_type, record.get(name)) {
            (FieldType::Time { precision }, Some(Value::Time(time))) if !precision.is_finest() => {
                R::set_property(object, name, R::new_date(time.timestamp_millis()));
            }
            (FieldType::Map { fields: Some(nested) }, Some(Value::Map(inner))) => {
                if let Some(mut child) = R::get_property(object, name) {
                    stage_time_fields::<R>(&mut child, inner, nested);
                    R::set_property(object, name, child);
                }
            }
            _ => {}
        }
    }
}

fn console_log<R: ScriptRuntime>(enabled: bool) -> NativeFunction<R::Value> {
    Arc::new(move |args: &[R::Value]| {
        if enabled {
            let line = args
                .iter()
                .map(|arg| match R::export(arg) {
                    Some(Value::String(text)) => text,
                    Some(other) => other.to_string(),
                    None => "undefined".to_string(),
                })
                .collect::<Vec<_>>()
                .join(" ");
            info!(target: SCRIPT_LOG_TARGET, "{}", line);
        }
        Ok(R::import(&Value::Null))
    })
}

fn prepare_refs_native<R: ScriptRuntime>() -> NativeFunction<R::Value> {
    Arc::new(|args: &[R::Value]| {
        let refs = args
            .first()
            .and_then(|arg| R::export(arg))
            .and_then(Value::into_map)
            .ok_or_else(|| "prepareRefs expects an object".to_string())?;
        Ok(R::import(&Value::Map(prepare_refs(&refs))))
    })
}
