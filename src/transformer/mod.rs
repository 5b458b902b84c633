//! The transformer: normalize, run the script, normalize again.
//!
//! A [`Transformer`] owns an optional source schema, an optional destination
//! schema, the current compiled script and a pool of execution contexts.
//! `transform` normalizes the raw record against the source schema, runs the
//! script with the record bound as `source`, and normalizes every record the
//! script returns against the destination schema.
//!
//! All methods take `&self`; one transformer can serve many threads at once.

pub mod config;
pub mod context;
pub mod error;
pub mod pool;

use log::{debug, info, warn};
use std::sync::{Arc, PoisonError, RwLock};

pub use config::{PoolConfig, ScriptConfig, TransformerConfig};
pub use context::ExecutionContext;
pub use error::{TransformError, TransformResult};
pub use pool::{ContextPool, PooledContext};

use crate::schema::Schema;
use crate::script::{ScriptEngine, ScriptRuntime};
use crate::value::{Record, Value};

/// Script installed before any call to [`Transformer::set_script`].
pub const DEFAULT_SCRIPT: &str = "return source";

struct LoadedScript<R: ScriptRuntime> {
    program: R::Program,
    generation: u64,
}

pub struct Transformer<R: ScriptRuntime = ScriptEngine> {
    source_schema: RwLock<Option<Arc<Schema>>>,
    destination_schema: RwLock<Option<Arc<Schema>>>,
    script: RwLock<Arc<LoadedScript<R>>>,
    pool: ContextPool<R>,
    config: TransformerConfig,
}

impl Transformer<ScriptEngine> {
    /// Creates a transformer with the bundled script engine and default
    /// configuration.
    pub fn new(source: Option<Schema>, destination: Option<Schema>) -> TransformResult<Self> {
        Self::with_runtime(source, destination, TransformerConfig::default())
    }

    /// Creates a transformer with the bundled script engine.
    pub fn with_config(
        source: Option<Schema>,
        destination: Option<Schema>,
        config: TransformerConfig,
    ) -> TransformResult<Self> {
        Self::with_runtime(source, destination, config)
    }
}

impl<R: ScriptRuntime> Transformer<R> {
    /// Creates a transformer driving runtime `R`.
    pub fn with_runtime(
        source: Option<Schema>,
        destination: Option<Schema>,
        config: TransformerConfig,
    ) -> TransformResult<Self> {
        config.validate()?;
        let program = R::compile(&R::wrap_script(DEFAULT_SCRIPT)).map_err(TransformError::ScriptLoad)?;
        let pool = ContextPool::new(&config.pool, &config.script);
        let generation = pool.generation();

        let transformer = Self {
            source_schema: RwLock::new(source.map(Arc::new)),
            destination_schema: RwLock::new(destination.map(Arc::new)),
            script: RwLock::new(Arc::new(LoadedScript { program, generation })),
            pool,
            config,
        };
        transformer.prewarm()?;
        debug!("Created transformer");
        Ok(transformer)
    }

    pub fn config(&self) -> &TransformerConfig {
        &self.config
    }

    pub fn source_schema(&self) -> Option<Arc<Schema>> {
        self.source_schema
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn destination_schema(&self) -> Option<Arc<Schema>> {
        self.destination_schema
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_source_schema(&self, schema: Schema) {
        *self.source_schema.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(schema));
        debug!("Source schema replaced");
    }

    /// Removes the source schema; inputs then pass through unnormalized.
    pub fn clear_source_schema(&self) {
        *self.source_schema.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn set_destination_schema(&self, schema: Schema) {
        *self
            .destination_schema
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(schema));
        debug!("Destination schema replaced");
    }

    /// Removes the destination schema; script results then pass through
    /// unnormalized.
    pub fn clear_destination_schema(&self) {
        *self
            .destination_schema
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn current_script(&self) -> Arc<LoadedScript<R>> {
        self.script
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Compiles `body` and makes it the script for every later `transform`.
    ///
    /// On a compile error the previous script stays installed. On success
    /// every pooled context is invalidated.
    pub fn set_script(&self, body: &str) -> TransformResult<()> {
        let program = R::compile(&R::wrap_script(body)).map_err(|e| {
            warn!("Rejected transformation script: {}", e);
            TransformError::ScriptLoad(e)
        })?;

        let generation = {
            let mut slot = self.script.write().unwrap_or_else(PoisonError::into_inner);
            let generation = self.pool.invalidate();
            *slot = Arc::new(LoadedScript { program, generation });
            generation
        };
        info!("Installed transformation script (generation {})", generation);

        self.prewarm()
    }

    fn prewarm(&self) -> TransformResult<()> {
        let count = self.config.pool.prewarm_contexts;
        if count == 0 {
            return Ok(());
        }
        let script = self.current_script();
        self.pool
            .prewarm(&script.program, script.generation, count)
            .map_err(TransformError::ScriptLoad)
    }

    /// Runs one raw record through source normalization, the script and
    /// destination normalization.
    ///
    /// Returns no records when the script yields null, undefined or a
    /// scalar; one record for an object; one per object element for an
    /// array.
    pub fn transform(&self, env: &Record, input: &Record) -> TransformResult<Vec<Record>> {
        let source_schema = self.source_schema();
        let source = match &source_schema {
            Some(schema) => schema.normalize(input),
            None => input.clone(),
        };

        let mut pooled = self.pool.acquire();
        let script = self.current_script();
        if pooled.context().generation() != script.generation {
            pooled.replace(self.pool.create_context(script.generation));
        }
        let context = pooled.context();
        if !context.is_ready() {
            context.preload_script(&script.program).map_err(|e| {
                warn!("Failed to preload transformation script: {}", e);
                TransformError::ScriptLoad(e)
            })?;
        }

        context.bind(env, &source, source_schema.as_deref());
        let result = context.execute().map_err(|e| {
            warn!("Transformation script failed: {}", e);
            TransformError::ScriptRuntime(e)
        })?;
        drop(pooled);

        Ok(self.collect(result))
    }

    fn collect(&self, result: Option<Value>) -> Vec<Record> {
        let destination = self.destination_schema();
        let finish = |record: Record| match &destination {
            Some(schema) => schema.normalize(&record),
            None => record,
        };

        match result {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Map(record)) => vec![finish(record)],
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Map(record) => Some(finish(record)),
                    other => {
                        debug!("Skipping {} element of script result", other.kind());
                        None
                    }
                })
                .collect(),
            Some(other) => {
                debug!("Script returned a {}, producing no records", other.kind());
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldDefinition;
    use crate::value::record_from_json;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        record_from_json(value).unwrap()
    }

    #[test]
    fn test_default_script_is_identity() {
        let transformer = Transformer::new(None, None).unwrap();
        let input = record(json!({"a": 1, "b": [true, "x"]}));
        assert_eq!(transformer.transform(&Record::new(), &input).unwrap(), vec![input]);
    }

    #[test]
    fn test_source_and_destination_normalization() {
        let source = Schema::new().with_field("n", FieldDefinition::int());
        let destination = Schema::new().with_field("label", FieldDefinition::string());
        let transformer = Transformer::new(Some(source), Some(destination)).unwrap();
        transformer
            .set_script(r#"return { label: "n=" + source.n, extra: 1 };"#)
            .unwrap();

        let output = transformer
            .transform(&Record::new(), &record(json!({"n": "5.6", "dropped": true})))
            .unwrap();
        assert_eq!(output, vec![record(json!({"label": "n=5"}))]);
    }

    #[test]
    fn test_result_shapes() {
        let transformer = Transformer::new(None, None).unwrap();
        let empty = Record::new();

        transformer.set_script("return null;").unwrap();
        assert!(transformer.transform(&empty, &empty).unwrap().is_empty());

        transformer.set_script("return 42;").unwrap();
        assert!(transformer.transform(&empty, &empty).unwrap().is_empty());

        transformer.set_script("return [{ a: 1 }, 2, { a: 3 }];").unwrap();
        assert_eq!(
            transformer.transform(&empty, &empty).unwrap(),
            vec![record(json!({"a": 1})), record(json!({"a": 3}))]
        );
    }

    #[test]
    fn test_failed_set_script_keeps_previous() {
        let transformer = Transformer::new(None, None).unwrap();
        transformer.set_script("return { v: 1 };").unwrap();
        let err = transformer.set_script("return {;").unwrap_err();
        assert!(matches!(err, TransformError::ScriptLoad(_)));
        assert_eq!(
            transformer.transform(&Record::new(), &Record::new()).unwrap(),
            vec![record(json!({"v": 1}))]
        );
    }

    #[test]
    fn test_set_script_invalidates_pooled_contexts() {
        let mut config = TransformerConfig::default();
        config.pool.prewarm_contexts = 2;
        let transformer = Transformer::with_config(None, None, config).unwrap();
        assert_eq!(transformer.pool.idle_count(), 2);

        transformer.set_script("return { v: 2 };").unwrap();
        assert_eq!(transformer.pool.generation(), 1);
        assert_eq!(
            transformer.transform(&Record::new(), &Record::new()).unwrap(),
            vec![record(json!({"v": 2}))]
        );
    }

    #[test]
    fn test_racing_set_script_leaves_no_stale_contexts() {
        let mut config = TransformerConfig::default();
        config.pool.prewarm_contexts = 3;
        let transformer = Transformer::with_config(None, None, config).unwrap();

        std::thread::scope(|scope| {
            for writer in ["a", "b"] {
                let transformer = &transformer;
                scope.spawn(move || {
                    for version in 0..25 {
                        let body = format!("return {{ v: \"{}{}\" }};", writer, version);
                        transformer.set_script(&body).unwrap();
                    }
                });
            }
        });

        let current = transformer.current_script().generation;
        let idle = transformer.pool.idle_count();
        assert!(idle <= 3);
        let mut held: Vec<_> = (0..idle).map(|_| transformer.pool.acquire()).collect();
        for pooled in &mut held {
            assert_eq!(pooled.context().generation(), current);
        }
        drop(held);

        let output = transformer.transform(&Record::new(), &Record::new()).unwrap();
        let winner = &output[0]["v"];
        assert!(winner == &Value::from("a24") || winner == &Value::from("b24"));
    }

    #[test]
    fn test_clearing_schemas() {
        let source = Schema::new().with_field("n", FieldDefinition::int());
        let transformer = Transformer::new(Some(source), None).unwrap();
        let input = record(json!({"n": "7", "other": 1}));
        assert_eq!(
            transformer.transform(&Record::new(), &input).unwrap(),
            vec![record(json!({"n": 7}))]
        );

        transformer.clear_source_schema();
        assert!(transformer.source_schema().is_none());
        assert_eq!(transformer.transform(&Record::new(), &input).unwrap(), vec![input]);
    }
}
