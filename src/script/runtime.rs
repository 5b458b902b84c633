//! The bundled script engine.

use log::debug;
use std::collections::HashMap;
use std::sync::Arc;

use super::ast::{FunctionDecl, Program};
use super::error::ScriptError;
use super::interpreter::{builtin_functions, Interpreter};
use super::parser::ScriptParser;
use super::value::{ScriptObject, ScriptValue, Visited};
use super::{NativeFunction, ScriptRuntime};
use crate::coercion::time::from_unix_millis;
use crate::transformer::config::ScriptConfig;
use crate::value::{Record, Value};

/// One isolated instance of the script language: globals, loaded functions
/// and registered natives.
pub struct ScriptEngine {
    globals: HashMap<String, ScriptValue>,
    functions: HashMap<String, Arc<FunctionDecl>>,
    natives: HashMap<String, NativeFunction<ScriptValue>>,
    max_call_depth: usize,
}

impl ScriptEngine {
    pub fn new(config: &ScriptConfig) -> Self {
        let mut globals = HashMap::new();
        globals.insert("NaN".to_string(), ScriptValue::Float(f64::NAN));
        globals.insert("Infinity".to_string(), ScriptValue::Float(f64::INFINITY));

        Self {
            globals,
            functions: HashMap::new(),
            natives: builtin_functions(),
            max_call_depth: config.max_call_depth,
        }
    }

    pub fn global(&self, name: &str) -> Option<&ScriptValue> {
        self.globals.get(name)
    }

    /// Calls a loaded function with arguments.
    pub fn call_with_args(
        &mut self,
        name: &str,
        args: Vec<ScriptValue>,
    ) -> Result<ScriptValue, ScriptError> {
        let mut interpreter = Interpreter::new(
            &mut self.globals,
            &self.functions,
            &self.natives,
            self.max_call_depth,
        );
        interpreter.call(name, args)
    }
}

impl ScriptRuntime for ScriptEngine {
    type Program = Program;
    type Value = ScriptValue;

    fn compile(source: &str) -> Result<Program, ScriptError> {
        ScriptParser::new().parse_program(source)
    }

    fn create(config: &ScriptConfig) -> Self {
        Self::new(config)
    }

    fn preload(&mut self, program: &Program) -> Result<(), ScriptError> {
        for function in program.functions() {
            self.functions
                .insert(function.name.clone(), Arc::clone(function));
        }
        debug!(
            "Preloaded script with {} functions",
            self.functions.len()
        );

        let mut interpreter = Interpreter::new(
            &mut self.globals,
            &self.functions,
            &self.natives,
            self.max_call_depth,
        );
        interpreter.run(&program.body)
    }

    fn set_global(&mut self, name: &str, value: ScriptValue) {
        self.globals.insert(name.to_string(), value);
    }

    fn register_native(&mut self, name: &str, function: NativeFunction<ScriptValue>) {
        self.natives.insert(name.to_string(), function);
    }

    fn call(&mut self, entry: &str) -> Result<ScriptValue, ScriptError> {
        self.call_with_args(entry, Vec::new())
    }

    fn import(value: &Value) -> ScriptValue {
        match value {
            Value::Null => ScriptValue::Null,
            Value::Int(i) => ScriptValue::Int(*i),
            Value::UInt(u) => ScriptValue::UInt(*u),
            Value::Float(f) => ScriptValue::Float(*f),
            Value::Bool(b) => ScriptValue::Bool(*b),
            Value::String(s) => ScriptValue::String(s.clone()),
            Value::Bytes(bytes) => ScriptValue::Bytes(bytes.clone()),
            Value::Time(t) => ScriptValue::Timestamp(*t),
            Value::Array(items) => ScriptValue::array(items.iter().map(Self::import).collect()),
            Value::Map(map) => ScriptValue::object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::import(v)))
                    .collect(),
            ),
        }
    }

    fn export(value: &ScriptValue) -> Option<Value> {
        export_visited(value, &mut Visited::default())
    }

    fn new_date(epoch_millis: i64) -> ScriptValue {
        ScriptValue::Date(epoch_millis)
    }

    fn get_property(object: &ScriptValue, name: &str) -> Option<ScriptValue> {
        match object {
            ScriptValue::Object(map) => map.read().get(name).cloned(),
            _ => None,
        }
    }

    fn set_property(object: &mut ScriptValue, name: &str, value: ScriptValue) -> bool {
        match object {
            ScriptValue::Object(map) => {
                map.write().insert(name.to_string(), value);
                true
            }
            _ => false,
        }
    }
}

/// Host view of a script value. A reference back to a container already being
/// exported has no host form and is left out.
fn export_visited(value: &ScriptValue, visited: &mut Visited) -> Option<Value> {
    let exported = match value {
        ScriptValue::Undefined => return None,
        ScriptValue::Null => Value::Null,
        ScriptValue::Bool(b) => Value::Bool(*b),
        ScriptValue::Int(i) => Value::Int(*i),
        ScriptValue::UInt(u) => Value::UInt(*u),
        ScriptValue::Float(f) => Value::Float(*f),
        ScriptValue::String(s) => Value::String(s.clone()),
        ScriptValue::Bytes(bytes) => Value::Bytes(bytes.clone()),
        ScriptValue::Date(ms) => Value::Time(from_unix_millis(*ms)),
        ScriptValue::Timestamp(t) => Value::Time(*t),
        ScriptValue::Array(items) => {
            if !visited.enter(items.id()) {
                return None;
            }
            let exported = items
                .read()
                .iter()
                .map(|item| export_visited(item, visited).unwrap_or(Value::Null))
                .collect();
            visited.leave();
            Value::Array(exported)
        }
        ScriptValue::Object(map) => {
            if !visited.enter(map.id()) {
                return None;
            }
            let exported = map
                .read()
                .iter()
                .filter_map(|(k, v)| export_visited(v, visited).map(|exported| (k.clone(), exported)))
                .collect::<Record>();
            visited.leave();
            Value::Map(exported)
        }
    };
    Some(exported)
}

impl Default for ScriptEngine {
    fn default() -> Self {
        Self::new(&ScriptConfig::default())
    }
}

/// Builds an empty script object.
pub fn empty_object() -> ScriptValue {
    ScriptValue::object(ScriptObject::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::record_from_json;
    use serde_json::json;

    fn engine_with(body: &str) -> ScriptEngine {
        let program = ScriptEngine::compile(&ScriptEngine::wrap_script(body)).unwrap();
        let mut engine = ScriptEngine::default();
        engine.preload(&program).unwrap();
        engine
    }

    fn run(body: &str, source: serde_json::Value) -> Option<Value> {
        let mut engine = engine_with(body);
        let source = Value::Map(record_from_json(source).unwrap());
        engine.set_global("source", ScriptEngine::import(&source));
        let result = engine.call("main").unwrap();
        ScriptEngine::export(&result)
    }

    #[test]
    fn test_identity() {
        let result = run("return source;", json!({"a": 1, "b": "x"}));
        assert_eq!(result, Some(Value::from(json!({"a": 1, "b": "x"}))));
    }

    #[test]
    fn test_undefined_result_is_null() {
        assert_eq!(run("let x = 1;", json!({})), Some(Value::Null));
    }

    #[test]
    fn test_helpers_and_loops() {
        let body = r#"
            function double(n) { return n * 2; }
            let out = [];
            for (const item of source.items) {
                if (item > 1) {
                    out.push({ value: double(item), label: "n" + item });
                }
            }
            return out;
        "#;
        let result = run(body, json!({"items": [1, 2, 3]})).unwrap();
        assert_eq!(
            result,
            Value::from(json!([
                {"value": 4, "label": "n2"},
                {"value": 6, "label": "n3"},
            ]))
        );
    }

    #[test]
    fn test_scrub_applies_to_result() {
        let body = "return { a: undefined, b: NaN, c: null, d: [undefined, 1 / 0, 2] };";
        let result = run(body, json!({})).unwrap();
        assert_eq!(result, Value::from(json!({"c": null, "d": [null, null, 2]})));
    }

    #[test]
    fn test_member_assignment_and_ternary() {
        let body = r#"
            let out = { meta: {} };
            out.meta.kind = source.n > 10 ? "big" : "small";
            out.count = 0;
            out.count += source.n;
            return out;
        "#;
        let result = run(body, json!({"n": 12})).unwrap();
        assert_eq!(result, Value::from(json!({"meta": {"kind": "big"}, "count": 12})));
    }

    #[test]
    fn test_objects_are_shared_between_bindings() {
        let body = r#"
            let out = { items: [] };
            let item = { a: 1 };
            out.items.push(item);
            item.b = 2;
            let list = out.items;
            list.push({ c: 3 });
            list[0].a = 10;
            return out;
        "#;
        let result = run(body, json!({})).unwrap();
        assert_eq!(
            result,
            Value::from(json!({"items": [{"a": 10, "b": 2}, {"c": 3}]}))
        );
    }

    #[test]
    fn test_source_mutated_through_alias() {
        let body = "let m = source.meta; m.x = 1; source.meta.y = 2; return source;";
        let result = run(body, json!({"meta": {}})).unwrap();
        assert_eq!(result, Value::from(json!({"meta": {"x": 1, "y": 2}})));
    }

    #[test]
    fn test_circular_result_is_an_error() {
        let mut engine = engine_with("let o = {}; o.self = o; return o;");
        engine.set_global("source", empty_object());
        assert!(matches!(engine.call("main"), Err(ScriptError::Runtime(_))));
    }

    #[test]
    fn test_dates() {
        let body = "return { at: new Date(source.ms), ms: new Date(1500).getTime() };";
        let result = run(body, json!({"ms": 86_400_000})).unwrap();
        let record = result.into_map().unwrap();
        assert_eq!(record["at"], Value::Time(from_unix_millis(86_400_000)));
        assert_eq!(record["ms"], Value::Int(1500));
    }

    #[test]
    fn test_runtime_errors() {
        let mut engine = engine_with("return missing.field;");
        engine.set_global("source", empty_object());
        assert!(matches!(engine.call("main"), Err(ScriptError::Runtime(_))));

        let mut engine = engine_with("return nothing();");
        assert_eq!(
            engine.call("main"),
            Err(ScriptError::UndefinedFunction("nothing".to_string()))
        );
    }

    #[test]
    fn test_call_depth_limit() {
        let program = ScriptEngine::compile("function f(n) { return f(n + 1); }").unwrap();
        let mut engine = ScriptEngine::new(&ScriptConfig {
            max_call_depth: 16,
            log_console_output: false,
        });
        engine.preload(&program).unwrap();
        assert_eq!(
            engine.call_with_args("f", vec![ScriptValue::Int(0)]),
            Err(ScriptError::CallDepthExceeded(16))
        );
    }

    #[test]
    fn test_top_level_statements_run_on_preload() {
        let program = ScriptEngine::compile("const LIMIT = 3; function main() { return LIMIT; }").unwrap();
        let mut engine = ScriptEngine::default();
        engine.preload(&program).unwrap();
        assert_eq!(engine.global("LIMIT"), Some(&ScriptValue::Int(3)));
        assert_eq!(engine.call("main"), Ok(ScriptValue::Int(3)));
    }

    #[test]
    fn test_natives() {
        let mut engine = engine_with("return add(2, Math.floor(2.7));");
        engine.register_native(
            "add",
            Arc::new(|args: &[ScriptValue]| {
                Ok(ScriptValue::Float(args.iter().map(ScriptValue::to_number).sum()))
            }),
        );
        assert_eq!(engine.call("main"), Ok(ScriptValue::Float(4.0)));
    }
}
