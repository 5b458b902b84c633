//! Sandboxed script execution.
//!
//! [`ScriptRuntime`] is the capability the transformer needs from a script
//! engine. [`ScriptEngine`] is the bundled implementation: a small
//! JavaScript-flavored language parsed with PEST and run by a tree-walking
//! interpreter.

pub mod ast;
pub mod error;
pub mod interpreter;
pub mod parser;
pub mod runtime;
pub mod value;

use std::sync::Arc;

pub use error::ScriptError;
pub use runtime::ScriptEngine;
pub use value::ScriptValue;

use crate::transformer::config::ScriptConfig;
use crate::value::Value;

/// Host function callable from scripts.
pub type NativeFunction<V> = Arc<dyn Fn(&[V]) -> Result<V, String> + Send + Sync>;

/// Name of the function every wrapped script exposes.
pub const ENTRY_POINT: &str = "main";

/// A script engine the transformer can drive.
///
/// One runtime instance backs one execution context and is never used by two
/// threads at once. Compiled programs are shared between contexts.
pub trait ScriptRuntime: Send + 'static {
    /// Compiled form of a script.
    type Program: Send + Sync + 'static;
    /// Value representation inside the engine.
    type Value: Clone + 'static;

    /// Compiles wrapped script text.
    fn compile(source: &str) -> Result<Self::Program, ScriptError>;

    /// Creates a fresh runtime.
    fn create(config: &ScriptConfig) -> Self
    where
        Self: Sized;

    /// Loads a compiled program so that its functions can be called.
    fn preload(&mut self, program: &Self::Program) -> Result<(), ScriptError>;

    /// Binds a global variable, replacing any previous binding.
    fn set_global(&mut self, name: &str, value: Self::Value);

    /// Registers a host function. Dotted names such as `console.log` are
    /// callable with member syntax.
    fn register_native(&mut self, name: &str, function: NativeFunction<Self::Value>);

    /// Calls a loaded function without arguments.
    fn call(&mut self, entry: &str) -> Result<Self::Value, ScriptError>;

    /// Converts a host value into the engine's representation.
    fn import(value: &Value) -> Self::Value;

    /// Converts an engine value back. `None` when the value has no host
    /// representation (such as `undefined`).
    fn export(value: &Self::Value) -> Option<Value>;

    /// The engine's native date for the given epoch milliseconds.
    fn new_date(epoch_millis: i64) -> Self::Value;

    /// Reads a property of an engine object. `None` when `object` is not an
    /// object or lacks the property.
    fn get_property(object: &Self::Value, name: &str) -> Option<Self::Value>;

    /// Sets a property on an engine object. Returns `false` when `object` is
    /// not an object.
    fn set_property(object: &mut Self::Value, name: &str, value: Self::Value) -> bool;

    /// Wraps a script body so that it exposes [`ENTRY_POINT`]. The body runs
    /// inside `run()`; `main()` returns null for a null result and the
    /// scrubbed result otherwise.
    fn wrap_script(body: &str) -> String {
        format!(
            "function run() {{\n{body}\n}}\n\
             function main() {{\n  let v = run();\n  if (v == null) {{ return null; }}\n  return scanStruct(v);\n}}\n"
        )
    }
}
