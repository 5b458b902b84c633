//! Tree-walking interpreter for the script language.

pub mod builtins;
pub mod engine;
pub mod methods;
pub mod operators;

pub use builtins::{builtin_functions, scan_struct, SCAN_STRUCT};
pub use engine::Interpreter;
