use thiserror::Error;

/// Errors raised while compiling or running a script.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ScriptError {
    #[error("Script parse error: {0}")]
    Parse(String),

    #[error("Script runtime error: {0}")]
    Runtime(String),

    #[error("Function not defined: {0}")]
    UndefinedFunction(String),

    #[error("Maximum call depth of {0} exceeded")]
    CallDepthExceeded(usize),
}

impl ScriptError {
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime(message.into())
    }
}
