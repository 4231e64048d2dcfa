//! Script execution error types

/// Script execution result type
pub type Result<T> = std::result::Result<T, ScriptError>;

/// Script execution error
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// Script compilation/parsing error
    #[error("compilation failed: {message}")]
    Compilation {
        /// Error message
        message: String,
        /// Line number if available
        line: Option<usize>,
    },

    /// Script runtime error
    #[error("runtime error: {message}")]
    Runtime {
        /// Error message
        message: String,
        /// Script line where the error occurred
        line: Option<usize>,
    },

    /// Script rejected before execution (signature policy)
    #[error("script rejected: {0}")]
    Rejected(String),

    /// IO error reading script files
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Engine-internal error
    #[error("internal engine error: {0}")]
    Internal(String),
}

impl From<ScriptError> for moray_core::Error {
    fn from(err: ScriptError) -> Self {
        moray_core::Error::Script(err.to_string())
    }
}
