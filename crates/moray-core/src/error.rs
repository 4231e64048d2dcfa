//! Error types for the Moray scanner

/// Result type alias using [`Error`]
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Main error type for the Moray scanner
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The interpreter could not describe the plugin
    #[error("Failed to parse plugin '{plugin}': {message}")]
    Parse {
        /// Plugin file name
        plugin: String,
        /// Error message
        message: String,
    },

    /// A plugin was parsed but never assigned an identifier
    #[error("Plugin '{0}' has no OID and cannot be registered")]
    MissingIdentifier(String),

    /// A fetched cache entry carries no identifier
    #[error("Cached entry for '{0}' has no OID")]
    InvalidCachedEntry(String),

    /// Metadata cache error
    #[error("Cache error: {0}")]
    Cache(String),

    /// Script execution error
    #[error("Script error: {0}")]
    Script(String),

    /// Worker process could not be spawned
    #[error("Failed to spawn worker: {0}")]
    Spawn(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error (should not happen in production)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a parse error
    pub fn parse(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Parse {
            plugin: plugin.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error() {
        let err = Error::parse("ssh_detect.rhai", "unexpected token");
        assert!(matches!(err, Error::Parse { .. }));
        assert!(err.to_string().contains("ssh_detect.rhai"));
    }

    #[test]
    fn test_missing_identifier_display() {
        let err = Error::MissingIdentifier("ftp_anon.rhai".to_string());
        assert!(err.to_string().contains("no OID"));
    }
}
