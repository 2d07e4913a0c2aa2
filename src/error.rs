//! Error types for depurar.

/// Result type alias for depurar operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in depurar operations.
///
/// Per-record data problems are never errors: they are recovered into
/// [`Finding`](crate::report::Finding)s by the validator. Only problems
/// that prevent a batch run from starting at all (unknown schema,
/// invalid configuration) or report deserialization failures surface
/// here.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Schema identifier not recognized; rejected at batch entry.
    #[error("Unknown schema '{name}' (expected claim, member, or provider)")]
    UnknownSchema {
        /// The unrecognized schema identifier.
        name: String,
    },

    /// Invalid engine configuration (e.g. negative severity weights).
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration error.
        message: String,
    },

    /// Report serialization or deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create an unknown schema error.
    pub fn unknown_schema(name: impl Into<String>) -> Self {
        Self::UnknownSchema { name: name.into() }
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_schema() {
        let err = Error::unknown_schema("invoice");
        assert!(err.to_string().contains("invoice"));
        assert!(err.to_string().contains("claim"));
    }

    #[test]
    fn test_invalid_config() {
        let err = Error::invalid_config("weights must be non-negative");
        assert!(err.to_string().contains("weights must be non-negative"));
    }
}
