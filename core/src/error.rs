use thiserror::Error;

/// Forge error types
#[derive(Error, Debug)]
pub enum ForgeError {
    /// An image inspection call failed. This is the only failure class
    /// that is retried.
    #[error("{0}")]
    Inspect(String),

    /// An external command exited non-zero or could not be spawned
    #[error("{0}")]
    Command(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A request failed validation (arches, scope, manifest types, labels)
    #[error("{0}")]
    Validation(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl ForgeError {
    /// Whether this failure came from an image inspection call.
    ///
    /// Inspection talks to remote registries through an external tool and
    /// is the retryable failure class. Validation and configuration
    /// failures are deterministic and never retried.
    pub fn is_inspect_failure(&self) -> bool {
        matches!(self, ForgeError::Inspect(_))
    }
}

impl From<serde_json::Error> for ForgeError {
    fn from(err: serde_json::Error) -> Self {
        ForgeError::Serialization(err.to_string())
    }
}

/// Result type alias for Forge operations
pub type Result<T> = std::result::Result<T, ForgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inspect_error_display() {
        let error = ForgeError::Inspect("mediaType not found".to_string());
        assert_eq!(error.to_string(), "mediaType not found");
    }

    #[test]
    fn test_config_error_display() {
        let error = ForgeError::Config("missing binary_image".to_string());
        assert_eq!(
            error.to_string(),
            "Configuration error: missing binary_image"
        );
    }

    #[test]
    fn test_is_inspect_failure() {
        assert!(ForgeError::Inspect("x".to_string()).is_inspect_failure());
        assert!(!ForgeError::Command("x".to_string()).is_inspect_failure());
        assert!(!ForgeError::Validation("x".to_string()).is_inspect_failure());
        assert!(!ForgeError::Config("x".to_string()).is_inspect_failure());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: ForgeError = io_error.into();
        assert!(matches!(error, ForgeError::Io(_)));
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let result: std::result::Result<serde_json::Value, _> =
            serde_json::from_str("{ invalid json }");
        let error: ForgeError = result.unwrap_err().into();
        assert!(matches!(error, ForgeError::Serialization(_)));
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_ok() -> Result<i32> {
            Ok(42)
        }

        assert_eq!(returns_ok().unwrap(), 42);
    }
}
