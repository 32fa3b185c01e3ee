//! Error types for ark-pta
//!
//! Resolution misses (a callee, field base or `this` binding that cannot be
//! found) are not errors: they are logged and the edge is omitted. The variants
//! here abort the current analysis run.

use thiserror::Error;

use crate::config::ConfigError;

/// Main error type for pointer-analysis operations
#[derive(Debug, Error)]
pub enum PtaError {
    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Builder or solver reached a state its algorithm rules out
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// A node id that must exist does not
    #[error("Missing PAG node: {0}")]
    MissingNode(String),

    /// IO error while writing dumps
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error while writing dumps
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PtaError {
    /// Create an invariant violation
    pub fn invariant(msg: impl Into<String>) -> Self {
        PtaError::InvariantViolation(msg.into())
    }

    /// Create a missing-node error
    pub fn missing_node(what: impl std::fmt::Display) -> Self {
        PtaError::MissingNode(what.to_string())
    }
}

/// Result type alias for pointer-analysis operations
pub type Result<T> = std::result::Result<T, PtaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_converts() {
        fn fails() -> Result<()> {
            Err(ConfigError::Validation("k".to_string()))?;
            Ok(())
        }
        let err = fails().unwrap_err();
        assert!(matches!(err, PtaError::Config(_)));
        assert!(err.to_string().starts_with("Configuration error"));
    }

    #[test]
    fn test_invariant_message() {
        let err = PtaError::invariant("field node cloned twice");
        assert_eq!(err.to_string(), "Invariant violation: field node cloned twice");
    }
}
