//! Error types for Arbor

use thiserror::Error;

/// Main error type for Arbor
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArborError {
    // ============ Contract Errors ============
    #[error("{0}")]
    InvalidArgument(String),

    // ============ Conversion Errors ============
    #[error("Serialization failed: {0}")]
    Serialization(String),

    // ============ Configuration Errors ============
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ArborError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        ArborError::InvalidArgument(message.into())
    }

    /// True for contract violations raised by argument validation
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, ArborError::InvalidArgument(_))
    }
}

impl From<serde_json::Error> for ArborError {
    fn from(err: serde_json::Error) -> Self {
        ArborError::Serialization(err.to_string())
    }
}

/// Result type for Arbor operations
pub type ArborResult<T> = Result<T, ArborError>;
