//! Error types for the trust model

use thiserror::Error;

/// Errors that can occur while handling trust model values
#[derive(Debug, Error)]
pub enum Error {
    /// JSON parsing or serialization error
    #[error("failed to process JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Hash algorithm name not recognized
    #[error("unsupported hash algorithm: {0}")]
    InvalidHashAlgorithm(String),

    /// Declaration failed validation
    #[error("invalid declaration: {0}")]
    Validation(String),
}

/// Result type for trust model operations
pub type Result<T> = std::result::Result<T, Error>;
