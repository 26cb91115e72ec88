//! Error types for the reconciler

use thiserror::Error;

/// Errors returned by a [`DeclarationClient`](crate::DeclarationClient)
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("trustroot {name:?} not found")]
    NotFound { name: String },

    #[error("trustroot {name:?} was modified concurrently")]
    Conflict { name: String },

    #[error("{0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum Error {
    /// Work queue key is not `name` or `namespace/name`
    #[error("invalid resource key: {0:?}")]
    InvalidKey(String),

    #[error(transparent)]
    Declaration(#[from] ClientError),

    #[error(transparent)]
    Convert(#[from] trustroot_convert::Error),

    #[error(transparent)]
    Store(#[from] trustroot_store::Error),

    #[error("reconciliation cancelled")]
    Cancelled,
}

impl Error {
    /// Whether the key should be requeued with backoff
    ///
    /// Conversion failures stay put until the declaration changes or the
    /// next resync.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Declaration(ClientError::NotFound { .. }) => false,
            Error::Declaration(_) => true,
            Error::Store(e) => e.is_retryable(),
            Error::InvalidKey(_) | Error::Convert(_) | Error::Cancelled => false,
        }
    }
}

/// Result type for reconciler operations
pub type Result<T> = std::result::Result<T, Error>;
