//! Error types for the store crate

/// Result type for store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading or writing the store resource
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The store resource does not exist yet
    #[error("store {namespace}/{name} not found")]
    NotFound { namespace: String, name: String },

    /// A create raced with another writer
    #[error("store {namespace}/{name} already exists")]
    AlreadyExists { namespace: String, name: String },

    /// Conditional write lost against a concurrent modification
    #[error("store {name} was modified concurrently: expected version {expected}, found {actual}")]
    Conflict {
        name: String,
        expected: String,
        actual: String,
    },

    /// Transport or server failure
    #[error("{0}")]
    Unavailable(String),

    /// Patch cannot be applied to the current entries
    #[error("invalid patch: {0}")]
    InvalidPatch(String),

    /// Entry value could not be serialized or parsed
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Whether retrying the same operation later can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Conflict { .. } | Error::Unavailable(_) | Error::AlreadyExists { .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<trustroot_types::Error> for Error {
    fn from(err: trustroot_types::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
