//! Error types for repository loading
//!
//! Every variant names the artifact that could not be used.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The repository archive could not be decompressed or read
    #[error("repository archive: {0}")]
    Archive(String),

    /// The archive holds more data than the configured total limit
    #[error("repository archive exceeds {limit} bytes")]
    ArchiveTooLarge { limit: u64 },

    /// The root manifest is not a valid TUF root
    #[error("root manifest: {0}")]
    InvalidRootManifest(String),

    /// The targets metadata file is present but malformed
    #[error("targets metadata {path}: {reason}")]
    InvalidTargetsMetadata { path: String, reason: String },

    /// No usable target file was found
    #[error("no trust material found under targets path {targets:?}")]
    MissingTarget { targets: String },

    /// A target file does not match its metadata
    #[error("target {target}: {reason}")]
    TargetMismatch { target: String, reason: String },

    /// A target file exceeds the configured size limit
    #[error("target {target}: {size} bytes exceeds limit of {limit}")]
    TargetTooLarge { target: String, size: u64, limit: u64 },

    /// A target file holds unusable key or certificate material
    #[error("target {target}: {source}")]
    InvalidTarget {
        target: String,
        #[source]
        source: trustroot_crypto::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
