//! Error types for trustroot-crypto

use thiserror::Error;

/// Errors that can occur while decoding keys and certificates
#[derive(Error, Debug)]
pub enum Error {
    /// Text could not be split into PEM blocks
    #[error("malformed PEM: {0}")]
    Pem(String),

    #[error("malformed DER: {0}")]
    Der(String),

    /// Public key could not be decoded
    #[error("invalid public key: {0}")]
    InvalidKey(String),

    /// Public key algorithm has no log ID derivation
    #[error("unsupported public key algorithm: {0}")]
    UnsupportedKeyType(String),

    /// Certificate block could not be decoded
    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),
}

impl Error {
    /// True when the material decoded but its key type cannot be used
    pub fn is_key_derivation(&self) -> bool {
        matches!(self, Error::UnsupportedKeyType(_))
    }
}

/// Result type for cryptographic operations
pub type Result<T> = std::result::Result<T, Error>;
