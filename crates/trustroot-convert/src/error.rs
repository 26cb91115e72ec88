//! Conversion errors

use thiserror::Error;
use trustroot_types::Role;

/// Broad category of a conversion failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed PEM, key or certificate material
    Parse,
    /// Key decoded but no log ID can be derived for its type
    KeyDerivation,
    /// Repository snapshot unusable
    RepositoryParse,
    /// Declaration fields failed validation
    Invalid,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to parse {role} material: {source}")]
    Parse {
        role: Role,
        #[source]
        source: trustroot_crypto::Error,
    },

    #[error("cannot derive log ID for {role} key: {source}")]
    KeyDerivation {
        role: Role,
        #[source]
        source: trustroot_crypto::Error,
    },

    #[error("{role}: invalid {field}: {reason}")]
    InvalidField {
        role: Role,
        field: &'static str,
        reason: String,
    },

    #[error("failed to load repository: {0}")]
    Repository(#[from] trustroot_tuf::Error),

    #[error(transparent)]
    Validation(#[from] trustroot_types::Error),
}

impl Error {
    pub(crate) fn from_crypto(role: Role, source: trustroot_crypto::Error) -> Self {
        if source.is_key_derivation() {
            Error::KeyDerivation { role, source }
        } else {
            Error::Parse { role, source }
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Parse { .. } => ErrorKind::Parse,
            Error::KeyDerivation { .. } => ErrorKind::KeyDerivation,
            Error::Repository(_) => ErrorKind::RepositoryParse,
            Error::InvalidField { .. } | Error::Validation(_) => ErrorKind::Invalid,
        }
    }

    /// Role whose material failed, when the failure is tied to one
    pub fn role(&self) -> Option<Role> {
        match self {
            Error::Parse { role, .. }
            | Error::KeyDerivation { role, .. }
            | Error::InvalidField { role, .. } => Some(*role),
            Error::Repository(_) | Error::Validation(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
