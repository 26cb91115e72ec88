//! Hash algorithm identifiers used by transparency log instances

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Hash algorithm of a transparency log
///
/// Serialized with the trusted root spelling (`SHA2_256`). Declarations use
/// the lowercase spelling (`sha-256`), accepted by [`FromStr`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlgorithm {
    /// SHA2-256
    #[default]
    #[serde(rename = "SHA2_256")]
    Sha2256,
    /// SHA2-512
    #[serde(rename = "SHA2_512")]
    Sha2512,
}

impl FromStr for HashAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sha-256" | "sha256" | "SHA2_256" => Ok(HashAlgorithm::Sha2256),
            "sha-512" | "sha512" | "SHA2_512" => Ok(HashAlgorithm::Sha2512),
            other => Err(Error::InvalidHashAlgorithm(other.to_string())),
        }
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HashAlgorithm::Sha2256 => write!(f, "SHA2_256"),
            HashAlgorithm::Sha2512 => write!(f, "SHA2_512"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("sha-256", HashAlgorithm::Sha2256)]
    #[case("sha256", HashAlgorithm::Sha2256)]
    #[case("SHA2_256", HashAlgorithm::Sha2256)]
    #[case("sha-512", HashAlgorithm::Sha2512)]
    #[case("SHA2_512", HashAlgorithm::Sha2512)]
    fn test_parse_declared_names(#[case] input: &str, #[case] expected: HashAlgorithm) {
        assert_eq!(input.parse::<HashAlgorithm>().unwrap(), expected);
    }

    #[test]
    fn test_reject_unknown_algorithm() {
        let err = "md5".parse::<HashAlgorithm>().unwrap_err();
        assert!(matches!(err, Error::InvalidHashAlgorithm(name) if name == "md5"));
    }

    #[test]
    fn test_serialized_spelling() {
        assert_eq!(
            serde_json::to_string(&HashAlgorithm::Sha2512).unwrap(),
            "\"SHA2_512\""
        );
        assert_eq!(HashAlgorithm::default(), HashAlgorithm::Sha2256);
        assert_eq!(HashAlgorithm::Sha2256.to_string(), "SHA2_256");
    }
}
