//! Targets role metadata and target classification

use std::collections::BTreeMap;

use serde::Deserialize;
use trustroot_types::Role;

use crate::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
struct SignedTargets {
    signed: TargetsMetadata,
}

/// The `signed` section of `targets.json`
#[derive(Debug, Clone, Deserialize)]
pub struct TargetsMetadata {
    #[serde(rename = "_type")]
    pub type_: String,
    #[serde(default)]
    pub targets: BTreeMap<String, TargetDescription>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TargetDescription {
    pub length: u64,
    #[serde(default)]
    pub hashes: BTreeMap<String, String>,
    #[serde(default)]
    pub custom: Option<TargetCustom>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TargetCustom {
    #[serde(default)]
    pub sigstore: Option<SigstoreCustom>,
}

/// Sigstore usage annotation of a target
#[derive(Debug, Clone, Deserialize)]
pub struct SigstoreCustom {
    pub usage: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
}

impl TargetsMetadata {
    pub fn from_slice(path: &str, bytes: &[u8]) -> Result<Self> {
        let invalid = |reason: String| Error::InvalidTargetsMetadata {
            path: path.to_string(),
            reason,
        };
        let signed: SignedTargets =
            serde_json::from_slice(bytes).map_err(|e| invalid(e.to_string()))?;
        if signed.signed.type_ != "targets" {
            return Err(invalid(format!(
                "expected _type \"targets\", got {:?}",
                signed.signed.type_
            )));
        }
        Ok(signed.signed)
    }
}

impl TargetDescription {
    pub fn sigstore(&self) -> Option<&SigstoreCustom> {
        self.custom.as_ref().and_then(|c| c.sigstore.as_ref())
    }

    /// Role named by the usage annotation
    pub fn role(&self) -> Option<Role> {
        self.sigstore().and_then(|s| s.usage.parse().ok())
    }

    pub fn is_expired(&self) -> bool {
        self.sigstore()
            .and_then(|s| s.status.as_deref())
            .is_some_and(|status| status.eq_ignore_ascii_case("expired"))
    }

    pub fn uri(&self) -> Option<&str> {
        self.sigstore()
            .and_then(|s| s.uri.as_deref())
            .filter(|uri| !uri.is_empty())
    }

    /// Check length and any known digests against the file contents
    pub fn verify(&self, name: &str, contents: &[u8]) -> Result<()> {
        let mismatch = |reason: String| Error::TargetMismatch {
            target: name.to_string(),
            reason,
        };
        if contents.len() as u64 != self.length {
            return Err(mismatch(format!(
                "length {} does not match metadata length {}",
                contents.len(),
                self.length
            )));
        }
        for (algorithm, expected) in &self.hashes {
            let Some(actual) = trustroot_crypto::target_digest(algorithm, contents) else {
                tracing::debug!(name, algorithm = %algorithm, "skipping unknown target hash");
                continue;
            };
            let actual = hex::encode(actual);
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(mismatch(format!("{} digest mismatch", algorithm)));
            }
        }
        Ok(())
    }
}

/// Classify a target by file name when metadata does not annotate it
pub fn role_from_file_name(name: &str) -> Option<Role> {
    let lower = name.to_ascii_lowercase();
    Role::ALL
        .into_iter()
        .find(|role| lower.starts_with(role.as_str()))
}

/// Position of a certificate file within a chain: leaf, intermediate, root
pub(crate) fn chain_rank(name: &str) -> u8 {
    let lower = name.to_ascii_lowercase();
    if lower.contains("leaf") {
        0
    } else if lower.contains("root") {
        2
    } else {
        1
    }
}
