//! TUF root manifest schema
//!
//! Only the structure is checked here. Signatures and thresholds are the
//! caller's trust decision.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::{Error, Result};

/// Top-level roles every root manifest must delegate
pub const TOP_LEVEL_ROLES: [&str; 4] = ["root", "snapshot", "targets", "timestamp"];

/// A signed root manifest
#[derive(Debug, Clone, Deserialize)]
pub struct RootManifest {
    pub signed: RootMetadata,
    #[serde(default)]
    pub signatures: Vec<Signature>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RootMetadata {
    #[serde(rename = "_type")]
    pub type_: String,
    pub spec_version: String,
    pub version: u64,
    pub expires: DateTime<Utc>,
    pub keys: BTreeMap<String, Key>,
    pub roles: BTreeMap<String, RoleKeys>,
    #[serde(default)]
    pub consistent_snapshot: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Key {
    pub keytype: String,
    pub scheme: String,
    pub keyval: KeyValue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeyValue {
    pub public: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoleKeys {
    pub keyids: Vec<String>,
    pub threshold: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Signature {
    pub keyid: String,
    pub sig: String,
}

impl RootManifest {
    /// Parse and structurally validate a root manifest
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let manifest: RootManifest = serde_json::from_slice(bytes)
            .map_err(|e| Error::InvalidRootManifest(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> Result<()> {
        let signed = &self.signed;
        if signed.type_ != "root" {
            return Err(Error::InvalidRootManifest(format!(
                "expected _type \"root\", got {:?}",
                signed.type_
            )));
        }
        if signed.version == 0 {
            return Err(Error::InvalidRootManifest("version must be at least 1".into()));
        }
        for name in TOP_LEVEL_ROLES {
            let role = signed.roles.get(name).ok_or_else(|| {
                Error::InvalidRootManifest(format!("missing role {:?}", name))
            })?;
            if role.threshold == 0 {
                return Err(Error::InvalidRootManifest(format!(
                    "role {:?} has threshold 0",
                    name
                )));
            }
            if let Some(unknown) = role.keyids.iter().find(|id| !signed.keys.contains_key(*id)) {
                return Err(Error::InvalidRootManifest(format!(
                    "role {:?} references unknown key {}",
                    name, unknown
                )));
            }
        }
        Ok(())
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.signed.expires <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT_JSON: &[u8] = include_bytes!("../../../testdata/tuf/root.json");

    #[test]
    fn test_parse_fixture_root() {
        let root = RootManifest::from_slice(ROOT_JSON).unwrap();
        assert_eq!(root.signed.version, 1);
        assert_eq!(root.signed.spec_version, "1.0");
        assert_eq!(root.signed.keys.len(), 4);
        assert!(!root.signed.consistent_snapshot);
        assert_eq!(root.signed.roles["targets"].threshold, 1);
        assert!(root.is_expired(Utc::now()));
    }

    #[test]
    fn test_rejects_wrong_type() {
        let json = br#"{"signed":{"_type":"targets","spec_version":"1.0","version":1,
            "expires":"2030-01-01T00:00:00Z","keys":{},"roles":{}},"signatures":[]}"#;
        let err = RootManifest::from_slice(json).unwrap_err();
        assert!(err.to_string().contains("expected _type"));
    }

    #[test]
    fn test_rejects_missing_role() {
        let json = br#"{"signed":{"_type":"root","spec_version":"1.0","version":1,
            "expires":"2030-01-01T00:00:00Z","keys":{},
            "roles":{"root":{"keyids":[],"threshold":1}}}}"#;
        let err = RootManifest::from_slice(json).unwrap_err();
        assert!(err.to_string().contains("missing role \"snapshot\""));
    }

    #[test]
    fn test_rejects_non_json() {
        assert!(matches!(
            RootManifest::from_slice(b"\x1f\x8b not json"),
            Err(Error::InvalidRootManifest(_))
        ));
    }
}
