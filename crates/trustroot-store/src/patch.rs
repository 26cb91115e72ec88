//! JSON Patch documents over store entries
//!
//! Only the `/data/<key>` paths of the store resource are ever patched. Keys
//! are escaped per RFC 6901 so names containing `/` or `~` stay addressable.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const DATA_PREFIX: &str = "/data/";

/// A single operation against one store entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOperation {
    Add { path: String, value: String },
    Replace { path: String, value: String },
    Remove { path: String },
}

impl PatchOperation {
    pub fn add(key: &str, value: impl Into<String>) -> Self {
        PatchOperation::Add {
            path: entry_path(key),
            value: value.into(),
        }
    }

    pub fn replace(key: &str, value: impl Into<String>) -> Self {
        PatchOperation::Replace {
            path: entry_path(key),
            value: value.into(),
        }
    }

    pub fn remove(key: &str) -> Self {
        PatchOperation::Remove {
            path: entry_path(key),
        }
    }

    pub fn path(&self) -> &str {
        match self {
            PatchOperation::Add { path, .. }
            | PatchOperation::Replace { path, .. }
            | PatchOperation::Remove { path } => path,
        }
    }

    /// Operation name as it appears on the wire
    pub fn op(&self) -> &'static str {
        match self {
            PatchOperation::Add { .. } => "add",
            PatchOperation::Replace { .. } => "replace",
            PatchOperation::Remove { .. } => "remove",
        }
    }

    /// Entry key addressed by this operation
    pub fn entry_key(&self) -> Result<String> {
        let path = self.path();
        let escaped = path
            .strip_prefix(DATA_PREFIX)
            .filter(|rest| !rest.is_empty() && !rest.contains('/'))
            .ok_or_else(|| Error::InvalidPatch(format!("path {path:?} is not a data entry")))?;
        Ok(unescape(escaped))
    }

    /// Apply this operation to a set of entries
    pub fn apply(&self, data: &mut BTreeMap<String, String>) -> Result<()> {
        let key = self.entry_key()?;
        match self {
            PatchOperation::Add { value, .. } => {
                data.insert(key, value.clone());
            }
            PatchOperation::Replace { value, .. } => match data.get_mut(&key) {
                Some(current) => *current = value.clone(),
                None => {
                    return Err(Error::InvalidPatch(format!(
                        "cannot replace missing entry {key:?}"
                    )))
                }
            },
            PatchOperation::Remove { .. } => {
                if data.remove(&key).is_none() {
                    return Err(Error::InvalidPatch(format!(
                        "cannot remove missing entry {key:?}"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// An ordered list of patch operations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JsonPatch(pub Vec<PatchOperation>);

impl JsonPatch {
    pub fn single(op: PatchOperation) -> Self {
        JsonPatch(vec![op])
    }

    pub fn operations(&self) -> &[PatchOperation] {
        &self.0
    }

    /// Wire encoding of the patch document
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Apply every operation, leaving `data` untouched if any fails
    pub fn apply(&self, data: &BTreeMap<String, String>) -> Result<BTreeMap<String, String>> {
        let mut patched = data.clone();
        for op in &self.0 {
            op.apply(&mut patched)?;
        }
        Ok(patched)
    }
}

/// Compute the operation that turns `current` into `desired` for one entry
///
/// Both sides are compared in canonical form. A current value that no
/// longer parses is treated as different and replaced. The returned
/// operation always carries the canonical desired value.
pub fn compute_patch(
    key: &str,
    current: Option<&str>,
    desired: Option<&str>,
) -> Result<Option<PatchOperation>> {
    let desired = desired.map(trustroot_types::canonicalize).transpose()?;
    let op = match (current, desired) {
        (None, None) => None,
        (Some(_), None) => Some(PatchOperation::remove(key)),
        (None, Some(desired)) => Some(PatchOperation::add(key, desired)),
        (Some(current), Some(desired)) => {
            let same = match trustroot_types::canonicalize(current) {
                Ok(current) => current == desired,
                Err(e) => {
                    tracing::debug!(key, error = %e, "stored entry does not parse, replacing it");
                    false
                }
            };
            (!same).then(|| PatchOperation::replace(key, desired))
        }
    };
    Ok(op)
}

/// JSON Pointer path of an entry in the store resource
pub fn entry_path(key: &str) -> String {
    format!("{DATA_PREFIX}{}", key.replace('~', "~0").replace('/', "~1"))
}

fn unescape(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const ENTRY: &str = r#"{"tlogs":[{"baseUrl":"https://rekor.example.com","hashAlgorithm":"SHA2_256","publicKey":{"rawBytes":"AAEC"},"logId":{"keyId":"AwQF"}}]}"#;
    const ENTRY_REORDERED: &str = r#"{
        "tlogs": [{
            "logId": {"keyId": "AwQF"},
            "publicKey": {"rawBytes": "AAEC"},
            "hashAlgorithm": "SHA2_256",
            "baseUrl": "https://rekor.example.com"
        }]
    }"#;

    #[rstest]
    #[case("test-trustroot", "/data/test-trustroot")]
    #[case("a/b", "/data/a~1b")]
    #[case("x~y", "/data/x~0y")]
    #[case("~/", "/data/~0~1")]
    fn test_entry_path_escaping(#[case] key: &str, #[case] path: &str) {
        assert_eq!(entry_path(key), path);
        assert_eq!(PatchOperation::remove(key).entry_key().unwrap(), key);
    }

    #[test]
    fn test_wire_format() {
        let patch = JsonPatch::single(PatchOperation::replace("tr", "{\"tlogs\":[]}"));
        assert_eq!(
            patch.to_json().unwrap(),
            r#"[{"op":"replace","path":"/data/tr","value":"{\"tlogs\":[]}"}]"#
        );
        let patch = JsonPatch::single(PatchOperation::remove("tr2"));
        assert_eq!(
            patch.to_json().unwrap(),
            r#"[{"op":"remove","path":"/data/tr2"}]"#
        );
    }

    #[test]
    fn test_equal_after_canonicalization_is_no_op() {
        assert_eq!(
            compute_patch("tr", Some(ENTRY_REORDERED), Some(ENTRY)).unwrap(),
            None
        );
    }

    #[test]
    fn test_compute_patch_ops() {
        assert_eq!(
            compute_patch("tr", None, Some(ENTRY_REORDERED)).unwrap(),
            Some(PatchOperation::add("tr", ENTRY))
        );
        assert_eq!(
            compute_patch("tr", Some("{}"), Some(ENTRY_REORDERED)).unwrap(),
            Some(PatchOperation::replace("tr", ENTRY))
        );
        assert_eq!(
            compute_patch("tr", Some("not json"), Some(ENTRY)).unwrap(),
            Some(PatchOperation::replace("tr", ENTRY))
        );
        assert_eq!(
            compute_patch("tr", Some(ENTRY), None).unwrap(),
            Some(PatchOperation::remove("tr"))
        );
        assert_eq!(compute_patch("tr", None, None).unwrap(), None);
    }

    #[test]
    fn test_invalid_desired_value() {
        assert!(matches!(
            compute_patch("tr", None, Some("42")),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn test_apply_is_atomic() {
        let data = BTreeMap::from([("a".to_string(), "1".to_string())]);
        let patch = JsonPatch(vec![
            PatchOperation::add("b", "2"),
            PatchOperation::remove("missing"),
        ]);
        assert!(matches!(patch.apply(&data), Err(Error::InvalidPatch(_))));

        let patch = JsonPatch(vec![
            PatchOperation::add("b", "2"),
            PatchOperation::replace("a", "3"),
        ]);
        let patched = patch.apply(&data).unwrap();
        assert_eq!(patched["a"], "3");
        assert_eq!(patched["b"], "2");
        assert_eq!(data["a"], "1");
    }

    #[test]
    fn test_non_data_path_is_rejected() {
        let op = PatchOperation::Remove {
            path: "/metadata/name".to_string(),
        };
        assert!(op.entry_key().is_err());
    }
}
