//! TrustRoot declaration objects
//!
//! A declaration contributes trust material under its own name. The payload
//! is either inline PEM material keyed by a fixed set of roles, or a mirrored
//! TUF repository snapshot.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::encoding::base64_field;
use crate::status::TrustRootStatus;
use crate::{DistinguishedName, Error, HashAlgorithm, Result};

/// Targets directory used when a repository source does not name one
pub const DEFAULT_TARGETS: &str = "targets";

/// A trust material declaration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustRoot {
    pub metadata: ObjectMeta,
    pub spec: TrustRootSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TrustRootStatus>,
}

/// Object identity and lifecycle markers
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,
    #[serde(default)]
    pub generation: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub finalizers: Vec<String>,
}

/// Where the declaration's trust material comes from
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TrustRootSpec {
    InlineKeys(InlineKeys),
    Repository(Repository),
}

/// Trust roles a declaration may supply material for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    /// Certificate Transparency log public key
    Ctfe,
    /// Fulcio certificate authority chain
    Fulcio,
    /// Rekor transparency log public key
    Rekor,
    /// Timestamp authority certificate chain
    Tsa,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Ctfe, Role::Fulcio, Role::Rekor, Role::Tsa];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Ctfe => "ctfe",
            Role::Fulcio => "fulcio",
            Role::Rekor => "rekor",
            Role::Tsa => "tsa",
        }
    }

    /// Whether the role carries a public key rather than a certificate chain
    pub fn is_log_key(&self) -> bool {
        matches!(self, Role::Ctfe | Role::Rekor)
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ctfe" => Ok(Role::Ctfe),
            "fulcio" => Ok(Role::Fulcio),
            "rekor" => Ok(Role::Rekor),
            "tsa" => Ok(Role::Tsa),
            other => Err(Error::Validation(format!("unknown role {other:?}"))),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// PEM material for one role plus the metadata the trusted root carries
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyMaterial {
    /// PEM bytes, base64 encoded on the wire
    #[serde(with = "base64_field")]
    pub data: Vec<u8>,
    /// Log base URL or CA URI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// `sha-256` or `sha-512`; logs default to SHA2-256
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_algorithm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<DistinguishedName>,
}

impl KeyMaterial {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            ..Default::default()
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_hash_algorithm(mut self, algorithm: impl Into<String>) -> Self {
        self.hash_algorithm = Some(algorithm.into());
        self
    }

    pub fn with_subject(mut self, subject: DistinguishedName) -> Self {
        self.subject = Some(subject);
        self
    }

    /// Declared hash algorithm, SHA2-256 when absent
    pub fn hash_algorithm(&self) -> Result<HashAlgorithm> {
        match &self.hash_algorithm {
            Some(name) => name.parse(),
            None => Ok(HashAlgorithm::default()),
        }
    }
}

/// Inline trust material keyed by role
///
/// Unknown role names in the serialized form are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineKeys {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ctfe: Option<KeyMaterial>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fulcio: Option<KeyMaterial>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rekor: Option<KeyMaterial>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tsa: Option<KeyMaterial>,
}

impl InlineKeys {
    /// Build from a free-form role map, skipping names that are not roles
    pub fn from_role_map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Vec<u8>>,
    {
        let mut keys = Self::default();
        for (name, pem) in entries {
            match name.as_ref().parse::<Role>() {
                Ok(role) => keys.set(role, KeyMaterial::new(pem)),
                Err(_) => tracing::debug!(role = name.as_ref(), "ignoring unknown role"),
            }
        }
        keys
    }

    pub fn get(&self, role: Role) -> Option<&KeyMaterial> {
        match role {
            Role::Ctfe => self.ctfe.as_ref(),
            Role::Fulcio => self.fulcio.as_ref(),
            Role::Rekor => self.rekor.as_ref(),
            Role::Tsa => self.tsa.as_ref(),
        }
    }

    pub fn set(&mut self, role: Role, material: KeyMaterial) {
        let slot = match role {
            Role::Ctfe => &mut self.ctfe,
            Role::Fulcio => &mut self.fulcio,
            Role::Rekor => &mut self.rekor,
            Role::Tsa => &mut self.tsa,
        };
        *slot = Some(material);
    }

    /// Present roles in a fixed order
    pub fn iter(&self) -> impl Iterator<Item = (Role, &KeyMaterial)> + '_ {
        Role::ALL
            .into_iter()
            .filter_map(move |role| self.get(role).map(|material| (role, material)))
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

/// Mirrored TUF repository snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    /// Directory of target files inside the archive
    #[serde(default)]
    pub targets: String,
    /// Root manifest JSON
    #[serde(with = "base64_field")]
    pub root: Vec<u8>,
    /// gzip-compressed tar of the repository
    #[serde(with = "base64_field")]
    pub mirror_fs: Vec<u8>,
}

impl Repository {
    pub fn targets_path(&self) -> &str {
        if self.targets.is_empty() {
            DEFAULT_TARGETS
        } else {
            &self.targets
        }
    }
}

impl TrustRootSpec {
    /// Fill in defaults for optional fields
    pub fn set_defaults(&mut self) {
        if let TrustRootSpec::Repository(repo) = self {
            if repo.targets.is_empty() {
                repo.targets = DEFAULT_TARGETS.to_string();
            }
        }
    }

    /// Check structural constraints that do not need cryptographic parsing
    pub fn validate(&self) -> Result<()> {
        match self {
            TrustRootSpec::InlineKeys(keys) => {
                if keys.is_empty() {
                    return Err(Error::Validation(
                        "inlineKeys must supply at least one role".into(),
                    ));
                }
                for (role, material) in keys.iter() {
                    validate_material(role, material)?;
                }
                Ok(())
            }
            TrustRootSpec::Repository(repo) => {
                if repo.root.is_empty() {
                    return Err(Error::Validation("repository.root is empty".into()));
                }
                if repo.mirror_fs.is_empty() {
                    return Err(Error::Validation("repository.mirrorFs is empty".into()));
                }
                if repo.targets_path().split('/').any(|c| c == "..") {
                    return Err(Error::Validation(format!(
                        "repository.targets {:?} must not contain '..'",
                        repo.targets
                    )));
                }
                Ok(())
            }
        }
    }
}

fn validate_material(role: Role, material: &KeyMaterial) -> Result<()> {
    if material.data.is_empty() {
        return Err(Error::Validation(format!("{role}: data is empty")));
    }
    if let Some(url) = &material.url {
        Url::parse(url).map_err(|e| Error::Validation(format!("{role}: invalid url {url:?}: {e}")))?;
    }
    material
        .hash_algorithm()
        .map_err(|e| Error::Validation(format!("{role}: {e}")))?;
    Ok(())
}

/// Finalizer state of a declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Not being deleted
    Active { has_finalizer: bool },
    /// Deletion requested; the finalizer holds the object until cleanup ran
    Terminating { has_finalizer: bool },
}

impl TrustRoot {
    pub fn new(name: impl Into<String>, spec: TrustRootSpec) -> Self {
        Self {
            metadata: ObjectMeta {
                name: name.into(),
                generation: 1,
                ..Default::default()
            },
            spec,
            status: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn has_finalizer(&self, finalizer: &str) -> bool {
        self.metadata.finalizers.iter().any(|f| f == finalizer)
    }

    pub fn lifecycle(&self, finalizer: &str) -> Lifecycle {
        let has_finalizer = self.has_finalizer(finalizer);
        if self.metadata.deletion_timestamp.is_some() {
            Lifecycle::Terminating { has_finalizer }
        } else {
            Lifecycle::Active { has_finalizer }
        }
    }
}
