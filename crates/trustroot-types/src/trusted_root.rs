//! Canonical trusted root model and its text encoding

use serde::{Deserialize, Serialize};

use crate::encoding::base64_field;
use crate::{HashAlgorithm, Result};

/// Aggregate trust material produced from one declaration
///
/// Sections that are empty are omitted from the serialized form, so a
/// declaration that only supplies a Rekor key serializes to `{"tlogs":[...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustedRoot {
    /// Transparency logs (Rekor)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tlogs: Vec<TransparencyLogInstance>,

    /// Certificate authorities (Fulcio)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub certificate_authorities: Vec<CertificateAuthority>,

    /// Certificate Transparency logs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ctlogs: Vec<TransparencyLogInstance>,

    /// Timestamp authorities
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub timestamp_authorities: Vec<CertificateAuthority>,
}

/// A transparency or certificate-transparency log
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransparencyLogInstance {
    /// Base URL of the log, empty when not declared
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub base_url: String,

    /// Hash algorithm used by the log
    #[serde(default)]
    pub hash_algorithm: HashAlgorithm,

    /// DER-encoded SubjectPublicKeyInfo
    pub public_key: PublicKey,

    /// Identifier derived from the public key
    pub log_id: LogId,
}

/// Public key information
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKey {
    #[serde(with = "base64_field")]
    pub raw_bytes: Vec<u8>,
}

/// SHA-256 digest of a log's public key, kept as raw bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogId {
    #[serde(with = "base64_field")]
    pub key_id: Vec<u8>,
}

impl LogId {
    pub fn new(key_id: impl Into<Vec<u8>>) -> Self {
        Self {
            key_id: key_id.into(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.key_id
    }
}

/// A certificate authority or timestamp authority
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateAuthority {
    #[serde(default, skip_serializing_if = "DistinguishedName::is_empty")]
    pub subject: DistinguishedName,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uri: String,

    /// Certificates in source order
    pub cert_chain: CertChain,
}

/// Subject information for a certificate authority
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistinguishedName {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub organization: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub common_name: String,
}

impl DistinguishedName {
    pub fn new(organization: impl Into<String>, common_name: impl Into<String>) -> Self {
        Self {
            organization: organization.into(),
            common_name: common_name.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.organization.is_empty() && self.common_name.is_empty()
    }
}

/// Certificate chain
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertChain {
    #[serde(default)]
    pub certificates: Vec<CertificateEntry>,
}

impl CertChain {
    /// Build a chain from DER certificates, keeping their order
    pub fn from_der<I, B>(certs: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Vec<u8>>,
    {
        Self {
            certificates: certs
                .into_iter()
                .map(|raw| CertificateEntry {
                    raw_bytes: raw.into(),
                })
                .collect(),
        }
    }
}

/// A certificate entry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateEntry {
    /// DER-encoded certificate
    #[serde(with = "base64_field")]
    pub raw_bytes: Vec<u8>,
}

impl TrustedRoot {
    /// Parse a trusted root from its JSON encoding
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to the canonical text form
    ///
    /// Fields are emitted in declaration order without whitespace, so equal
    /// values always produce identical strings.
    pub fn to_canonical_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// True when no section carries any entry
    pub fn is_empty(&self) -> bool {
        self.tlogs.is_empty()
            && self.certificate_authorities.is_empty()
            && self.ctlogs.is_empty()
            && self.timestamp_authorities.is_empty()
    }
}

/// Reserialize a stored trusted root into canonical form
///
/// Stored values written by other processes may differ in field order or
/// whitespace; comparing canonical forms avoids replaying no-op patches.
pub fn canonicalize(serialized: &str) -> Result<String> {
    TrustedRoot::from_json(serialized)?.to_canonical_json()
}
