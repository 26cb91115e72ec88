//! Trust model and declaration types
//!
//! This crate defines the canonical trusted root that is stored per
//! declaration, and the TrustRoot declaration object that owners use to
//! contribute trust material:
//! - Transparency logs and CT logs with their derived log IDs
//! - Certificate authorities and timestamp authorities with ordered chains
//! - Inline key material keyed by role, or a mirrored TUF repository
//!
//! # Example
//!
//! ```
//! use trustroot_types::{canonicalize, TrustedRoot};
//!
//! let stored = r#"{ "tlogs": [] }"#;
//! assert_eq!(canonicalize(stored).unwrap(), "{}");
//! assert!(TrustedRoot::from_json(stored).unwrap().is_empty());
//! ```

pub mod declaration;
pub mod encoding;
pub mod error;
pub mod hash;
pub mod status;
pub mod trusted_root;

pub use declaration::{
    InlineKeys, KeyMaterial, Lifecycle, ObjectMeta, Repository, Role, TrustRoot, TrustRootSpec,
    DEFAULT_TARGETS,
};
pub use encoding::base64_field;
pub use error::{Error, Result};
pub use hash::HashAlgorithm;
pub use status::{Condition, ConditionStatus, ConditionType, TrustRootStatus};
pub use trusted_root::{
    canonicalize, CertChain, CertificateAuthority, CertificateEntry, DistinguishedName, LogId,
    PublicKey, TransparencyLogInstance, TrustedRoot,
};
