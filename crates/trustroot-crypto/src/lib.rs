//! Key and certificate handling for trust material
//!
//! Declared trust material arrives as PEM. This crate decodes it into
//! canonical DER, classifies public key algorithms, orders certificate
//! chains, and derives transparency log IDs. Hashing uses aws-lc-rs.

pub mod encoding;
pub mod error;
pub mod hash;
pub mod log_id;
pub mod x509;

pub use encoding::{parse_pem_blocks, CertificateDer, PublicKeySpki};
pub use error::{Error, Result};
pub use hash::{sha256, target_digest};
pub use log_id::{derive_log_id, log_id_from_pem};
pub use x509::{certificate_public_key, order_chain, subject_common_name, KeyAlgorithm};
