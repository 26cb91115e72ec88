//! Log identifier derivation

use crate::encoding::PublicKeySpki;
use crate::error::Result;
use crate::hash::sha256;

/// SHA-256 over the canonical DER SubjectPublicKeyInfo
pub fn derive_log_id(key: &PublicKeySpki) -> [u8; 32] {
    sha256(key.as_bytes())
}

/// Parse a PEM public key (or certificate) and derive its log ID
pub fn log_id_from_pem(pem: &[u8]) -> Result<[u8; 32]> {
    Ok(derive_log_id(&PublicKeySpki::from_pem(pem)?))
}
