//! Digests for log IDs and repository target checks

use aws_lc_rs::digest::{self, Algorithm, SHA256, SHA384, SHA512};

/// SHA-256 of `data`, the digest behind every log ID
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(digest::digest(&SHA256, data).as_ref());
    out
}

/// Digest of `data` under a TUF hash name (`sha256`, `sha384`, `sha512`)
///
/// Returns `None` for names this crate does not compute.
pub fn target_digest(name: &str, data: &[u8]) -> Option<Vec<u8>> {
    let algorithm: &'static Algorithm = match name {
        "sha256" => &SHA256,
        "sha384" => &SHA384,
        "sha512" => &SHA512,
        _ => return None,
    };
    Some(digest::digest(algorithm, data).as_ref().to_vec())
}
