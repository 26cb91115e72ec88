//! X.509 certificate and public key utilities

use const_oid::db::rfc4519::CN;
use const_oid::db::rfc5912::{
    ID_EC_PUBLIC_KEY, RSA_ENCRYPTION, SECP_256_R_1, SECP_384_R_1, SECP_521_R_1,
};
use const_oid::db::rfc8410::ID_ED_25519;
use const_oid::ObjectIdentifier;
use x509_cert::der::asn1::{AnyRef, PrintableStringRef, Utf8StringRef};
use x509_cert::der::Decode;
use x509_cert::spki::SubjectPublicKeyInfoOwned;
use x509_cert::Certificate;

use crate::encoding::{CertificateDer, PublicKeySpki};
use crate::error::{Error, Result};

/// Public key algorithms accepted for log keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    EcdsaP256,
    EcdsaP384,
    EcdsaP521,
    Rsa,
    Ed25519,
}

/// Parse a DER-encoded certificate
pub fn parse_certificate(der: &[u8]) -> Result<Certificate> {
    Certificate::from_der(der)
        .map_err(|e| Error::InvalidCertificate(format!("failed to parse certificate: {}", e)))
}

/// Extract the canonical SPKI from a DER-encoded certificate
pub fn certificate_public_key(der: &[u8]) -> Result<PublicKeySpki> {
    let cert = parse_certificate(der)?;
    PublicKeySpki::from_spki(&cert.tbs_certificate.subject_public_key_info)
}

/// Classify the key algorithm of a SubjectPublicKeyInfo
pub fn key_algorithm(spki: &SubjectPublicKeyInfoOwned) -> Result<KeyAlgorithm> {
    let alg_oid = spki.algorithm.oid;

    if alg_oid == ID_EC_PUBLIC_KEY {
        let params = spki.algorithm.parameters.as_ref().ok_or_else(|| {
            Error::InvalidKey("EC key missing curve parameters".to_string())
        })?;
        // params.value() holds the raw OID content bytes
        let curve_oid = ObjectIdentifier::from_bytes(params.value())
            .map_err(|e| Error::InvalidKey(format!("failed to parse EC curve OID: {}", e)))?;

        return if curve_oid == SECP_256_R_1 {
            Ok(KeyAlgorithm::EcdsaP256)
        } else if curve_oid == SECP_384_R_1 {
            Ok(KeyAlgorithm::EcdsaP384)
        } else if curve_oid == SECP_521_R_1 {
            Ok(KeyAlgorithm::EcdsaP521)
        } else {
            Err(Error::UnsupportedKeyType(format!("EC curve {}", curve_oid)))
        };
    }

    if alg_oid == RSA_ENCRYPTION {
        return Ok(KeyAlgorithm::Rsa);
    }
    if alg_oid == ID_ED_25519 {
        return Ok(KeyAlgorithm::Ed25519);
    }

    tracing::warn!("unsupported public key algorithm OID: {}", alg_oid);
    Err(Error::UnsupportedKeyType(format!("algorithm {}", alg_oid)))
}

/// Common name of the certificate subject, if any
pub fn subject_common_name(der: &[u8]) -> Result<Option<String>> {
    let cert = parse_certificate(der)?;
    for rdn in cert.tbs_certificate.subject.0.iter() {
        for atv in rdn.0.iter() {
            if atv.oid != CN {
                continue;
            }
            let value = AnyRef::from(&atv.value);
            if let Ok(s) = value.decode_as::<Utf8StringRef<'_>>() {
                return Ok(Some(s.to_string()));
            }
            if let Ok(s) = value.decode_as::<PrintableStringRef<'_>>() {
                return Ok(Some(s.to_string()));
            }
        }
    }
    Ok(None)
}

/// Order certificates from leaf to root by following issuer names
///
/// Input that does not form a single linear chain is returned unchanged.
pub fn order_chain(certs: Vec<CertificateDer>) -> Result<Vec<CertificateDer>> {
    if certs.len() < 2 {
        return Ok(certs);
    }
    let parsed = certs
        .iter()
        .map(|c| parse_certificate(c.as_bytes()))
        .collect::<Result<Vec<_>>>()?;

    let issues_other = |i: usize| {
        parsed.iter().enumerate().any(|(j, other)| {
            j != i && other.tbs_certificate.issuer == parsed[i].tbs_certificate.subject
        })
    };
    let leaves: Vec<usize> = (0..parsed.len()).filter(|&i| !issues_other(i)).collect();
    let [leaf] = leaves[..] else {
        tracing::debug!(leaves = leaves.len(), "certificates do not form a linear chain");
        return Ok(certs);
    };

    let mut order = vec![leaf];
    let mut current = leaf;
    while order.len() < parsed.len() {
        let tbs = &parsed[current].tbs_certificate;
        if tbs.issuer == tbs.subject {
            break;
        }
        let next = (0..parsed.len())
            .find(|j| !order.contains(j) && parsed[*j].tbs_certificate.subject == tbs.issuer);
        match next {
            Some(j) => {
                order.push(j);
                current = j;
            }
            None => break,
        }
    }

    if order.len() != certs.len() {
        tracing::debug!("certificate chain has gaps, keeping input order");
        return Ok(certs);
    }
    let mut slots: Vec<Option<CertificateDer>> = certs.into_iter().map(Some).collect();
    Ok(order.into_iter().filter_map(|i| slots[i].take()).collect())
}
