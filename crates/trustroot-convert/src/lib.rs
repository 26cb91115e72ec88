//! Conversion of declared trust material into a [`TrustedRoot`]
//!
//! Both declaration sources end up here: inline keys directly, repository
//! snapshots after the TUF loader has sorted their targets by role. The
//! conversion is pure; it never touches the store.
//!
//! | Role     | Section                  | Input                        |
//! |----------|--------------------------|------------------------------|
//! | `ctfe`   | `ctlogs`                 | public key (or certificate)  |
//! | `rekor`  | `tlogs`                  | public key (or certificate)  |
//! | `fulcio` | `certificateAuthorities` | one or more certificates     |
//! | `tsa`    | `timestampAuthorities`   | certificate chain, in order  |

pub mod error;

use trustroot_crypto::{derive_log_id, CertificateDer, PublicKeySpki};
use trustroot_tuf::TufConfig;
use trustroot_types::{
    CertChain, CertificateAuthority, InlineKeys, KeyMaterial, LogId, PublicKey, Role,
    TransparencyLogInstance, TrustRootSpec, TrustedRoot,
};

pub use error::{Error, ErrorKind, Result};

/// Converts declarations using a repository loader configuration
#[derive(Debug, Clone, Default)]
pub struct Converter {
    tuf: TufConfig,
}

impl Converter {
    pub fn new(tuf: TufConfig) -> Self {
        Self { tuf }
    }

    /// Validate and convert a declaration payload
    pub fn convert(&self, spec: &TrustRootSpec) -> Result<TrustedRoot> {
        spec.validate()?;
        match spec {
            TrustRootSpec::InlineKeys(keys) => convert_inline_keys(keys),
            TrustRootSpec::Repository(repo) => {
                let keys = trustroot_tuf::load_repository_with(repo, &self.tuf)?;
                convert_inline_keys(&keys)
            }
        }
    }
}

/// Convert a declaration payload with the default repository settings
pub fn convert_spec(spec: &TrustRootSpec) -> Result<TrustedRoot> {
    Converter::default().convert(spec)
}

/// Convert role material; absent roles leave their section empty
pub fn convert_inline_keys(keys: &InlineKeys) -> Result<TrustedRoot> {
    let mut root = TrustedRoot::default();
    for (role, material) in keys.iter() {
        match role {
            Role::Ctfe => root.ctlogs.push(log_instance(role, material)?),
            Role::Rekor => root.tlogs.push(log_instance(role, material)?),
            Role::Fulcio => root
                .certificate_authorities
                .push(certificate_authority(role, material)?),
            Role::Tsa => root
                .timestamp_authorities
                .push(certificate_authority(role, material)?),
        }
        tracing::debug!(role = %role, "converted trust material");
    }
    Ok(root)
}

fn log_instance(role: Role, material: &KeyMaterial) -> Result<TransparencyLogInstance> {
    let hash_algorithm = material
        .hash_algorithm()
        .map_err(|e| Error::InvalidField {
            role,
            field: "hashAlgorithm",
            reason: e.to_string(),
        })?;
    let key = PublicKeySpki::from_pem(&material.data).map_err(|e| Error::from_crypto(role, e))?;
    let log_id = derive_log_id(&key);

    Ok(TransparencyLogInstance {
        base_url: material.url.clone().unwrap_or_default(),
        hash_algorithm,
        public_key: PublicKey {
            raw_bytes: key.into_bytes(),
        },
        log_id: LogId::new(log_id),
    })
}

fn certificate_authority(role: Role, material: &KeyMaterial) -> Result<CertificateAuthority> {
    let chain =
        CertificateDer::chain_from_pem(&material.data).map_err(|e| Error::from_crypto(role, e))?;

    Ok(CertificateAuthority {
        subject: material.subject.clone().unwrap_or_default(),
        uri: material.url.clone().unwrap_or_default(),
        cert_chain: CertChain::from_der(chain.into_iter().map(CertificateDer::into_bytes)),
    })
}
