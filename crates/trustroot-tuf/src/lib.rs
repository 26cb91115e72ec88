//! Trust material from a mirrored TUF repository
//!
//! A repository source supplies a root manifest and a gzip-compressed tar of
//! the repository. This crate checks the manifest's structure, reads the
//! archive, and sorts the target files into the same role-keyed shape as
//! inline keys, so one converter handles both sources.
//!
//! TUF signatures, thresholds and rollback protection are not checked: the
//! caller supplying the snapshot has already made that trust decision.
//!
//! # Example
//!
//! ```no_run
//! use trustroot_tuf::load_repository;
//! use trustroot_types::Repository;
//!
//! # fn example(repo: &Repository) -> Result<(), trustroot_tuf::Error> {
//! let keys = load_repository(repo)?;
//! for (role, material) in keys.iter() {
//!     println!("{}: {} bytes", role, material.data.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod error;
pub mod root;
pub mod targets;

use std::collections::BTreeMap;

use chrono::Utc;
use trustroot_crypto::CertificateDer;
use trustroot_types::{InlineKeys, KeyMaterial, Repository, Role};

pub use archive::{RepositoryArchive, TargetsDir};
pub use error::{Error, Result};
pub use root::RootManifest;
pub use targets::{role_from_file_name, TargetDescription, TargetsMetadata};

/// Default size limit for a single target file
pub const DEFAULT_MAX_TARGET_SIZE: u64 = 1024 * 1024;

/// Default limit on the bytes read from one archive
pub const DEFAULT_MAX_ARCHIVE_SIZE: u64 = 32 * 1024 * 1024;

/// Configuration for repository loading
#[derive(Debug, Clone)]
pub struct TufConfig {
    /// Largest target file accepted from the archive
    pub max_target_size: u64,
    /// Total size of the files kept from the archive
    pub max_archive_size: u64,
}

impl Default for TufConfig {
    fn default() -> Self {
        Self {
            max_target_size: DEFAULT_MAX_TARGET_SIZE,
            max_archive_size: DEFAULT_MAX_ARCHIVE_SIZE,
        }
    }
}

impl TufConfig {
    pub fn with_max_target_size(mut self, bytes: u64) -> Self {
        self.max_target_size = bytes;
        self
    }

    pub fn with_max_archive_size(mut self, bytes: u64) -> Self {
        self.max_archive_size = bytes;
        self
    }
}

/// Load role material from a repository source with default settings
pub fn load_repository(repo: &Repository) -> Result<InlineKeys> {
    load_repository_with(repo, &TufConfig::default())
}

/// A target file assigned to a role
struct Target<'a> {
    name: &'a str,
    contents: &'a [u8],
    uri: Option<&'a str>,
}

/// Load role material from a repository source
pub fn load_repository_with(repo: &Repository, config: &TufConfig) -> Result<InlineKeys> {
    let root = RootManifest::from_slice(&repo.root)?;
    if root.is_expired(Utc::now()) {
        tracing::warn!(
            version = root.signed.version,
            expires = %root.signed.expires,
            "root manifest has expired, using repository snapshot anyway"
        );
    }

    let targets_path = repo.targets_path();
    let archive = RepositoryArchive::from_tar_gz(&repo.mirror_fs, targets_path, config)?;
    let dir = archive
        .targets_dir(targets_path)
        .ok_or_else(|| Error::MissingTarget {
            targets: targets_path.to_string(),
        })?;

    let metadata_path = dir.metadata_path();
    let metadata = archive
        .get(&metadata_path)
        .map(|bytes| TargetsMetadata::from_slice(&metadata_path, bytes))
        .transpose()?;

    let mut by_role: BTreeMap<Role, Vec<Target<'_>>> = BTreeMap::new();
    for (&name, &contents) in &dir.files {
        let description = metadata.as_ref().and_then(|m| m.targets.get(name));
        if let Some(description) = description {
            description.verify(name, contents)?;
            if description.is_expired() {
                tracing::debug!(target_name = name, "skipping expired target");
                continue;
            }
        }
        let role = description
            .and_then(TargetDescription::role)
            .or_else(|| role_from_file_name(name));
        let Some(role) = role else {
            tracing::debug!(target_name = name, "target has no recognized usage");
            continue;
        };
        by_role.entry(role).or_default().push(Target {
            name,
            contents,
            uri: description.and_then(TargetDescription::uri),
        });
    }

    let mut keys = InlineKeys::default();
    // files arrive in name order
    for (role, mut files) in by_role {
        let uri = files.iter().find_map(|t| t.uri).map(str::to_string);
        let data = if role.is_log_key() {
            if files.len() > 1 {
                tracing::warn!(
                    role = %role,
                    using = files[0].name,
                    count = files.len(),
                    "several key targets for one role, using the first"
                );
            }
            files[0].contents.to_vec()
        } else {
            files.sort_by_key(|t| (targets::chain_rank(t.name), t.name));
            assemble_chain(&files)?
        };
        tracing::debug!(role = %role, files = files.len(), "loaded repository targets");
        let mut material = KeyMaterial::new(data);
        material.url = uri;
        keys.set(role, material);
    }

    if keys.is_empty() {
        return Err(Error::MissingTarget {
            targets: targets_path.to_string(),
        });
    }
    Ok(keys)
}

/// Combine certificate files into one PEM chain ordered leaf to root by issuer
fn assemble_chain(files: &[Target<'_>]) -> Result<Vec<u8>> {
    if let [single] = files {
        return Ok(single.contents.to_vec());
    }
    let mut certs = Vec::new();
    for file in files {
        let chain = CertificateDer::chain_from_pem(file.contents).map_err(|source| {
            Error::InvalidTarget {
                target: file.name.to_string(),
                source,
            }
        })?;
        certs.extend(chain);
    }
    let ordered = trustroot_crypto::order_chain(certs).map_err(|source| Error::InvalidTarget {
        target: files[0].name.to_string(),
        source,
    })?;
    let blocks: Vec<pem::Pem> = ordered
        .into_iter()
        .map(|cert| pem::Pem::new("CERTIFICATE", cert.into_bytes()))
        .collect();
    let encoded = pem::encode_many_config(
        &blocks,
        pem::EncodeConfig::new().set_line_ending(pem::LineEnding::LF),
    );
    Ok(encoded.into_bytes())
}
