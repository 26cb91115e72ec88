//! Reading the gzip-compressed tar of a mirrored repository

use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Component, Path};

use flate2::read::GzDecoder;

use crate::{Error, Result, TufConfig};

/// Regular files of a repository archive keyed by normalized path
#[derive(Debug, Clone, Default)]
pub struct RepositoryArchive {
    files: BTreeMap<String, Vec<u8>>,
}

/// Files found in one targets directory
#[derive(Debug, Clone)]
pub struct TargetsDir<'a> {
    /// Directory holding the TUF metadata files, empty at the archive root
    pub repository_root: String,
    /// Target file name to contents, sorted by name
    pub files: BTreeMap<&'a str, &'a [u8]>,
}

impl TargetsDir<'_> {
    /// Path of the targets role metadata next to the targets directory
    pub fn metadata_path(&self) -> String {
        if self.repository_root.is_empty() {
            "targets.json".to_string()
        } else {
            format!("{}/targets.json", self.repository_root)
        }
    }
}

impl RepositoryArchive {
    /// Decompress and read the regular files of a repository archive
    ///
    /// Entries escaping the archive root are skipped. A file under the
    /// `targets` directory larger than `config.max_target_size` is rejected;
    /// any other file that large is skipped. Reading stops with an error once
    /// the kept files exceed `config.max_archive_size` in total.
    pub fn from_tar_gz(bytes: &[u8], targets: &str, config: &TufConfig) -> Result<Self> {
        let wanted = path_components(targets);
        let mut archive = tar::Archive::new(GzDecoder::new(bytes));
        let entries = archive
            .entries()
            .map_err(|e| Error::Archive(format!("failed to read entries: {}", e)))?;

        let mut files = BTreeMap::new();
        let mut total: u64 = 0;
        for entry in entries {
            let mut entry =
                entry.map_err(|e| Error::Archive(format!("corrupt entry: {}", e)))?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let raw_path = entry
                .path()
                .map_err(|e| Error::Archive(format!("invalid entry path: {}", e)))?
                .into_owned();
            let Some(path) = normalize(&raw_path) else {
                tracing::warn!(path = %raw_path.display(), "skipping archive entry outside the repository");
                continue;
            };
            let size = entry.size();
            if size > config.max_target_size {
                if split_target(&path, &wanted).is_some() {
                    return Err(Error::TargetTooLarge {
                        target: path,
                        size,
                        limit: config.max_target_size,
                    });
                }
                tracing::warn!(path = %path, size, "skipping oversized archive entry");
                continue;
            }
            total = total.saturating_add(size);
            if total > config.max_archive_size {
                return Err(Error::ArchiveTooLarge {
                    limit: config.max_archive_size,
                });
            }
            let mut contents = Vec::with_capacity(size as usize);
            entry
                .read_to_end(&mut contents)
                .map_err(|e| Error::Archive(format!("failed to read {}: {}", path, e)))?;
            files.insert(path, contents);
        }

        if files.is_empty() {
            return Err(Error::Archive("archive contains no files".to_string()));
        }
        tracing::debug!(files = files.len(), bytes = total, "read repository archive");
        Ok(Self { files })
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    /// Locate the targets directory named `targets`
    ///
    /// The directory may sit below a leading prefix such as `repository/`.
    /// When several directories match, the one nearest the archive root wins.
    pub fn targets_dir(&self, targets: &str) -> Option<TargetsDir<'_>> {
        let wanted = path_components(targets);
        let mut best: Option<TargetsDir<'_>> = None;

        for (path, contents) in &self.files {
            let Some((root, name)) = split_target(path, &wanted) else {
                continue;
            };
            match &mut best {
                Some(dir) if dir.repository_root == root => {
                    dir.files.insert(name, contents.as_slice());
                }
                Some(dir) if depth(&dir.repository_root) <= depth(&root) => {}
                _ => {
                    let mut files = BTreeMap::new();
                    files.insert(name, contents.as_slice());
                    best = Some(TargetsDir {
                        repository_root: root,
                        files,
                    });
                }
            }
        }
        best
    }
}

fn path_components(path: &str) -> Vec<&str> {
    path.split('/').filter(|c| !c.is_empty()).collect()
}

/// Split a file path into its repository root and target name when the file
/// sits directly in the `wanted` targets directory
fn split_target<'p>(path: &'p str, wanted: &[&str]) -> Option<(String, &'p str)> {
    let components: Vec<&str> = path.split('/').collect();
    let (name, dirs) = components.split_last()?;
    if dirs.len() < wanted.len() || !dirs.ends_with(wanted) {
        return None;
    }
    Some((dirs[..dirs.len() - wanted.len()].join("/"), *name))
}

/// Number of directories in a repository root, zero at the archive root
fn depth(root: &str) -> usize {
    if root.is_empty() {
        0
    } else {
        root.split('/').count()
    }
}

fn normalize(path: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?.to_string()),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}
