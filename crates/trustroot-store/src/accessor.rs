//! Entry-level reads and writes with optimistic concurrency

use std::collections::BTreeMap;

use trustroot_types::TrustedRoot;

use crate::patch::compute_patch;
use crate::{ConfigStore, Error, JsonPatch, PatchOperation, Result, StoreRef, StoreSnapshot};

/// Default number of re-reads after a lost conditional write
pub const DEFAULT_CONFLICT_RETRIES: usize = 5;

/// What a sync did to the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The store resource was created holding the entry
    Created,
    /// One patch operation was applied
    Patched(PatchOperation),
    /// The entry already had the desired value
    Unchanged,
}

/// Reads and writes single entries of the store resource
#[derive(Debug, Clone)]
pub struct StoreAccessor<S> {
    store: S,
    conflict_retries: usize,
}

impl<S: ConfigStore> StoreAccessor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            conflict_retries: DEFAULT_CONFLICT_RETRIES,
        }
    }

    pub fn with_conflict_retries(mut self, retries: usize) -> Self {
        self.conflict_retries = retries;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Current entries, or [`Error::NotFound`] if the resource is absent
    pub async fn get_entries(&self, store: &StoreRef) -> Result<BTreeMap<String, String>> {
        Ok(self.store.get(store).await?.data)
    }

    /// Create the resource if it is absent
    ///
    /// Losing a creation race to another writer counts as success.
    pub async fn ensure_created(
        &self,
        store: &StoreRef,
        initial: BTreeMap<String, String>,
    ) -> Result<StoreSnapshot> {
        match self.store.get(store).await {
            Err(Error::NotFound { .. }) => {}
            other => return other,
        }
        match self.store.create(store, initial).await {
            Ok(snapshot) => {
                tracing::info!(store = %store, "created store resource");
                Ok(snapshot)
            }
            Err(Error::AlreadyExists { .. }) => {
                tracing::debug!(store = %store, "store resource created concurrently");
                self.store.get(store).await
            }
            Err(e) => Err(e),
        }
    }

    /// Apply a single operation conditioned on a resource version
    pub async fn apply(
        &self,
        store: &StoreRef,
        op: PatchOperation,
        expected_version: Option<&str>,
    ) -> Result<StoreSnapshot> {
        let patch = JsonPatch::single(op);
        self.store.patch(store, &patch, expected_version).await
    }

    /// Bring the entry `key` to the serialized trusted root `desired`
    ///
    /// Creates the resource if it does not exist yet. A lost conditional
    /// write is retried against a fresh read, up to the configured number of
    /// times; any other failure is returned immediately.
    pub async fn sync_entry(&self, store: &StoreRef, key: &str, desired: &str) -> Result<SyncOutcome> {
        let desired = trustroot_types::canonicalize(desired)?;
        let mut attempt = 0;
        loop {
            let snapshot = match self.store.get(store).await {
                Ok(snapshot) => snapshot,
                Err(Error::NotFound { .. }) => {
                    let initial = BTreeMap::from([(key.to_string(), desired.clone())]);
                    match self.store.create(store, initial).await {
                        Ok(_) => {
                            tracing::info!(store = %store, key, "created store resource with entry");
                            return Ok(SyncOutcome::Created);
                        }
                        Err(e @ Error::AlreadyExists { .. }) if attempt < self.conflict_retries => {
                            tracing::debug!(store = %store, key, error = %e, "retrying after creation race");
                            attempt += 1;
                            continue;
                        }
                        Err(e) => return Err(e),
                    }
                }
                Err(e) => return Err(e),
            };

            let current = snapshot.data.get(key).map(String::as_str);
            let Some(op) = compute_patch(key, current, Some(&desired))? else {
                tracing::debug!(store = %store, key, "store entry up to date");
                return Ok(SyncOutcome::Unchanged);
            };

            match self
                .apply(store, op.clone(), Some(&snapshot.resource_version))
                .await
            {
                Ok(_) => {
                    tracing::info!(store = %store, key, op = op.op(), "patched store entry");
                    return Ok(SyncOutcome::Patched(op));
                }
                Err(e @ Error::Conflict { .. }) if attempt < self.conflict_retries => {
                    tracing::debug!(store = %store, key, error = %e, "retrying after conflict");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Remove the entry `key`
    ///
    /// An absent resource or entry is already the desired state.
    pub async fn remove_entry(&self, store: &StoreRef, key: &str) -> Result<SyncOutcome> {
        let mut attempt = 0;
        loop {
            let snapshot = match self.store.get(store).await {
                Ok(snapshot) => snapshot,
                Err(Error::NotFound { .. }) => return Ok(SyncOutcome::Unchanged),
                Err(e) => return Err(e),
            };
            if !snapshot.data.contains_key(key) {
                return Ok(SyncOutcome::Unchanged);
            }

            let op = PatchOperation::remove(key);
            match self
                .apply(store, op.clone(), Some(&snapshot.resource_version))
                .await
            {
                Ok(_) => {
                    tracing::info!(store = %store, key, "removed store entry");
                    return Ok(SyncOutcome::Patched(op));
                }
                Err(e @ Error::Conflict { .. }) if attempt < self.conflict_retries => {
                    tracing::debug!(store = %store, key, error = %e, "retrying after conflict");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Parse every entry of the store resource into a trusted root
pub fn decode_entries(data: &BTreeMap<String, String>) -> Result<BTreeMap<String, TrustedRoot>> {
    data.iter()
        .map(|(key, value)| {
            TrustedRoot::from_json(value)
                .map(|root| (key.clone(), root))
                .map_err(|e| Error::Serialization(format!("entry {key}: {e}")))
        })
        .collect()
}
