//! Shared store of canonical trusted roots
//!
//! Every declaration owns one entry in a single namespaced key-value
//! resource. This crate provides:
//!
//! - [`ConfigStore`]: the narrow interface to the resource (read, create, patch)
//! - [`InMemoryStore`]: an in-process implementation with resource versions
//! - [`StoreAccessor`]: canonical patch computation and the optimistic
//!   concurrency loop on top of any [`ConfigStore`]
//!
//! # Example
//!
//! ```
//! use trustroot_store::{InMemoryStore, StoreAccessor, StoreRef, SyncOutcome};
//!
//! # async fn example() -> Result<(), trustroot_store::Error> {
//! let accessor = StoreAccessor::new(InMemoryStore::new());
//! let store = StoreRef::new("cosign-system", "config-sigstore-keys");
//!
//! let outcome = accessor.sync_entry(&store, "my-trustroot", "{}").await?;
//! assert_eq!(outcome, SyncOutcome::Created);
//! # Ok(())
//! # }
//! ```

mod accessor;
mod error;
mod memory;
pub mod patch;

pub use accessor::{decode_entries, StoreAccessor, SyncOutcome, DEFAULT_CONFLICT_RETRIES};
pub use error::{Error, Result};
pub use memory::{InMemoryStore, StoreAction, StoreVerb};
pub use patch::{compute_patch, JsonPatch, PatchOperation};

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed future returned by [`ConfigStore`] operations
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Identity of the store resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreRef {
    pub namespace: String,
    pub name: String,
}

impl StoreRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for StoreRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Entries of the store resource as read at one resource version
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreSnapshot {
    pub data: BTreeMap<String, String>,
    pub resource_version: String,
}

/// Access to the shared store resource
///
/// Writes are conditional: a patch carrying an expected resource version
/// fails with [`Error::Conflict`] when the resource has moved on. No
/// in-process locking is layered on top.
pub trait ConfigStore: Send + Sync {
    /// Read the resource, or [`Error::NotFound`] if it does not exist
    fn get(&self, store: &StoreRef) -> StoreFuture<'_, StoreSnapshot>;

    /// Create the resource, or [`Error::AlreadyExists`] if another writer won
    fn create(
        &self,
        store: &StoreRef,
        data: BTreeMap<String, String>,
    ) -> StoreFuture<'_, StoreSnapshot>;

    /// Apply a JSON patch to the resource's entries
    fn patch(
        &self,
        store: &StoreRef,
        patch: &JsonPatch,
        expected_version: Option<&str>,
    ) -> StoreFuture<'_, StoreSnapshot>;
}

impl<T: ConfigStore + ?Sized> ConfigStore for Arc<T> {
    fn get(&self, store: &StoreRef) -> StoreFuture<'_, StoreSnapshot> {
        (**self).get(store)
    }

    fn create(
        &self,
        store: &StoreRef,
        data: BTreeMap<String, String>,
    ) -> StoreFuture<'_, StoreSnapshot> {
        (**self).create(store, data)
    }

    fn patch(
        &self,
        store: &StoreRef,
        patch: &JsonPatch,
        expected_version: Option<&str>,
    ) -> StoreFuture<'_, StoreSnapshot> {
        (**self).patch(store, patch, expected_version)
    }
}

impl ConfigStore for Box<dyn ConfigStore> {
    fn get(&self, store: &StoreRef) -> StoreFuture<'_, StoreSnapshot> {
        (**self).get(store)
    }

    fn create(
        &self,
        store: &StoreRef,
        data: BTreeMap<String, String>,
    ) -> StoreFuture<'_, StoreSnapshot> {
        (**self).create(store, data)
    }

    fn patch(
        &self,
        store: &StoreRef,
        patch: &JsonPatch,
        expected_version: Option<&str>,
    ) -> StoreFuture<'_, StoreSnapshot> {
        (**self).patch(store, patch, expected_version)
    }
}
