//! In-memory store implementation

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::{ConfigStore, Error, JsonPatch, Result, StoreFuture, StoreRef, StoreSnapshot};

/// Kind of store call, used to target injected failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreVerb {
    Get,
    Create,
    Patch,
}

/// A call made against the store, in order of arrival
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreAction {
    Get(StoreRef),
    Create {
        store: StoreRef,
        data: BTreeMap<String, String>,
    },
    Patch {
        store: StoreRef,
        patch: JsonPatch,
    },
}

#[derive(Debug)]
struct Resource {
    data: BTreeMap<String, String>,
    version: u64,
}

impl Resource {
    fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            data: self.data.clone(),
            resource_version: self.version.to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    resources: HashMap<StoreRef, Resource>,
    actions: Vec<StoreAction>,
    failures: HashMap<StoreVerb, String>,
    pending_conflicts: usize,
    next_version: u64,
}

impl State {
    fn bump(&mut self) -> u64 {
        self.next_version += 1;
        self.next_version
    }

    fn injected(&self, verb: StoreVerb) -> Result<()> {
        match self.failures.get(&verb) {
            Some(message) => Err(Error::Unavailable(message.clone())),
            None => Ok(()),
        }
    }
}

/// Store resources held in process memory
///
/// Every write bumps a resource version so conditional patches behave like
/// a real API server. Calls are recorded, and failures or conflicts can be
/// injected per verb.
///
/// # Example
///
/// ```
/// use trustroot_store::{ConfigStore, InMemoryStore, StoreRef, StoreVerb};
///
/// # async fn example() {
/// let store = InMemoryStore::new();
/// store.fail_on(StoreVerb::Get, "connection refused").await;
///
/// let err = store.get(&StoreRef::new("ns", "keys")).await.unwrap_err();
/// assert_eq!(err.to_string(), "connection refused");
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a resource with entries, replacing any existing one
    pub async fn insert_resource(&self, store: &StoreRef, data: BTreeMap<String, String>) {
        let mut state = self.state.write().await;
        let version = state.bump();
        state
            .resources
            .insert(store.clone(), Resource { data, version });
    }

    /// Current entries of a resource, bypassing the action log
    pub async fn entries(&self, store: &StoreRef) -> Option<BTreeMap<String, String>> {
        let state = self.state.read().await;
        state.resources.get(store).map(|r| r.data.clone())
    }

    /// Make every call of `verb` fail with an unavailable error
    pub async fn fail_on(&self, verb: StoreVerb, message: impl Into<String>) {
        self.state.write().await.failures.insert(verb, message.into());
    }

    pub async fn clear_failures(&self) {
        self.state.write().await.failures.clear();
    }

    /// Make the next `count` patches lose against a concurrent writer
    pub async fn conflict_next(&self, count: usize) {
        self.state.write().await.pending_conflicts = count;
    }

    /// Calls made so far
    pub async fn actions(&self) -> Vec<StoreAction> {
        self.state.read().await.actions.clone()
    }

    /// Patch documents sent so far
    pub async fn patches(&self) -> Vec<JsonPatch> {
        self.state
            .read()
            .await
            .actions
            .iter()
            .filter_map(|action| match action {
                StoreAction::Patch { patch, .. } => Some(patch.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn clear_actions(&self) {
        self.state.write().await.actions.clear();
    }
}

fn not_found(store: &StoreRef) -> Error {
    Error::NotFound {
        namespace: store.namespace.clone(),
        name: store.name.clone(),
    }
}

impl ConfigStore for InMemoryStore {
    fn get(&self, store: &StoreRef) -> StoreFuture<'_, StoreSnapshot> {
        let store = store.clone();
        Box::pin(async move {
            let mut state = self.state.write().await;
            state.actions.push(StoreAction::Get(store.clone()));
            state.injected(StoreVerb::Get)?;
            state
                .resources
                .get(&store)
                .map(Resource::snapshot)
                .ok_or_else(|| not_found(&store))
        })
    }

    fn create(
        &self,
        store: &StoreRef,
        data: BTreeMap<String, String>,
    ) -> StoreFuture<'_, StoreSnapshot> {
        let store = store.clone();
        Box::pin(async move {
            let mut state = self.state.write().await;
            state.actions.push(StoreAction::Create {
                store: store.clone(),
                data: data.clone(),
            });
            state.injected(StoreVerb::Create)?;
            if state.resources.contains_key(&store) {
                return Err(Error::AlreadyExists {
                    namespace: store.namespace,
                    name: store.name,
                });
            }
            let version = state.bump();
            let resource = Resource { data, version };
            let snapshot = resource.snapshot();
            state.resources.insert(store, resource);
            Ok(snapshot)
        })
    }

    fn patch(
        &self,
        store: &StoreRef,
        patch: &JsonPatch,
        expected_version: Option<&str>,
    ) -> StoreFuture<'_, StoreSnapshot> {
        let store = store.clone();
        let patch = patch.clone();
        let expected_version = expected_version.map(str::to_string);
        Box::pin(async move {
            let mut state = self.state.write().await;
            state.actions.push(StoreAction::Patch {
                store: store.clone(),
                patch: patch.clone(),
            });
            state.injected(StoreVerb::Patch)?;

            let simulate_conflict = state.pending_conflicts > 0;
            if simulate_conflict {
                state.pending_conflicts -= 1;
            }
            let version = state.bump();
            let resource = state
                .resources
                .get_mut(&store)
                .ok_or_else(|| not_found(&store))?;

            if simulate_conflict {
                resource.version = version;
            }
            let actual = resource.version.to_string();
            if let Some(expected) = expected_version {
                if expected != actual {
                    return Err(Error::Conflict {
                        name: store.name,
                        expected,
                        actual,
                    });
                }
            }

            resource.data = patch.apply(&resource.data)?;
            resource.version = version;
            Ok(resource.snapshot())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PatchOperation;

    fn keys() -> StoreRef {
        StoreRef::new("cosign-system", "config-sigstore-keys")
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let store = InMemoryStore::new();
        assert!(matches!(
            store.get(&keys()).await,
            Err(Error::NotFound { .. })
        ));

        let data = BTreeMap::from([("a".to_string(), "{}".to_string())]);
        let created = store.create(&keys(), data.clone()).await.unwrap();
        assert_eq!(store.get(&keys()).await.unwrap(), created);

        let err = store.create(&keys(), data).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_patch_checks_resource_version() {
        let store = InMemoryStore::new();
        let created = store.create(&keys(), BTreeMap::new()).await.unwrap();
        let patch = JsonPatch::single(PatchOperation::add("a", "{}"));

        let patched = store
            .patch(&keys(), &patch, Some(&created.resource_version))
            .await
            .unwrap();
        assert_ne!(patched.resource_version, created.resource_version);

        let err = store
            .patch(&keys(), &patch, Some(&created.resource_version))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_injected_conflicts_are_consumed() {
        let store = InMemoryStore::new();
        let created = store.create(&keys(), BTreeMap::new()).await.unwrap();
        store.conflict_next(1).await;
        let patch = JsonPatch::single(PatchOperation::add("a", "{}"));

        let err = store
            .patch(&keys(), &patch, Some(&created.resource_version))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));

        let current = store.get(&keys()).await.unwrap();
        store
            .patch(&keys(), &patch, Some(&current.resource_version))
            .await
            .unwrap();
        assert_eq!(store.patches().await.len(), 2);
    }

    #[tokio::test]
    async fn test_injected_failure_is_recorded() {
        let store = InMemoryStore::new();
        store.insert_resource(&keys(), BTreeMap::new()).await;
        store
            .fail_on(StoreVerb::Patch, "inducing failure for patch configmaps")
            .await;

        let patch = JsonPatch::single(PatchOperation::add("a", "{}"));
        let err = store.patch(&keys(), &patch, None).await.unwrap_err();
        assert_eq!(err.to_string(), "inducing failure for patch configmaps");
        assert_eq!(store.patches().await, vec![patch]);
        assert_eq!(store.entries(&keys()).await, Some(BTreeMap::new()));
    }
}
