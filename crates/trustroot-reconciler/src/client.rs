//! Access to TrustRoot declarations

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use trustroot_types::{TrustRoot, TrustRootStatus};

use crate::error::ClientError;

/// Boxed future returned by [`DeclarationClient`] operations
pub type ClientFuture<'a, T> =
    Pin<Box<dyn Future<Output = std::result::Result<T, ClientError>> + Send + 'a>>;

/// The calls the reconciler makes against declarations
pub trait DeclarationClient: Send + Sync {
    fn get(&self, name: &str) -> ClientFuture<'_, TrustRoot>;

    fn list(&self) -> ClientFuture<'_, Vec<TrustRoot>>;

    /// Replace the finalizer list, conditioned on `resource_version`
    fn patch_finalizers(
        &self,
        name: &str,
        finalizers: &[String],
        resource_version: &str,
    ) -> ClientFuture<'_, TrustRoot>;

    fn update_status(&self, name: &str, status: &TrustRootStatus) -> ClientFuture<'_, TrustRoot>;
}

impl<T: DeclarationClient + ?Sized> DeclarationClient for Arc<T> {
    fn get(&self, name: &str) -> ClientFuture<'_, TrustRoot> {
        (**self).get(name)
    }

    fn list(&self) -> ClientFuture<'_, Vec<TrustRoot>> {
        (**self).list()
    }

    fn patch_finalizers(
        &self,
        name: &str,
        finalizers: &[String],
        resource_version: &str,
    ) -> ClientFuture<'_, TrustRoot> {
        (**self).patch_finalizers(name, finalizers, resource_version)
    }

    fn update_status(&self, name: &str, status: &TrustRootStatus) -> ClientFuture<'_, TrustRoot> {
        (**self).update_status(name, status)
    }
}

/// Merge patch body sent when replacing finalizers
pub fn finalizer_patch(finalizers: &[String], resource_version: &str) -> String {
    serde_json::json!({
        "metadata": {
            "finalizers": finalizers,
            "resourceVersion": resource_version,
        }
    })
    .to_string()
}

/// A write made against declarations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclarationAction {
    PatchFinalizers { name: String, patch: String },
    UpdateStatus { name: String, status: TrustRootStatus },
}

/// Kind of declaration call, used to target injected failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclarationVerb {
    Get,
    List,
    PatchFinalizers,
    UpdateStatus,
}

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<String, TrustRoot>,
    actions: Vec<DeclarationAction>,
    failures: HashMap<DeclarationVerb, String>,
    next_version: u64,
}

impl State {
    fn injected(&self, verb: DeclarationVerb) -> std::result::Result<(), ClientError> {
        match self.failures.get(&verb) {
            Some(message) => Err(ClientError::Unavailable(message.clone())),
            None => Ok(()),
        }
    }

    fn bump(&mut self, name: &str) -> Option<&mut TrustRoot> {
        self.next_version += 1;
        let version = self.next_version.to_string();
        let object = self.objects.get_mut(name)?;
        object.metadata.resource_version = version;
        Some(object)
    }
}

/// Declarations held in process memory
///
/// Behaves like an API server for the calls the reconciler makes: writes
/// bump the resource version, a deleted object whose last finalizer is
/// removed disappears, and every write is recorded.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDeclarations {
    state: Arc<RwLock<State>>,
}

impl InMemoryDeclarations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a declaration, assigning it a resource version
    pub async fn insert(&self, object: TrustRoot) {
        let mut state = self.state.write().await;
        let name = object.metadata.name.clone();
        state.objects.insert(name.clone(), object);
        state.bump(&name);
    }

    /// Request deletion; the object stays while finalizers remain
    pub async fn delete(&self, name: &str) {
        let mut state = self.state.write().await;
        let gone = match state.objects.get_mut(name) {
            Some(object) if object.metadata.finalizers.is_empty() => true,
            Some(object) => {
                object.metadata.deletion_timestamp.get_or_insert_with(Utc::now);
                false
            }
            None => false,
        };
        if gone {
            state.objects.remove(name);
        } else {
            state.bump(name);
        }
    }

    pub async fn object(&self, name: &str) -> Option<TrustRoot> {
        self.state.read().await.objects.get(name).cloned()
    }

    pub async fn fail_on(&self, verb: DeclarationVerb, message: impl Into<String>) {
        self.state.write().await.failures.insert(verb, message.into());
    }

    pub async fn clear_failures(&self) {
        self.state.write().await.failures.clear();
    }

    pub async fn actions(&self) -> Vec<DeclarationAction> {
        self.state.read().await.actions.clone()
    }

    pub async fn clear_actions(&self) {
        self.state.write().await.actions.clear();
    }
}

fn not_found(name: &str) -> ClientError {
    ClientError::NotFound {
        name: name.to_string(),
    }
}

impl DeclarationClient for InMemoryDeclarations {
    fn get(&self, name: &str) -> ClientFuture<'_, TrustRoot> {
        let name = name.to_string();
        Box::pin(async move {
            let state = self.state.read().await;
            state.injected(DeclarationVerb::Get)?;
            state
                .objects
                .get(&name)
                .cloned()
                .ok_or_else(|| not_found(&name))
        })
    }

    fn list(&self) -> ClientFuture<'_, Vec<TrustRoot>> {
        Box::pin(async move {
            let state = self.state.read().await;
            state.injected(DeclarationVerb::List)?;
            Ok(state.objects.values().cloned().collect())
        })
    }

    fn patch_finalizers(
        &self,
        name: &str,
        finalizers: &[String],
        resource_version: &str,
    ) -> ClientFuture<'_, TrustRoot> {
        let name = name.to_string();
        let finalizers = finalizers.to_vec();
        let resource_version = resource_version.to_string();
        Box::pin(async move {
            let mut state = self.state.write().await;
            state.actions.push(DeclarationAction::PatchFinalizers {
                name: name.clone(),
                patch: finalizer_patch(&finalizers, &resource_version),
            });
            state.injected(DeclarationVerb::PatchFinalizers)?;

            let object = state.objects.get_mut(&name).ok_or_else(|| not_found(&name))?;
            if object.metadata.resource_version != resource_version {
                return Err(ClientError::Conflict { name });
            }
            object.metadata.finalizers = finalizers;

            let released = object.metadata.deletion_timestamp.is_some()
                && object.metadata.finalizers.is_empty();
            if released {
                state.bump(&name);
                return state.objects.remove(&name).ok_or_else(|| not_found(&name));
            }
            state.bump(&name).cloned().ok_or_else(|| not_found(&name))
        })
    }

    fn update_status(&self, name: &str, status: &TrustRootStatus) -> ClientFuture<'_, TrustRoot> {
        let name = name.to_string();
        let status = status.clone();
        Box::pin(async move {
            let mut state = self.state.write().await;
            state.actions.push(DeclarationAction::UpdateStatus {
                name: name.clone(),
                status: status.clone(),
            });
            state.injected(DeclarationVerb::UpdateStatus)?;

            let object = state.objects.get_mut(&name).ok_or_else(|| not_found(&name))?;
            object.status = Some(status);
            state.bump(&name).cloned().ok_or_else(|| not_found(&name))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trustroot_types::{InlineKeys, TrustRootSpec};

    fn declaration(name: &str) -> TrustRoot {
        TrustRoot::new(
            name,
            TrustRootSpec::InlineKeys(InlineKeys::from_role_map([("rekor", &b"pem"[..])])),
        )
    }

    #[test]
    fn test_finalizer_patch_body() {
        let patch = finalizer_patch(&["trustroots.policy.sigstore.dev".to_string()], "42");
        assert_eq!(
            patch,
            r#"{"metadata":{"finalizers":["trustroots.policy.sigstore.dev"],"resourceVersion":"42"}}"#
        );
        assert_eq!(
            finalizer_patch(&[], "7"),
            r#"{"metadata":{"finalizers":[],"resourceVersion":"7"}}"#
        );
    }

    #[tokio::test]
    async fn test_finalizer_patch_checks_resource_version() {
        let client = InMemoryDeclarations::new();
        client.insert(declaration("tr")).await;
        let current = client.get("tr").await.unwrap();

        let finalizers = vec!["f".to_string()];
        let updated = client
            .patch_finalizers("tr", &finalizers, &current.metadata.resource_version)
            .await
            .unwrap();
        assert_eq!(updated.metadata.finalizers, finalizers);

        let err = client
            .patch_finalizers("tr", &[], &current.metadata.resource_version)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_deletion_waits_for_finalizers() {
        let client = InMemoryDeclarations::new();
        let mut object = declaration("tr");
        object.metadata.finalizers = vec!["f".to_string()];
        client.insert(object).await;

        client.delete("tr").await;
        let pending = client.object("tr").await.unwrap();
        assert!(pending.metadata.deletion_timestamp.is_some());

        client
            .patch_finalizers("tr", &[], &pending.metadata.resource_version)
            .await
            .unwrap();
        assert!(client.object("tr").await.is_none());
        assert!(matches!(
            client.get("tr").await,
            Err(ClientError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_without_finalizers_removes_immediately() {
        let client = InMemoryDeclarations::new();
        client.insert(declaration("tr")).await;
        client.delete("tr").await;
        assert!(client.list().await.unwrap().is_empty());
    }
}
