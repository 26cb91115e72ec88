//! Per-declaration reconciliation
//!
//! Each pass re-derives everything from the declaration's current state, so
//! an interrupted pass is safe to repeat:
//!
//! 1. A live declaration without the finalizer gets it before any store write.
//! 2. The payload is validated and converted. Failures are written to the
//!    status and leave the store untouched.
//! 3. The canonical trusted root is synced into the declaration's store entry.
//! 4. A declaration being deleted has its entry removed, then its finalizer.

use std::sync::Arc;

use tracing::Instrument;
use trustroot_convert::{Converter, ErrorKind};
use trustroot_store::{ConfigStore, StoreAccessor, StoreRef, SyncOutcome};
use trustroot_types::{ConditionStatus, ConditionType, Lifecycle, TrustRoot, TrustRootStatus};

use crate::error::ClientError;
use crate::{DeclarationClient, Error, Event, EventRecorder, ReconcilerConfig, Result};

/// Event reason for finalizer changes
pub const REASON_FINALIZER_UPDATE: &str = "FinalizerUpdate";

/// Event reason for retryable reconcile failures
pub const REASON_INTERNAL_ERROR: &str = "InternalError";

/// Stage a reconcile pass reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Key could not be mapped to a declaration
    Unknown,
    /// Declaration fields were rejected
    Validating,
    /// Trust material failed to convert
    Converting,
    /// Store entry could not be written yet
    Syncing,
    /// Store entry matches the declaration
    Ready,
    /// Deletion requested, cleanup pending
    Terminating,
    /// Declaration is gone or released
    Deleted,
}

impl Phase {
    /// Phase a declaration is in according to its lifecycle and status
    pub fn of(declaration: &TrustRoot, finalizer: &str) -> Self {
        if let Lifecycle::Terminating { .. } = declaration.lifecycle(finalizer) {
            return Phase::Terminating;
        }
        let Some(status) = &declaration.status else {
            return Phase::Unknown;
        };
        if status.is_ready() {
            return Phase::Ready;
        }
        let failed = |type_: ConditionType| {
            status
                .condition(type_)
                .is_some_and(|c| c.status == ConditionStatus::False)
        };
        if failed(ConditionType::KeysParsed) {
            Phase::Converting
        } else if failed(ConditionType::StoreUpdated) {
            Phase::Syncing
        } else {
            Phase::Unknown
        }
    }
}

/// Result of a successful reconcile pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub phase: Phase,
    /// Store change made during the pass, if any store call was made
    pub store: Option<SyncOutcome>,
}

impl ReconcileOutcome {
    fn at(phase: Phase) -> Self {
        Self { phase, store: None }
    }
}

/// Map a work queue key to a declaration name
///
/// Declarations are cluster scoped; a namespace prefix is accepted and
/// ignored.
pub fn parse_key(key: &str) -> Result<&str> {
    let name = match key.split_once('/') {
        None => key,
        Some((_, name)) if !name.contains('/') => name,
        Some(_) => return Err(Error::InvalidKey(key.to_string())),
    };
    if name.is_empty() {
        return Err(Error::InvalidKey(key.to_string()));
    }
    Ok(name)
}

/// Folds one declaration at a time into the shared store
pub struct Reconciler<C, S> {
    client: C,
    accessor: StoreAccessor<S>,
    converter: Converter,
    events: Arc<dyn EventRecorder>,
    config: ReconcilerConfig,
    store_ref: StoreRef,
}

impl<C: DeclarationClient, S: ConfigStore> Reconciler<C, S> {
    pub fn new(
        client: C,
        store: S,
        events: Arc<dyn EventRecorder>,
        config: ReconcilerConfig,
    ) -> Self {
        let accessor = StoreAccessor::new(store).with_conflict_retries(config.conflict_retries);
        Self {
            client,
            accessor,
            converter: Converter::new(config.tuf_config()),
            events,
            store_ref: config.store_ref(),
            config,
        }
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Reconcile the declaration named by a work queue key
    ///
    /// Malformed keys and missing declarations are not errors. Errors
    /// returned here are the ones worth requeueing or reporting; see
    /// [`Error::is_retryable`].
    pub async fn reconcile(&self, key: &str) -> Result<ReconcileOutcome> {
        let name = match parse_key(key) {
            Ok(name) => name,
            Err(e) => {
                tracing::warn!(key, error = %e, "dropping malformed key");
                return Ok(ReconcileOutcome::at(Phase::Unknown));
            }
        };
        let span = tracing::info_span!("reconcile", trustroot = %name);
        self.reconcile_named(name).instrument(span).await
    }

    async fn reconcile_named(&self, name: &str) -> Result<ReconcileOutcome> {
        let declaration = match self.client.get(name).await {
            Ok(declaration) => declaration,
            Err(ClientError::NotFound { .. }) => {
                tracing::debug!("trustroot no longer exists");
                return Ok(ReconcileOutcome::at(Phase::Deleted));
            }
            Err(e) => return Err(e.into()),
        };

        match declaration.lifecycle(&self.config.finalizer) {
            Lifecycle::Terminating {
                has_finalizer: false,
            } => {
                tracing::debug!("trustroot is being deleted and already released");
                Ok(ReconcileOutcome::at(Phase::Deleted))
            }
            Lifecycle::Terminating {
                has_finalizer: true,
            } => self.finalize(&declaration).await,
            Lifecycle::Active {
                has_finalizer: false,
            } => {
                let declaration = self.attach_finalizer(&declaration).await?;
                self.reconcile_active(&declaration).await
            }
            Lifecycle::Active {
                has_finalizer: true,
            } => self.reconcile_active(&declaration).await,
        }
    }

    async fn attach_finalizer(&self, declaration: &TrustRoot) -> Result<TrustRoot> {
        let mut finalizers = declaration.metadata.finalizers.clone();
        finalizers.push(self.config.finalizer.clone());
        self.patch_finalizers(declaration, finalizers).await
    }

    async fn patch_finalizers(
        &self,
        declaration: &TrustRoot,
        finalizers: Vec<String>,
    ) -> Result<TrustRoot> {
        let name = declaration.name();
        match self
            .client
            .patch_finalizers(name, &finalizers, &declaration.metadata.resource_version)
            .await
        {
            Ok(updated) => {
                self.events.record(Event::normal(
                    name,
                    REASON_FINALIZER_UPDATE,
                    format!("Updated \"{name}\" finalizers"),
                ));
                Ok(updated)
            }
            Err(e) => {
                self.events.record(Event::warning(
                    name,
                    "FinalizerUpdateFailed",
                    format!("Failed to update finalizers for \"{name}\": {e}"),
                ));
                Err(e.into())
            }
        }
    }

    async fn reconcile_active(&self, declaration: &TrustRoot) -> Result<ReconcileOutcome> {
        let name = declaration.name();
        let mut status = declaration.status.clone().unwrap_or_default();
        status.initialize_conditions();
        status.observed_generation = declaration.metadata.generation;

        let mut spec = declaration.spec.clone();
        spec.set_defaults();
        let root = match self.converter.convert(&spec) {
            Ok(root) => root,
            Err(e) => {
                let phase = match e.kind() {
                    ErrorKind::Invalid => Phase::Validating,
                    _ => Phase::Converting,
                };
                tracing::warn!(error = %e, "trust material is invalid");
                status.mark_keys_invalid(e.to_string());
                self.update_status(declaration, status).await?;
                return Ok(ReconcileOutcome::at(phase));
            }
        };
        status.mark_keys_parsed();

        let synced = match root.to_canonical_json() {
            Ok(serialized) => {
                self.accessor
                    .sync_entry(&self.store_ref, name, &serialized)
                    .await
            }
            Err(e) => Err(e.into()),
        };
        match synced {
            Ok(outcome) => {
                status.mark_store_updated();
                self.update_status(declaration, status).await?;
                tracing::debug!(?outcome, "trustroot is ready");
                Ok(ReconcileOutcome {
                    phase: Phase::Ready,
                    store: Some(outcome),
                })
            }
            Err(e) => {
                tracing::warn!(store = %self.store_ref, error = %e, "failed to update store");
                status.mark_store_update_failed(e.to_string());
                if let Err(status_err) = self.update_status(declaration, status).await {
                    tracing::warn!(error = %status_err, "failed to record store failure in status");
                }
                self.events
                    .record(Event::warning(name, REASON_INTERNAL_ERROR, e.to_string()));
                Err(e.into())
            }
        }
    }

    async fn finalize(&self, declaration: &TrustRoot) -> Result<ReconcileOutcome> {
        let name = declaration.name();
        let removed = match self.accessor.remove_entry(&self.store_ref, name).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(store = %self.store_ref, error = %e, "failed to remove store entry");
                self.events
                    .record(Event::warning(name, REASON_INTERNAL_ERROR, e.to_string()));
                return Err(e.into());
            }
        };

        let finalizers = declaration
            .metadata
            .finalizers
            .iter()
            .filter(|f| **f != self.config.finalizer)
            .cloned()
            .collect();
        self.patch_finalizers(declaration, finalizers).await?;
        tracing::info!("released trustroot");
        Ok(ReconcileOutcome {
            phase: Phase::Deleted,
            store: Some(removed),
        })
    }

    /// Write the status unless only transition times would change
    async fn update_status(&self, declaration: &TrustRoot, status: TrustRootStatus) -> Result<()> {
        if declaration
            .status
            .as_ref()
            .is_some_and(|current| current.same_conditions(&status))
        {
            return Ok(());
        }
        self.client
            .update_status(declaration.name(), &status)
            .await?;
        Ok(())
    }
}
