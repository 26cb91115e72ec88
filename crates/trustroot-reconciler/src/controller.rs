//! Controller loop driving the reconciler from a work queue

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use trustroot_store::ConfigStore;

use crate::reconciler::parse_key;
use crate::{DeclarationClient, Error, Reconciler, Result, WorkQueue};

/// Runs a bounded pool of workers over a deduplicating work queue
///
/// Declaration change notifications are fed in through [`Controller::enqueue`].
/// Every declaration is also re-enqueued once per resync period, and keys
/// whose reconcile failed with a retryable error come back after their
/// backoff delay.
pub struct Controller<C, S> {
    reconciler: Arc<Reconciler<C, S>>,
    queue: WorkQueue,
}

impl<C, S> Controller<C, S>
where
    C: DeclarationClient + 'static,
    S: ConfigStore + 'static,
{
    pub fn new(reconciler: Reconciler<C, S>) -> Self {
        let config = reconciler.config();
        let queue = WorkQueue::new(config.base_backoff, config.max_backoff);
        Self {
            reconciler: Arc::new(reconciler),
            queue,
        }
    }

    pub fn queue(&self) -> &WorkQueue {
        &self.queue
    }

    pub fn reconciler(&self) -> &Reconciler<C, S> {
        &self.reconciler
    }

    /// Queue a change notification keyed `name` or `namespace/name`
    ///
    /// Both spellings map to one queue entry, so a declaration is never
    /// reconciled by two workers at once. Malformed keys are dropped.
    pub async fn enqueue(&self, key: &str) -> bool {
        match parse_key(key) {
            Ok(name) => {
                self.queue.add(name).await;
                true
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "dropping malformed key");
                false
            }
        }
    }

    /// Queue every existing declaration
    pub async fn enqueue_all(&self) -> Result<usize> {
        let declarations = self.reconciler.client().list().await?;
        for declaration in &declarations {
            self.queue.add(declaration.name()).await;
        }
        Ok(declarations.len())
    }

    /// Run until `shutdown` is cancelled
    ///
    /// A reconcile in flight when shutdown is requested is dropped at its
    /// next await point; the next run picks the declaration up again.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let config = self.reconciler.config();
        tracing::info!(
            workers = config.workers,
            resync_secs = config.resync_period.as_secs(),
            "starting trustroot controller"
        );

        let mut workers = JoinSet::new();
        for id in 0..config.workers.max(1) {
            let reconciler = Arc::clone(&self.reconciler);
            let queue = self.queue.clone();
            let shutdown = shutdown.clone();
            workers.spawn(async move { worker(id, reconciler, queue, shutdown).await });
        }

        let mut resync =
            tokio::time::interval(config.resync_period.max(Duration::from_secs(1)));
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = resync.tick() => match self.enqueue_all().await {
                    Ok(count) => tracing::debug!(count, "enqueued trustroots for resync"),
                    Err(e) => tracing::warn!(error = %e, "failed to list trustroots for resync"),
                },
            }
        }

        tracing::info!("shutting down trustroot controller");
        self.queue.shut_down().await;
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::warn!(error = %e, "worker task failed");
            }
        }
        Ok(())
    }
}

async fn worker<C, S>(
    id: usize,
    reconciler: Arc<Reconciler<C, S>>,
    queue: WorkQueue,
    shutdown: CancellationToken,
) where
    C: DeclarationClient,
    S: ConfigStore,
{
    loop {
        let key = tokio::select! {
            _ = shutdown.cancelled() => break,
            key = queue.get() => match key {
                Some(key) => key,
                None => break,
            },
        };

        let result = tokio::select! {
            _ = shutdown.cancelled() => Err(Error::Cancelled),
            result = reconciler.reconcile(&key) => result,
        };

        match result {
            Ok(outcome) => {
                tracing::debug!(worker = id, key = %key, phase = ?outcome.phase, "reconciled");
                queue.forget(&key).await;
            }
            Err(Error::Cancelled) => {
                tracing::debug!(worker = id, key = %key, "reconcile cancelled");
            }
            Err(e) if e.is_retryable() => {
                let delay = queue.add_rate_limited(key.as_str()).await;
                tracing::warn!(worker = id, key = %key, error = %e, ?delay, "requeueing after failure");
            }
            Err(e) => {
                tracing::warn!(worker = id, key = %key, error = %e, "dropping key until next change");
                queue.forget(&key).await;
            }
        }
        queue.done(&key).await;
    }
}
