//! Deduplicating work queue with per-key backoff
//!
//! A key sits in the queue at most once. While a worker holds a key, adds of
//! that key are parked and the key is queued again when the worker calls
//! [`WorkQueue::done`], so one key is never processed concurrently.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};

#[derive(Debug, Default)]
struct QueueState {
    queue: VecDeque<String>,
    dirty: HashSet<String>,
    processing: HashSet<String>,
    failures: HashMap<String, u32>,
    shutting_down: bool,
}

#[derive(Debug)]
struct Inner {
    state: Mutex<QueueState>,
    notify: Notify,
    base_backoff: Duration,
    max_backoff: Duration,
}

#[derive(Debug, Clone)]
pub struct WorkQueue {
    inner: Arc<Inner>,
}

impl WorkQueue {
    pub fn new(base_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState::default()),
                notify: Notify::new(),
                base_backoff,
                max_backoff,
            }),
        }
    }

    /// Queue a key unless it is already waiting
    pub async fn add(&self, key: impl Into<String>) {
        let key = key.into();
        let mut state = self.inner.state.lock().await;
        if state.shutting_down || !state.dirty.insert(key.clone()) {
            return;
        }
        if state.processing.contains(&key) {
            return;
        }
        state.queue.push_back(key);
        drop(state);
        self.inner.notify.notify_one();
    }

    /// Queue a key once `delay` has passed
    pub fn add_after(&self, key: impl Into<String>, delay: Duration) {
        let key = key.into();
        let queue = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.add(key).await;
        });
    }

    /// Queue a key after its exponential backoff delay
    pub async fn add_rate_limited(&self, key: impl Into<String>) -> Duration {
        let key = key.into();
        let failures = {
            let mut state = self.inner.state.lock().await;
            let count = state.failures.entry(key.clone()).or_insert(0);
            *count = count.saturating_add(1);
            *count
        };
        let delay = self.backoff(failures);
        self.add_after(key, delay);
        delay
    }

    /// Reset the backoff of a key
    pub async fn forget(&self, key: &str) {
        self.inner.state.lock().await.failures.remove(key);
    }

    /// Consecutive retryable failures recorded for a key
    pub async fn num_requeues(&self, key: &str) -> u32 {
        self.inner
            .state
            .lock()
            .await
            .failures
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    /// Wait for the next key; `None` once the queue is shut down and drained
    pub async fn get(&self) -> Option<String> {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let mut state = self.inner.state.lock().await;
                if let Some(key) = state.queue.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    return Some(key);
                }
                if state.shutting_down {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Release a key taken with [`WorkQueue::get`]
    pub async fn done(&self, key: &str) {
        let mut state = self.inner.state.lock().await;
        state.processing.remove(key);
        if state.dirty.contains(key) {
            state.queue.push_back(key.to_string());
            drop(state);
            self.inner.notify.notify_one();
        }
    }

    /// Stop accepting keys and wake every waiting worker
    pub async fn shut_down(&self) {
        self.inner.state.lock().await.shutting_down = true;
        self.inner.notify.notify_waiters();
    }

    pub async fn len(&self) -> usize {
        self.inner.state.lock().await.queue.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn backoff(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(31);
        self.inner
            .base_backoff
            .checked_mul(1u32 << exponent)
            .map_or(self.inner.max_backoff, |delay| {
                delay.min(self.inner.max_backoff)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn queue() -> WorkQueue {
        WorkQueue::new(Duration::from_millis(5), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_duplicate_adds_collapse() {
        let queue = queue();
        queue.add("a").await;
        queue.add("a").await;
        queue.add("b").await;
        assert_eq!(queue.len().await, 2);
        assert_eq!(queue.get().await.as_deref(), Some("a"));
        assert_eq!(queue.get().await.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_key_in_flight_is_deferred() {
        let queue = queue();
        queue.add("a").await;
        let key = queue.get().await.unwrap();

        queue.add("a").await;
        assert!(queue.is_empty().await);

        queue.done(&key).await;
        assert_eq!(queue.len().await, 1);
        assert_eq!(queue.get().await.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_shutdown_releases_waiters() {
        let queue = queue();
        let waiter = tokio::spawn({
            let queue = queue.clone();
            async move { queue.get().await }
        });
        tokio::task::yield_now().await;
        queue.shut_down().await;
        assert_eq!(waiter.await.unwrap(), None);

        queue.add("late").await;
        assert!(queue.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_backoff_grows() {
        let queue = queue();
        assert_eq!(queue.add_rate_limited("a").await, Duration::from_millis(5));
        assert_eq!(queue.add_rate_limited("a").await, Duration::from_millis(10));
        assert_eq!(queue.add_rate_limited("a").await, Duration::from_millis(20));
        assert_eq!(queue.num_requeues("a").await, 3);

        assert_eq!(queue.get().await.as_deref(), Some("a"));
        queue.forget("a").await;
        assert_eq!(queue.num_requeues("a").await, 0);
    }

    #[rstest]
    #[case(1, 5)]
    #[case(2, 10)]
    #[case(4, 40)]
    #[case(40, 1_000)]
    fn test_backoff_is_capped(#[case] failures: u32, #[case] millis: u64) {
        assert_eq!(queue().backoff(failures), Duration::from_millis(millis));
    }
}
