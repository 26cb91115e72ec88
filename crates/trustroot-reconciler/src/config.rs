//! Reconciler configuration

use std::time::Duration;

use serde::Deserialize;
use trustroot_store::{StoreRef, DEFAULT_CONFLICT_RETRIES};
use trustroot_tuf::{TufConfig, DEFAULT_MAX_TARGET_SIZE};

/// Finalizer guarding store entries of live declarations
pub const FINALIZER_NAME: &str = "trustroots.policy.sigstore.dev";

/// Namespace holding the shared store resource
pub const DEFAULT_NAMESPACE: &str = "cosign-system";

/// Name of the shared store resource
pub const DEFAULT_STORE_NAME: &str = "config-sigstore-keys";

/// Interval after which every declaration is reconciled again
pub const DEFAULT_RESYNC_PERIOD: Duration = Duration::from_secs(10 * 60 * 60);

/// Settings threaded into the reconciler and controller
///
/// Durations are read as integer seconds, backoff bounds as milliseconds:
///
/// ```
/// use trustroot_reconciler::ReconcilerConfig;
///
/// let config: ReconcilerConfig =
///     serde_json::from_str(r#"{"workers": 4, "resync_period_secs": 60}"#).unwrap();
/// assert_eq!(config.workers, 4);
/// assert_eq!(config.resync_period.as_secs(), 60);
/// assert_eq!(config.namespace, "cosign-system");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    pub namespace: String,
    pub store_name: String,
    pub finalizer: String,
    #[serde(rename = "resync_period_secs", deserialize_with = "duration::secs")]
    pub resync_period: Duration,
    pub workers: usize,
    pub conflict_retries: usize,
    #[serde(rename = "base_backoff_ms", deserialize_with = "duration::millis")]
    pub base_backoff: Duration,
    #[serde(rename = "max_backoff_ms", deserialize_with = "duration::millis")]
    pub max_backoff: Duration,
    /// Largest file accepted from a repository archive
    pub max_target_size: u64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            store_name: DEFAULT_STORE_NAME.to_string(),
            finalizer: FINALIZER_NAME.to_string(),
            resync_period: DEFAULT_RESYNC_PERIOD,
            workers: 2,
            conflict_retries: DEFAULT_CONFLICT_RETRIES,
            base_backoff: Duration::from_millis(5),
            max_backoff: Duration::from_secs(1000),
            max_target_size: DEFAULT_MAX_TARGET_SIZE,
        }
    }
}

impl ReconcilerConfig {
    pub fn with_store(mut self, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self.store_name = name.into();
        self
    }

    pub fn with_resync_period(mut self, period: Duration) -> Self {
        self.resync_period = period;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_conflict_retries(mut self, retries: usize) -> Self {
        self.conflict_retries = retries;
        self
    }

    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.base_backoff = base;
        self.max_backoff = max.max(base);
        self
    }

    pub fn with_max_target_size(mut self, bytes: u64) -> Self {
        self.max_target_size = bytes;
        self
    }

    pub fn store_ref(&self) -> StoreRef {
        StoreRef::new(&self.namespace, &self.store_name)
    }

    pub fn tuf_config(&self) -> TufConfig {
        TufConfig::default().with_max_target_size(self.max_target_size)
    }
}

mod duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn secs<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }

    pub fn millis<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
