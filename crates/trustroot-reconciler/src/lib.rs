//! Reconciliation of TrustRoot declarations into the shared store
//!
//! The [`Reconciler`] handles one declaration per call: it attaches the
//! cleanup finalizer, converts the trust material, syncs the canonical
//! trusted root into the declaration's store entry and reports the result as
//! status conditions. The [`Controller`] drives it from a deduplicating
//! [`WorkQueue`] with a bounded worker pool, periodic resync and per-key
//! backoff.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use tokio_util::sync::CancellationToken;
//! use trustroot_reconciler::{
//!     Controller, InMemoryDeclarations, Reconciler, ReconcilerConfig, TracingEvents,
//! };
//! use trustroot_store::InMemoryStore;
//!
//! # async fn example() -> Result<(), trustroot_reconciler::Error> {
//! let reconciler = Reconciler::new(
//!     InMemoryDeclarations::new(),
//!     InMemoryStore::new(),
//!     Arc::new(TracingEvents),
//!     ReconcilerConfig::default(),
//! );
//! let controller = Controller::new(reconciler);
//!
//! let shutdown = CancellationToken::new();
//! controller.run(shutdown.clone()).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod queue;
pub mod reconciler;

pub use client::{
    finalizer_patch, ClientFuture, DeclarationAction, DeclarationClient, DeclarationVerb,
    InMemoryDeclarations,
};
pub use config::{ReconcilerConfig, FINALIZER_NAME};
pub use controller::Controller;
pub use error::{ClientError, Error, Result};
pub use events::{Event, EventRecorder, EventType, RecordingEvents, TracingEvents};
pub use queue::WorkQueue;
pub use reconciler::{
    parse_key, Phase, ReconcileOutcome, Reconciler, REASON_FINALIZER_UPDATE,
    REASON_INTERNAL_ERROR,
};
