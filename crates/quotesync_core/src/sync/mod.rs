//! Local/remote reconciliation.
//!
//! # Responsibility
//! - Merge remote snapshots and imported batches into the local collection.
//! - Run push/fetch/merge cycles and schedule them with single-flight semantics.
//! - Surface conflicting merges to the host application.
//!
//! # Invariants
//! - Only the scheduler decides when a cycle runs; at most one runs at a time.
//! - Remote failures are converted into "no change this cycle".

pub mod engine;
pub mod http_remote;
pub mod notifier;
pub mod reconciler;
pub mod remote_client;
pub mod scheduler;
