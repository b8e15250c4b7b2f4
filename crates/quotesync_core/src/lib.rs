//! Core engine for QuoteSync.
//! This crate owns the quote collection, its local persistence and its
//! reconciliation with the remote source.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod sync;

pub use config::Config;
pub use db::{DbError, DbLocation};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::codec::ValidationError;
pub use model::record::{CategoryFilter, Preferences, Record, RecordValidationError};
pub use repo::local_store::{
    LocalStore, SqliteLocalStore, StoreBatch, StoreError, StoreResult,
};
pub use service::quote_service::{AppliedMerge, QuoteService, QuoteServiceError};
pub use sync::engine::{CycleOutcome, CycleReport, PushReport, SyncEngine};
pub use sync::http_remote::HttpRemoteClient;
pub use sync::notifier::{ChannelNotifier, ConflictEvent, ConflictNotifier, LogNotifier};
pub use sync::reconciler::{dedup_by_text, merge_import, merge_remote, MergeOutcome, MergeSource};
pub use sync::remote_client::{RemoteClient, RemoteError};
pub use sync::scheduler::{
    IntervalTicks, SchedulerHandle, SchedulerState, SchedulerStats, SyncScheduler, TickOutcome,
    TickSource,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
