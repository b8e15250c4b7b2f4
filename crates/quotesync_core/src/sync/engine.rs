//! One reconciliation cycle against the remote source.
//!
//! # Responsibility
//! - Push locally added quotes, fetch the remote snapshot, merge, persist and
//!   notify, in that order.
//!
//! # Invariants
//! - Every push of a cycle happens before its fetch; the fetch happens before
//!   the merge is saved. Each stage consumes the previous stage's output.
//! - Remote failures never escalate: a failed fetch leaves the collection
//!   unchanged and reports no conflict; a failed push stays queued for the next
//!   cycle and is not retried within the current one.
//! - Storage failures abort the cycle and are returned to the caller; the
//!   merge and its preference repair are written together or not at all, and
//!   no conflict is notified for a merge that was not persisted.
//! - Delivered records are removed from the outbox as stored after the pushes,
//!   so records queued meanwhile by another handle stay queued.

use crate::model::record::Record;
use crate::repo::local_store::{LocalStore, StoreResult};
use crate::service::quote_service::QuoteService;
use crate::sync::notifier::{notify_on_conflict, ConflictNotifier};
use crate::sync::remote_client::{RemoteClient, RemoteError};
use log::{info, warn};
use std::time::Instant;

/// Outbox delivery summary for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PushReport {
    pub pushed: usize,
    pub failed: usize,
}

/// What the fetch-and-merge half of the cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Fetch failed; nothing was merged.
    RemoteUnavailable(RemoteError),
    /// Snapshot merged into the collection.
    Merged {
        conflict_occurred: bool,
        added: usize,
        updated: usize,
        total: usize,
        category_reset: bool,
    },
}

/// Summary of one reconciliation cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub push: PushReport,
    pub outcome: CycleOutcome,
}

impl CycleReport {
    pub fn conflict_occurred(&self) -> bool {
        matches!(
            self.outcome,
            CycleOutcome::Merged {
                conflict_occurred: true,
                ..
            }
        )
    }
}

/// Output of the push stage; the only way to reach the fetch stage.
struct Pushed {
    report: PushReport,
}

/// Output of the fetch stage; the only way to reach the merge stage.
struct Fetched {
    push: PushReport,
    snapshot: Result<Vec<Record>, RemoteError>,
}

/// Reconciliation engine wiring the quote service to a remote and a notifier.
pub struct SyncEngine<S: LocalStore, R: RemoteClient, N: ConflictNotifier> {
    quotes: QuoteService<S>,
    remote: R,
    notifier: N,
}

impl<S: LocalStore, R: RemoteClient, N: ConflictNotifier> SyncEngine<S, R, N> {
    pub fn new(quotes: QuoteService<S>, remote: R, notifier: N) -> Self {
        Self {
            quotes,
            remote,
            notifier,
        }
    }

    pub fn quotes(&self) -> &QuoteService<S> {
        &self.quotes
    }

    /// Mutable access for local edits between cycles.
    pub fn quotes_mut(&mut self) -> &mut QuoteService<S> {
        &mut self.quotes
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Runs push, fetch, merge and notify once.
    pub fn run_cycle(&mut self) -> StoreResult<CycleReport> {
        let started_at = Instant::now();
        let pushed = self.push_stage()?;
        let fetched = self.fetch_stage(pushed);
        let report = self.merge_stage(fetched)?;

        match &report.outcome {
            CycleOutcome::RemoteUnavailable(err) => warn!(
                "event=sync_cycle module=sync status=skipped pushed={} push_failed={} duration_ms={} error_code={} error={}",
                report.push.pushed,
                report.push.failed,
                started_at.elapsed().as_millis(),
                err.code(),
                err
            ),
            CycleOutcome::Merged {
                conflict_occurred,
                added,
                updated,
                total,
                category_reset,
            } => info!(
                "event=sync_cycle module=sync status=ok pushed={} push_failed={} conflict={} added={} updated={} total={} category_reset={} duration_ms={}",
                report.push.pushed,
                report.push.failed,
                conflict_occurred,
                added,
                updated,
                total,
                category_reset,
                started_at.elapsed().as_millis()
            ),
        }
        Ok(report)
    }

    fn push_stage(&self) -> StoreResult<Pushed> {
        let store = self.quotes.store();
        let outbox = store.load_outbox()?;
        if outbox.is_empty() {
            return Ok(Pushed {
                report: PushReport::default(),
            });
        }

        let attempted = outbox.len();
        let mut delivered = Vec::new();
        for record in outbox {
            match self.remote.push_record(&record) {
                Ok(()) => delivered.push(record),
                Err(err) => warn!(
                    "event=remote_push module=sync status=error error_code={} error={}",
                    err.code(),
                    err
                ),
            }
        }

        let failed = attempted - delivered.len();
        if !delivered.is_empty() {
            store.exclusive(|store| {
                let mut pending = store.load_outbox()?;
                pending.retain(|record| !delivered.contains(record));
                store.save_outbox(&pending)
            })?;
        }
        Ok(Pushed {
            report: PushReport {
                pushed: attempted - failed,
                failed,
            },
        })
    }

    fn fetch_stage(&self, pushed: Pushed) -> Fetched {
        Fetched {
            push: pushed.report,
            snapshot: self.remote.fetch_snapshot(),
        }
    }

    fn merge_stage(&mut self, fetched: Fetched) -> StoreResult<CycleReport> {
        let snapshot = match fetched.snapshot {
            Ok(snapshot) => snapshot,
            Err(err) => {
                return Ok(CycleReport {
                    push: fetched.push,
                    outcome: CycleOutcome::RemoteUnavailable(err),
                });
            }
        };

        let (outcome, applied) = self.quotes.merge_remote_snapshot(&snapshot)?;
        notify_on_conflict(&self.notifier, &outcome, applied.category_reset);

        Ok(CycleReport {
            push: fetched.push,
            outcome: CycleOutcome::Merged {
                conflict_occurred: outcome.conflict_occurred,
                added: outcome.added,
                updated: outcome.updated,
                total: outcome.merged.len(),
                category_reset: applied.category_reset,
            },
        })
    }
}
