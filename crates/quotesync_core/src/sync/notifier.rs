//! Conflict notification side channel.
//!
//! # Responsibility
//! - Tell the host application that a sync changed the local collection.
//!
//! # Invariants
//! - One event per conflicting merge, none otherwise.
//! - Emission never blocks and never fails the cycle; a disconnected receiver
//!   is ignored.

use crate::sync::reconciler::{MergeOutcome, MergeSource};
use log::{debug, warn};
use std::sync::mpsc::Sender;

/// Notification payload describing a conflicting merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictEvent {
    pub source: MergeSource,
    pub added: usize,
    pub updated: usize,
    pub total: usize,
    /// Selected category was reset to `all` by the merge.
    pub category_reset: bool,
}

impl ConflictEvent {
    /// Human-readable summary for alerts/toasts.
    pub fn message(&self) -> String {
        let mut message = format!(
            "Quotes updated from {} due to conflict resolution ({} added, {} updated, {} total).",
            match self.source {
                MergeSource::Remote => "server",
                MergeSource::Import => "import",
            },
            self.added,
            self.updated,
            self.total
        );
        if self.category_reset {
            message.push_str(" Category filter reset to all.");
        }
        message
    }
}

/// Receiver of conflict events.
pub trait ConflictNotifier {
    fn notify(&self, event: &ConflictEvent);
}

/// Emits an event when `outcome` reports a conflict.
///
/// Returns whether an event was emitted.
pub fn notify_on_conflict<N: ConflictNotifier + ?Sized>(
    notifier: &N,
    outcome: &MergeOutcome,
    category_reset: bool,
) -> bool {
    if !outcome.conflict_occurred {
        return false;
    }
    notifier.notify(&ConflictEvent {
        source: outcome.source,
        added: outcome.added,
        updated: outcome.updated,
        total: outcome.merged.len(),
        category_reset,
    });
    true
}

/// Forwards events over an `mpsc` channel to the host's event loop.
pub struct ChannelNotifier {
    sender: Sender<ConflictEvent>,
}

impl ChannelNotifier {
    pub fn new(sender: Sender<ConflictEvent>) -> Self {
        Self { sender }
    }
}

impl ConflictNotifier for ChannelNotifier {
    fn notify(&self, event: &ConflictEvent) {
        if self.sender.send(event.clone()).is_err() {
            debug!("event=conflict_notify module=notify status=dropped reason=receiver_closed");
        }
    }
}

/// Writes events to the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl ConflictNotifier for LogNotifier {
    fn notify(&self, event: &ConflictEvent) {
        warn!(
            "event=conflict_notify module=notify status=ok source={} added={} updated={} total={} category_reset={}",
            event.source.as_str(),
            event.added,
            event.updated,
            event.total,
            event.category_reset
        );
    }
}
