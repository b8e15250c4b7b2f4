//! Periodic and manual triggering of sync cycles.
//!
//! # Responsibility
//! - Run at most one cycle at a time (`Idle -> Running -> Idle`).
//! - Drive cycles from an injectable tick source and from manual triggers.
//! - Own the timer thread lifecycle.
//!
//! # Invariants
//! - A tick or manual trigger that arrives while a cycle runs is dropped, never
//!   queued.
//! - The timer never waits for a cycle: each accepted tick runs on a worker
//!   thread, so a hung remote call drops later ticks instead of delaying them.
//! - Teardown cancels the pending timer and does not join an in-flight cycle.

use crate::repo::local_store::{LocalStore, StoreError, StoreResult};
use crate::sync::engine::{CycleReport, SyncEngine};
use crate::sync::notifier::ConflictNotifier;
use crate::sync::remote_client::RemoteClient;
use log::{debug, error, info};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Anything the scheduler can run as one reconciliation cycle.
pub trait SyncCycle: Send + 'static {
    fn run_cycle(&mut self) -> StoreResult<CycleReport>;
}

impl<S, R, N> SyncCycle for SyncEngine<S, R, N>
where
    S: LocalStore + Send + 'static,
    R: RemoteClient + Send + 'static,
    N: ConflictNotifier + Send + 'static,
{
    fn run_cycle(&mut self) -> StoreResult<CycleReport> {
        SyncEngine::run_cycle(self)
    }
}

/// Source of timer ticks.
pub trait TickSource: Send + 'static {
    /// Blocks until the next tick is due.
    ///
    /// Returns `false` once `cancel` fires (or its sender is gone) or the
    /// source is exhausted.
    fn wait_tick(&mut self, cancel: &Receiver<()>) -> bool;
}

/// Fixed-interval ticks backed by `recv_timeout` on the cancel channel.
#[derive(Debug, Clone, Copy)]
pub struct IntervalTicks {
    interval: Duration,
}

impl IntervalTicks {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl TickSource for IntervalTicks {
    fn wait_tick(&mut self, cancel: &Receiver<()>) -> bool {
        matches!(
            cancel.recv_timeout(self.interval),
            Err(RecvTimeoutError::Timeout)
        )
    }
}

/// Why a cycle was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Timer,
    Manual,
}

impl Trigger {
    fn as_str(self) -> &'static str {
        match self {
            Self::Timer => "timer",
            Self::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
}

/// Result of one trigger.
#[derive(Debug)]
pub enum TickOutcome {
    Completed(CycleReport),
    Failed(StoreError),
    /// Another cycle was running; this trigger was discarded.
    Dropped,
}

/// Counters for observability and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SchedulerStats {
    pub completed: usize,
    pub failed: usize,
    pub dropped: usize,
}

#[derive(Default)]
struct Counters {
    completed: AtomicUsize,
    failed: AtomicUsize,
    dropped: AtomicUsize,
}

/// Single-flight scheduler over a shared sync cycle.
///
/// Cloning yields another handle to the same cycle and flag.
pub struct SyncScheduler<C: SyncCycle> {
    cycle: Arc<Mutex<C>>,
    running: Arc<AtomicBool>,
    counters: Arc<Counters>,
}

impl<C: SyncCycle> Clone for SyncScheduler<C> {
    fn clone(&self) -> Self {
        Self {
            cycle: Arc::clone(&self.cycle),
            running: Arc::clone(&self.running),
            counters: Arc::clone(&self.counters),
        }
    }
}

/// Marks a claimed `Running` slot; releases it on drop, including on panic.
struct RunSlot {
    running: Arc<AtomicBool>,
}

impl Drop for RunSlot {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

impl<C: SyncCycle> SyncScheduler<C> {
    pub fn new(cycle: C) -> Self {
        Self {
            cycle: Arc::new(Mutex::new(cycle)),
            running: Arc::new(AtomicBool::new(false)),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn state(&self) -> SchedulerState {
        if self.running.load(Ordering::Acquire) {
            SchedulerState::Running
        } else {
            SchedulerState::Idle
        }
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            completed: self.counters.completed.load(Ordering::Acquire),
            failed: self.counters.failed.load(Ordering::Acquire),
            dropped: self.counters.dropped.load(Ordering::Acquire),
        }
    }

    /// Runs a cycle on the calling thread unless one is already running.
    pub fn trigger_now(&self) -> TickOutcome {
        self.fire(Trigger::Manual)
    }

    /// Gives exclusive access to the cycle owner between cycles.
    ///
    /// Blocks while a cycle is running.
    pub fn with_cycle<T>(&self, f: impl FnOnce(&mut C) -> T) -> T {
        f(&mut self.lock_cycle())
    }

    /// Spawns the timer thread.
    pub fn start(&self, mut ticks: impl TickSource) -> SchedulerHandle {
        let (cancel_tx, cancel_rx) = mpsc::channel();
        let scheduler = self.clone();

        let thread = thread::spawn(move || {
            info!("event=scheduler_start module=scheduler status=ok");
            while ticks.wait_tick(&cancel_rx) {
                let Some(slot) = scheduler.try_claim(Trigger::Timer) else {
                    continue;
                };
                let worker = scheduler.clone();
                thread::spawn(move || {
                    worker.run_claimed(slot, Trigger::Timer);
                });
            }
            info!("event=scheduler_stop module=scheduler status=ok");
        });

        SchedulerHandle {
            cancel: Some(cancel_tx),
            thread: Some(thread),
        }
    }

    fn fire(&self, trigger: Trigger) -> TickOutcome {
        match self.try_claim(trigger) {
            Some(slot) => self.run_claimed(slot, trigger),
            None => TickOutcome::Dropped,
        }
    }

    fn try_claim(&self, trigger: Trigger) -> Option<RunSlot> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.counters.dropped.fetch_add(1, Ordering::AcqRel);
            debug!(
                "event=scheduler_tick module=scheduler status=dropped trigger={}",
                trigger.as_str()
            );
            return None;
        }
        Some(RunSlot {
            running: Arc::clone(&self.running),
        })
    }

    fn run_claimed(&self, slot: RunSlot, trigger: Trigger) -> TickOutcome {
        debug!(
            "event=scheduler_tick module=scheduler status=start trigger={}",
            trigger.as_str()
        );
        let result = self.lock_cycle().run_cycle();
        drop(slot);

        match result {
            Ok(report) => {
                self.counters.completed.fetch_add(1, Ordering::AcqRel);
                TickOutcome::Completed(report)
            }
            Err(err) => {
                self.counters.failed.fetch_add(1, Ordering::AcqRel);
                error!(
                    "event=scheduler_tick module=scheduler status=error trigger={} error={}",
                    trigger.as_str(),
                    err
                );
                TickOutcome::Failed(err)
            }
        }
    }

    fn lock_cycle(&self) -> MutexGuard<'_, C> {
        // Merges are all-or-nothing, so state behind a poisoned lock is consistent.
        self.cycle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Running timer; dropping it cancels the timer as well.
pub struct SchedulerHandle {
    cancel: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Cancels the pending timer without waiting for an in-flight cycle.
    pub fn stop(mut self) {
        self.cancel_timer();
    }

    /// Cancels the timer and waits for the timer thread (not its workers).
    pub fn stop_and_join(mut self) {
        self.cancel_timer();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("event=scheduler_stop module=scheduler status=error reason=timer_panicked");
            }
        }
    }

    fn cancel_timer(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}
