#![allow(dead_code)]

use quotesync_core::{
    LocalStore, Preferences, Record, RemoteClient, RemoteError, SqliteLocalStore, StoreBatch,
    StoreResult, TickSource,
};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub fn quote(text: &str, category: &str) -> Record {
    Record::new(text, category).unwrap()
}

pub fn server(text: &str) -> Record {
    Record::from_server(text).unwrap()
}

/// Remote call as observed by `FakeRemote`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    Push(String),
    Fetch,
}

/// Scriptable in-process remote.
pub struct FakeRemote {
    snapshot: Mutex<Result<Vec<Record>, RemoteError>>,
    fail_push: AtomicBool,
    calls: Mutex<Vec<RemoteCall>>,
}

impl FakeRemote {
    pub fn serving(snapshot: Vec<Record>) -> Self {
        Self {
            snapshot: Mutex::new(Ok(snapshot)),
            fail_push: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn unavailable() -> Self {
        let remote = Self::serving(Vec::new());
        remote.set_snapshot(Err(RemoteError::Request("connection refused".to_string())));
        remote
    }

    pub fn set_snapshot(&self, snapshot: Result<Vec<Record>, RemoteError>) {
        *self.snapshot.lock().unwrap() = snapshot;
    }

    pub fn set_fail_push(&self, fail: bool) {
        self.fail_push.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl RemoteClient for FakeRemote {
    fn fetch_snapshot(&self) -> Result<Vec<Record>, RemoteError> {
        self.calls.lock().unwrap().push(RemoteCall::Fetch);
        self.snapshot.lock().unwrap().clone()
    }

    fn push_record(&self, record: &Record) -> Result<(), RemoteError> {
        self.calls
            .lock()
            .unwrap()
            .push(RemoteCall::Push(record.text.clone()));
        if self.fail_push.load(Ordering::SeqCst) {
            return Err(RemoteError::Status(503));
        }
        Ok(())
    }
}

/// Remote whose fetch parks until the test releases it.
pub struct BlockingRemote {
    snapshot: Vec<Record>,
    entered: Sender<()>,
    release: Receiver<()>,
}

impl BlockingRemote {
    pub fn new(snapshot: Vec<Record>, entered: Sender<()>, release: Receiver<()>) -> Self {
        Self {
            snapshot,
            entered,
            release,
        }
    }
}

impl RemoteClient for BlockingRemote {
    fn fetch_snapshot(&self) -> Result<Vec<Record>, RemoteError> {
        let _ = self.entered.send(());
        self.release
            .recv()
            .map_err(|_| RemoteError::Request("released by teardown".to_string()))?;
        Ok(self.snapshot.clone())
    }

    fn push_record(&self, _record: &Record) -> Result<(), RemoteError> {
        Ok(())
    }
}

/// In-memory SQLite store that counts collection saves.
pub struct CountingStore {
    inner: SqliteLocalStore,
    saves: Arc<AtomicUsize>,
}

impl CountingStore {
    pub fn in_memory(saves: Arc<AtomicUsize>) -> Self {
        Self {
            inner: SqliteLocalStore::open_in_memory().unwrap(),
            saves,
        }
    }
}

impl LocalStore for CountingStore {
    fn load(&self) -> StoreResult<Option<Vec<Record>>> {
        self.inner.load()
    }

    fn load_preferences(&self) -> StoreResult<Preferences> {
        self.inner.load_preferences()
    }

    fn load_outbox(&self) -> StoreResult<Vec<Record>> {
        self.inner.load_outbox()
    }

    fn write_batch(&self, batch: &StoreBatch<'_>) -> StoreResult<()> {
        if batch.quotes.is_some() {
            self.saves.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.write_batch(batch)
    }

    fn last_viewed(&self) -> StoreResult<Option<String>> {
        self.inner.last_viewed()
    }

    fn set_last_viewed(&self, text: &str) -> StoreResult<()> {
        self.inner.set_last_viewed(text)
    }
}

/// Tick source driven by a channel the test controls.
pub struct ManualTicks {
    ticks: Receiver<()>,
}

impl ManualTicks {
    pub fn new(ticks: Receiver<()>) -> Self {
        Self { ticks }
    }
}

impl TickSource for ManualTicks {
    fn wait_tick(&mut self, cancel: &Receiver<()>) -> bool {
        loop {
            match cancel.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => return false,
                Err(TryRecvError::Empty) => {}
            }
            match self.ticks.recv_timeout(Duration::from_millis(10)) {
                // A tick racing with cancel loses.
                Ok(()) => return cancel.try_recv() == Err(TryRecvError::Empty),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return false,
            }
        }
    }
}

/// Polls `condition` until it holds or five seconds pass.
pub fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not met within 5s");
        std::thread::sleep(Duration::from_millis(5));
    }
}

/// Makes every write of `key` to the store file at `path` fail.
pub fn reject_writes(path: &Path, key: &str) {
    let conn = rusqlite::Connection::open(path).unwrap();
    conn.execute_batch(&format!(
        "CREATE TRIGGER reject_insert BEFORE INSERT ON kv_store WHEN NEW.key = '{key}'
         BEGIN SELECT RAISE(ABORT, 'write rejected'); END;
         CREATE TRIGGER reject_update BEFORE UPDATE ON kv_store WHEN NEW.key = '{key}'
         BEGIN SELECT RAISE(ABORT, 'write rejected'); END;"
    ))
    .unwrap();
}

/// Undoes `reject_writes`.
pub fn accept_writes(path: &Path) {
    let conn = rusqlite::Connection::open(path).unwrap();
    conn.execute_batch("DROP TRIGGER reject_insert; DROP TRIGGER reject_update;")
        .unwrap();
}
