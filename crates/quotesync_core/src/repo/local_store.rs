//! Local quote store contract and SQLite key-value implementation.
//!
//! # Responsibility
//! - Persist the quote collection, preferences and push outbox under stable keys.
//! - Hold session-scoped values that must not outlive the store connection.
//! - Serialize read-modify-write sequences between processes sharing one file.
//!
//! # Invariants
//! - A `StoreBatch` is written in one transaction: every key or none.
//! - Writes are durable before the call returns (`synchronous=FULL`).
//! - Inside `exclusive`, no other connection can write until the closure returns.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::{open_db, open_db_in_memory, DbError};
use crate::model::codec::{decode_batch, encode_compact};
use crate::model::record::{CategoryFilter, Preferences, Record};
use log::{debug, error, warn};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

/// Persisted collection key.
pub const QUOTES_KEY: &str = "quotes";
/// Persisted selected-category key.
pub const LAST_CATEGORY_KEY: &str = "lastCategory";
/// Persisted outbox of locally added records awaiting push.
pub const PENDING_PUSH_KEY: &str = "pendingPush";
/// Session-scoped last viewed quote key.
pub const LAST_QUOTE_KEY: &str = "lastQuote";

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence failure surfaced to callers.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    Serialization(serde_json::Error),
    InvalidData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Serialization(err) => write!(f, "failed to serialize store value: {err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted store data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Serialization(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

/// Durable values to write together. `None` leaves a key untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreBatch<'a> {
    pub quotes: Option<&'a [Record]>,
    pub preferences: Option<&'a Preferences>,
    pub outbox: Option<&'a [Record]>,
}

impl<'a> StoreBatch<'a> {
    pub fn quotes(mut self, quotes: &'a [Record]) -> Self {
        self.quotes = Some(quotes);
        self
    }

    pub fn preferences(mut self, preferences: &'a Preferences) -> Self {
        self.preferences = Some(preferences);
        self
    }

    pub fn outbox(mut self, outbox: &'a [Record]) -> Self {
        self.outbox = Some(outbox);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_none() && self.preferences.is_none() && self.outbox.is_none()
    }
}

/// Durable process-local persistence for the quote engine.
pub trait LocalStore {
    /// Returns the persisted collection, or `None` when nothing was ever saved.
    fn load(&self) -> StoreResult<Option<Vec<Record>>>;
    fn load_preferences(&self) -> StoreResult<Preferences>;
    /// Returns records added locally that have not been pushed yet.
    fn load_outbox(&self) -> StoreResult<Vec<Record>>;

    /// Writes every value present in `batch`, atomically.
    fn write_batch(&self, batch: &StoreBatch<'_>) -> StoreResult<()>;

    /// Runs `f` while holding the store's write lock.
    ///
    /// An `Err` from `f` discards everything `f` wrote. Stores without
    /// cross-process writers may rely on this default, which takes no lock.
    fn exclusive<T, F>(&self, f: F) -> StoreResult<T>
    where
        Self: Sized,
        F: FnOnce(&Self) -> StoreResult<T>,
    {
        f(self)
    }

    /// Replaces the persisted collection.
    fn save(&self, quotes: &[Record]) -> StoreResult<()> {
        self.write_batch(&StoreBatch::default().quotes(quotes))
    }

    fn save_preferences(&self, preferences: &Preferences) -> StoreResult<()> {
        self.write_batch(&StoreBatch::default().preferences(preferences))
    }

    fn save_outbox(&self, pending: &[Record]) -> StoreResult<()> {
        self.write_batch(&StoreBatch::default().outbox(pending))
    }

    /// Returns the last quote shown in this session.
    fn last_viewed(&self) -> StoreResult<Option<String>>;
    fn set_last_viewed(&self, text: &str) -> StoreResult<()>;
}

/// SQLite-backed local store.
///
/// Durable values live in `kv_store`; session values live in a TEMP table that
/// SQLite drops together with the connection.
pub struct SqliteLocalStore {
    conn: Connection,
}

impl SqliteLocalStore {
    /// Wraps a migrated connection and prepares the session table.
    pub fn new(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(
            "CREATE TEMP TABLE IF NOT EXISTS session_kv (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL
            );",
        )?;
        Ok(Self { conn })
    }

    /// Opens (or creates) a file-backed store.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::new(open_db(path)?)
    }

    /// Opens a throwaway in-memory store.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::new(open_db_in_memory()?)
    }

    fn read(&self, table: Table, key: &str) -> StoreResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                &format!("SELECT value FROM {} WHERE key = ?1;", table.name()),
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn read_batch(&self, key: &str) -> StoreResult<Option<Vec<Record>>> {
        match self.read(Table::Durable, key)? {
            Some(json) => decode_batch(&json)
                .map(Some)
                .map_err(|err| StoreError::InvalidData(format!("{key}: {err}"))),
            None => Ok(None),
        }
    }
}

impl LocalStore for SqliteLocalStore {
    fn load(&self) -> StoreResult<Option<Vec<Record>>> {
        self.read_batch(QUOTES_KEY)
    }

    fn load_preferences(&self) -> StoreResult<Preferences> {
        let selected_category = self
            .read(Table::Durable, LAST_CATEGORY_KEY)?
            .map(|value| CategoryFilter::parse(&value))
            .unwrap_or_default();
        Ok(Preferences { selected_category })
    }

    fn load_outbox(&self) -> StoreResult<Vec<Record>> {
        Ok(self.read_batch(PENDING_PUSH_KEY)?.unwrap_or_default())
    }

    fn write_batch(&self, batch: &StoreBatch<'_>) -> StoreResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut entries: Vec<(&str, String)> = Vec::with_capacity(3);
        if let Some(quotes) = batch.quotes {
            entries.push((QUOTES_KEY, encode_compact(quotes)?));
        }
        if let Some(preferences) = batch.preferences {
            entries.push((
                LAST_CATEGORY_KEY,
                preferences.selected_category.as_str().to_string(),
            ));
        }
        if let Some(outbox) = batch.outbox {
            entries.push((PENDING_PUSH_KEY, encode_compact(outbox)?));
        }

        // Inside `exclusive` the outer transaction owns commit and rollback.
        if self.conn.is_autocommit() {
            let tx = self.conn.unchecked_transaction()?;
            upsert_all(&tx, Table::Durable, &entries)?;
            tx.commit()?;
        } else {
            upsert_all(&self.conn, Table::Durable, &entries)?;
        }

        debug!(
            "event=store_write module=store status=ok keys={} bytes={}",
            entries.len(),
            entries.iter().map(|(_, value)| value.len()).sum::<usize>()
        );
        Ok(())
    }

    fn exclusive<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Self) -> StoreResult<T>,
    {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        match f(self) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = tx.rollback() {
                    warn!("event=store_write module=store status=warn error_code=rollback_failed error={rollback}");
                }
                Err(err)
            }
        }
    }

    fn last_viewed(&self) -> StoreResult<Option<String>> {
        self.read(Table::Session, LAST_QUOTE_KEY)
    }

    fn set_last_viewed(&self, text: &str) -> StoreResult<()> {
        upsert_all(&self.conn, Table::Session, &[(LAST_QUOTE_KEY, text.to_string())])
    }
}

fn upsert_all(conn: &Connection, table: Table, entries: &[(&str, String)]) -> StoreResult<()> {
    let sql = match table {
        Table::Durable => {
            "INSERT INTO kv_store (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = (strftime('%s', 'now') * 1000);"
        }
        Table::Session => {
            "INSERT INTO session_kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value;"
        }
    };

    for (key, value) in entries {
        if let Err(err) = conn.execute(sql, params![key, value]) {
            error!(
                "event=store_write module=store status=error key={key} error_code=write_failed error={err}"
            );
            return Err(err.into());
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
enum Table {
    Durable,
    Session,
}

impl Table {
    fn name(self) -> &'static str {
        match self {
            Self::Durable => "kv_store",
            Self::Session => "session_kv",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{LocalStore, SqliteLocalStore, StoreBatch, StoreError, QUOTES_KEY};
    use crate::model::record::{seed_quotes, CategoryFilter, Preferences};

    #[test]
    fn load_returns_none_before_first_save() {
        let store = SqliteLocalStore::open_in_memory().expect("store should open");
        assert!(store.load().expect("load").is_none());
    }

    #[test]
    fn persisted_empty_collection_is_distinct_from_missing() {
        let store = SqliteLocalStore::open_in_memory().expect("store should open");
        store.save(&[]).expect("save empty");
        assert_eq!(store.load().expect("load"), Some(Vec::new()));
    }

    #[test]
    fn save_overwrites_previous_collection() {
        let store = SqliteLocalStore::open_in_memory().expect("store should open");
        let quotes = seed_quotes();
        store.save(&quotes).expect("first save");
        store.save(&quotes[..1]).expect("second save");
        assert_eq!(store.load().expect("load"), Some(quotes[..1].to_vec()));
    }

    #[test]
    fn preferences_default_to_all_and_roundtrip() {
        let store = SqliteLocalStore::open_in_memory().expect("store should open");
        assert_eq!(
            store.load_preferences().expect("load prefs"),
            Preferences::default()
        );

        let prefs = Preferences {
            selected_category: CategoryFilter::parse("Wisdom"),
        };
        store.save_preferences(&prefs).expect("save prefs");
        assert_eq!(store.load_preferences().expect("load prefs"), prefs);
    }

    #[test]
    fn corrupted_collection_is_reported_not_masked() {
        let store = SqliteLocalStore::open_in_memory().expect("store should open");
        store
            .conn
            .execute(
                "INSERT INTO kv_store (key, value) VALUES (?1, ?2);",
                [QUOTES_KEY, r#"[{"text":"","category":"X"}]"#],
            )
            .expect("raw insert");

        let err = store.load().expect_err("blank text must be rejected");
        assert!(matches!(err, StoreError::InvalidData(ref message) if message.contains("quotes")));
    }

    #[test]
    fn last_viewed_is_kept_per_session() {
        let store = SqliteLocalStore::open_in_memory().expect("store should open");
        assert!(store.last_viewed().expect("read").is_none());
        store.set_last_viewed("In the middle").expect("write");
        assert_eq!(
            store.last_viewed().expect("read").as_deref(),
            Some("In the middle")
        );
    }

    #[test]
    fn batch_with_failing_key_writes_nothing() {
        let store = SqliteLocalStore::open_in_memory().expect("store should open");
        store
            .conn
            .execute_batch(
                "CREATE TRIGGER reject_outbox BEFORE INSERT ON kv_store
                 WHEN NEW.key = 'pendingPush'
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .expect("trigger");

        let quotes = seed_quotes();
        let batch = StoreBatch::default().quotes(&quotes).outbox(&quotes[..1]);
        assert!(store.write_batch(&batch).is_err());
        assert!(store.load().expect("load").is_none());
        assert!(store.conn.is_autocommit());
    }

    #[test]
    fn exclusive_discards_writes_when_closure_fails() {
        let store = SqliteLocalStore::open_in_memory().expect("store should open");
        let quotes = seed_quotes();

        let result: Result<(), StoreError> = store.exclusive(|store| {
            store.save(&quotes)?;
            Err(StoreError::InvalidData("stop".to_string()))
        });
        assert!(result.is_err());
        assert!(store.load().expect("load").is_none());

        store
            .exclusive(|store| store.save(&quotes))
            .expect("exclusive save");
        assert_eq!(store.load().expect("load"), Some(quotes));
    }

    #[test]
    fn empty_batch_is_a_no_op() {
        let store = SqliteLocalStore::open_in_memory().expect("store should open");
        store
            .write_batch(&StoreBatch::default())
            .expect("empty batch");
        assert!(store.load().expect("load").is_none());
    }
}
