//! Quote collection use-case service.
//!
//! # Responsibility
//! - Own the in-memory collection and preferences loaded from a `LocalStore`.
//! - Provide local addition, filtering, random pick, import and export.
//! - Apply merge outcomes produced by the reconciler (import and remote sync).
//!
//! # Invariants
//! - Persisted data always wins over the built-in seed; the seed is written once.
//! - Writes start from the stored collection, not the cached copy, so edits made
//!   through another store handle on the same file are merged, never overwritten.
//! - Every use-case persists its keys in one `StoreBatch`; a failure leaves both
//!   the store and memory as they were.
//! - No two quotes in the collection share a text.

use crate::model::codec::{decode_batch, encode_pretty, ValidationError};
use crate::model::record::{
    distinct_categories, seed_quotes, CategoryFilter, Preferences, Record, RecordValidationError,
    ALL_CATEGORIES,
};
use crate::repo::local_store::{LocalStore, StoreBatch, StoreError};
use crate::sync::reconciler::{merge_import, merge_remote, repair_preferences, MergeOutcome};
use log::{info, warn};
use rand::seq::SliceRandom;
use rand::Rng;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::Path;

/// Service error for quote use-cases.
#[derive(Debug)]
pub enum QuoteServiceError {
    /// Added quote has a blank field.
    InvalidQuote(RecordValidationError),
    /// Added quote's text is already in the collection.
    DuplicateQuote(String),
    /// Filter names a category with no quotes.
    UnknownCategory(String),
    /// Imported batch is malformed.
    Validation(ValidationError),
    /// Persistence-layer failure.
    Store(StoreError),
    /// Export could not be rendered.
    Serialization(serde_json::Error),
    /// Import/export file could not be read or written.
    Io(io::Error),
}

impl Display for QuoteServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidQuote(err) => write!(f, "{err}"),
            Self::DuplicateQuote(text) => write!(f, "quote already exists: `{text}`"),
            Self::UnknownCategory(name) => write!(f, "no quotes in category `{name}`"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Serialization(err) => write!(f, "failed to render export: {err}"),
            Self::Io(err) => write!(f, "{err}"),
        }
    }
}

impl Error for QuoteServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidQuote(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::Serialization(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::DuplicateQuote(_) | Self::UnknownCategory(_) => None,
        }
    }
}

impl From<StoreError> for QuoteServiceError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<ValidationError> for QuoteServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RecordValidationError> for QuoteServiceError {
    fn from(value: RecordValidationError) -> Self {
        Self::InvalidQuote(value)
    }
}

impl From<io::Error> for QuoteServiceError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

pub type QuoteServiceResult<T> = Result<T, QuoteServiceError>;

/// Effect of applying a merge to the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AppliedMerge {
    /// Collection was rewritten in the store.
    pub saved: bool,
    /// Selected category was reset to `all`.
    pub category_reset: bool,
}

/// Quote collection facade over a local store.
pub struct QuoteService<S: LocalStore> {
    store: S,
    quotes: Vec<Record>,
    preferences: Preferences,
}

impl<S: LocalStore> QuoteService<S> {
    /// Loads the collection from `store`, seeding it when nothing was persisted.
    pub fn open(store: S) -> QuoteServiceResult<Self> {
        let (quotes, preferences) = store.exclusive(|store| {
            let quotes = match store.load()? {
                Some(quotes) => quotes,
                None => {
                    let seed = seed_quotes();
                    store.save(&seed)?;
                    info!(
                        "event=quotes_seed module=service status=ok total={}",
                        seed.len()
                    );
                    seed
                }
            };
            Ok((quotes, store.load_preferences()?))
        })?;

        info!(
            "event=quotes_open module=service status=ok total={} category={}",
            quotes.len(),
            if preferences.selected_category == CategoryFilter::All {
                "all"
            } else {
                "custom"
            }
        );
        Ok(Self {
            store,
            quotes,
            preferences,
        })
    }

    pub fn quotes(&self) -> &[Record] {
        &self.quotes
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Reloads the collection and preferences from the store.
    pub fn refresh(&mut self) -> QuoteServiceResult<()> {
        if let Some(quotes) = self.store.load()? {
            self.quotes = quotes;
        }
        self.preferences = self.store.load_preferences()?;
        Ok(())
    }

    /// Adds one quote and queues it for the next push.
    ///
    /// # Errors
    /// - `InvalidQuote` for blank input, `DuplicateQuote` for a known text.
    pub fn add_quote(
        &mut self,
        text: impl AsRef<str>,
        category: impl AsRef<str>,
    ) -> QuoteServiceResult<Record> {
        let record = Record::new(text, category)?;
        let cached = &self.quotes;
        let written = self.store.exclusive(|store| {
            let mut quotes = store.load()?.unwrap_or_else(|| cached.clone());
            if quotes.iter().any(|quote| quote.text == record.text) {
                return Ok(None);
            }
            quotes.push(record.clone());
            let mut outbox = store.load_outbox()?;
            outbox.push(record.clone());
            store.write_batch(&StoreBatch::default().quotes(&quotes).outbox(&outbox))?;
            Ok(Some((quotes, outbox.len())))
        })?;

        let Some((quotes, pending_push)) = written else {
            return Err(QuoteServiceError::DuplicateQuote(record.text));
        };
        self.quotes = quotes;
        info!(
            "event=quote_add module=service status=ok total={} pending_push={pending_push}",
            self.quotes.len()
        );
        Ok(record)
    }

    /// Returns `all` followed by each category in first-seen order.
    pub fn categories(&self) -> Vec<String> {
        let mut categories = vec![ALL_CATEGORIES.to_string()];
        categories.extend(distinct_categories(&self.quotes));
        categories
    }

    /// Persists the selected category filter.
    pub fn select_category(&mut self, filter: CategoryFilter) -> QuoteServiceResult<()> {
        self.refresh()?;
        if !filter.is_satisfied_by(&self.quotes) {
            return Err(QuoteServiceError::UnknownCategory(filter.as_str().to_string()));
        }
        let preferences = Preferences {
            selected_category: filter,
        };
        self.store.save_preferences(&preferences)?;
        self.preferences = preferences;
        Ok(())
    }

    /// Returns the quotes visible under the selected category.
    pub fn filtered(&self) -> Vec<&Record> {
        self.quotes
            .iter()
            .filter(|quote| self.preferences.selected_category.matches(quote))
            .collect()
    }

    /// Picks a random visible quote and remembers it for this session.
    ///
    /// Returns `None` when the filtered view is empty.
    pub fn random_quote<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> QuoteServiceResult<Option<Record>> {
        let visible = self.filtered();
        let Some(picked) = visible.choose(rng) else {
            return Ok(None);
        };
        self.store.set_last_viewed(&picked.text)?;
        Ok(Some((*picked).clone()))
    }

    /// Returns the text of the last quote shown in this session.
    pub fn last_viewed(&self) -> QuoteServiceResult<Option<String>> {
        Ok(self.store.last_viewed()?)
    }

    /// Imports a JSON batch, keeping local quotes on text collisions.
    pub fn import_json(&mut self, json: &str) -> QuoteServiceResult<MergeOutcome> {
        let imported = match decode_batch(json) {
            Ok(imported) => imported,
            Err(err) => {
                warn!(
                    "event=quotes_import module=service status=error error_code=invalid_batch position={}",
                    err.position().map_or_else(|| "none".to_string(), |p| p.to_string())
                );
                return Err(err.into());
            }
        };

        let (outcome, applied) = self.merge_with(|local| merge_import(local, &imported))?;
        info!(
            "event=quotes_import module=service status=ok added={} skipped={} total={} category_reset={}",
            outcome.added,
            outcome.duplicates_skipped,
            outcome.merged.len(),
            applied.category_reset
        );
        Ok(outcome)
    }

    /// Reads and imports a JSON file.
    pub fn import_from_path(&mut self, path: impl AsRef<Path>) -> QuoteServiceResult<MergeOutcome> {
        let json = std::fs::read_to_string(path)?;
        self.import_json(&json)
    }

    /// Renders the collection as pretty-printed JSON.
    pub fn export_json(&self) -> QuoteServiceResult<String> {
        encode_pretty(&self.quotes).map_err(QuoteServiceError::Serialization)
    }

    /// Writes the pretty-printed collection to `path`.
    pub fn export_to_path(&self, path: impl AsRef<Path>) -> QuoteServiceResult<()> {
        let json = self.export_json()?;
        std::fs::write(path, json)?;
        info!(
            "event=quotes_export module=service status=ok total={}",
            self.quotes.len()
        );
        Ok(())
    }

    /// Merges a remote snapshot into the stored collection.
    ///
    /// Returns the merge against the collection as stored when the merge ran.
    pub fn merge_remote_snapshot(
        &mut self,
        snapshot: &[Record],
    ) -> Result<(MergeOutcome, AppliedMerge), StoreError> {
        self.merge_with(|local| merge_remote(local, snapshot))
    }

    /// Runs `merge` against the stored collection and persists the result
    /// together with any preference repair.
    ///
    /// The collection is only rewritten when it actually changed.
    fn merge_with<F>(&mut self, merge: F) -> Result<(MergeOutcome, AppliedMerge), StoreError>
    where
        F: FnOnce(&[Record]) -> MergeOutcome,
    {
        let cached = &self.quotes;
        let (outcome, preferences, applied) = self.store.exclusive(|store| {
            let local = store.load()?.unwrap_or_else(|| cached.clone());
            let preferences = store.load_preferences()?;
            let outcome = merge(&local);
            let repaired = repair_preferences(&preferences, &outcome.merged);

            let applied = AppliedMerge {
                saved: outcome.merged != local,
                category_reset: repaired.is_some(),
            };
            let mut batch = StoreBatch::default();
            if applied.saved {
                batch = batch.quotes(&outcome.merged);
            }
            if let Some(repaired) = &repaired {
                batch = batch.preferences(repaired);
            }
            store.write_batch(&batch)?;

            Ok((outcome, repaired.unwrap_or(preferences), applied))
        })?;

        self.quotes = outcome.merged.clone();
        self.preferences = preferences;
        Ok((outcome, applied))
    }
}
