//! Quote record and user preference model.
//!
//! # Responsibility
//! - Define the `Record` unit exchanged with storage, remote and import files.
//! - Define the persisted category filter preference.
//!
//! # Invariants
//! - `text` and `category` are trimmed and non-empty for every constructed record.
//! - `CategoryFilter::All` is persisted as the literal string `all`.

use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Category tag assigned to every record that originates from the remote source.
pub const SERVER_CATEGORY: &str = "Server";

/// Persisted spelling of the unfiltered view.
pub const ALL_CATEGORIES: &str = "all";

/// Validation error for a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordValidationError {
    /// `text` is empty after trimming.
    EmptyText,
    /// `category` is empty after trimming.
    EmptyCategory,
}

impl Display for RecordValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyText => write!(f, "quote text must not be empty"),
            Self::EmptyCategory => write!(f, "quote category must not be empty"),
        }
    }
}

impl Error for RecordValidationError {}

/// One quote: a text and the category it is filed under.
///
/// Two records describe the same quote iff their `text` values are equal.
/// Only `Serialize` is derived: decoding goes through `model::codec`, which
/// validates every field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Record {
    pub text: String,
    pub category: String,
}

impl Record {
    /// Creates a record from raw input, trimming both fields.
    ///
    /// # Errors
    /// - `EmptyText` / `EmptyCategory` when a field is blank after trimming.
    pub fn new(
        text: impl AsRef<str>,
        category: impl AsRef<str>,
    ) -> Result<Self, RecordValidationError> {
        let text = text.as_ref().trim();
        if text.is_empty() {
            return Err(RecordValidationError::EmptyText);
        }
        let category = category.as_ref().trim();
        if category.is_empty() {
            return Err(RecordValidationError::EmptyCategory);
        }

        Ok(Self {
            text: text.to_string(),
            category: category.to_string(),
        })
    }

    /// Creates a remote-origin record tagged with [`SERVER_CATEGORY`].
    pub fn from_server(text: impl AsRef<str>) -> Result<Self, RecordValidationError> {
        Self::new(text, SERVER_CATEGORY)
    }
}

/// Category filter selected by the user.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    /// No filtering.
    #[default]
    All,
    /// Only quotes filed under this exact category.
    Category(String),
}

impl CategoryFilter {
    /// Parses the persisted/user-provided spelling.
    ///
    /// Blank input and `all` map to `CategoryFilter::All`.
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed == ALL_CATEGORIES {
            Self::All
        } else {
            Self::Category(trimmed.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::All => ALL_CATEGORIES,
            Self::Category(name) => name.as_str(),
        }
    }

    /// Returns whether `record` is visible under this filter.
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Self::All => true,
            Self::Category(name) => record.category == *name,
        }
    }

    /// Returns whether this filter still refers to something in `quotes`.
    pub fn is_satisfied_by(&self, quotes: &[Record]) -> bool {
        match self {
            Self::All => true,
            Self::Category(name) => quotes.iter().any(|quote| quote.category == *name),
        }
    }
}

impl Display for CategoryFilter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted user preferences.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Preferences {
    pub selected_category: CategoryFilter,
}

/// Built-in collection used when nothing has ever been persisted.
pub fn seed_quotes() -> Vec<Record> {
    vec![
        Record {
            text: "The only limit to our realization of tomorrow is our doubts of today."
                .to_string(),
            category: "Motivation".to_string(),
        },
        Record {
            text: "Life is what happens when you're busy making other plans.".to_string(),
            category: "Life".to_string(),
        },
        Record {
            text: "In the middle of difficulty lies opportunity.".to_string(),
            category: "Wisdom".to_string(),
        },
    ]
}

/// Returns unique categories in first-seen order.
pub fn distinct_categories(quotes: &[Record]) -> Vec<String> {
    let mut categories: Vec<String> = Vec::new();
    for quote in quotes {
        if !categories.iter().any(|known| *known == quote.category) {
            categories.push(quote.category.clone());
        }
    }
    categories
}

#[cfg(test)]
mod tests {
    use super::{
        distinct_categories, seed_quotes, CategoryFilter, Record, RecordValidationError,
        SERVER_CATEGORY,
    };

    #[test]
    fn new_trims_both_fields() {
        let record = Record::new("  Stay hungry.  ", "\tLife ").expect("valid record");
        assert_eq!(record.text, "Stay hungry.");
        assert_eq!(record.category, "Life");
    }

    #[test]
    fn new_rejects_blank_fields() {
        assert_eq!(
            Record::new("   ", "Life").expect_err("blank text"),
            RecordValidationError::EmptyText
        );
        assert_eq!(
            Record::new("text", "").expect_err("blank category"),
            RecordValidationError::EmptyCategory
        );
    }

    #[test]
    fn server_records_use_fixed_category() {
        let record = Record::from_server("sunt aut facere").expect("valid title");
        assert_eq!(record.category, SERVER_CATEGORY);
    }

    #[test]
    fn filter_parse_maps_all_and_blank() {
        assert_eq!(CategoryFilter::parse("all"), CategoryFilter::All);
        assert_eq!(CategoryFilter::parse("  "), CategoryFilter::All);
        assert_eq!(
            CategoryFilter::parse(" Wisdom "),
            CategoryFilter::Category("Wisdom".to_string())
        );
        assert_eq!(CategoryFilter::All.as_str(), "all");
    }

    #[test]
    fn filter_satisfaction_tracks_present_categories() {
        let quotes = seed_quotes();
        assert!(CategoryFilter::All.is_satisfied_by(&[]));
        assert!(CategoryFilter::parse("Life").is_satisfied_by(&quotes));
        assert!(!CategoryFilter::parse("Server").is_satisfied_by(&quotes));
    }

    #[test]
    fn distinct_categories_keeps_first_seen_order() {
        let mut quotes = seed_quotes();
        quotes.push(Record::new("Another", "Life").expect("valid record"));
        assert_eq!(
            distinct_categories(&quotes),
            vec!["Motivation", "Life", "Wisdom"]
        );
    }
}
