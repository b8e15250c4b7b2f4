//! Merge and conflict resolution for the quote collection.
//!
//! # Responsibility
//! - Combine the local collection with a remote snapshot or an imported batch.
//! - Decide whether a merge diverged from the local state (a "conflict").
//! - Repair the category preference when a merge invalidates it.
//!
//! # Invariants
//! - Identity is `text`; no two merged records share a text.
//! - Import keeps the first occurrence (local precedence) and never conflicts.
//! - Remote sync lets the remote category win on overlapping texts, keeps
//!   local-only texts in place and appends remote-only texts in remote order.
//! - Remote sync is convergent: merging the same snapshot twice reports no
//!   conflict the second time.
//! - Functions here are pure; they never touch storage or the network.

use crate::model::record::{CategoryFilter, Preferences, Record};
use std::collections::{HashMap, HashSet};

/// Which input a merge consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeSource {
    Remote,
    Import,
}

impl MergeSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Import => "import",
        }
    }
}

/// Result of one merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub source: MergeSource,
    pub merged: Vec<Record>,
    /// `merged` differs from the pre-merge local collection.
    pub conflict_occurred: bool,
    /// Texts that were not present locally.
    pub added: usize,
    /// Local texts whose category was replaced by the remote one.
    pub updated: usize,
    /// Incoming records discarded because their text was already present.
    pub duplicates_skipped: usize,
}

/// Removes later records whose text was already seen.
pub fn dedup_by_text(quotes: impl IntoIterator<Item = Record>) -> Vec<Record> {
    let mut seen = HashSet::new();
    quotes
        .into_iter()
        .filter(|quote| seen.insert(quote.text.clone()))
        .collect()
}

/// Merges an imported batch into the local collection.
///
/// `merged = dedup_by_text(local ++ imported)`; a local record always wins
/// over an imported record with the same text.
pub fn merge_import(local: &[Record], imported: &[Record]) -> MergeOutcome {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut merged = Vec::with_capacity(local.len() + imported.len());

    for quote in local {
        if seen.insert(quote.text.as_str()) {
            merged.push(quote.clone());
        }
    }

    let mut added = 0;
    for quote in imported {
        if seen.insert(quote.text.as_str()) {
            merged.push(quote.clone());
            added += 1;
        }
    }

    MergeOutcome {
        source: MergeSource::Import,
        merged,
        conflict_occurred: false,
        added,
        updated: 0,
        duplicates_skipped: imported.len() - added,
    }
}

/// Merges a remote snapshot into the local collection with remote precedence.
pub fn merge_remote(local: &[Record], remote: &[Record]) -> MergeOutcome {
    let mut remote_by_text: HashMap<&str, &Record> = HashMap::with_capacity(remote.len());
    for quote in remote {
        remote_by_text.entry(quote.text.as_str()).or_insert(quote);
    }

    let mut seen: HashSet<&str> = HashSet::new();
    let mut merged = Vec::with_capacity(local.len() + remote.len());
    let mut updated = 0;

    for quote in local {
        if !seen.insert(quote.text.as_str()) {
            continue;
        }
        match remote_by_text.get(quote.text.as_str()) {
            Some(winner) => {
                if winner.category != quote.category {
                    updated += 1;
                }
                merged.push((*winner).clone());
            }
            None => merged.push(quote.clone()),
        }
    }

    let mut added = 0;
    let mut duplicates_skipped = 0;
    for quote in remote {
        if seen.insert(quote.text.as_str()) {
            merged.push(quote.clone());
            added += 1;
        } else if !local.iter().any(|known| known.text == quote.text) {
            duplicates_skipped += 1;
        }
    }

    let conflict_occurred = !same_contents(local, &merged);
    MergeOutcome {
        source: MergeSource::Remote,
        merged,
        conflict_occurred,
        added,
        updated,
        duplicates_skipped,
    }
}

/// Returns whether two collections hold the same `(text, category)` multiset.
pub fn same_contents(left: &[Record], right: &[Record]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    let mut left_sorted: Vec<&Record> = left.iter().collect();
    let mut right_sorted: Vec<&Record> = right.iter().collect();
    left_sorted.sort_by(|a, b| (&a.text, &a.category).cmp(&(&b.text, &b.category)));
    right_sorted.sort_by(|a, b| (&a.text, &a.category).cmp(&(&b.text, &b.category)));
    left_sorted == right_sorted
}

/// Resets the selected category to `all` when `merged` no longer contains it.
///
/// Returns `None` when the preferences are still valid.
pub fn repair_preferences(preferences: &Preferences, merged: &[Record]) -> Option<Preferences> {
    if preferences.selected_category.is_satisfied_by(merged) {
        return None;
    }
    Some(Preferences {
        selected_category: CategoryFilter::All,
    })
}

#[cfg(test)]
mod tests {
    use super::{
        dedup_by_text, merge_import, merge_remote, repair_preferences, same_contents,
        MergeSource,
    };
    use crate::model::record::{CategoryFilter, Preferences, Record};

    fn quote(text: &str, category: &str) -> Record {
        Record::new(text, category).expect("test record must be valid")
    }

    #[test]
    fn dedup_keeps_first_occurrence_and_is_idempotent() {
        let quotes = vec![quote("A", "X"), quote("B", "Y"), quote("A", "Z")];
        let once = dedup_by_text(quotes);
        assert_eq!(once, vec![quote("A", "X"), quote("B", "Y")]);
        assert_eq!(dedup_by_text(once.clone()), once);
    }

    #[test]
    fn import_appends_new_texts_and_keeps_local_categories() {
        let local = vec![quote("A", "X")];
        let imported = vec![quote("A", "Other"), quote("B", "Y"), quote("B", "Z")];

        let outcome = merge_import(&local, &imported);
        assert_eq!(outcome.source, MergeSource::Import);
        assert_eq!(outcome.merged, vec![quote("A", "X"), quote("B", "Y")]);
        assert!(!outcome.conflict_occurred);
        assert_eq!(outcome.added, 1);
        assert_eq!(outcome.duplicates_skipped, 2);
    }

    #[test]
    fn remote_wins_on_overlap_and_adds_new_texts() {
        let local = vec![quote("A", "X")];
        let remote = vec![quote("A", "Y"), quote("B", "Z")];

        let outcome = merge_remote(&local, &remote);
        assert_eq!(outcome.merged, vec![quote("A", "Y"), quote("B", "Z")]);
        assert!(outcome.conflict_occurred);
        assert_eq!(outcome.updated, 1);
        assert_eq!(outcome.added, 1);
    }

    #[test]
    fn remote_merge_preserves_local_only_records_in_place() {
        let local = vec![quote("L1", "Mine"), quote("A", "X"), quote("L2", "Mine")];
        let remote = vec![quote("A", "Server")];

        let outcome = merge_remote(&local, &remote);
        assert_eq!(
            outcome.merged,
            vec![quote("L1", "Mine"), quote("A", "Server"), quote("L2", "Mine")]
        );
    }

    #[test]
    fn identical_sets_in_different_order_do_not_conflict() {
        let local = vec![quote("A", "X"), quote("B", "Y")];
        let remote = vec![quote("B", "Y"), quote("A", "X")];

        let outcome = merge_remote(&local, &remote);
        assert!(!outcome.conflict_occurred);
        assert!(same_contents(&outcome.merged, &local));
    }

    #[test]
    fn second_merge_with_same_snapshot_converges() {
        let local = vec![quote("Mine", "Life"), quote("A", "X")];
        let remote = vec![quote("A", "Server"), quote("B", "Server")];

        let first = merge_remote(&local, &remote);
        assert!(first.conflict_occurred);
        let second = merge_remote(&first.merged, &remote);
        assert!(!second.conflict_occurred);
        assert_eq!(second.merged, first.merged);
    }

    #[test]
    fn duplicate_local_texts_collapse_and_count_as_conflict() {
        let local = vec![quote("A", "X"), quote("A", "X")];
        let outcome = merge_remote(&local, &[]);
        assert_eq!(outcome.merged, vec![quote("A", "X")]);
        assert!(outcome.conflict_occurred);
    }

    #[test]
    fn same_contents_compares_multisets() {
        let a = vec![quote("A", "X"), quote("B", "Y")];
        let b = vec![quote("A", "X"), quote("B", "Other")];
        assert!(!same_contents(&a, &b));
        assert!(!same_contents(&a, &a[..1]));
    }

    #[test]
    fn repair_resets_missing_category_only() {
        let merged = vec![quote("A", "Server")];
        let stale = Preferences {
            selected_category: CategoryFilter::parse("Wisdom"),
        };
        let repaired = repair_preferences(&stale, &merged).expect("should reset");
        assert_eq!(repaired.selected_category, CategoryFilter::All);

        let valid = Preferences {
            selected_category: CategoryFilter::parse("Server"),
        };
        assert!(repair_preferences(&valid, &merged).is_none());
        assert!(repair_preferences(&Preferences::default(), &[]).is_none());
    }
}
