//! Domain model for the quote collection.
//!
//! # Responsibility
//! - Define the canonical quote record and the preference shape.
//! - Own the JSON batch codec shared by import, export and persistence.
//!
//! # Invariants
//! - A record's identity is its trimmed `text`; category is not identity.
//! - Records are immutable once constructed through `Record::new`.

pub mod codec;
pub mod record;
