//! Persistence layer contracts and implementations.
//!
//! # Responsibility
//! - Define the `LocalStore` contract consumed by services and the sync engine.
//! - Keep SQLite details inside the persistence boundary.
//!
//! # Invariants
//! - Store writes replace whole values; there is no partial update API.

pub mod local_store;
