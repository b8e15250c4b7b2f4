//! Remote source contract.
//!
//! # Responsibility
//! - Describe the two calls the sync engine makes against the remote side.
//! - Classify remote failures so the engine can treat them as "no sync".
//!
//! # Invariants
//! - Implementations never retry on their own; the scheduler is the retry loop.
//! - Snapshot records are already validated `Record`s tagged by the adapter.

use crate::model::record::Record;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Remote side unavailable for this cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Transport failure (DNS, connect, timeout, TLS).
    Request(String),
    /// Non-success HTTP status.
    Status(u16),
    /// Response body could not be mapped to records.
    Parse(String),
}

impl RemoteError {
    /// Stable short code for structured logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Request(_) => "remote_request_failed",
            Self::Status(_) => "remote_bad_status",
            Self::Parse(_) => "remote_parse_failed",
        }
    }
}

impl Display for RemoteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Request(message) => write!(f, "remote request failed: {message}"),
            Self::Status(status) => write!(f, "remote returned HTTP {status}"),
            Self::Parse(message) => write!(f, "remote payload could not be parsed: {message}"),
        }
    }
}

impl Error for RemoteError {}

/// Capability to read from and write to the authoritative remote source.
pub trait RemoteClient {
    /// Fetches the whole remote collection.
    fn fetch_snapshot(&self) -> RemoteResult<Vec<Record>>;
    /// Sends one locally added record.
    fn push_record(&self, record: &Record) -> RemoteResult<()>;
}
