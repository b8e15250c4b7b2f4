//! HTTP remote adapter backed by `reqwest`'s blocking client.
//!
//! The remote source serves a JSON array of posts; each post's `title` becomes
//! a quote filed under the `Server` category. Pushes POST one record as JSON to
//! the same endpoint.

use crate::model::record::Record;
use crate::sync::remote_client::{RemoteClient, RemoteError, RemoteResult};
use log::debug;
use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use std::time::Duration;

/// Wire shape of one remote item. Extra fields are ignored.
#[derive(Debug, Deserialize)]
pub struct RemotePost {
    pub title: String,
}

/// Remote client for a JSON posts endpoint.
pub struct HttpRemoteClient {
    client: Client,
    endpoint: String,
    snapshot_limit: usize,
}

impl HttpRemoteClient {
    /// Builds a client with a transport-level timeout.
    ///
    /// `snapshot_limit = 0` keeps every remote item.
    pub fn new(
        endpoint: impl Into<String>,
        snapshot_limit: usize,
        timeout: Duration,
    ) -> RemoteResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Request(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            snapshot_limit,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl RemoteClient for HttpRemoteClient {
    fn fetch_snapshot(&self) -> RemoteResult<Vec<Record>> {
        let resp = self
            .client
            .get(&self.endpoint)
            .header(ACCEPT, "application/json")
            .send()
            .map_err(|e| RemoteError::Request(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(RemoteError::Status(resp.status().as_u16()));
        }

        let posts: Vec<RemotePost> = resp.json().map_err(|e| RemoteError::Parse(e.to_string()))?;
        debug!(
            "event=remote_fetch module=remote status=ok items={}",
            posts.len()
        );
        snapshot_from_posts(posts, self.snapshot_limit)
    }

    fn push_record(&self, record: &Record) -> RemoteResult<()> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(record)
            .send()
            .map_err(|e| RemoteError::Request(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(RemoteError::Status(resp.status().as_u16()));
        }
        Ok(())
    }
}

/// Maps remote posts to `Server` records, keeping at most `limit` items.
///
/// # Errors
/// - `Parse` when a kept post has a blank title.
pub fn snapshot_from_posts(posts: Vec<RemotePost>, limit: usize) -> RemoteResult<Vec<Record>> {
    let limit = if limit == 0 { posts.len() } else { limit };
    posts
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(index, post)| {
            Record::from_server(&post.title)
                .map_err(|err| RemoteError::Parse(format!("item #{index}: {err}")))
        })
        .collect()
}
