//! In-memory fetcher
//!
//! Serves blobs registered up front and records every request, which makes
//! it the network double for tests and the backend for inline datasets.

use std::ops::Range;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use hashbrown::HashMap;
use parking_lot::{Mutex, RwLock};

use super::ByteRangeFetcher;
use crate::{Error, Result};

/// A request observed by [`MemoryFetcher`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    /// `None` for whole-resource fetches
    pub range: Option<Range<u64>>,
}

/// Fetcher over blobs held in memory
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    blobs: RwLock<HashMap<String, Bytes>>,
    requests: Mutex<Vec<FetchRequest>>,
    latency: Option<Duration>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every response by `latency`, keeping requests in flight
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Register `bytes` under `url`, replacing any previous blob
    pub fn insert(&self, url: impl Into<String>, bytes: impl Into<Bytes>) {
        self.blobs.write().insert(url.into(), bytes.into());
    }

    pub fn remove(&self, url: &str) -> Option<Bytes> {
        self.blobs.write().remove(url)
    }

    /// All requests seen so far, in order
    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().clone()
    }

    /// Number of requests made for `url`
    pub fn request_count(&self, url: &str) -> usize {
        self.requests.lock().iter().filter(|r| r.url == url).count()
    }

    pub fn total_requests(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn clear_requests(&self) {
        self.requests.lock().clear();
    }

    async fn respond(&self, url: &str, range: Option<Range<u64>>) -> Result<Bytes> {
        self.requests.lock().push(FetchRequest {
            url: url.to_string(),
            range: range.clone(),
        });

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let blob = self
            .blobs
            .read()
            .get(url)
            .cloned()
            .ok_or_else(|| Error::http(url, "status 404 Not Found"))?;

        match range {
            None => Ok(blob),
            Some(range) => {
                let len = blob.len() as u64;
                if range.start >= range.end || range.end > len {
                    return Err(Error::http(url, "status 416 Range Not Satisfiable"));
                }
                // Bounds checked against `len` above
                Ok(blob.slice(range.start as usize..range.end as usize))
            }
        }
    }
}

#[async_trait]
impl ByteRangeFetcher for MemoryFetcher {
    async fn fetch_range(&self, url: &str, range: Range<u64>) -> Result<Bytes> {
        self.respond(url, Some(range)).await
    }

    async fn fetch(&self, url: &str) -> Result<Bytes> {
        self.respond(url, None).await
    }
}
