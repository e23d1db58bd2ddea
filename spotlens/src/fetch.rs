//! Byte-range fetching
//!
//! Chunked sources read exactly one feature's compressed payload per request,
//! using HTTP range requests against a static blob. Headers, manifests and
//! plain tables are fetched whole through the same trait.

mod file;
mod memory;

pub use memory::{FetchRequest, MemoryFetcher};

use std::ops::Range;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use spotlens_core::format_range_header;
use spotlens_core::validation::validate_chunk_bounds;

use crate::config::FetchConfig;
use crate::{Error, Result};

/// Source of raw bytes for remote resources
#[async_trait]
pub trait ByteRangeFetcher: Send + Sync {
    /// Fetch the half-open byte interval `range` of the resource at `url`
    async fn fetch_range(&self, url: &str, range: Range<u64>) -> Result<Bytes>;

    /// Fetch the whole resource at `url`
    async fn fetch(&self, url: &str) -> Result<Bytes>;
}

/// HTTP client for range-based access to remote blobs
///
/// `file://` URLs are served from local files, which is how local-folder
/// mode reaches the same code path as the network.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher with default settings
    pub fn new() -> Result<Self> {
        Self::with_config(&FetchConfig::default())
    }

    /// Create a fetcher honouring `config`
    pub fn with_config(config: &FetchConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        let client = builder
            .build()
            .map_err(|err| Error::http("<client>", err))?;
        Ok(Self { client })
    }

    /// Size of the resource as reported by a `HEAD` request
    pub async fn content_length(&self, url: &str) -> Result<u64> {
        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|err| Error::http(url, err))?;

        response
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .ok_or_else(|| Error::http(url, "no content-length header"))?
            .to_str()
            .map_err(|err| Error::http(url, err))?
            .parse::<u64>()
            .map_err(|err| Error::http(url, err))
    }

    /// Check if the server advertises byte range support
    pub async fn supports_range_requests(&self, url: &str) -> Result<bool> {
        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|err| Error::http(url, err))?;

        Ok(response
            .headers()
            .get(reqwest::header::ACCEPT_RANGES)
            .is_some_and(|v| v.as_bytes() == b"bytes"))
    }
}

#[async_trait]
impl ByteRangeFetcher for HttpFetcher {
    async fn fetch_range(&self, url: &str, range: Range<u64>) -> Result<Bytes> {
        if let Some(path) = file::local_path(url) {
            return file::read(path, Some(range)).await;
        }

        let range_header = format_range_header(&range)?;
        log::debug!("GET {url} {range_header}");

        let response = self
            .client
            .get(url)
            .header(reqwest::header::RANGE, range_header)
            .send()
            .await
            .map_err(|err| Error::http(url, err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::http(url, format!("status {status}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| Error::http(url, err))?;

        if status == StatusCode::PARTIAL_CONTENT {
            return check_partial_len(url, &range, bytes);
        }

        // Server ignored the range and sent the whole blob
        validate_chunk_bounds(range.start, range.end, bytes.len() as u64).map_err(|_| {
            Error::http(
                url,
                format!("range {}..{} beyond {} byte body", range.start, range.end, bytes.len()),
            )
        })?;
        // In bounds of `bytes`, so both ends fit in usize
        Ok(bytes.slice(range.start as usize..range.end as usize))
    }

    async fn fetch(&self, url: &str) -> Result<Bytes> {
        if let Some(path) = file::local_path(url) {
            return file::read(path, None).await;
        }

        log::debug!("GET {url}");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| Error::http(url, err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::http(url, format!("status {status}")));
        }

        response.bytes().await.map_err(|err| Error::http(url, err))
    }
}

/// A 206 body must cover the requested range exactly
fn check_partial_len(url: &str, range: &Range<u64>, bytes: Bytes) -> Result<Bytes> {
    let expected = range.end - range.start;
    if bytes.len() as u64 != expected {
        return Err(Error::http(
            url,
            format!("range {}..{} returned {} of {expected} bytes", range.start, range.end, bytes.len()),
        ));
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_content_length_is_checked() {
        let body = Bytes::from_static(b"0123");
        assert_eq!(check_partial_len("https://host/blob", &(10..14), body.clone()).unwrap(), body);

        let err = check_partial_len("https://host/blob", &(10..20), body).unwrap_err();
        assert!(matches!(err, Error::Http { .. }));
        assert_eq!(err.kind(), crate::ErrorKind::Transport);
    }

    #[tokio::test]
    async fn test_file_urls_are_served_locally() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"0123456789").unwrap();
        let url = url::Url::from_file_path(file.path()).unwrap().to_string();

        let fetcher = HttpFetcher::new().unwrap();
        let bytes = fetcher.fetch_range(&url, 2..5).await.unwrap();
        assert_eq!(&bytes[..], b"234");

        let whole = fetcher.fetch(&url).await.unwrap();
        assert_eq!(&whole[..], b"0123456789");

        let err = fetcher.fetch_range(&url, 8..20).await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Transport);
    }
}
