//! Chunked feature sources
//!
//! A chunked source is one static blob holding every feature as its own gzip
//! member, plus a JSON [`ChunkHeader`] with the byte offsets. Hydration reads
//! the header; each retrieval then costs exactly one range request, or none
//! for all-zero features.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use spotlens_core::{densify, ChunkHeader, DataType, Densified, FormatError, NameIndex, Selector};

use crate::cache::{CacheKey, MemoCache};
use crate::codec::{parse_rows, parse_sparse};
use crate::config::RetrievalConfig;
use crate::data::{FeatureData, RetrievedData};
use crate::decompress::Decompressor;
use crate::fetch::ByteRangeFetcher;
use crate::hydration::{Hydrate, Hydration};
use crate::local::{resolve_url, LocalDirectory};
use crate::{Error, Result};

/// Manifest entry for a chunked source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkedParams {
    pub name: String,
    /// Blob holding the concatenated chunks
    pub url: String,
    /// Header JSON; not needed when `header` is inline
    #[serde(default)]
    pub header_url: Option<String>,
    #[serde(default, alias = "headers")]
    pub header: Option<ChunkHeader>,
    #[serde(default)]
    pub data_type: DataType,
    #[serde(default)]
    pub unit: Option<String>,
}

impl ChunkedParams {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            header_url: None,
            header: None,
            data_type: DataType::default(),
            unit: None,
        }
    }

    pub fn with_header_url(mut self, url: impl Into<String>) -> Self {
        self.header_url = Some(url.into());
        self
    }

    pub fn with_header(mut self, header: ChunkHeader) -> Self {
        self.header = Some(header);
        self
    }

    pub fn with_data_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }
}

/// Observable lifecycle of a chunked source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Uninitialized,
    HeaderLoading,
    Ready,
}

#[derive(Debug)]
struct LoadedHeader {
    header: ChunkHeader,
    names: NameIndex,
}

impl LoadedHeader {
    fn new(source: &str, header: ChunkHeader) -> Result<Self> {
        header.validate().map_err(|e| Error::header(source, e))?;
        let names = NameIndex::from_header(&header).map_err(|e| Error::header(source, e))?;
        Ok(Self { header, names })
    }
}

struct Inner {
    name: String,
    url: String,
    header_url: Option<String>,
    data_type: DataType,
    unit: Option<String>,
    fetcher: Arc<dyn ByteRangeFetcher>,
    decompressor: Decompressor,
    header: Hydration<LoadedHeader>,
    retrieved: MemoCache<Arc<RetrievedData>>,
}

/// Lazily retrieved features stored as byte-addressable chunks
///
/// Clones share the header and the retrieval cache.
#[derive(Clone)]
pub struct ChunkedFeatureSource {
    inner: Arc<Inner>,
}

impl fmt::Debug for ChunkedFeatureSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkedFeatureSource")
            .field("name", &self.inner.name)
            .field("url", &self.inner.url)
            .field("state", &self.state())
            .field("cached", &self.inner.retrieved.len())
            .finish()
    }
}

impl ChunkedFeatureSource {
    /// Create a cold source; an inline header makes it ready immediately
    pub fn new(
        params: ChunkedParams,
        fetcher: Arc<dyn ByteRangeFetcher>,
        config: &RetrievalConfig,
        local: Option<&LocalDirectory>,
    ) -> Result<Self> {
        let url = resolve_url(local, &params.url)?;
        let header_url = params
            .header_url
            .as_deref()
            .map(|header_url| resolve_url(local, header_url))
            .transpose()?;

        let header = match params.header {
            Some(header) => Hydration::ready(&params.name, LoadedHeader::new(&params.name, header)?),
            None if header_url.is_some() => Hydration::new(&params.name),
            None => {
                return Err(Error::missing(&params.name, "neither `header` nor `headerUrl` given"))
            }
        };

        Ok(Self {
            inner: Arc::new(Inner {
                name: params.name,
                url,
                header_url,
                data_type: params.data_type,
                unit: params.unit,
                fetcher,
                decompressor: config.decompressor,
                header,
                retrieved: MemoCache::new(config.cache_capacity),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    pub fn data_type(&self) -> DataType {
        self.inner.data_type
    }

    pub fn state(&self) -> SourceState {
        if self.inner.header.is_hydrated() {
            SourceState::Ready
        } else if self.inner.header.is_loading() {
            SourceState::HeaderLoading
        } else {
            SourceState::Uninitialized
        }
    }

    /// The validated header, once hydrated
    pub fn header(&self) -> Option<&ChunkHeader> {
        self.inner.header.get().map(|loaded| &loaded.header)
    }

    /// Feature names, derived from positions when the header has none
    pub fn names(&self) -> Option<&[String]> {
        self.inner.header.get().map(|loaded| loaded.names.names())
    }

    /// Whether names came from the header rather than from positions
    pub fn has_explicit_names(&self) -> bool {
        self.inner
            .header
            .get()
            .is_some_and(|loaded| loaded.names.has_explicit_names())
    }

    pub fn len(&self) -> Option<usize> {
        self.header().map(|header| header.length)
    }

    pub fn is_empty(&self) -> Option<bool> {
        self.len().map(|len| len == 0)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.inner.header.get()?.names.index_of(name)
    }

    /// Feature to show when the source is first selected
    pub fn active_default(&self) -> Option<&str> {
        self.header()?.active_default.as_deref()
    }

    /// Retrieve one feature
    ///
    /// `Ok(None)` when the selector names nothing in this source. Results are
    /// memoized by feature index, so a name and its index share one fetch.
    pub async fn retrieve(
        &self,
        selector: impl Into<Selector>,
    ) -> Result<Option<Arc<RetrievedData>>> {
        let selector = selector.into();
        if selector.is_sentinel() {
            return Err(Error::InvalidSelector(format!(
                "{selector} passed to `{}`",
                self.inner.name
            )));
        }

        self.hydrate().await?;
        let loaded = self.inner.header.require()?;

        let index = match loaded.names.resolve(&selector) {
            Ok(Some(index)) => index,
            Ok(None) => {
                log::warn!("feature {selector} not found in `{}`", self.inner.name);
                return Ok(None);
            }
            Err(FormatError::NamesUnavailable) => {
                return Err(Error::NamesUnavailable(self.inner.name.clone()))
            }
            Err(FormatError::SentinelSelector) => {
                return Err(Error::InvalidSelector(selector.to_string()))
            }
            Err(other) => return Err(other.into()),
        };

        let key = CacheKey::new(&index)?;
        let inner = Arc::clone(&self.inner);
        let data = self
            .inner
            .retrieved
            .get_or_insert_with(key, move || async move { inner.load(index).await.map(Arc::new) })
            .await?;
        Ok(Some(data))
    }

    /// Number of features currently memoized
    pub fn cached(&self) -> usize {
        self.inner.retrieved.len()
    }
}

impl Inner {
    async fn load_header(&self) -> Result<LoadedHeader> {
        let url = self
            .header_url
            .as_deref()
            .ok_or_else(|| Error::header(&self.name, "no header URL"))?;
        let bytes = self.fetcher.fetch(url).await?;
        let header: ChunkHeader =
            serde_json::from_slice(&bytes).map_err(|e| Error::parse(url, e))?;
        LoadedHeader::new(&self.name, header)
    }

    async fn load(&self, index: usize) -> Result<RetrievedData> {
        let loaded = self.header.require()?;
        let header = &loaded.header;
        let range = header
            .chunk_range(index)
            .ok_or(FormatError::IndexOutOfBounds {
                index,
                length: header.length,
            })?;

        let data = if range.is_empty() {
            log::debug!("`{}` feature {index} is empty, skipping fetch", self.name);
            match header.sparse_mode {
                Some(mode) => FeatureData::from(Densified::empty(mode, header.length)),
                None => FeatureData::Rows(Vec::new()),
            }
        } else {
            let bytes = self.fetcher.fetch_range(&self.url, range).await?;
            let text = self.decompressor.decompress(&bytes)?;
            match header.sparse_mode {
                Some(mode) => {
                    let rows = parse_sparse(&text, &self.url)?;
                    let densified = densify(&rows, mode, &loaded.names)
                        .map_err(|e| Error::malformed(&self.name, e))?;
                    FeatureData::from(densified)
                }
                None => FeatureData::Rows(parse_rows(&text, &self.url)?),
            }
        };

        Ok(RetrievedData::new(self.data_type, data)
            .with_coord_name(header.coord_name.clone())
            .with_scale(header.m_per_px, header.size)
            .with_unit(self.unit.clone()))
    }
}

#[async_trait]
impl Hydrate for ChunkedFeatureSource {
    async fn hydrate(&self) -> Result<()> {
        self.inner
            .header
            .get_or_try_init(|| self.inner.load_header())
            .await
            .map(|_| ())
    }

    fn is_hydrated(&self) -> bool {
        self.inner.header.is_hydrated()
    }
}
