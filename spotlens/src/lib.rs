//! spotlens - chunked feature retrieval for spatial-omics samples
//!
//! Turns a sample's feature matrices, stored as concatenated gzip chunks
//! behind a JSON header, into per-feature arrays fetched on demand with HTTP
//! range requests, memoized per source and joined with the positions they
//! are drawn on.
//!
//! ## Architecture
//!
//! - **spotlens-core**: header format, selectors and densification (no I/O)
//! - **spotlens**: fetching, decompression, caching and the sample model
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use spotlens::{FeatureAndGroup, HttpFetcher, RetrievalConfig, Sample};
//!
//! async fn example() -> spotlens::Result<()> {
//!     let fetcher = Arc::new(HttpFetcher::new()?);
//!     let sample = Sample::load(
//!         "https://example.org/V1_Mouse_Brain/sample.json",
//!         fetcher,
//!         RetrievalConfig::default().with_cache_capacity(128),
//!     )
//!     .await?;
//!
//!     if let Some(feature) = sample.get_feature(&FeatureAndGroup::new("genes", "GFAP")).await? {
//!         println!("{} positions, range {:?}", feature.data.len(), feature.minmax);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `streaming` (default): flate2 decoder; without it chunks go through the
//!   software inflate path
//! - `mmap` (default): `file://` URLs are read through memory maps
//! - `cli` (default): dependencies of the `feature_query` demo

pub use spotlens_core::{
    parse_range, ChunkHeader, DataType, FormatError, NameIndex, Selector, SparseMode,
    SENTINEL_INDEX,
};

pub mod annotation;
pub mod cache;
pub mod chunked;
pub mod codec;
pub mod config;
pub mod coords;
pub mod data;
pub mod decompress;
pub mod error;
pub mod fetch;
pub mod hydration;
pub mod image;
pub mod local;
pub mod manifest;
pub mod plain;
pub mod sample;

pub use annotation::{DrawState, PointAnnotation};
pub use cache::{CacheKey, MemoCache, Memoized, OneSlot};
pub use chunked::{ChunkedFeatureSource, ChunkedParams, SourceState};
pub use config::{FetchConfig, RetrievalConfig};
pub use coords::{Coord, CoordId, CoordParams, CoordinateSet, Position};
pub use data::{FeatureData, RetrievedData, Row, Value};
pub use decompress::Decompressor;
pub use error::{Error, ErrorKind, Result};
pub use fetch::{ByteRangeFetcher, FetchRequest, HttpFetcher, MemoryFetcher};
pub use hydration::{Hydrate, Hydration};
pub use image::{Image, ImageMetadata, ImageParams};
pub use local::LocalDirectory;
pub use manifest::{FeatureParams, SampleManifest};
pub use plain::{PlainFeatureSource, PlainParams};
pub use sample::{FeatureAndGroup, FeatureResult, FeatureSource, FeatureValues, Sample, SampleRegistry};
