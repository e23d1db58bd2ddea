//! Samples
//!
//! A [`Sample`] owns an image, its coordinate sets and its feature sources,
//! and joins retrieved features with the positions they are drawn on.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{join_all, BoxFuture, FutureExt};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use spotlens_core::constants::{MISC_GROUP, PLACEHOLDER_DOMAIN, SINGULAR_WEIGHT};
use spotlens_core::{DataType, Selector};

use crate::cache::{CacheKey, MemoCache};
use crate::chunked::ChunkedFeatureSource;
use crate::config::RetrievalConfig;
use crate::coords::{Coord, CoordinateSet};
use crate::data::{row_value, FeatureData, RetrievedData, Value};
use crate::fetch::ByteRangeFetcher;
use crate::hydration::{Hydrate, Hydration};
use crate::image::Image;
use crate::local::LocalDirectory;
use crate::manifest::{FeatureParams, SampleManifest};
use crate::plain::PlainFeatureSource;
use crate::{Error, ErrorKind, Result};

const MANIFEST_FILE: &str = "sample.json";

/// Arrays at least this long are scanned for their range in parallel
const PARALLEL_MINMAX_LEN: usize = 1 << 16;

/// Stable identity of a requestable feature
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeatureAndGroup {
    /// Source name, or `"Misc"` for plain sources addressed by name
    pub group: String,
    pub feature: String,
}

impl FeatureAndGroup {
    pub fn new(group: impl Into<String>, feature: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            feature: feature.into(),
        }
    }

    /// Plain source addressed through the `"Misc"` group
    pub fn misc(feature: impl Into<String>) -> Self {
        Self::new(MISC_GROUP, feature)
    }

    pub fn is_misc(&self) -> bool {
        self.group == MISC_GROUP
    }
}

impl fmt::Display for FeatureAndGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.feature)
    }
}

/// A feature source of either storage kind
#[derive(Debug, Clone)]
pub enum FeatureSource {
    Chunked(ChunkedFeatureSource),
    Plain(PlainFeatureSource),
}

impl FeatureSource {
    pub fn from_params(
        params: FeatureParams,
        fetcher: Arc<dyn ByteRangeFetcher>,
        config: &RetrievalConfig,
        local: Option<&LocalDirectory>,
    ) -> Result<Self> {
        Ok(match params {
            FeatureParams::Chunked(params) => {
                FeatureSource::Chunked(ChunkedFeatureSource::new(params, fetcher, config, local)?)
            }
            FeatureParams::Plain(params) => {
                FeatureSource::Plain(PlainFeatureSource::new(params, fetcher, local)?)
            }
        })
    }

    pub fn name(&self) -> &str {
        match self {
            FeatureSource::Chunked(source) => source.name(),
            FeatureSource::Plain(source) => source.name(),
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            FeatureSource::Chunked(source) => source.data_type(),
            FeatureSource::Plain(source) => source.data_type(),
        }
    }

    /// Features this source offers, once hydrated
    pub fn feature_names(&self) -> Option<Vec<String>> {
        match self {
            FeatureSource::Chunked(source) => source.names().map(<[String]>::to_vec),
            FeatureSource::Plain(source) => source.columns(),
        }
    }
}

#[async_trait]
impl Hydrate for FeatureSource {
    async fn hydrate(&self) -> Result<()> {
        match self {
            FeatureSource::Chunked(source) => source.hydrate().await,
            FeatureSource::Plain(source) => source.hydrate().await,
        }
    }

    fn is_hydrated(&self) -> bool {
        match self {
            FeatureSource::Chunked(source) => source.is_hydrated(),
            FeatureSource::Plain(source) => source.is_hydrated(),
        }
    }
}

/// Values aligned with the displayed positions of a coordinate set
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValues {
    Quantitative(Vec<f64>),
    Categorical(Vec<String>),
}

impl FeatureValues {
    pub fn len(&self) -> usize {
        match self {
            FeatureValues::Quantitative(values) => values.len(),
            FeatureValues::Categorical(labels) => labels.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_numbers(&self) -> Option<&[f64]> {
        match self {
            FeatureValues::Quantitative(values) => Some(values),
            FeatureValues::Categorical(_) => None,
        }
    }

    pub fn as_labels(&self) -> Option<&[String]> {
        match self {
            FeatureValues::Quantitative(_) => None,
            FeatureValues::Categorical(labels) => Some(labels),
        }
    }
}

/// A feature ready to draw
#[derive(Debug, Clone)]
pub struct FeatureResult {
    pub data: Arc<FeatureValues>,
    pub coords: CoordinateSet,
    pub data_type: DataType,
    /// Numeric range, `(0, 1)` for labels and empty data
    pub minmax: (f64, f64),
    pub unit: Option<String>,
}

/// One spatial-omics sample
pub struct Sample {
    name: String,
    image: Option<Image>,
    coords: BTreeMap<String, CoordinateSet>,
    features: BTreeMap<String, FeatureSource>,
    local: Option<LocalDirectory>,
    fetcher: Arc<dyn ByteRangeFetcher>,
    config: RetrievalConfig,
    adhoc: MemoCache<CoordinateSet>,
    hydrated: Hydration<()>,
}

impl fmt::Debug for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sample")
            .field("name", &self.name)
            .field("coords", &self.coords.keys().collect::<Vec<_>>())
            .field("features", &self.features.keys().collect::<Vec<_>>())
            .field("local", &self.local)
            .field("hydrated", &self.hydrated.is_hydrated())
            .finish()
    }
}

impl Sample {
    /// Build a cold sample from its manifest
    pub fn new(
        manifest: SampleManifest,
        fetcher: Arc<dyn ByteRangeFetcher>,
        config: RetrievalConfig,
    ) -> Result<Self> {
        Self::build(manifest, fetcher, config, None)
    }

    /// Build a sample whose relative URLs resolve under `directory`
    pub fn with_local_directory(
        manifest: SampleManifest,
        directory: LocalDirectory,
        fetcher: Arc<dyn ByteRangeFetcher>,
        config: RetrievalConfig,
    ) -> Result<Self> {
        Self::build(manifest, fetcher, config, Some(directory))
    }

    /// Fetch `sample.json` from `url` and build the sample
    pub async fn load(
        url: &str,
        fetcher: Arc<dyn ByteRangeFetcher>,
        config: RetrievalConfig,
    ) -> Result<Self> {
        let bytes = fetcher.fetch(url).await?;
        let manifest = SampleManifest::from_json(&bytes, url)?;
        Self::new(manifest, fetcher, config)
    }

    /// Read `sample.json` from a local folder and build the sample
    pub async fn load_local(
        directory: LocalDirectory,
        fetcher: Arc<dyn ByteRangeFetcher>,
        config: RetrievalConfig,
    ) -> Result<Self> {
        let url = directory.resolve(MANIFEST_FILE)?;
        let bytes = fetcher.fetch(&url).await?;
        let manifest = SampleManifest::from_json(&bytes, &url)?;
        Self::with_local_directory(manifest, directory, fetcher, config)
    }

    fn build(
        manifest: SampleManifest,
        fetcher: Arc<dyn ByteRangeFetcher>,
        config: RetrievalConfig,
        local: Option<LocalDirectory>,
    ) -> Result<Self> {
        let image = manifest
            .img_params
            .map(|params| Image::new(params, fetcher.clone(), local.as_ref()))
            .transpose()?;

        let mut coords = BTreeMap::new();
        for params in manifest.coord_params {
            let set = CoordinateSet::new(params, fetcher.clone(), config.subsample_target, local.as_ref());
            let Some(set) = skip_absent(&manifest.name, set)? else {
                continue;
            };
            if coords.insert(set.name().to_string(), set).is_some() {
                return Err(duplicate(&manifest.name, "coordinate set"));
            }
        }

        let mut features = BTreeMap::new();
        for params in manifest.feat_params {
            let source = FeatureSource::from_params(params, fetcher.clone(), &config, local.as_ref());
            let Some(source) = skip_absent(&manifest.name, source)? else {
                continue;
            };
            if features.insert(source.name().to_string(), source).is_some() {
                return Err(duplicate(&manifest.name, "feature source"));
            }
        }

        Ok(Self {
            hydrated: Hydration::new(&manifest.name),
            name: manifest.name,
            image,
            coords,
            features,
            local,
            fetcher,
            adhoc: MemoCache::new(config.coords_cache_capacity),
            config,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn image(&self) -> Option<&Image> {
        self.image.as_ref()
    }

    pub fn local_directory(&self) -> Option<&LocalDirectory> {
        self.local.as_ref()
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn fetcher(&self) -> &Arc<dyn ByteRangeFetcher> {
        &self.fetcher
    }

    pub fn coords(&self, name: &str) -> Option<&CoordinateSet> {
        self.coords.get(name)
    }

    pub fn coord_names(&self) -> impl Iterator<Item = &str> {
        self.coords.keys().map(String::as_str)
    }

    pub fn source(&self, name: &str) -> Option<&FeatureSource> {
        self.features.get(name)
    }

    /// Names of the feature sources
    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.features.keys().map(String::as_str)
    }

    /// Resolve a feature to its values and positions
    ///
    /// `Ok(None)` when the group, feature or coordinate set does not exist,
    /// when a payload or table cannot be parsed, or when row coordinates come
    /// without any scale.
    pub async fn get_feature(&self, fg: &FeatureAndGroup) -> Result<Option<FeatureResult>> {
        match self.resolve_feature(fg).await {
            Err(err) if err.kind() == ErrorKind::Absent => {
                log::warn!("`{}`: {fg} unavailable: {err}", self.name);
                Ok(None)
            }
            result => result,
        }
    }

    async fn resolve_feature(&self, fg: &FeatureAndGroup) -> Result<Option<FeatureResult>> {
        let source_name = if fg.is_misc() { &fg.feature } else { &fg.group };
        let Some(source) = self.features.get(source_name) else {
            log::warn!("`{}`: no feature source `{source_name}` for {fg}", self.name);
            return Ok(None);
        };

        let retrieved = match source {
            FeatureSource::Chunked(_) if fg.is_misc() => {
                log::warn!("`{}`: {fg} names a chunked source, which needs a feature", self.name);
                return Ok(None);
            }
            FeatureSource::Chunked(chunked) => {
                chunked.hydrate().await?;
                chunked.retrieve(selector_for(chunked, &fg.feature)).await?
            }
            FeatureSource::Plain(plain) => {
                plain.hydrate().await?;
                plain.retrieve((!fg.is_misc()).then_some(fg.feature.as_str()))?
            }
        };
        let Some(retrieved) = retrieved else {
            return Ok(None);
        };

        let coords = match &retrieved.coord_name {
            Some(coord_name) => match self.coords.get(coord_name) {
                Some(coords) => {
                    coords.hydrate().await?;
                    coords.clone()
                }
                None => {
                    log::warn!("`{}`: {fg} refers to unknown coordinates `{coord_name}`", self.name);
                    return Ok(None);
                }
            },
            None => match self.adhoc_coords(fg, &retrieved).await? {
                Some(coords) => coords,
                None => return Ok(None),
            },
        };

        let data = align(fg, &retrieved, &coords)?;
        let minmax = value_range(&data);

        Ok(Some(FeatureResult {
            data: Arc::new(data),
            coords,
            data_type: retrieved.data_type,
            minmax,
            unit: retrieved.unit.clone(),
        }))
    }

    /// Coordinate set minted from rows that carry their own positions
    async fn adhoc_coords(
        &self,
        fg: &FeatureAndGroup,
        retrieved: &RetrievedData,
    ) -> Result<Option<CoordinateSet>> {
        let FeatureData::Rows(rows) = &retrieved.data else {
            log::warn!("`{}`: {fg} has neither coordinates nor positions", self.name);
            return Ok(None);
        };
        if !retrieved.data.has_positions() {
            log::warn!("`{}`: rows of {fg} carry no `x`/`y`", self.name);
            return Ok(None);
        }

        if retrieved.m_per_px.is_none() {
            if let Some(image) = &self.image {
                image.hydrate().await?;
            }
        }
        let image = self.image.as_ref();
        let Some(m_per_px) = retrieved.m_per_px.or_else(|| image.and_then(Image::m_per_px)) else {
            log::warn!("`{}`: no mPerPx for {fg} and no image scale", self.name);
            return Ok(None);
        };
        let size = retrieved.size.or_else(|| image.and_then(Image::size));

        let key = CacheKey::from_raw(format!("{}-{}-{}", self.name, fg.group, fg.feature));
        let name = format!("{}-{}", fg.group, fg.feature);
        let target = self.config.subsample_target;
        let coords = self
            .adhoc
            .get_or_insert_with(key, || {
                let rows = rows.clone();
                async move { CoordinateSet::from_rows(name, &rows, Some(m_per_px), size, target) }
            })
            .await?;
        Ok(Some(coords))
    }
}

#[async_trait]
impl Hydrate for Sample {
    /// Hydrate every component together, reporting the first failure
    async fn hydrate(&self) -> Result<()> {
        self.hydrated
            .get_or_try_init(move || async move {
                let mut tasks: Vec<BoxFuture<'_, (&str, Result<()>)>> = Vec::new();
                if let Some(image) = &self.image {
                    tasks.push(async move { ("image", image.hydrate().await) }.boxed());
                }
                for (name, coords) in &self.coords {
                    tasks.push(async move { (name.as_str(), coords.hydrate().await) }.boxed());
                }
                for (name, source) in &self.features {
                    tasks.push(async move { (name.as_str(), source.hydrate().await) }.boxed());
                }

                let mut first = None;
                for (component, result) in join_all(tasks).await {
                    if let Err(err) = result {
                        log::warn!("`{}`: `{component}` failed to hydrate: {err}", self.name);
                        first.get_or_insert(err);
                    }
                }
                first.map_or(Ok(()), Err)
            })
            .await
            .map(|_| ())
    }

    fn is_hydrated(&self) -> bool {
        self.hydrated.is_hydrated()
    }
}

/// Drop a component whose data is missing, keeping the rest of the sample
fn skip_absent<T>(sample: &str, component: Result<T>) -> Result<Option<T>> {
    match component {
        Ok(component) => Ok(Some(component)),
        Err(err) if err.kind() == ErrorKind::Absent => {
            log::warn!("`{sample}`: skipping component: {err}");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

fn duplicate(sample: &str, what: &str) -> Error {
    Error::InvalidParams {
        name: sample.to_string(),
        reason: format!("duplicate {what} name"),
    }
}

/// Index selectors for sources whose names are only positions
fn selector_for(source: &ChunkedFeatureSource, feature: &str) -> Selector {
    if !source.has_explicit_names() {
        if let Ok(index) = feature.parse::<usize>() {
            return Selector::from(index);
        }
    }
    Selector::from(feature)
}

/// Align retrieved data with the displayed positions of `coords`
fn align(fg: &FeatureAndGroup, retrieved: &RetrievedData, coords: &CoordinateSet) -> Result<FeatureValues> {
    let shown = coords.positions()?;
    let loaded = coords.all_positions()?.len();

    if retrieved.data_type == DataType::Singular {
        return Ok(FeatureValues::Quantitative(vec![SINGULAR_WEIGHT; shown.len()]));
    }

    let cells: Vec<Value> = match &retrieved.data {
        FeatureData::Dense(values) => {
            warn_on_mismatch(fg, values.len(), loaded);
            by_idx(&shown, |idx| values.get(idx).copied().map(Value::Number))
        }
        FeatureData::Record(record) => shown
            .iter()
            .map(|coord| Value::Number(record.get(&coord.join_key()).copied().unwrap_or(0.0)))
            .collect(),
        FeatureData::Rows(rows) => {
            warn_on_mismatch(fg, rows.len(), loaded);
            let mut cells = Vec::with_capacity(shown.len());
            for coord in shown.iter() {
                let cell = match rows.get(coord.idx) {
                    Some(row) => row_value(row).cloned().ok_or_else(|| {
                        Error::malformed(
                            &fg.feature,
                            format!("row {} has no single value field", coord.idx),
                        )
                    })?,
                    None => Value::Number(0.0),
                };
                cells.push(cell);
            }
            cells
        }
    };

    Ok(match retrieved.data_type {
        DataType::Categorical => {
            FeatureValues::Categorical(cells.iter().map(Value::to_string).collect())
        }
        _ => FeatureValues::Quantitative(
            cells
                .iter()
                .map(|cell| {
                    cell.as_f64().ok_or_else(|| {
                        Error::malformed(&fg.feature, format!("`{cell}` is not a number"))
                    })
                })
                .collect::<Result<_>>()?,
        ),
    })
}

fn by_idx(shown: &[Coord], value_at: impl Fn(usize) -> Option<Value>) -> Vec<Value> {
    shown
        .iter()
        .map(|coord| value_at(coord.idx).unwrap_or(Value::Number(0.0)))
        .collect()
}

fn warn_on_mismatch(fg: &FeatureAndGroup, data: usize, positions: usize) {
    if data != positions {
        log::warn!("{fg} has {data} values for {positions} positions");
    }
}

/// Range of the finite values, placeholder for labels and empty data
fn value_range(values: &FeatureValues) -> (f64, f64) {
    let FeatureValues::Quantitative(values) = values else {
        return PLACEHOLDER_DOMAIN;
    };

    let fold = |(lo, hi): (f64, f64), &value: &f64| {
        if value.is_finite() {
            (lo.min(value), hi.max(value))
        } else {
            (lo, hi)
        }
    };
    let empty = (f64::INFINITY, f64::NEG_INFINITY);
    let (lo, hi) = if values.len() >= PARALLEL_MINMAX_LEN {
        values
            .par_iter()
            .fold(|| empty, fold)
            .reduce(|| empty, |a, b| (a.0.min(b.0), a.1.max(b.1)))
    } else {
        values.iter().fold(empty, fold)
    };

    if lo > hi {
        PLACEHOLDER_DOMAIN
    } else {
        (lo, hi)
    }
}

/// Samples loaded in a session, by name
#[derive(Debug, Default)]
pub struct SampleRegistry {
    samples: BTreeMap<String, Arc<Sample>>,
}

impl SampleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `sample`; a name already in use is rejected
    pub fn insert(&mut self, sample: Sample) -> Result<Arc<Sample>> {
        if self.samples.contains_key(sample.name()) {
            return Err(Error::SampleExists(sample.name().to_string()));
        }
        let sample = Arc::new(sample);
        self.samples
            .insert(sample.name().to_string(), Arc::clone(&sample));
        Ok(sample)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Sample>> {
        self.samples.get(name).cloned()
    }

    /// Drop a sample together with its caches
    pub fn remove(&mut self, name: &str) -> Option<Arc<Sample>> {
        self.samples.remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.samples.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
