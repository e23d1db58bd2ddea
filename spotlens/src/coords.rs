//! Coordinate sets
//!
//! Positions are numbered by row order when loaded. That `idx` never changes,
//! so data aligned with the full set can still be joined after subsampling.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::codec::parse_rows;
use crate::data::{Row, Value};
use crate::fetch::ByteRangeFetcher;
use crate::hydration::{Hydrate, Hydration};
use crate::local::{resolve_url, LocalDirectory};
use crate::{Error, Result};

/// Caller-supplied stable key of a position
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CoordId {
    Int(i64),
    Text(String),
}

impl CoordId {
    /// Only typed numbers become `Int`; text ids are kept verbatim
    fn from_value(value: &Value) -> Self {
        match value {
            Value::Number(number) if number.fract() == 0.0 => CoordId::Int(*number as i64),
            other => CoordId::Text(other.to_string()),
        }
    }
}

impl fmt::Display for CoordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordId::Int(id) => write!(f, "{id}"),
            CoordId::Text(id) => f.write_str(id),
        }
    }
}

/// One position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<CoordId>,
    /// Row position at load time
    pub idx: usize,
}

impl Coord {
    /// Key records are joined on: `id` when present, else `idx`
    pub fn join_key(&self) -> String {
        match &self.id {
            Some(id) => id.to_string(),
            None => self.idx.to_string(),
        }
    }
}

/// Inline position in a manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub id: Option<CoordId>,
}

/// Manifest entry for a coordinate set
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordParams {
    pub name: String,
    /// CSV with `x`, `y` and optionally `id`
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, alias = "pos")]
    pub positions: Option<Vec<Position>>,
    #[serde(default)]
    pub m_per_px: Option<f64>,
    #[serde(default)]
    pub size: Option<f64>,
}

impl CoordParams {
    pub fn from_url(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn from_positions(name: impl Into<String>, positions: Vec<Position>) -> Self {
        Self {
            name: name.into(),
            positions: Some(positions),
            ..Self::default()
        }
    }

    pub fn with_scale(mut self, m_per_px: f64, size: Option<f64>) -> Self {
        self.m_per_px = Some(m_per_px);
        self.size = size;
        self
    }
}

#[derive(Debug)]
struct Positions {
    all: Arc<Vec<Coord>>,
    shown: Arc<Vec<Coord>>,
}

impl Positions {
    fn new(all: Vec<Coord>, target: Option<usize>) -> Self {
        let all = Arc::new(all);
        let shown = match target {
            Some(target) => subsample(&all, target),
            None => Arc::clone(&all),
        };
        Self { all, shown }
    }
}

struct Inner {
    name: String,
    url: Option<String>,
    m_per_px: Option<f64>,
    size: Option<f64>,
    subsample_target: Option<usize>,
    fetcher: Option<Arc<dyn ByteRangeFetcher>>,
    positions: Hydration<Positions>,
}

/// Named set of positions
#[derive(Clone)]
pub struct CoordinateSet {
    inner: Arc<Inner>,
}

impl fmt::Debug for CoordinateSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoordinateSet")
            .field("name", &self.inner.name)
            .field("len", &self.len())
            .field("m_per_px", &self.inner.m_per_px)
            .finish()
    }
}

impl CoordinateSet {
    pub fn new(
        params: CoordParams,
        fetcher: Arc<dyn ByteRangeFetcher>,
        subsample_target: Option<usize>,
        local: Option<&LocalDirectory>,
    ) -> Result<Self> {
        let url = params
            .url
            .as_deref()
            .map(|url| resolve_url(local, url))
            .transpose()?;

        let positions = match params.positions {
            Some(positions) => {
                let coords = positions
                    .into_iter()
                    .enumerate()
                    .map(|(idx, position)| Coord {
                        x: position.x,
                        y: position.y,
                        id: position.id,
                        idx,
                    })
                    .collect();
                Hydration::ready(&params.name, Positions::new(coords, subsample_target))
            }
            None if url.is_some() => Hydration::new(&params.name),
            None => {
                return Err(Error::missing(&params.name, "neither `url` nor inline positions given"))
            }
        };

        Ok(Self {
            inner: Arc::new(Inner {
                name: params.name,
                url,
                m_per_px: params.m_per_px,
                size: params.size,
                subsample_target,
                fetcher: Some(fetcher),
                positions,
            }),
        })
    }

    /// Hydrated set built from rows carrying `x`, `y` and optionally `id`
    pub fn from_rows(
        name: impl Into<String>,
        rows: &[Row],
        m_per_px: Option<f64>,
        size: Option<f64>,
        subsample_target: Option<usize>,
    ) -> Result<Self> {
        let name = name.into();
        let coords = coords_from_rows(&name, rows)?;
        Ok(Self {
            inner: Arc::new(Inner {
                positions: Hydration::ready(&name, Positions::new(coords, subsample_target)),
                name,
                url: None,
                m_per_px,
                size,
                subsample_target,
                fetcher: None,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn m_per_px(&self) -> Option<f64> {
        self.inner.m_per_px
    }

    pub fn size(&self) -> Option<f64> {
        self.inner.size
    }

    /// Displayed positions, subsampled when a target is configured
    pub fn positions(&self) -> Result<Arc<Vec<Coord>>> {
        Ok(Arc::clone(&self.inner.positions.require()?.shown))
    }

    /// Every loaded position
    pub fn all_positions(&self) -> Result<Arc<Vec<Coord>>> {
        Ok(Arc::clone(&self.inner.positions.require()?.all))
    }

    /// Number of displayed positions, `None` before hydration
    pub fn len(&self) -> Option<usize> {
        self.inner.positions.get().map(|positions| positions.shown.len())
    }

    pub fn is_empty(&self) -> Option<bool> {
        self.len().map(|len| len == 0)
    }

    pub fn is_subsampled(&self) -> bool {
        self.inner
            .positions
            .get()
            .is_some_and(|positions| !Arc::ptr_eq(&positions.all, &positions.shown))
    }
}

impl Inner {
    async fn load(&self) -> Result<Positions> {
        let (Some(url), Some(fetcher)) = (self.url.as_deref(), self.fetcher.as_ref()) else {
            return Err(Error::NotHydrated(self.name.clone()));
        };
        let bytes = fetcher.fetch(url).await?;
        let text = std::str::from_utf8(&bytes).map_err(|e| Error::parse(url, e))?;
        let rows = parse_rows(text, url)?;
        let coords = coords_from_rows(&self.name, &rows)?;
        log::debug!("`{}`: {} positions", self.name, coords.len());
        Ok(Positions::new(coords, self.subsample_target))
    }
}

fn coords_from_rows(name: &str, rows: &[Row]) -> Result<Vec<Coord>> {
    rows.iter()
        .enumerate()
        .map(|(idx, row)| {
            let axis = |column: &str| {
                row.get(column)
                    .and_then(Value::as_f64)
                    .ok_or_else(|| Error::malformed(name, format!("row {idx} has no numeric `{column}`")))
            };
            Ok(Coord {
                x: axis("x")?,
                y: axis("y")?,
                id: row.get("id").map(CoordId::from_value),
                idx,
            })
        })
        .collect()
}

/// Keep every `ceil(len / target)`-th position, preserving `idx`
///
/// Returns the same `Arc` when nothing needs to be dropped.
pub fn subsample(positions: &Arc<Vec<Coord>>, target: usize) -> Arc<Vec<Coord>> {
    let target = target.max(1);
    if positions.len() <= target {
        return Arc::clone(positions);
    }
    let stride = positions.len().div_ceil(target);
    Arc::new(positions.iter().step_by(stride).cloned().collect())
}

#[async_trait]
impl Hydrate for CoordinateSet {
    async fn hydrate(&self) -> Result<()> {
        self.inner
            .positions
            .get_or_try_init(|| self.inner.load())
            .await
            .map(|_| ())
    }

    fn is_hydrated(&self) -> bool {
        self.inner.positions.is_hydrated()
    }
}
