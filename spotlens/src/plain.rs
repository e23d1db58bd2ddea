//! Plain feature sources
//!
//! A plain source is a whole table fetched once. Features are its columns,
//! projected synchronously from the resident rows.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use spotlens_core::constants::{is_coordinate_column, VALUE_COLUMN};
use spotlens_core::DataType;

use crate::cache::OneSlot;
use crate::codec::{parse_json_rows, parse_rows};
use crate::data::{FeatureData, RetrievedData, Row};
use crate::fetch::ByteRangeFetcher;
use crate::hydration::{Hydrate, Hydration};
use crate::local::{resolve_url, LocalDirectory};
use crate::{Error, Result};

/// Manifest entry for a plain source
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlainParams {
    pub name: String,
    /// CSV table, or a JSON array of objects when the URL ends in `.json`
    #[serde(default)]
    pub url: Option<String>,
    /// Inline rows
    #[serde(default, alias = "dataSource")]
    pub rows: Option<Vec<Row>>,
    #[serde(default)]
    pub data_type: DataType,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub coord_name: Option<String>,
    #[serde(default)]
    pub m_per_px: Option<f64>,
    #[serde(default)]
    pub size: Option<f64>,
}

impl PlainParams {
    pub fn from_url(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn from_rows(name: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            name: name.into(),
            rows: Some(rows),
            ..Self::default()
        }
    }

    pub fn with_data_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }

    pub fn with_coord_name(mut self, coord_name: impl Into<String>) -> Self {
        self.coord_name = Some(coord_name.into());
        self
    }

    pub fn with_scale(mut self, m_per_px: f64, size: Option<f64>) -> Self {
        self.m_per_px = Some(m_per_px);
        self.size = size;
        self
    }
}

struct Inner {
    name: String,
    url: Option<String>,
    data_type: DataType,
    unit: Option<String>,
    coord_name: Option<String>,
    m_per_px: Option<f64>,
    size: Option<f64>,
    fetcher: Arc<dyn ByteRangeFetcher>,
    rows: Hydration<Arc<Vec<Row>>>,
    last: OneSlot<Option<String>, Option<Arc<RetrievedData>>>,
}

/// Feature source over a resident table
#[derive(Clone)]
pub struct PlainFeatureSource {
    inner: Arc<Inner>,
}

impl fmt::Debug for PlainFeatureSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlainFeatureSource")
            .field("name", &self.inner.name)
            .field("url", &self.inner.url)
            .field("hydrated", &self.inner.rows.is_hydrated())
            .finish()
    }
}

impl PlainFeatureSource {
    pub fn new(
        params: PlainParams,
        fetcher: Arc<dyn ByteRangeFetcher>,
        local: Option<&LocalDirectory>,
    ) -> Result<Self> {
        let url = params
            .url
            .as_deref()
            .map(|url| resolve_url(local, url))
            .transpose()?;

        let rows = match params.rows {
            Some(rows) => Hydration::ready(&params.name, Arc::new(rows)),
            None if url.is_some() => Hydration::new(&params.name),
            None => {
                return Err(Error::missing(&params.name, "neither `url` nor inline rows given"))
            }
        };

        Ok(Self {
            inner: Arc::new(Inner {
                name: params.name,
                url,
                data_type: params.data_type,
                unit: params.unit,
                coord_name: params.coord_name,
                m_per_px: params.m_per_px,
                size: params.size,
                fetcher,
                rows,
                last: OneSlot::new(),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn data_type(&self) -> DataType {
        self.inner.data_type
    }

    /// Resident rows, once hydrated
    pub fn rows(&self) -> Option<&Arc<Vec<Row>>> {
        self.inner.rows.get()
    }

    /// Feature columns: every column of the first row except coordinates
    pub fn columns(&self) -> Option<Vec<String>> {
        let rows = self.inner.rows.get()?;
        Some(
            rows.first()
                .map(|row| {
                    row.keys()
                        .filter(|name| !is_coordinate_column(name))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default(),
        )
    }

    /// Project `column` out of the resident rows
    ///
    /// `Some(column)` keeps `x`, `y` and `id` and renames the column to
    /// `value`; `None` returns the rows unchanged. A column no row carries is
    /// `Ok(None)`.
    pub fn retrieve(&self, column: Option<&str>) -> Result<Option<Arc<RetrievedData>>> {
        let rows = self.inner.rows.require()?;
        let key = column.map(str::to_string);
        Ok(self
            .inner
            .last
            .get_or_compute(key, |column| self.inner.project(rows, column.as_deref())))
    }
}

impl Inner {
    fn project(&self, rows: &[Row], column: Option<&str>) -> Option<Arc<RetrievedData>> {
        let rows = match column {
            None => rows.to_vec(),
            Some(column) => {
                if !rows.iter().any(|row| row.contains_key(column)) {
                    log::warn!("column `{column}` not found in `{}`", self.name);
                    return None;
                }
                rows.iter()
                    .map(|row| {
                        let mut projected: Row = row
                            .iter()
                            .filter(|(name, _)| is_coordinate_column(name))
                            .map(|(name, value)| (name.clone(), value.clone()))
                            .collect();
                        if let Some(value) = row.get(column) {
                            projected.insert(VALUE_COLUMN.to_string(), value.clone());
                        }
                        projected
                    })
                    .collect()
            }
        };

        Some(Arc::new(
            RetrievedData::new(self.data_type, FeatureData::Rows(rows))
                .with_coord_name(self.coord_name.clone())
                .with_scale(self.m_per_px, self.size)
                .with_unit(self.unit.clone()),
        ))
    }

    async fn load_rows(&self) -> Result<Arc<Vec<Row>>> {
        let url = self
            .url
            .as_deref()
            .ok_or_else(|| Error::NotHydrated(self.name.clone()))?;
        let bytes = self.fetcher.fetch(url).await?;
        let text = std::str::from_utf8(&bytes).map_err(|e| Error::parse(url, e))?;
        let rows = if url.ends_with(".json") {
            parse_json_rows(text, url)?
        } else {
            parse_rows(text, url)?
        };
        log::debug!("`{}`: {} rows from {url}", self.name, rows.len());
        Ok(Arc::new(rows))
    }
}

#[async_trait]
impl Hydrate for PlainFeatureSource {
    async fn hydrate(&self) -> Result<()> {
        self.inner
            .rows
            .get_or_try_init(|| self.inner.load_rows())
            .await
            .map(|_| ())
    }

    fn is_hydrated(&self) -> bool {
        self.inner.rows.is_hydrated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Value;
    use crate::fetch::MemoryFetcher;

    fn table() -> (Arc<MemoryFetcher>, PlainFeatureSource) {
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.insert(
            "mem://cells.csv",
            "x,y,id,cluster,area\n1,2,a,tumor,10\n3,4,b,stroma,12\n",
        );
        let source = PlainFeatureSource::new(
            PlainParams::from_url("cells", "mem://cells.csv").with_data_type(DataType::Categorical),
            fetcher.clone(),
            None,
        )
        .unwrap();
        (fetcher, source)
    }

    #[tokio::test]
    async fn test_projection() {
        let (fetcher, source) = table();
        assert_eq!(source.retrieve(Some("cluster")), Err(Error::NotHydrated("cells".into())));

        source.hydrate().await.unwrap();
        source.hydrate().await.unwrap();
        assert_eq!(fetcher.request_count("mem://cells.csv"), 1);
        assert_eq!(source.columns(), Some(vec!["area".to_string(), "cluster".to_string()]));

        let data = source.retrieve(Some("cluster")).unwrap().unwrap();
        let FeatureData::Rows(rows) = &data.data else {
            panic!("expected rows");
        };
        assert_eq!(rows[0]["value"], Value::Text("tumor".into()));
        assert_eq!(rows[1]["x"], Value::Number(3.0));
        assert!(!rows[0].contains_key("area"));

        // Repeated identical request reuses the projection
        let again = source.retrieve(Some("cluster")).unwrap().unwrap();
        assert!(Arc::ptr_eq(&data, &again));

        let full = source.retrieve(None).unwrap().unwrap();
        assert_eq!(full.data.len(), 2);
        assert_eq!(source.retrieve(Some("missing")).unwrap(), None);
    }

    #[tokio::test]
    async fn test_inline_and_json_rows() {
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.insert("mem://rois.json", r#"[{"x": 1, "y": 1, "label": "a"}]"#);
        let source =
            PlainFeatureSource::new(PlainParams::from_url("rois", "mem://rois.json"), fetcher.clone(), None)
                .unwrap();
        source.hydrate().await.unwrap();
        assert_eq!(source.rows().map(|rows| rows.len()), Some(1));

        let row: Row = [("x".to_string(), Value::Number(0.0))].into_iter().collect();
        let inline =
            PlainFeatureSource::new(PlainParams::from_rows("inline", vec![row]), fetcher, None).unwrap();
        assert!(inline.is_hydrated());
        assert!(inline.retrieve(None).unwrap().is_some());
    }
}
