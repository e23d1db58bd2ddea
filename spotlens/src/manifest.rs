//! Sample manifest (`sample.json`)

use serde::{Deserialize, Serialize};

use crate::chunked::ChunkedParams;
use crate::coords::CoordParams;
use crate::image::ImageParams;
use crate::plain::PlainParams;
use crate::{Error, Result};

/// Everything needed to construct a sample
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleManifest {
    pub name: String,
    #[serde(default)]
    pub img_params: Option<ImageParams>,
    #[serde(default)]
    pub coord_params: Vec<CoordParams>,
    #[serde(default)]
    pub feat_params: Vec<FeatureParams>,
}

/// A feature source entry, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FeatureParams {
    #[serde(rename = "chunkedCSV")]
    Chunked(ChunkedParams),
    #[serde(rename = "plainCSV")]
    Plain(PlainParams),
}

impl FeatureParams {
    pub fn name(&self) -> &str {
        match self {
            FeatureParams::Chunked(params) => &params.name,
            FeatureParams::Plain(params) => &params.name,
        }
    }
}

impl SampleManifest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Parse `sample.json` fetched from `url`
    pub fn from_json(bytes: &[u8], url: &str) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::parse(url, e))
    }

    pub fn with_image(mut self, params: ImageParams) -> Self {
        self.img_params = Some(params);
        self
    }

    pub fn with_coords(mut self, params: CoordParams) -> Self {
        self.coord_params.push(params);
        self
    }

    pub fn with_feature(mut self, params: FeatureParams) -> Self {
        self.feat_params.push(params);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_manifest() {
        let json = r#"{
            "name": "V1_Mouse_Brain",
            "imgParams": {"urls": ["image.tif"], "mPerPx": 0.5e-6},
            "coordParams": [{"name": "spots", "url": "spots.csv", "size": 55e-6}],
            "featParams": [
                {"type": "chunkedCSV", "name": "genes", "url": "genes.bin", "headerUrl": "genes.json"},
                {"type": "plainCSV", "name": "clusters", "url": "clusters.csv", "dataType": "categorical"}
            ]
        }"#;
        let manifest = SampleManifest::from_json(json.as_bytes(), "sample.json").unwrap();
        assert_eq!(manifest.name, "V1_Mouse_Brain");
        assert_eq!(manifest.coord_params[0].size, Some(55e-6));
        assert_eq!(manifest.feat_params.len(), 2);
        assert_eq!(manifest.feat_params[0].name(), "genes");
        assert!(matches!(
            &manifest.feat_params[1],
            FeatureParams::Plain(params) if params.data_type == spotlens_core::DataType::Categorical
        ));

        let err = SampleManifest::from_json(br#"{"name": "x", "featParams": [{"type": "zarr"}]}"#, "s.json")
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Absent);
    }
}
