//! Sample image metadata
//!
//! Only the scale matters here: pixel data is left to the renderer. The scale
//! comes from the manifest or from a metadata JSON next to the image.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::fetch::ByteRangeFetcher;
use crate::hydration::{Hydrate, Hydration};
use crate::local::{resolve_url, LocalDirectory};
use crate::{Error, Result};

/// Manifest entry for the sample image
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageParams {
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub m_per_px: Option<f64>,
    #[serde(default)]
    pub size: Option<f64>,
    /// JSON carrying `mPerPx` and channel names
    #[serde(default)]
    pub metadata_url: Option<String>,
}

/// Scale and channels of an image
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetadata {
    #[serde(default)]
    pub m_per_px: Option<f64>,
    #[serde(default)]
    pub size: Option<f64>,
    #[serde(default)]
    pub channels: Vec<String>,
}

struct Inner {
    urls: Vec<String>,
    metadata_url: Option<String>,
    fallback: ImageMetadata,
    fetcher: Arc<dyn ByteRangeFetcher>,
    metadata: Hydration<ImageMetadata>,
}

/// Image of a sample
#[derive(Clone)]
pub struct Image {
    inner: Arc<Inner>,
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("urls", &self.inner.urls)
            .field("metadata", &self.inner.metadata.get())
            .finish()
    }
}

impl Image {
    pub fn new(
        params: ImageParams,
        fetcher: Arc<dyn ByteRangeFetcher>,
        local: Option<&LocalDirectory>,
    ) -> Result<Self> {
        let urls = params
            .urls
            .iter()
            .map(|url| resolve_url(local, url))
            .collect::<Result<Vec<_>>>()?;
        let metadata_url = params
            .metadata_url
            .as_deref()
            .map(|url| resolve_url(local, url))
            .transpose()?;

        let fallback = ImageMetadata {
            m_per_px: params.m_per_px,
            size: params.size,
            channels: Vec::new(),
        };
        let metadata = match metadata_url {
            Some(_) => Hydration::new("image"),
            None => Hydration::ready("image", fallback.clone()),
        };

        Ok(Self {
            inner: Arc::new(Inner {
                urls,
                metadata_url,
                fallback,
                fetcher,
                metadata,
            }),
        })
    }

    pub fn urls(&self) -> &[String] {
        &self.inner.urls
    }

    /// Meters per pixel, from metadata once hydrated, else from the manifest
    pub fn m_per_px(&self) -> Option<f64> {
        self.inner
            .metadata
            .get()
            .and_then(|metadata| metadata.m_per_px)
            .or(self.inner.fallback.m_per_px)
    }

    pub fn size(&self) -> Option<f64> {
        self.inner
            .metadata
            .get()
            .and_then(|metadata| metadata.size)
            .or(self.inner.fallback.size)
    }

    pub fn channels(&self) -> &[String] {
        self.inner
            .metadata
            .get()
            .map(|metadata| metadata.channels.as_slice())
            .unwrap_or_default()
    }
}

impl Inner {
    async fn load(&self) -> Result<ImageMetadata> {
        let url = self
            .metadata_url
            .as_deref()
            .ok_or_else(|| Error::NotHydrated("image".into()))?;
        let bytes = self.fetcher.fetch(url).await?;
        serde_json::from_slice(&bytes).map_err(|e| Error::parse(url, e))
    }
}

#[async_trait]
impl Hydrate for Image {
    async fn hydrate(&self) -> Result<()> {
        self.inner
            .metadata
            .get_or_try_init(|| self.inner.load())
            .await
            .map(|_| ())
    }

    fn is_hydrated(&self) -> bool {
        self.inner.metadata.is_hydrated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::MemoryFetcher;

    #[tokio::test]
    async fn test_scale_from_metadata() {
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.insert(
            "mem://image.json",
            r#"{"mPerPx": 0.497e-6, "channels": ["DAPI", "GFAP"]}"#,
        );
        let image = Image::new(
            ImageParams {
                urls: vec!["mem://image.tif".into()],
                m_per_px: Some(1e-6),
                metadata_url: Some("mem://image.json".into()),
                ..ImageParams::default()
            },
            fetcher,
            None,
        )
        .unwrap();

        assert_eq!(image.m_per_px(), Some(1e-6));
        image.hydrate().await.unwrap();
        assert_eq!(image.m_per_px(), Some(0.497e-6));
        assert_eq!(image.channels(), ["DAPI", "GFAP"]);
    }

    #[test]
    fn test_manifest_scale() {
        let image = Image::new(
            ImageParams {
                m_per_px: Some(2.0),
                ..ImageParams::default()
            },
            Arc::new(MemoryFetcher::new()),
            None,
        )
        .unwrap();
        assert!(image.is_hydrated());
        assert_eq!(image.m_per_px(), Some(2.0));
        assert!(image.channels().is_empty());
    }
}
