//! The layer adapter capability and its shared plumbing.

use std::time::Duration;

use async_trait::async_trait;
use image::RgbaImage;
use parcel_common::{CrsCode, FeatureCollection, ParcelVizError, ParcelVizResult};
use projection::Extent;
use reqwest::Client;

/// Per-call network timeout for layer fetches. Calls are not retried.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Data returned by a layer fetch.
#[derive(Debug, Clone)]
pub enum LayerData {
    /// Features tagged with the CRS their coordinates are in
    Vector {
        features: FeatureCollection,
        crs: CrsCode,
    },
    /// Decoded RGBA8 imagery covering the requested extent
    Raster(RgbaImage),
}

impl LayerData {
    /// Feature count for vector data, `None` for rasters.
    pub fn feature_count(&self) -> Option<usize> {
        match self {
            LayerData::Vector { features, .. } => Some(features.len()),
            LayerData::Raster(_) => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            LayerData::Vector { .. } => "vector",
            LayerData::Raster(_) => "raster",
        }
    }
}

/// A source of map data for one configured layer.
#[async_trait]
pub trait LayerAdapter: Send + Sync {
    /// Configured layer name.
    fn name(&self) -> &str;

    /// Fetch data covering `extent`. Raster sources render at `image_size`
    /// (width, height) when given.
    async fn fetch(
        &self,
        extent: &Extent,
        image_size: Option<(u32, u32)>,
    ) -> ParcelVizResult<LayerData>;
}

/// Shared resources handed to every adapter constructor.
#[derive(Debug, Clone)]
pub struct AdapterContext {
    pub client: Client,
    /// Process-wide ArcGIS token used when a layer has none of its own
    pub arcgis_token: Option<String>,
}

impl AdapterContext {
    pub fn new(arcgis_token: Option<String>) -> ParcelVizResult<Self> {
        Ok(Self::with_client(build_client(FETCH_TIMEOUT)?, arcgis_token))
    }

    pub fn with_client(client: Client, arcgis_token: Option<String>) -> Self {
        Self {
            client,
            arcgis_token: arcgis_token.filter(|t| !t.trim().is_empty()),
        }
    }
}

/// HTTP client with a fixed overall request timeout.
pub fn build_client(timeout: Duration) -> ParcelVizResult<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("parcelviz/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ParcelVizError::Internal(format!("failed to build HTTP client: {}", e)))
}

/// Classify a transport failure.
pub fn fetch_error(url: &str, err: reqwest::Error) -> ParcelVizError {
    if err.is_timeout() {
        ParcelVizError::Timeout(url.to_string())
    } else {
        ParcelVizError::AdapterFetch {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}
