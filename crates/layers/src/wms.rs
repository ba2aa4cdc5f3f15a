//! Web Map Service layer adapter.

use async_trait::async_trait;
use parcel_common::{CrsCode, LayerConfig, ParcelVizError, ParcelVizResult};
use projection::Extent;
use reqwest::Client;
use tracing::{debug, info, instrument};

use crate::adapter::{fetch_error, AdapterContext, LayerAdapter, LayerData};

/// Image size requested when the caller gives none.
pub const DEFAULT_IMAGE_SIZE: u32 = 1024;

/// Fetches transparent PNG imagery with a GetMap request.
pub struct WmsAdapter {
    client: Client,
    name: String,
    url: String,
    crs: CrsCode,
    layers: String,
    styles: String,
    version: String,
}

impl WmsAdapter {
    pub const TYPE: &'static str = "wms";

    pub fn new(config: &LayerConfig, context: &AdapterContext) -> ParcelVizResult<Self> {
        let required = |key: &str| {
            config
                .param_str(key)
                .ok_or_else(|| ParcelVizError::AdapterConfig {
                    layer: config.name.clone(),
                    message: format!("missing '{}' parameter.", key),
                })
        };

        Ok(Self {
            client: context.client.clone(),
            name: config.name.clone(),
            url: required("url")?,
            crs: config.target_crs,
            layers: required("layers")?,
            styles: config.param_str("styles").unwrap_or_default(),
            version: config
                .param_str("version")
                .unwrap_or_else(|| "1.3.0".to_string()),
        })
    }

    /// GetMap query parameters for `extent` at `width` x `height` pixels.
    pub fn get_map_params(&self, extent: &Extent, width: u32, height: u32) -> Vec<(&'static str, String)> {
        vec![
            ("service", "WMS".to_string()),
            ("request", "GetMap".to_string()),
            ("format", "image/png".to_string()),
            ("transparent", "true".to_string()),
            ("version", self.version.clone()),
            ("layers", self.layers.clone()),
            ("styles", self.styles.clone()),
            ("crs", self.crs.to_string()),
            ("bbox", extent.bbox().to_wms_string()),
            ("width", width.to_string()),
            ("height", height.to_string()),
        ]
    }
}

#[async_trait]
impl LayerAdapter for WmsAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, extent), fields(layer = %self.name, crs = %self.crs))]
    async fn fetch(
        &self,
        extent: &Extent,
        image_size: Option<(u32, u32)>,
    ) -> ParcelVizResult<LayerData> {
        let (width, height) = image_size.unwrap_or((DEFAULT_IMAGE_SIZE, DEFAULT_IMAGE_SIZE));
        debug!(url = %self.url, width, height, "Requesting GetMap");

        let response = self
            .client
            .get(&self.url)
            .query(&self.get_map_params(extent, width, height))
            .send()
            .await
            .map_err(|e| fetch_error(&self.url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ParcelVizError::AdapterResponse(format!(
                "WMS {} returned HTTP {}",
                self.url, status
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(|e| fetch_error(&self.url, e))?;
        if let Some(message) = service_exception(content_type.as_deref(), &body) {
            return Err(ParcelVizError::AdapterResponse(format!(
                "WMS {} raised a service exception: {}",
                self.url, message
            )));
        }
        let image = image::load_from_memory(&body)
            .map_err(|e| {
                ParcelVizError::AdapterResponse(format!(
                    "WMS {} returned an undecodable image: {}",
                    self.url, e
                ))
            })?
            .to_rgba8();

        info!(
            width = image.width(),
            height = image.height(),
            bytes = body.len(),
            "Fetched WMS image"
        );
        Ok(LayerData::Raster(image))
    }
}

/// Message of a `ServiceExceptionReport` returned in place of an image.
///
/// Servers report errors with HTTP 200 and an XML body. Any XML body counts,
/// with the first `ServiceException` text as the message when present.
fn service_exception(content_type: Option<&str>, body: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(body);
    let is_xml = content_type.is_some_and(|ct| ct.contains("xml"))
        || text.trim_start().starts_with('<');
    if !is_xml {
        return None;
    }

    let message = text
        .find("<ServiceException")
        .and_then(|start| {
            let rest = &text[start..];
            let open_end = rest.find('>')? + 1;
            let close = rest.find("</ServiceException>")?;
            (close >= open_end).then(|| rest[open_end..close].trim().to_string())
        })
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| "unrecognized XML response".to_string());
    Some(message)
}
