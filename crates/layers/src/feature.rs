//! ArcGIS FeatureServer layer adapter.

use async_trait::async_trait;
use parcel_common::{
    CrsCode, Feature, FeatureCollection, LayerConfig, ParcelVizError, ParcelVizResult,
};
use projection::Extent;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use crate::adapter::{fetch_error, AdapterContext, LayerAdapter, LayerData};

/// Queries features intersecting the extent envelope as GeoJSON.
pub struct ArcGisFeatureAdapter {
    client: Client,
    name: String,
    url: String,
    crs: CrsCode,
    out_fields: String,
    token: Option<String>,
}

impl ArcGisFeatureAdapter {
    pub const TYPE: &'static str = "arcgis_feature";

    pub fn new(config: &LayerConfig, context: &AdapterContext) -> ParcelVizResult<Self> {
        let url = config
            .param_str("url")
            .ok_or_else(|| ParcelVizError::AdapterConfig {
                layer: config.name.clone(),
                message: "missing 'url' parameter.".to_string(),
            })?;

        Ok(Self {
            client: context.client.clone(),
            name: config.name.clone(),
            url: url.trim_end_matches('/').to_string(),
            crs: config.target_crs,
            out_fields: config.param_str("out_fields").unwrap_or_else(|| "*".to_string()),
            token: config.param_str("token").or_else(|| context.arcgis_token.clone()),
        })
    }

    pub fn query_url(&self) -> String {
        format!("{}/query", self.url)
    }

    /// Query parameters for an envelope search over `extent`.
    pub fn query_params(&self, extent: &Extent) -> Vec<(&'static str, String)> {
        let envelope = json!({
            "xmin": extent.min_x(),
            "ymin": extent.min_y(),
            "xmax": extent.max_x(),
            "ymax": extent.max_y(),
            "spatialReference": {"wkid": self.crs.code()},
        });

        let mut params = vec![
            ("f", "geojson".to_string()),
            ("geometry", envelope.to_string()),
            ("geometryType", "esriGeometryEnvelope".to_string()),
            ("inSR", self.crs.code().to_string()),
            ("outSR", self.crs.code().to_string()),
            ("spatialRel", "esriSpatialRelIntersects".to_string()),
            ("maxRecordCountFactor", "4".to_string()),
            ("outFields", self.out_fields.clone()),
            ("returnGeometry", "true".to_string()),
        ];
        if let Some(token) = &self.token {
            params.push(("token", token.clone()));
        }
        params
    }
}

#[async_trait]
impl LayerAdapter for ArcGisFeatureAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, extent), fields(layer = %self.name, crs = %self.crs))]
    async fn fetch(
        &self,
        extent: &Extent,
        _image_size: Option<(u32, u32)>,
    ) -> ParcelVizResult<LayerData> {
        let url = self.query_url();
        debug!(url = %url, extent = %extent.cache_key(), "Querying feature service");

        let response = self
            .client
            .get(&url)
            .query(&self.query_params(extent))
            .send()
            .await
            .map_err(|e| fetch_error(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ParcelVizError::AdapterResponse(format!(
                "Feature service {} returned HTTP {}",
                url, status
            )));
        }

        let body = response.bytes().await.map_err(|e| fetch_error(&url, e))?;
        let payload: Value = serde_json::from_slice(&body).map_err(|e| {
            ParcelVizError::AdapterResponse(format!(
                "Feature service {} returned invalid JSON: {}",
                url, e
            ))
        })?;

        let features = parse_features(&payload)?;
        info!(count = features.len(), "Fetched features");

        Ok(LayerData::Vector {
            features,
            crs: self.crs,
        })
    }
}

/// Pull the feature list out of a GeoJSON query response.
///
/// Features that do not parse as simple GeoJSON are dropped with a warning.
pub fn parse_features(payload: &Value) -> ParcelVizResult<FeatureCollection> {
    let Some(raw) = payload.get("features").and_then(Value::as_array) else {
        let detail = payload
            .pointer("/error/message")
            .and_then(Value::as_str)
            .map(|m| format!(" (service error: {})", m))
            .unwrap_or_default();
        return Err(ParcelVizError::AdapterResponse(format!(
            "FeatureServer response missing 'features'.{}",
            detail
        )));
    };

    let mut features = Vec::with_capacity(raw.len());
    let mut skipped = 0usize;
    for value in raw {
        match serde_json::from_value::<Feature>(value.clone()) {
            Ok(feature) => features.push(feature),
            Err(e) => {
                skipped += 1;
                debug!(error = %e, "Unparseable feature");
            }
        }
    }
    if skipped > 0 {
        warn!(skipped, "Dropped features with unsupported geometry");
    }

    Ok(FeatureCollection::new(features))
}
