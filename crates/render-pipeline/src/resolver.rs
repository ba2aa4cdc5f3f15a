//! Parcel resolution: address or APN to a parcel record.
//!
//! Two backends are available:
//! - LightBox geocoding for street addresses
//! - An ArcGIS parcel FeatureServer for APN lookups
//!
//! [`GeocodeService`] composes them behind the [`ParcelResolver`] trait.

use std::time::Duration;

use async_trait::async_trait;
use layers::build_client;
use parcel_common::{CrsCode, Geometry, ParcelRecord, ParcelVizError, ParcelVizResult};
use reqwest::{Client, Response};
use serde_json::{json, Value};
use tracing::{debug, info, instrument};

use crate::config::ParcelSourceConfig;
use crate::settings::AppSettings;

/// Timeout for each LightBox call.
pub const LIGHTBOX_TIMEOUT: Duration = Duration::from_secs(20);

/// Timeout for parcel FeatureServer queries.
pub const PARCEL_SERVICE_TIMEOUT: Duration = Duration::from_secs(30);

/// Maps an address or identifier to exactly one parcel.
#[async_trait]
pub trait ParcelResolver: Send + Sync {
    /// Resolve a parcel. The identifier wins when both are given.
    async fn resolve(
        &self,
        address: Option<&str>,
        apn: Option<&str>,
    ) -> ParcelVizResult<ParcelRecord>;
}

// ============================================================================
// LightBox
// ============================================================================

/// Thin client for the LightBox geocode and parcel endpoints.
#[derive(Debug, Clone)]
pub struct LightBoxClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl LightBoxClient {
    pub fn new(api_key: impl Into<String>, base_url: &str) -> ParcelVizResult<Self> {
        Ok(Self {
            client: build_client(LIGHTBOX_TIMEOUT)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// Geocode `address` and fetch the top-ranked candidate's parcel.
    #[instrument(skip(self))]
    pub async fn address_to_parcel(&self, address: &str) -> ParcelVizResult<ParcelRecord> {
        let url = format!("{}/geocode", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&json!({"address": address, "limit": 1}))
            .send()
            .await
            .map_err(|e| lookup_error(&url, e))?;
        let data = read_json(&url, response).await?;

        let Some(candidate) = data
            .get("results")
            .and_then(Value::as_array)
            .and_then(|results| results.first())
        else {
            return Err(ParcelVizError::ResolutionFailed(format!(
                "No results returned for address: {}",
                address
            )));
        };
        let parcel_id = candidate
            .get("parcelId")
            .and_then(scalar_string)
            .ok_or_else(|| {
                ParcelVizError::ResolutionFailed(
                    "Geocode result is missing 'parcelId'.".to_string(),
                )
            })?;
        debug!(parcel_id = %parcel_id, "Geocoded address");

        let info = self.lookup_parcel(&parcel_id).await?;
        let geometry = parse_geometry(info.get("geometry"))?;

        let record = ParcelRecord::new(
            info.get("apn").and_then(scalar_string).unwrap_or(parcel_id),
            Some(
                info.get("siteAddress")
                    .and_then(scalar_string)
                    .unwrap_or_else(|| address.to_string()),
            ),
            info.get("county").and_then(scalar_string),
            geometry,
            CrsCode::WGS84,
        )
        .map_err(|e| ParcelVizError::ResolutionFailed(e.to_string()))?;

        info!(apn = %record.apn(), "Resolved address");
        Ok(record)
    }

    async fn lookup_parcel(&self, parcel_id: &str) -> ParcelVizResult<Value> {
        let url = format!("{}/parcels/{}", self.base_url, parcel_id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| lookup_error(&url, e))?;
        read_json(&url, response).await
    }
}

// ============================================================================
// Parcel FeatureServer
// ============================================================================

/// APN lookups against a parcel FeatureServer layer.
#[derive(Debug, Clone)]
pub struct ParcelService {
    client: Client,
    url: String,
    id_field: String,
    address_field: Option<String>,
    token: Option<String>,
    out_sr: CrsCode,
}

impl ParcelService {
    pub fn new(
        url: &str,
        id_field: impl Into<String>,
        address_field: Option<String>,
        token: Option<String>,
        out_sr: CrsCode,
    ) -> ParcelVizResult<Self> {
        Ok(Self {
            client: build_client(PARCEL_SERVICE_TIMEOUT)?,
            url: url.trim_end_matches('/').to_string(),
            id_field: id_field.into(),
            address_field: address_field.filter(|f| !f.trim().is_empty()),
            token: token.filter(|t| !t.trim().is_empty()),
            out_sr,
        })
    }

    /// Build from the `parcels` config section, `None` when it has no URL.
    pub fn from_config(
        config: &ParcelSourceConfig,
        out_sr: CrsCode,
        fallback_token: Option<String>,
    ) -> ParcelVizResult<Option<Self>> {
        let Some(url) = config.url.as_deref().filter(|u| !u.trim().is_empty()) else {
            return Ok(None);
        };
        let service = Self::new(
            url,
            config.id_field.clone(),
            config.address_field.clone(),
            config.token.clone().or(fallback_token),
            out_sr,
        )?;
        Ok(Some(service))
    }

    /// `where` clause matching `apn` exactly.
    pub fn where_clause(&self, apn: &str) -> String {
        format!("{}='{}'", self.id_field, apn.replace('\'', "''"))
    }

    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn fetch_parcel_by_apn(&self, apn: &str) -> ParcelVizResult<ParcelRecord> {
        let url = format!("{}/query", self.url);
        let mut params = vec![
            ("where", self.where_clause(apn)),
            ("outFields", "*".to_string()),
            ("f", "geojson".to_string()),
            ("outSR", self.out_sr.code().to_string()),
            ("returnGeometry", "true".to_string()),
        ];
        if let Some(token) = &self.token {
            params.push(("token", token.clone()));
        }

        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| lookup_error(&url, e))?;
        let data = read_json(&url, response).await?;

        let Some(feature) = data
            .get("features")
            .and_then(Value::as_array)
            .and_then(|features| features.first())
        else {
            return Err(ParcelVizError::ResolutionFailed(format!(
                "No parcel found for APN '{}'.",
                apn
            )));
        };

        let geometry = parse_geometry(feature.get("geometry"))?;
        let properties = feature.get("properties");
        let property = |name: &str| properties.and_then(|p| p.get(name)).and_then(scalar_string);

        let record = ParcelRecord::new(
            property(&self.id_field).unwrap_or_else(|| apn.to_string()),
            self.address_field.as_deref().and_then(property),
            property("COUNTY"),
            geometry,
            self.out_sr,
        )
        .map_err(|e| ParcelVizError::ResolutionFailed(e.to_string()))?;

        info!(apn = %record.apn(), "Resolved APN");
        Ok(record)
    }
}

// ============================================================================
// Facade
// ============================================================================

/// Routes lookups to the configured backend.
#[derive(Debug, Clone, Default)]
pub struct GeocodeService {
    lightbox: Option<LightBoxClient>,
    parcels: Option<ParcelService>,
}

impl GeocodeService {
    pub fn new(lightbox: Option<LightBoxClient>, parcels: Option<ParcelService>) -> Self {
        Self { lightbox, parcels }
    }

    /// Wire up whichever backends the settings and config provide.
    pub fn from_settings(
        settings: &AppSettings,
        parcels: &ParcelSourceConfig,
        out_sr: CrsCode,
    ) -> ParcelVizResult<Self> {
        let lightbox = settings
            .lightbox_api_key
            .as_deref()
            .map(|key| LightBoxClient::new(key, &settings.lightbox_base_url))
            .transpose()?;
        let parcels = ParcelService::from_config(parcels, out_sr, settings.arcgis_token.clone())?;
        Ok(Self::new(lightbox, parcels))
    }
}

#[async_trait]
impl ParcelResolver for GeocodeService {
    async fn resolve(
        &self,
        address: Option<&str>,
        apn: Option<&str>,
    ) -> ParcelVizResult<ParcelRecord> {
        let address = address.map(str::trim).filter(|a| !a.is_empty());
        let apn = apn.map(str::trim).filter(|a| !a.is_empty());

        if let Some(apn) = apn {
            return match &self.parcels {
                Some(service) => service.fetch_parcel_by_apn(apn).await,
                None => Err(ParcelVizError::UnsupportedLookup(
                    "APN resolution requires a parcel service URL in the 'parcels' configuration."
                        .to_string(),
                )),
            };
        }

        let Some(address) = address else {
            return Err(ParcelVizError::MissingInput(
                "Provide either an address or an APN.".to_string(),
            ));
        };
        match &self.lightbox {
            Some(client) => client.address_to_parcel(address).await,
            None => Err(ParcelVizError::ResolutionFailed(
                "LightBox client not configured for address lookups.".to_string(),
            )),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn lookup_error(url: &str, err: reqwest::Error) -> ParcelVizError {
    if err.is_timeout() {
        ParcelVizError::ResolutionFailed(format!("Parcel lookup at {} timed out", url))
    } else {
        ParcelVizError::ResolutionFailed(format!("Parcel lookup at {} failed: {}", url, err))
    }
}

async fn read_json(url: &str, response: Response) -> ParcelVizResult<Value> {
    let status = response.status();
    if !status.is_success() {
        return Err(ParcelVizError::ResolutionFailed(format!(
            "Parcel lookup at {} returned HTTP {}",
            url, status
        )));
    }
    let body = response.bytes().await.map_err(|e| lookup_error(url, e))?;
    serde_json::from_slice(&body).map_err(|e| {
        ParcelVizError::ResolutionFailed(format!(
            "Parcel lookup at {} returned invalid JSON: {}",
            url, e
        ))
    })
}

fn parse_geometry(value: Option<&Value>) -> ParcelVizResult<Geometry> {
    let value = value.filter(|v| !v.is_null()).ok_or_else(|| {
        ParcelVizError::ResolutionFailed("Parcel record has no geometry.".to_string())
    })?;
    let geometry: Geometry = serde_json::from_value(value.clone()).map_err(|e| {
        ParcelVizError::ResolutionFailed(format!("Parcel geometry is not valid GeoJSON: {}", e))
    })?;
    if geometry.is_empty() {
        return Err(ParcelVizError::ResolutionFailed(
            "Parcel geometry is empty.".to_string(),
        ));
    }
    Ok(geometry)
}

/// Strings and numbers as text; anything else is absent.
fn scalar_string(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}
