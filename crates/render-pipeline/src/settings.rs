//! Process settings read from the environment.

use std::env;
use std::path::PathBuf;

use parcel_common::{ParcelVizError, ParcelVizResult};
use serde::Serialize;

pub const DEFAULT_CONFIG_PATH: &str = "config/sources.yaml";
pub const DEFAULT_OUTPUT_ROOT: &str = "outputs";
pub const DEFAULT_LIGHTBOX_BASE_URL: &str = "https://api.lightboxre.com/v1";
pub const DEFAULT_MAX_CONCURRENT_LAYERS: usize = 4;

/// Runtime configuration for the pipeline and its front ends.
#[derive(Debug, Clone, Serialize)]
pub struct AppSettings {
    pub config_path: PathBuf,
    pub output_root: PathBuf,
    #[serde(skip_serializing)]
    pub lightbox_api_key: Option<String>,
    pub lightbox_base_url: String,
    #[serde(skip_serializing)]
    pub arcgis_token: Option<String>,
    pub api_host: String,
    pub api_port: u16,
    pub log_level: String,
    pub max_concurrent_layers: usize,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            output_root: PathBuf::from(DEFAULT_OUTPUT_ROOT),
            lightbox_api_key: None,
            lightbox_base_url: DEFAULT_LIGHTBOX_BASE_URL.to_string(),
            arcgis_token: None,
            api_host: "0.0.0.0".to_string(),
            api_port: 8000,
            log_level: "info".to_string(),
            max_concurrent_layers: DEFAULT_MAX_CONCURRENT_LAYERS,
        }
    }
}

impl AppSettings {
    /// Read settings from process environment variables.
    ///
    /// Call `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> ParcelVizResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> ParcelVizResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let api_port = match get("API_PORT") {
            Some(port) => port.parse::<u16>().map_err(|_| {
                ParcelVizError::Config(format!("API_PORT must be a port number, got '{}'", port))
            })?,
            None => defaults.api_port,
        };

        let max_concurrent_layers = match get("MAX_CONCURRENT_LAYERS") {
            Some(n) => match n.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ParcelVizError::Config(format!(
                        "MAX_CONCURRENT_LAYERS must be a positive integer, got '{}'",
                        n
                    )))
                }
            },
            None => defaults.max_concurrent_layers,
        };

        Ok(Self {
            config_path: get("CONFIG_PATH").map(PathBuf::from).unwrap_or(defaults.config_path),
            output_root: get("OUTPUT_ROOT").map(PathBuf::from).unwrap_or(defaults.output_root),
            lightbox_api_key: get("LIGHTBOX_API_KEY"),
            lightbox_base_url: get("LIGHTBOX_BASE_URL").unwrap_or(defaults.lightbox_base_url),
            arcgis_token: get("ARCGIS_TOKEN"),
            api_host: get("API_HOST").unwrap_or(defaults.api_host),
            api_port,
            log_level: get("LOG_LEVEL")
                .map(|l| l.to_lowercase())
                .unwrap_or(defaults.log_level),
            max_concurrent_layers,
        })
    }

    /// `host:port` the API binds to.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }
}
