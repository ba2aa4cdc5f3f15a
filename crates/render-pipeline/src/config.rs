//! Source configuration loader.
//!
//! Loads the YAML file describing the parcel lookup service, the output map
//! size and every renderable layer. Supports environment variable
//! substitution using `${VAR}` and `${VAR:-default}` syntax.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use parcel_common::{
    sanitize_path_segment, CrsCode, LayerConfig, ParcelVizError, ParcelVizResult, StyleMap,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use serde_yaml::Mapping;
use tracing::{debug, info};

// ============================================================================
// Sections
// ============================================================================

/// Output figure size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapSpec {
    #[serde(default = "default_width_px")]
    pub width_px: u32,
    #[serde(default = "default_height_px")]
    pub height_px: u32,
    /// Informational; the request dpi wins
    #[serde(default = "default_dpi")]
    pub dpi: u32,
}

impl Default for MapSpec {
    fn default() -> Self {
        Self {
            width_px: default_width_px(),
            height_px: default_height_px(),
            dpi: default_dpi(),
        }
    }
}

/// Where APN lookups are answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParcelSourceConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_id_field")]
    pub id_field: String,
    #[serde(default)]
    pub address_field: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

fn default_width_px() -> u32 {
    1600
}

fn default_height_px() -> u32 {
    1200
}

fn default_dpi() -> u32 {
    220
}

fn default_provider() -> String {
    "arcgis".to_string()
}

fn default_id_field() -> String {
    "APN".to_string()
}

fn default_crs_code() -> u32 {
    4326
}

fn default_buffer_feet() -> f64 {
    200.0
}

#[derive(Debug, Deserialize)]
struct RawSourceConfig {
    #[serde(default = "default_crs_code")]
    default_crs: u32,
    #[serde(default = "default_buffer_feet")]
    buffer_feet: f64,
    #[serde(default)]
    cache: Option<serde_yaml::Value>,
    #[serde(default)]
    map: Option<MapSpec>,
    #[serde(default)]
    parcels: Option<ParcelSourceConfig>,
    #[serde(default)]
    layers: Option<Mapping>,
}

// ============================================================================
// SourceConfig
// ============================================================================

/// Validated, read-only view of the source configuration file.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    default_crs: CrsCode,
    buffer_feet: f64,
    map: MapSpec,
    parcels: ParcelSourceConfig,
    layers: Vec<LayerConfig>,
}

impl SourceConfig {
    /// Parse configuration text after environment substitution.
    pub fn from_yaml_str(content: &str) -> ParcelVizResult<Self> {
        let expanded = expand_env_vars(content).map_err(config_error)?;

        let root: serde_yaml::Value = serde_yaml::from_str(&expanded)
            .context("Failed to parse source config YAML")
            .map_err(config_error)?;
        let root = match root {
            serde_yaml::Value::Null => serde_yaml::Value::Mapping(Mapping::new()),
            serde_yaml::Value::Mapping(_) => root,
            _ => {
                return Err(ParcelVizError::Config(
                    "Configuration root must be a mapping.".to_string(),
                ))
            }
        };

        let raw: RawSourceConfig = serde_yaml::from_value(root)
            .context("Invalid source config")
            .map_err(config_error)?;
        if raw.cache.is_some() {
            debug!("Ignoring 'cache' section; responses are not cached");
        }

        let parcels = raw
            .parcels
            .ok_or_else(|| ParcelVizError::Config("Missing 'parcels' configuration.".to_string()))?;

        let default_crs = CrsCode::new(raw.default_crs);
        let layers = raw
            .layers
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| parse_layer(key, value, default_crs))
            .collect::<ParcelVizResult<Vec<_>>>()?;
        check_output_names(&layers)?;

        Ok(Self {
            default_crs,
            buffer_feet: raw.buffer_feet,
            map: raw.map.unwrap_or_default(),
            parcels,
            layers,
        })
    }

    pub fn default_crs(&self) -> CrsCode {
        self.default_crs
    }

    pub fn buffer_feet(&self) -> f64 {
        self.buffer_feet
    }

    pub fn map(&self) -> &MapSpec {
        &self.map
    }

    pub fn parcels(&self) -> &ParcelSourceConfig {
        &self.parcels
    }

    /// Layers in file order.
    pub fn layers(&self) -> &[LayerConfig] {
        &self.layers
    }

    /// Look up one layer by name.
    pub fn layer(&self, name: &str) -> ParcelVizResult<&LayerConfig> {
        self.layers
            .iter()
            .find(|layer| layer.name == name)
            .ok_or_else(|| ParcelVizError::LayerNotDefined(name.to_string()))
    }

    pub fn layer_names(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(|layer| layer.name.as_str())
    }
}

/// Load and validate a source configuration file.
pub fn load_source_config<P: AsRef<Path>>(path: P) -> ParcelVizResult<SourceConfig> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ParcelVizError::Config(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read source config from {:?}", path))
        .map_err(config_error)?;

    let config = SourceConfig::from_yaml_str(&content)?;
    info!(
        path = %path.display(),
        layers = config.layers.len(),
        default_crs = %config.default_crs,
        "Loaded source config"
    );
    Ok(config)
}

fn config_error(err: anyhow::Error) -> ParcelVizError {
    ParcelVizError::Config(format!("{:#}", err))
}

/// Every layer must map to its own image file once its name is sanitized.
fn check_output_names(layers: &[LayerConfig]) -> ParcelVizResult<()> {
    let mut seen: HashMap<String, &str> = HashMap::new();
    for layer in layers {
        let file_stem = sanitize_path_segment(&layer.name);
        if let Some(previous) = seen.insert(file_stem.clone(), &layer.name) {
            return Err(ParcelVizError::Config(format!(
                "Layers '{}' and '{}' would both write '{}.png'.",
                previous, layer.name, file_stem
            )));
        }
    }
    Ok(())
}

/// Reserved keys of a layer entry; everything else is an adapter parameter.
const LAYER_KEYS: [&str; 4] = ["type", "target_epsg", "title", "style"];

fn parse_layer(
    key: serde_yaml::Value,
    value: serde_yaml::Value,
    default_crs: CrsCode,
) -> ParcelVizResult<LayerConfig> {
    let name = match key {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Number(n) => n.to_string(),
        other => {
            return Err(ParcelVizError::Config(format!(
                "Layer names must be strings, got {:?}",
                other
            )))
        }
    };

    let entry = match serde_json::to_value(&value)? {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        _ => {
            return Err(ParcelVizError::Config(format!(
                "Layer '{}' must be a mapping.",
                name
            )))
        }
    };

    let layer_type = match entry.get("type") {
        Some(Value::String(t)) if !t.trim().is_empty() => t.trim().to_string(),
        _ => return Err(ParcelVizError::Config(format!("Layer '{}' missing 'type'.", name))),
    };

    let target_crs = match entry.get("target_epsg") {
        None | Some(Value::Null) => default_crs,
        Some(v) => parse_epsg(v).ok_or_else(|| {
            ParcelVizError::Config(format!("Layer '{}' has invalid 'target_epsg': {}", name, v))
        })?,
    };

    let style: StyleMap = match entry.get("style") {
        None | Some(Value::Null) => StyleMap::new(),
        Some(Value::Object(map)) => map.clone().into_iter().collect(),
        Some(_) => {
            return Err(ParcelVizError::Config(format!(
                "Layer '{}' 'style' must be a mapping.",
                name
            )))
        }
    };

    let mut layer = LayerConfig::new(name, layer_type, target_crs);
    layer.title = entry.get("title").and_then(Value::as_str).map(str::to_string);
    layer.style = style;
    layer.params = entry
        .into_iter()
        .filter(|(k, _)| !LAYER_KEYS.contains(&k.as_str()))
        .collect();
    Ok(layer)
}

fn parse_epsg(value: &Value) -> Option<CrsCode> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|c| u32::try_from(c).ok()).map(CrsCode::new),
        Value::String(s) => CrsCode::from_wms_string(s.trim())
            .ok()
            .or_else(|| s.trim().parse::<u32>().ok().map(CrsCode::new)),
        _ => None,
    }
}

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand `${VAR}` and `${VAR:-default}` references.
pub fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();

            let mut var_expr = String::new();
            let mut depth = 1;
            while depth > 0 {
                match chars.next() {
                    Some('{') => {
                        depth += 1;
                        var_expr.push('{');
                    }
                    Some('}') => {
                        depth -= 1;
                        if depth > 0 {
                            var_expr.push('}');
                        }
                    }
                    Some(c) => var_expr.push(c),
                    None => anyhow::bail!("Unclosed variable substitution: ${{{}", var_expr),
                }
            }

            result.push_str(&resolve_var_expr(&var_expr)?);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

fn resolve_var_expr(expr: &str) -> Result<String> {
    if let Some((var_name, default)) = expr.split_once(":-") {
        match std::env::var(var_name.trim()) {
            Ok(val) if !val.is_empty() => Ok(val),
            _ => Ok(default.to_string()),
        }
    } else {
        std::env::var(expr.trim()).with_context(|| format!("Environment variable {} not set", expr))
    }
}
