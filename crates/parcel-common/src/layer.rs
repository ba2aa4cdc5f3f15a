//! Layer configuration as resolved from the source config file.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::CrsCode;

/// Free-form style settings (colors, widths, opacities) keyed by name.
pub type StyleMap = BTreeMap<String, Value>;

/// A single configured map layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    /// Unique key within a configuration set
    pub name: String,

    /// Adapter type tag, e.g. "arcgis_feature" or "wms"
    #[serde(rename = "type")]
    pub layer_type: String,

    /// CRS the layer is requested and drawn in
    pub target_crs: CrsCode,

    /// Figure title, falls back to the layer name
    #[serde(default)]
    pub title: Option<String>,

    /// Adapter-specific parameters (url, out_fields, layers, token, ...)
    #[serde(default)]
    pub params: BTreeMap<String, Value>,

    #[serde(default)]
    pub style: StyleMap,
}

impl LayerConfig {
    pub fn new(name: impl Into<String>, layer_type: impl Into<String>, target_crs: CrsCode) -> Self {
        Self {
            name: name.into(),
            layer_type: layer_type.into(),
            target_crs,
            title: None,
            params: BTreeMap::new(),
            style: StyleMap::new(),
        }
    }

    /// Builder-style parameter insert, mostly for tests and fixtures.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_style(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.style.insert(key.into(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    /// Parameter as a non-blank string. Numbers and booleans are stringified.
    pub fn param_str(&self, key: &str) -> Option<String> {
        let text = match self.params.get(key)? {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => return None,
        };
        (!text.is_empty()).then_some(text)
    }

    /// Title used in the figure heading.
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(&self.name)
    }
}
