//! Render request and response payloads.

use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;

use crate::{CrsCode, ParcelSummary, ParcelVizError, ParcelVizResult};

pub const DEFAULT_BUFFER_FEET: f64 = 250.0;
pub const DEFAULT_OUTPUT_DPI: u32 = 220;
pub const MIN_OUTPUT_DPI: u32 = 96;
pub const MAX_OUTPUT_DPI: u32 = 600;

fn default_buffer_feet() -> f64 {
    DEFAULT_BUFFER_FEET
}

fn default_output_dpi() -> u32 {
    DEFAULT_OUTPUT_DPI
}

/// Input payload for the render pipeline, the API and the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderRequest {
    #[serde(default)]
    pub address: Option<String>,

    #[serde(default)]
    pub apn: Option<String>,

    #[serde(default)]
    pub layers: Vec<String>,

    #[serde(default = "default_buffer_feet")]
    pub buffer_feet: f64,

    #[serde(default = "default_output_dpi")]
    pub output_dpi: u32,
}

impl Default for RenderRequest {
    fn default() -> Self {
        Self {
            address: None,
            apn: None,
            layers: Vec::new(),
            buffer_feet: DEFAULT_BUFFER_FEET,
            output_dpi: DEFAULT_OUTPUT_DPI,
        }
    }
}

impl RenderRequest {
    pub fn for_apn(apn: impl Into<String>, layers: &[&str]) -> Self {
        Self {
            apn: Some(apn.into()),
            layers: layers.iter().map(|l| l.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn for_address(address: impl Into<String>, layers: &[&str]) -> Self {
        Self {
            address: Some(address.into()),
            layers: layers.iter().map(|l| l.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Validate and normalize the request.
    ///
    /// Blank address/APN values become `None`, layer names are trimmed with
    /// blanks dropped and duplicates collapsed onto their first occurrence.
    pub fn validated(self) -> ParcelVizResult<RenderRequest> {
        let address = non_blank(self.address);
        let apn = non_blank(self.apn);
        if address.is_none() && apn.is_none() {
            return Err(ParcelVizError::MissingInput(
                "Provide either an address or an APN.".to_string(),
            ));
        }

        let mut layers: Vec<String> = Vec::with_capacity(self.layers.len());
        for layer in self.layers {
            let layer = layer.trim();
            if !layer.is_empty() && !layers.iter().any(|l| l == layer) {
                layers.push(layer.to_string());
            }
        }
        if layers.is_empty() {
            return Err(ParcelVizError::InvalidRequest(
                "At least one layer must be specified.".to_string(),
            ));
        }

        if !self.buffer_feet.is_finite() || self.buffer_feet < 0.0 {
            return Err(ParcelVizError::InvalidRequest(format!(
                "buffer_feet must be a non-negative number, got {}",
                self.buffer_feet
            )));
        }

        if !(MIN_OUTPUT_DPI..=MAX_OUTPUT_DPI).contains(&self.output_dpi) {
            return Err(ParcelVizError::InvalidRequest(format!(
                "output_dpi must be between {} and {}, got {}",
                MIN_OUTPUT_DPI, MAX_OUTPUT_DPI, self.output_dpi
            )));
        }

        Ok(RenderRequest {
            address,
            apn,
            layers,
            buffer_feet: self.buffer_feet,
            output_dpi: self.output_dpi,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Metadata for one rendered layer output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerResult {
    pub name: String,
    pub path: PathBuf,
    pub warnings: Vec<String>,
    pub crs: CrsCode,
    pub created_at: DateTime<Utc>,
}

impl LayerResult {
    pub fn new(name: impl Into<String>, path: PathBuf, crs: CrsCode) -> Self {
        Self {
            name: name.into(),
            path,
            warnings: Vec::new(),
            crs,
            created_at: Utc::now(),
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

/// Layer name to public image reference, kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageMap(Vec<(String, String)>);

impl ImageMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entry. Replacement keeps the original position.
    pub fn insert(&mut self, name: impl Into<String>, url: impl Into<String>) {
        let name = name.into();
        let url = url.into();
        match self.0.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = url,
            None => self.0.push((name, url)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for ImageMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ImageMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ImageMapVisitor;

        impl<'de> Visitor<'de> for ImageMapVisitor {
            type Value = ImageMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of layer names to image references")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<ImageMap, A::Error> {
                let mut images = ImageMap::new();
                while let Some((k, v)) = access.next_entry::<String, String>()? {
                    images.insert(k, v);
                }
                Ok(images)
            }
        }

        deserializer.deserialize_map(ImageMapVisitor)
    }
}

/// Aggregate response for a render job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderResponse {
    pub parcel: ParcelSummary,
    pub images: ImageMap,
    pub contact_sheet: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_from_json() {
        let request: RenderRequest =
            serde_json::from_value(json!({"apn": "123", "layers": ["zoning"]})).unwrap();
        assert_eq!(request.buffer_feet, 250.0);
        assert_eq!(request.output_dpi, 220);
        assert_eq!(request.address, None);
    }

    #[test]
    fn test_missing_identifier() {
        let err = RenderRequest {
            address: Some("   ".into()),
            layers: vec!["zoning".into()],
            ..Default::default()
        }
        .validated()
        .unwrap_err();
        assert!(matches!(err, ParcelVizError::MissingInput(_)));
        assert_eq!(err.to_string(), "Provide either an address or an APN.");
    }

    #[test]
    fn test_layers_are_trimmed_and_deduplicated() {
        let request = RenderRequest {
            apn: Some(" 123 ".into()),
            layers: vec![
                " zoning ".into(),
                "".into(),
                "flood".into(),
                "zoning".into(),
                "  ".into(),
            ],
            ..Default::default()
        }
        .validated()
        .unwrap();
        assert_eq!(request.apn.as_deref(), Some("123"));
        assert_eq!(request.layers, vec!["zoning", "flood"]);
    }

    #[test]
    fn test_no_layers_rejected() {
        let err = RenderRequest::for_apn("123", &["  "]).validated().unwrap_err();
        assert!(matches!(err, ParcelVizError::InvalidRequest(_)));
    }

    #[test]
    fn test_numeric_bounds() {
        let mut request = RenderRequest::for_apn("123", &["zoning"]);
        request.buffer_feet = -1.0;
        assert!(request.clone().validated().is_err());
        request.buffer_feet = f64::INFINITY;
        assert!(request.clone().validated().is_err());
        request.buffer_feet = 0.0;
        assert!(request.clone().validated().is_ok());

        request.output_dpi = 95;
        assert!(request.clone().validated().is_err());
        request.output_dpi = 601;
        assert!(request.clone().validated().is_err());
        request.output_dpi = 600;
        assert!(request.validated().is_ok());
    }

    #[test]
    fn test_image_map_keeps_insertion_order() {
        let mut images = ImageMap::new();
        images.insert("zoning", "/outputs/1/zoning.png");
        images.insert("aerial", "/outputs/1/aerial.png");
        images.insert("flood", "/outputs/1/flood.png");
        images.insert("zoning", "/outputs/1/zoning2.png");

        let text = serde_json::to_string(&images).unwrap();
        assert_eq!(
            text,
            r#"{"zoning":"/outputs/1/zoning2.png","aerial":"/outputs/1/aerial.png","flood":"/outputs/1/flood.png"}"#
        );
        let back: ImageMap = serde_json::from_str(&text).unwrap();
        assert_eq!(back.keys().collect::<Vec<_>>(), vec!["zoning", "aerial", "flood"]);
    }
}
