//! Layer style resolution.
//!
//! Style maps come straight from the source config, so every value is
//! checked here. Anything unusable falls back to the default with a warning.

use parcel_common::StyleMap;
use serde_json::Value;
use tracing::warn;

/// An opaque RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Color as premultiplication-ready RGBA with the given alpha in `[0, 1]`.
    pub fn with_alpha(self, alpha: f32) -> [u8; 4] {
        let a = (alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
        [self.0, self.1, self.2, a]
    }
}

/// Parse hex color string to RGB.
///
/// Accepts `#rrggbb`, `#rgb` and a few named colors.
pub fn hex_to_rgb(color: &str) -> Option<Rgb> {
    let color = color.trim();
    match color.to_ascii_lowercase().as_str() {
        "black" => return Some(Rgb(0, 0, 0)),
        "white" => return Some(Rgb(255, 255, 255)),
        "red" => return Some(Rgb(255, 0, 0)),
        "green" => return Some(Rgb(0, 128, 0)),
        "blue" => return Some(Rgb(0, 0, 255)),
        "yellow" => return Some(Rgb(255, 255, 0)),
        "orange" => return Some(Rgb(255, 165, 0)),
        "cyan" => return Some(Rgb(0, 255, 255)),
        "magenta" => return Some(Rgb(255, 0, 255)),
        "gray" | "grey" => return Some(Rgb(128, 128, 128)),
        _ => {}
    }

    let hex = color.strip_prefix('#')?;
    if !hex.is_ascii() {
        return None;
    }
    match hex.len() {
        6 => {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            Some(Rgb(r, g, b))
        }
        3 => {
            let digit = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
            Some(Rgb(digit(0)?, digit(1)?, digit(2)?))
        }
        _ => None,
    }
}

/// Color from the first present key, falling back to `default`.
fn color_setting(style: &StyleMap, keys: &[&str], default: Rgb) -> Rgb {
    let Some((key, value)) = keys.iter().find_map(|k| style.get(*k).map(|v| (*k, v))) else {
        return default;
    };
    match value.as_str().and_then(hex_to_rgb) {
        Some(rgb) => rgb,
        None => {
            warn!(key, value = %value, "Invalid color in layer style, using default");
            default
        }
    }
}

/// Non-negative number, falling back to `default`.
fn number_setting(style: &StyleMap, key: &str, default: f32) -> f32 {
    let Some(value) = style.get(key) else {
        return default;
    };
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() && v >= 0.0 => v as f32,
        _ => {
            warn!(key, value = %value, "Invalid number in layer style, using default");
            default
        }
    }
}

fn alpha_setting(style: &StyleMap, key: &str, default: f32) -> f32 {
    number_setting(style, key, default).clamp(0.0, 1.0)
}

/// Styling for vector features.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorStyle {
    pub fill: Rgb,
    pub outline: Rgb,
    /// Line width in points
    pub line_width: f32,
    pub fill_alpha: f32,
}

impl VectorStyle {
    pub const DEFAULT_FILL: Rgb = Rgb(0x4c, 0x78, 0xa8);
    pub const DEFAULT_OUTLINE: Rgb = Rgb(0x29, 0x41, 0x62);

    pub fn from_style(style: &StyleMap) -> Self {
        Self {
            fill: color_setting(style, &["fill_color", "color"], Self::DEFAULT_FILL),
            outline: color_setting(style, &["outline", "line_color"], Self::DEFAULT_OUTLINE),
            line_width: number_setting(style, "line_width", 0.8),
            fill_alpha: alpha_setting(style, "fill_alpha", 0.4),
        }
    }
}

/// Styling for the parcel outline drawn over every layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParcelStyle {
    pub fill: Rgb,
    pub outline: Rgb,
    /// Outline width in points
    pub outline_width: f32,
    pub fill_alpha: f32,
}

impl ParcelStyle {
    pub fn from_style(style: &StyleMap) -> Self {
        Self {
            fill: color_setting(style, &["parcel_fill_color"], Rgb(0x00, 0xff, 0xff)),
            outline: color_setting(style, &["parcel_outline_color"], Rgb(0x00, 0xb7, 0xc2)),
            outline_width: number_setting(style, "parcel_outline_width", 2.5),
            fill_alpha: alpha_setting(style, "parcel_fill_alpha", 0.18),
        }
    }
}

/// Styling for raster imagery.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterStyle {
    pub opacity: f32,
}

impl RasterStyle {
    pub fn from_style(style: &StyleMap) -> Self {
        Self {
            opacity: alpha_setting(style, "opacity", 1.0),
        }
    }
}
