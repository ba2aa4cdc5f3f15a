//! Coordinate Reference System types and utilities.
//!
//! Only the codes parcel layers are actually served in are described here.
//! Anything else is still representable as a [`CrsCode`], it just has an
//! [`LinearUnit::Unknown`] unit and no projection math behind it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An EPSG coordinate reference system code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CrsCode(pub u32);

impl CrsCode {
    /// WGS84 Geographic (lon/lat in degrees)
    pub const WGS84: CrsCode = CrsCode(4326);
    /// NAD83 Geographic
    pub const NAD83: CrsCode = CrsCode(4269);
    /// Web Mercator (meters)
    pub const WEB_MERCATOR: CrsCode = CrsCode(3857);

    pub fn new(code: u32) -> Self {
        Self(code)
    }

    pub fn code(&self) -> u32 {
        self.0
    }

    /// Parse a CRS string (supports both SRS and CRS parameter formats).
    ///
    /// Accepts formats like:
    /// - "EPSG:4326"
    /// - "epsg:3857"
    /// - "CRS:84" (equivalent to EPSG:4326 with lon/lat axis order)
    /// - "2227"
    pub fn from_wms_string(s: &str) -> Result<Self, CrsParseError> {
        let normalized = s.trim().to_uppercase();

        if normalized == "CRS:84" {
            return Ok(CrsCode::WGS84);
        }

        let digits = normalized.strip_prefix("EPSG:").unwrap_or(&normalized);
        digits
            .parse::<u32>()
            .map(CrsCode)
            .map_err(|_| CrsParseError::UnsupportedCrs(s.to_string()))
    }

    /// The family of projection behind this code.
    pub fn kind(&self) -> CrsKind {
        match self.0 {
            4326 | 4269 => CrsKind::Geographic,
            3857 | 900913 => CrsKind::WebMercator,
            code @ 32601..=32660 => CrsKind::Utm {
                zone: (code - 32600) as u8,
                north: true,
            },
            code @ 32701..=32760 => CrsKind::Utm {
                zone: (code - 32700) as u8,
                north: false,
            },
            code @ 26901..=26923 => CrsKind::Utm {
                zone: (code - 26900) as u8,
                north: true,
            },
            5070 | 3310 => CrsKind::Albers,
            2225..=2230 | 2263 | 2264 => CrsKind::StatePlane,
            _ => CrsKind::Unknown,
        }
    }

    /// Linear unit of the first axis.
    pub fn unit(&self) -> LinearUnit {
        match self.kind() {
            CrsKind::Geographic => LinearUnit::Degree,
            CrsKind::WebMercator | CrsKind::Utm { .. } | CrsKind::Albers => LinearUnit::Metre,
            CrsKind::StatePlane => LinearUnit::UsSurveyFoot,
            CrsKind::Unknown => LinearUnit::Unknown,
        }
    }

    /// Check if this is a geographic (lat/lon) CRS.
    pub fn is_geographic(&self) -> bool {
        matches!(self.kind(), CrsKind::Geographic)
    }

    /// Human-readable CRS name, when the code is known.
    pub fn name(&self) -> Option<String> {
        let name = match (self.0, self.kind()) {
            (4326, _) => "WGS 84".to_string(),
            (4269, _) => "NAD83".to_string(),
            (_, CrsKind::WebMercator) => "WGS 84 / Pseudo-Mercator".to_string(),
            (code, CrsKind::Utm { zone, north }) if code >= 32600 => format!(
                "WGS 84 / UTM zone {}{}",
                zone,
                if north { "N" } else { "S" }
            ),
            (_, CrsKind::Utm { zone, .. }) => format!("NAD83 / UTM zone {}N", zone),
            (5070, _) => "NAD83 / Conus Albers".to_string(),
            (3310, _) => "NAD83 / California Albers".to_string(),
            (code @ 2225..=2230, _) => format!("NAD83 / California zone {} (ftUS)", code - 2224),
            (2263, _) => "NAD83 / New York Long Island (ftUS)".to_string(),
            (2264, _) => "NAD83 / North Carolina (ftUS)".to_string(),
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for CrsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

impl From<u32> for CrsCode {
    fn from(code: u32) -> Self {
        CrsCode(code)
    }
}

/// Projection family of a CRS code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrsKind {
    /// Longitude/latitude in degrees
    Geographic,
    /// Spherical Web Mercator
    WebMercator,
    /// Universal Transverse Mercator
    Utm { zone: u8, north: bool },
    /// Albers equal-area (unit known, no transformation support)
    Albers,
    /// US State Plane in survey feet (unit known, no transformation support)
    StatePlane,
    Unknown,
}

/// Linear unit of a CRS axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinearUnit {
    Degree,
    Metre,
    UsSurveyFoot,
    Unknown,
}

impl LinearUnit {
    pub fn name(&self) -> &'static str {
        match self {
            LinearUnit::Degree => "degree",
            LinearUnit::Metre => "metre",
            LinearUnit::UsSurveyFoot => "US survey foot",
            LinearUnit::Unknown => "unknown",
        }
    }
}

impl fmt::Display for LinearUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Metadata about a coordinate reference system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrsInfo {
    pub epsg: u32,
    pub name: String,
    pub units: String,
}

/// Return human-readable CRS metadata.
pub fn describe_crs(crs: CrsCode) -> CrsInfo {
    CrsInfo {
        epsg: crs.code(),
        name: crs.name().unwrap_or_else(|| crs.to_string()),
        units: crs.unit().name().to_string(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CrsParseError {
    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),
}
