//! Normalized parcel records.

use serde::{Deserialize, Serialize};

use crate::{CrsCode, Geometry, ParcelVizError, ParcelVizResult};

/// A resolved parcel: identifier, optional site details and its outline.
///
/// The geometry is always accompanied by the CRS it is expressed in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParcelRecord {
    apn: String,
    pub address: Option<String>,
    pub county: Option<String>,
    pub geometry: Geometry,
    pub crs: CrsCode,
}

impl ParcelRecord {
    /// Build a record, rejecting blank identifiers.
    pub fn new(
        apn: impl Into<String>,
        address: Option<String>,
        county: Option<String>,
        geometry: Geometry,
        crs: CrsCode,
    ) -> ParcelVizResult<Self> {
        let apn = apn.into().trim().to_string();
        if apn.is_empty() {
            return Err(ParcelVizError::ResolutionFailed(
                "Parcel record is missing an identifier.".to_string(),
            ));
        }
        Ok(Self {
            apn,
            address: address.filter(|a| !a.trim().is_empty()),
            county: county.filter(|c| !c.trim().is_empty()),
            geometry,
            crs,
        })
    }

    pub fn apn(&self) -> &str {
        &self.apn
    }

    /// Directory name used to partition this parcel's outputs.
    pub fn output_segment(&self) -> String {
        sanitize_path_segment(&self.apn)
    }

    pub fn summary(&self) -> ParcelSummary {
        ParcelSummary::from(self)
    }
}

/// Make a string usable as a single path segment.
///
/// Separators become `_`, as do leading dots, so `.` and `..` can never
/// name the current or parent directory.
pub fn sanitize_path_segment(value: &str) -> String {
    let cleaned = value.replace(['/', '\\'], "_");
    let dots = cleaned.chars().take_while(|c| *c == '.').count();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        format!("{}{}", "_".repeat(dots), &cleaned[dots..])
    }
}

/// Parcel block of a render response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParcelSummary {
    pub apn: String,
    pub address: Option<String>,
    pub county: Option<String>,
    /// CRS label such as "EPSG:4326"
    pub crs: String,
}

impl From<&ParcelRecord> for ParcelSummary {
    fn from(record: &ParcelRecord) -> Self {
        Self {
            apn: record.apn.clone(),
            address: record.address.clone(),
            county: record.county.clone(),
            crs: record.crs.to_string(),
        }
    }
}
