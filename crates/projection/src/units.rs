//! Linear unit conversion for buffer distances.

use parcel_common::{CrsCode, LinearUnit, ParcelVizError, ParcelVizResult};

/// International foot in metres.
pub const METRES_PER_FOOT: f64 = 0.3048;

/// Flat feet-per-degree approximation used for geographic buffers.
///
/// Not latitude-corrected: a degree of longitude is treated the same as a
/// degree of latitude.
pub const FEET_PER_DEGREE: f64 = 364_000.0;

/// Convert a distance in feet into the given linear unit.
///
/// Returns `None` for units with no conversion.
pub fn feet_to_unit(feet: f64, unit: LinearUnit) -> Option<f64> {
    match unit {
        LinearUnit::Metre => Some(feet * METRES_PER_FOOT),
        LinearUnit::UsSurveyFoot => Some(feet),
        LinearUnit::Degree => Some(feet / FEET_PER_DEGREE),
        LinearUnit::Unknown => None,
    }
}

/// Convert a distance in feet into the linear unit of `crs`.
pub fn feet_to_units(feet: f64, crs: CrsCode) -> ParcelVizResult<f64> {
    let unit = crs.unit();
    feet_to_unit(feet, unit).ok_or(ParcelVizError::UnsupportedUnit { crs, unit })
}
