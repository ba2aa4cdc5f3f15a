//! Error types for parcelviz crates and services.

use thiserror::Error;

use crate::crs::{CrsCode, LinearUnit};

/// Result type alias using ParcelVizError.
pub type ParcelVizResult<T> = Result<T, ParcelVizError>;

/// Primary error type for render pipeline operations.
#[derive(Debug, Error)]
pub enum ParcelVizError {
    // === Request Errors ===
    #[error("{0}")]
    MissingInput(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // === Parcel Resolution Errors ===
    #[error("{0}")]
    UnsupportedLookup(String),

    #[error("{0}")]
    ResolutionFailed(String),

    // === Configuration Errors ===
    #[error("Layer '{0}' not defined in configuration.")]
    LayerNotDefined(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // === Adapter Errors ===
    #[error("Layer '{layer}' {message}")]
    AdapterConfig { layer: String, message: String },

    #[error("Unknown layer type '{0}'.")]
    UnregisteredLayerType(String),

    #[error("{0}")]
    AdapterResponse(String),

    #[error("Request to {url} failed: {message}")]
    AdapterFetch { url: String, message: String },

    #[error("Request to {0} timed out")]
    Timeout(String),

    // === Geometry Errors ===
    #[error("Unsupported CRS unit '{unit}' for {crs}")]
    UnsupportedUnit { crs: CrsCode, unit: LinearUnit },

    #[error("Reprojection from {from} to {to} is not supported")]
    UnsupportedProjection { from: CrsCode, to: CrsCode },

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    // === Rendering Errors ===
    #[error("Composition failed: {0}")]
    Composition(String),

    // === Infrastructure Errors ===
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ParcelVizError {
    /// True for failures caused by what the caller asked for, as opposed to
    /// failures of the service itself.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ParcelVizError::MissingInput(_)
                | ParcelVizError::InvalidRequest(_)
                | ParcelVizError::UnsupportedLookup(_)
                | ParcelVizError::ResolutionFailed(_)
        )
    }

    /// Get the HTTP status code for this error when it reaches a boundary.
    pub fn http_status_code(&self) -> u16 {
        if self.is_client_error() {
            400
        } else {
            500
        }
    }
}

// Conversion from common error types
impl From<std::io::Error> for ParcelVizError {
    fn from(err: std::io::Error) -> Self {
        ParcelVizError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ParcelVizError {
    fn from(err: serde_json::Error) -> Self {
        ParcelVizError::Internal(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ParcelVizError::MissingInput("Provide either an address or an APN.".into())
                .http_status_code(),
            400
        );
        assert_eq!(
            ParcelVizError::ResolutionFailed("no results".into()).http_status_code(),
            400
        );
        assert_eq!(ParcelVizError::Io("disk full".into()).http_status_code(), 500);
        assert_eq!(
            ParcelVizError::Composition("bad canvas".into()).http_status_code(),
            500
        );
    }

    #[test]
    fn test_messages() {
        let err = ParcelVizError::AdapterConfig {
            layer: "zoning".into(),
            message: "missing 'url' parameter.".into(),
        };
        assert_eq!(err.to_string(), "Layer 'zoning' missing 'url' parameter.");

        let err = ParcelVizError::UnsupportedUnit {
            crs: CrsCode(99999),
            unit: LinearUnit::Unknown,
        };
        assert_eq!(err.to_string(), "Unsupported CRS unit 'unknown' for EPSG:99999");
    }
}
