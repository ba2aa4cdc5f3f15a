//! Common types and utilities shared across all parcelviz crates and services.

pub mod bbox;
pub mod crs;
pub mod error;
pub mod geometry;
pub mod layer;
pub mod parcel;
pub mod request;
pub mod tile;

pub use bbox::BoundingBox;
pub use crs::{describe_crs, CrsCode, CrsInfo, CrsKind, LinearUnit};
pub use error::{ParcelVizError, ParcelVizResult};
pub use geometry::{Feature, FeatureCollection, Geometry, Position};
pub use layer::{LayerConfig, StyleMap};
pub use parcel::{sanitize_path_segment, ParcelRecord, ParcelSummary};
pub use request::{ImageMap, LayerResult, RenderRequest, RenderResponse};
pub use tile::{tiles_for_extent, TileCoord};
