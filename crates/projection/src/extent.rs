//! Buffered layer extents.

use serde::Serialize;
use tracing::debug;

use parcel_common::{BoundingBox, CrsCode, Geometry, ParcelVizError, ParcelVizResult};

use crate::transform::{BuiltinReprojector, Reprojector};
use crate::units::feet_to_units;

/// An axis-aligned bounding box tagged with the CRS it is expressed in.
///
/// Only produced by [`buffered_extent`]; callers cannot assemble one by hand.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Extent {
    bbox: BoundingBox,
    crs: CrsCode,
}

impl Extent {
    pub(crate) fn new(bbox: BoundingBox, crs: CrsCode) -> Self {
        Self { bbox, crs }
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    pub fn crs(&self) -> CrsCode {
        self.crs
    }

    pub fn min_x(&self) -> f64 {
        self.bbox.min_x
    }

    pub fn min_y(&self) -> f64 {
        self.bbox.min_y
    }

    pub fn max_x(&self) -> f64 {
        self.bbox.max_x
    }

    pub fn max_y(&self) -> f64 {
        self.bbox.max_y
    }

    pub fn width(&self) -> f64 {
        self.bbox.width()
    }

    pub fn height(&self) -> f64 {
        self.bbox.height()
    }

    /// Stable textual fingerprint, e.g. `3857:-8905559.263462_...`.
    pub fn cache_key(&self) -> String {
        format!("{}:{}", self.crs.code(), self.bbox.cache_key())
    }
}

/// Axis-aligned buffer: the geometry's bounds grown by `distance` on every side.
pub fn buffer(geometry: &Geometry, distance: f64) -> ParcelVizResult<BoundingBox> {
    if !distance.is_finite() || distance < 0.0 {
        return Err(ParcelVizError::InvalidGeometry(format!(
            "buffer distance must be a non-negative number, got {}",
            distance
        )));
    }
    let bounds = geometry
        .bounds()
        .ok_or_else(|| ParcelVizError::InvalidGeometry("geometry has no coordinates".into()))?;
    Ok(bounds.expand(distance))
}

/// Reproject `geometry` into `target` and compute its buffered extent there.
pub fn buffered_extent(
    geometry: &Geometry,
    source: CrsCode,
    target: CrsCode,
    buffer_feet: f64,
) -> ParcelVizResult<(Geometry, Extent)> {
    buffered_extent_with(&BuiltinReprojector, geometry, source, target, buffer_feet)
}

/// [`buffered_extent`] with a caller-supplied reprojection engine.
pub fn buffered_extent_with(
    reprojector: &dyn Reprojector,
    geometry: &Geometry,
    source: CrsCode,
    target: CrsCode,
    buffer_feet: f64,
) -> ParcelVizResult<(Geometry, Extent)> {
    if geometry.is_empty() {
        return Err(ParcelVizError::InvalidGeometry(
            "geometry has no coordinates".into(),
        ));
    }

    let projected = reprojector.reproject(geometry, source, target)?;
    let distance = feet_to_units(buffer_feet, target)?;
    let bbox = buffer(&projected, distance)?;

    debug!(
        source = %source,
        target = %target,
        buffer_feet,
        distance,
        "Computed buffered extent"
    );

    Ok((projected, Extent::new(bbox, target)))
}
