//! Geometry reprojection between the supported CRS families.
//!
//! Every pair goes through geographic coordinates: the source is unprojected
//! to lon/lat and the result projected into the target. 4326 and 4269 are
//! treated as the same datum.

use parcel_common::{
    CrsCode, CrsKind, Geometry, ParcelVizError, ParcelVizResult, Position,
};

use crate::mercator;
use crate::utm::{Ellipsoid, TransverseMercator};

/// Moves geometries between coordinate reference systems.
pub trait Reprojector: Send + Sync {
    fn reproject(&self, geometry: &Geometry, from: CrsCode, to: CrsCode)
        -> ParcelVizResult<Geometry>;
}

/// Closed-form projections for geographic, Web Mercator and UTM codes.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinReprojector;

impl Reprojector for BuiltinReprojector {
    fn reproject(
        &self,
        geometry: &Geometry,
        from: CrsCode,
        to: CrsCode,
    ) -> ParcelVizResult<Geometry> {
        if from == to {
            return Ok(geometry.clone());
        }

        let (Some(source), Some(target)) = (Projection::for_crs(from), Projection::for_crs(to))
        else {
            return Err(ParcelVizError::UnsupportedProjection { from, to });
        };

        geometry.try_map_positions(|p| {
            let (lon, lat) = source.unproject(p.x, p.y);
            let (x, y) = target.project(lon, lat);
            if x.is_finite() && y.is_finite() {
                Ok(Position::new(x, y))
            } else {
                Err(ParcelVizError::InvalidGeometry(format!(
                    "({}, {}) has no finite position in {}",
                    p.x, p.y, to
                )))
            }
        })
    }
}

/// Transform a single point. Convenience wrapper over [`BuiltinReprojector`].
pub fn transform_point(x: f64, y: f64, from: CrsCode, to: CrsCode) -> ParcelVizResult<(f64, f64)> {
    let point = Geometry::Point {
        coordinates: Position::new(x, y),
    };
    match BuiltinReprojector.reproject(&point, from, to)? {
        Geometry::Point { coordinates } => Ok((coordinates.x, coordinates.y)),
        _ => Err(ParcelVizError::Internal("point reprojected to non-point".into())),
    }
}

enum Projection {
    Geographic,
    WebMercator,
    Utm(TransverseMercator),
}

impl Projection {
    fn for_crs(crs: CrsCode) -> Option<Projection> {
        match crs.kind() {
            CrsKind::Geographic => Some(Projection::Geographic),
            CrsKind::WebMercator => Some(Projection::WebMercator),
            CrsKind::Utm { zone, north } => {
                let ellipsoid = if (26901..=26923).contains(&crs.code()) {
                    Ellipsoid::GRS80
                } else {
                    Ellipsoid::WGS84
                };
                Some(Projection::Utm(TransverseMercator::new(zone, north, ellipsoid)))
            }
            CrsKind::Albers | CrsKind::StatePlane | CrsKind::Unknown => None,
        }
    }

    fn unproject(&self, x: f64, y: f64) -> (f64, f64) {
        match self {
            Projection::Geographic => (x, y),
            Projection::WebMercator => mercator::inverse(x, y),
            Projection::Utm(tm) => tm.inverse(x, y),
        }
    }

    fn project(&self, lon: f64, lat: f64) -> (f64, f64) {
        match self {
            Projection::Geographic => (lon, lat),
            Projection::WebMercator => mercator::forward(lon, lat),
            Projection::Utm(tm) => tm.forward(lon, lat),
        }
    }
}
