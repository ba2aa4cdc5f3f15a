//! XYZ (slippy map) tile helpers for Web Mercator tiled sources.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::BoundingBox;

/// Latitude limit of the Web Mercator tile pyramid.
pub const MAX_MERCATOR_LAT: f64 = 85.051129;

const LL_EPSILON: f64 = 1e-11;

/// A tile coordinate (z/x/y).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    /// Zoom level
    pub z: u32,
    /// Column (x)
    pub x: u32,
    /// Row (y), counted from the north edge
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u32, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Tile containing a lon/lat point. Out-of-range points clamp to the edge tiles.
    pub fn containing(lon: f64, lat: f64, zoom: u32) -> Self {
        let n = 2f64.powi(zoom as i32);
        let max_index = n - 1.0;

        let x = ((lon + 180.0) / 360.0 * n).floor();
        let lat_rad = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians();
        let y = ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n).floor();

        TileCoord {
            z: zoom,
            x: x.clamp(0.0, max_index) as u32,
            y: y.clamp(0.0, max_index) as u32,
        }
    }

    /// Lon/lat bounds of the tile.
    pub fn bounds(&self) -> BoundingBox {
        let n = 2f64.powi(self.z as i32);

        let lon_min = self.x as f64 / n * 360.0 - 180.0;
        let lon_max = (self.x + 1) as f64 / n * 360.0 - 180.0;

        let lat_max = (PI * (1.0 - 2.0 * self.y as f64 / n)).sinh().atan().to_degrees();
        let lat_min = (PI * (1.0 - 2.0 * (self.y + 1) as f64 / n))
            .sinh()
            .atan()
            .to_degrees();

        BoundingBox::new(lon_min, lat_min, lon_max, lat_max)
    }

    /// "z/x/y" path fragment.
    pub fn cache_key(&self) -> String {
        format!("{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Tiles at `zoom` covering lon/lat `bounds`, row-major within each column sweep.
///
/// Bounds crossing the antimeridian (`min_x > max_x`) are split in two.
pub fn tiles_for_extent(bounds: &BoundingBox, zoom: u32) -> Vec<TileCoord> {
    let parts = if bounds.min_x > bounds.max_x {
        vec![
            BoundingBox::new(-180.0, bounds.min_y, bounds.max_x, bounds.max_y),
            BoundingBox::new(bounds.min_x, bounds.min_y, 180.0, bounds.max_y),
        ]
    } else {
        vec![*bounds]
    };

    let mut tiles = Vec::new();
    for part in parts {
        let west = part.min_x.max(-180.0);
        let south = part.min_y.max(-MAX_MERCATOR_LAT);
        let east = part.max_x.min(180.0);
        let north = part.max_y.min(MAX_MERCATOR_LAT);

        let upper_left = TileCoord::containing(west, north, zoom);
        let lower_right = TileCoord::containing(east - LL_EPSILON, south + LL_EPSILON, zoom);

        for x in upper_left.x..=lower_right.x {
            for y in upper_left.y..=lower_right.y {
                tiles.push(TileCoord::new(zoom, x, y));
            }
        }
    }
    tiles
}
