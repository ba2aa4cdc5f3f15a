//! Coordinate reference system transformations and layer extents.
//!
//! Implements the handful of projections parcel layers are served in from
//! scratch without external dependencies.

pub mod extent;
pub mod mercator;
pub mod transform;
pub mod units;
pub mod utm;

pub use extent::{buffer, buffered_extent, buffered_extent_with, Extent};
pub use transform::{transform_point, BuiltinReprojector, Reprojector};
pub use units::{feet_to_unit, feet_to_units};
pub use utm::{Ellipsoid, TransverseMercator};
