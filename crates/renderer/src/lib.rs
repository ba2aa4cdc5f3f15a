//! Map image rendering for parcel layers.
//!
//! Implements three kinds of output:
//! - Vector features over the parcel outline
//! - Raster imagery stretched to the layer extent
//! - Placeholder pages carrying an error message

pub mod canvas;
pub mod compose;
pub mod png;
pub mod style;
pub mod text;

pub use canvas::{Canvas, FigureSpec, MapFrame};
pub use compose::{compose_placeholder, compose_raster, compose_vector};
pub use style::{hex_to_rgb, ParcelStyle, RasterStyle, Rgb, VectorStyle};
pub use text::Typeface;
