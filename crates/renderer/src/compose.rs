//! Map composition: one layer plus the parcel outline into one PNG file.
//!
//! All entry points are synchronous and CPU-bound. Async callers should run
//! them on a blocking thread.

use std::path::Path;

use image::RgbaImage;
use parcel_common::{FeatureCollection, Geometry, ParcelVizError, ParcelVizResult, StyleMap};
use projection::Extent;
use tiny_skia::{
    BlendMode, ColorU8, FilterQuality, Pixmap, PixmapPaint, PremultipliedColorU8, Transform,
};
use tracing::debug;

use crate::canvas::{Canvas, FigureSpec, GeometryPaint, MapFrame};
use crate::png::write_atomic;
use crate::style::{ParcelStyle, RasterStyle, VectorStyle};
use crate::text::Typeface;

/// Placeholder message font size in points.
const MESSAGE_SIZE_PT: f32 = 12.0;

/// Render vector features with the parcel outline on top.
pub fn compose_vector(
    path: &Path,
    figure: &FigureSpec,
    extent: &Extent,
    parcel: &Geometry,
    features: &FeatureCollection,
    style: &StyleMap,
) -> ParcelVizResult<()> {
    let mut canvas = Canvas::new(figure)?;
    let frame = canvas.frame(extent);

    let vector = VectorStyle::from_style(style);
    let paint = GeometryPaint::new(
        vector.fill,
        vector.fill_alpha,
        vector.outline,
        vector.line_width,
        figure,
    );

    let mut drawn = 0usize;
    for geometry in features.features.iter().filter_map(|f| f.geometry.as_ref()) {
        canvas.draw_geometry(geometry, &frame, &paint);
        drawn += 1;
    }

    draw_parcel(&mut canvas, &frame, parcel, style, figure);

    debug!(path = %path.display(), features = drawn, "Composed vector layer");
    write_atomic(path, &canvas.encode_png()?)
}

/// Render a raster image stretched over the extent with the parcel outline on top.
pub fn compose_raster(
    path: &Path,
    figure: &FigureSpec,
    extent: &Extent,
    parcel: &Geometry,
    image: &RgbaImage,
    style: &StyleMap,
) -> ParcelVizResult<()> {
    let mut canvas = Canvas::new(figure)?;
    let frame = canvas.frame(extent);

    let source = rgba_to_pixmap(image)?;
    let raster = RasterStyle::from_style(style);

    let (left, top) = frame.to_pixel(extent.min_x(), extent.max_y());
    let (right, bottom) = frame.to_pixel(extent.max_x(), extent.min_y());
    let sx = (right - left) / source.width() as f32;
    let sy = (bottom - top) / source.height() as f32;

    let paint = PixmapPaint {
        opacity: raster.opacity,
        blend_mode: BlendMode::SourceOver,
        quality: FilterQuality::Bilinear,
    };
    let (pixmap, clip) = canvas.parts_mut();
    pixmap.draw_pixmap(
        0,
        0,
        source.as_ref(),
        &paint,
        Transform::from_row(sx, 0.0, 0.0, sy, left, top),
        clip,
    );

    draw_parcel(&mut canvas, &frame, parcel, style, figure);

    debug!(
        path = %path.display(),
        width = image.width(),
        height = image.height(),
        "Composed raster layer"
    );
    write_atomic(path, &canvas.encode_png()?)
}

/// Render a page holding only the title and a centered, wrapped message.
pub fn compose_placeholder(path: &Path, figure: &FigureSpec, message: &str) -> ParcelVizResult<()> {
    let mut canvas = Canvas::new(figure)?;
    let area = canvas.area();

    let face = Typeface::from_points(MESSAGE_SIZE_PT, figure.dpi)?;
    let lines = face.wrap(message, area.width);

    let block_height = lines.len() as f32 * face.line_height();
    let mut y = area.y + (area.height - block_height) / 2.0;

    let center_x = area.x + area.width / 2.0;
    for line in &lines {
        let x = center_x - face.text_width(line) / 2.0;
        canvas.draw_text(&face, line, x, y);
        y += face.line_height();
    }

    debug!(path = %path.display(), lines = lines.len(), "Composed placeholder");
    write_atomic(path, &canvas.encode_png()?)
}

fn draw_parcel(
    canvas: &mut Canvas,
    frame: &MapFrame,
    parcel: &Geometry,
    style: &StyleMap,
    figure: &FigureSpec,
) {
    let parcel_style = ParcelStyle::from_style(style);
    let paint = GeometryPaint::new(
        parcel_style.fill,
        parcel_style.fill_alpha,
        parcel_style.outline,
        parcel_style.outline_width,
        figure,
    );
    canvas.draw_geometry(parcel, frame, &paint);
}

/// Copy straight RGBA into a premultiplied pixmap.
fn rgba_to_pixmap(image: &RgbaImage) -> ParcelVizResult<Pixmap> {
    let mut pixmap = Pixmap::new(image.width(), image.height()).ok_or_else(|| {
        ParcelVizError::Composition(format!(
            "raster image has unusable size {}x{}",
            image.width(),
            image.height()
        ))
    })?;

    let pixels: Vec<PremultipliedColorU8> = image
        .pixels()
        .map(|p| ColorU8::from_rgba(p[0], p[1], p[2], p[3]).premultiply())
        .collect();
    pixmap.pixels_mut().copy_from_slice(&pixels);
    Ok(pixmap)
}
