//! Figure canvas: page layout, title band and the world-to-pixel frame.

use image::{Rgba, RgbaImage};
use parcel_common::{Geometry, ParcelVizError, ParcelVizResult, Position};
use projection::Extent;
use tiny_skia::{
    Color, FillRule, LineCap, LineJoin, Mask, Paint, PathBuilder, Pixmap, Rect, Stroke, Transform,
};

use crate::png::create_png;
use crate::style::Rgb;
use crate::text::Typeface;

/// Title font size in points.
pub const TITLE_SIZE_PT: f32 = 12.0;

/// Output figure dimensions and heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FigureSpec {
    pub width: u32,
    pub height: u32,
    pub dpi: u32,
    pub title: Option<String>,
}

impl FigureSpec {
    pub fn new(width: u32, height: u32, dpi: u32) -> Self {
        Self {
            width,
            height,
            dpi,
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Convert a length in points to pixels at this figure's resolution.
    pub fn points_to_px(&self, points: f32) -> f32 {
        points * self.dpi as f32 / 72.0
    }
}

/// Pixel rectangle the map is drawn into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawArea {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Maps extent coordinates onto the draw area with equal x/y scale,
/// centering the extent along the slack axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapFrame {
    scale: f64,
    origin_x: f64,
    origin_y: f64,
    min_x: f64,
    max_y: f64,
}

impl MapFrame {
    pub fn fit(extent: &Extent, area: DrawArea) -> Self {
        let span_x = if extent.width() > 0.0 { extent.width() } else { 1.0 };
        let span_y = if extent.height() > 0.0 { extent.height() } else { 1.0 };

        let scale = (area.width as f64 / span_x).min(area.height as f64 / span_y);
        let origin_x = area.x as f64 + (area.width as f64 - extent.width() * scale) / 2.0;
        let origin_y = area.y as f64 + (area.height as f64 - extent.height() * scale) / 2.0;

        Self {
            scale,
            origin_x,
            origin_y,
            min_x: extent.min_x(),
            max_y: extent.max_y(),
        }
    }

    /// Pixels per world unit.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// World coordinate to pixel position (y grows downward).
    pub fn to_pixel(&self, x: f64, y: f64) -> (f32, f32) {
        (
            (self.origin_x + (x - self.min_x) * self.scale) as f32,
            (self.origin_y + (self.max_y - y) * self.scale) as f32,
        )
    }
}

/// How a geometry is painted.
#[derive(Debug, Clone, Copy)]
pub struct GeometryPaint {
    pub fill: [u8; 4],
    pub stroke: [u8; 4],
    /// Stroke width in pixels
    pub stroke_width: f32,
    /// Point marker radius in pixels
    pub point_radius: f32,
}

/// Text placed on the page after all shapes.
struct Label {
    face: Typeface,
    text: String,
    x: f32,
    y: f32,
}

/// A white page with an optional title band and a clipped map area.
pub struct Canvas {
    pixmap: Pixmap,
    dpi: u32,
    area: DrawArea,
    clip: Option<Mask>,
    labels: Vec<Label>,
}

impl Canvas {
    pub fn new(figure: &FigureSpec) -> ParcelVizResult<Self> {
        let mut pixmap = Pixmap::new(figure.width, figure.height).ok_or_else(|| {
            ParcelVizError::Composition(format!(
                "cannot allocate a {}x{} canvas",
                figure.width, figure.height
            ))
        })?;
        pixmap.fill(Color::WHITE);

        let pad = 0.05 * figure.dpi as f32;
        let mut top = pad;

        let mut labels = Vec::new();
        let title = figure.title.as_deref().map(str::trim).filter(|t| !t.is_empty());
        if let Some(title) = title {
            let face = Typeface::from_points(TITLE_SIZE_PT, figure.dpi)?;
            let x = figure.width as f32 / 2.0 - face.text_width(title) / 2.0;
            top += face.line_height();
            labels.push(Label {
                face,
                text: title.to_string(),
                x,
                y: pad,
            });
        }

        let area = DrawArea {
            x: pad,
            y: top,
            width: (figure.width as f32 - 2.0 * pad).max(1.0),
            height: (figure.height as f32 - top - pad).max(1.0),
        };

        let clip = Rect::from_xywh(area.x, area.y, area.width, area.height).and_then(|rect| {
            let mut mask = Mask::new(figure.width, figure.height)?;
            mask.fill_path(
                &PathBuilder::from_rect(rect),
                FillRule::Winding,
                false,
                Transform::identity(),
            );
            Some(mask)
        });

        Ok(Self {
            pixmap,
            dpi: figure.dpi,
            area,
            clip,
            labels,
        })
    }

    pub fn area(&self) -> DrawArea {
        self.area
    }

    /// Queue one line of black text with the top of its line box at `(x, y)`.
    /// Text is drawn over every shape when the canvas is encoded.
    pub fn draw_text(&mut self, face: &Typeface, text: &str, x: f32, y: f32) {
        self.labels.push(Label {
            face: face.clone(),
            text: text.to_string(),
            x,
            y,
        });
    }

    /// Split borrow used when drawing with the clip mask.
    pub(crate) fn parts_mut(&mut self) -> (&mut Pixmap, Option<&Mask>) {
        (&mut self.pixmap, self.clip.as_ref())
    }

    pub fn frame(&self, extent: &Extent) -> MapFrame {
        MapFrame::fit(extent, self.area)
    }

    /// Fill polygons, stroke polygon rings and lines, and disc points.
    pub fn draw_geometry(&mut self, geometry: &Geometry, frame: &MapFrame, style: &GeometryPaint) {
        let mut areas = PathBuilder::new();
        let mut lines = PathBuilder::new();
        let mut points = Vec::new();

        match geometry {
            Geometry::Point { coordinates } => points.push(*coordinates),
            Geometry::MultiPoint { coordinates } => points.extend(coordinates.iter().copied()),
            Geometry::LineString { coordinates } => add_polyline(&mut lines, coordinates, frame, false),
            Geometry::MultiLineString { coordinates } => {
                for line in coordinates {
                    add_polyline(&mut lines, line, frame, false);
                }
            }
            Geometry::Polygon { coordinates } => {
                for ring in coordinates {
                    add_polyline(&mut areas, ring, frame, true);
                }
            }
            Geometry::MultiPolygon { coordinates } => {
                for ring in coordinates.iter().flatten() {
                    add_polyline(&mut areas, ring, frame, true);
                }
            }
        }

        let fill = paint_for(style.fill);
        let outline = paint_for(style.stroke);
        let stroke = line_stroke(style.stroke_width);
        let (pixmap, clip) = self.parts_mut();

        if let Some(path) = areas.finish() {
            if style.fill[3] > 0 {
                pixmap.fill_path(&path, &fill, FillRule::EvenOdd, Transform::identity(), clip);
            }
            if style.stroke_width > 0.0 {
                pixmap.stroke_path(&path, &outline, &stroke, Transform::identity(), clip);
            }
        }

        if let Some(path) = lines.finish() {
            if style.stroke_width > 0.0 {
                pixmap.stroke_path(&path, &outline, &stroke, Transform::identity(), clip);
            }
        }

        for point in points {
            let (px, py) = frame.to_pixel(point.x, point.y);
            if let Some(circle) = PathBuilder::from_circle(px, py, style.point_radius.max(1.0)) {
                pixmap.fill_path(&circle, &fill, FillRule::Winding, Transform::identity(), clip);
                if style.stroke_width > 0.0 {
                    pixmap.stroke_path(&circle, &outline, &stroke, Transform::identity(), clip);
                }
            }
        }
    }

    /// Flatten shapes and text into a straight-alpha image.
    pub fn to_image(&self) -> ParcelVizResult<RgbaImage> {
        let mut rgba = Vec::with_capacity(self.pixmap.data().len());
        for pixel in self.pixmap.pixels() {
            let c = pixel.demultiply();
            rgba.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
        }
        let mut image = RgbaImage::from_raw(self.pixmap.width(), self.pixmap.height(), rgba)
            .ok_or_else(|| ParcelVizError::Composition("canvas buffer size mismatch".to_string()))?;

        for label in &self.labels {
            label
                .face
                .draw(&mut image, &label.text, label.x, label.y, Rgba([0, 0, 0, 255]));
        }
        Ok(image)
    }

    /// Encode the canvas as PNG with the figure's DPI.
    pub fn encode_png(&self) -> ParcelVizResult<Vec<u8>> {
        let image = self.to_image()?;
        create_png(
            image.as_raw(),
            image.width() as usize,
            image.height() as usize,
            self.dpi,
        )
        .map_err(ParcelVizError::Composition)
    }
}

fn add_polyline(pb: &mut PathBuilder, coords: &[Position], frame: &MapFrame, close: bool) {
    let mut iter = coords.iter();
    let Some(first) = iter.next() else {
        return;
    };
    let (x, y) = frame.to_pixel(first.x, first.y);
    pb.move_to(x, y);
    for p in iter {
        let (x, y) = frame.to_pixel(p.x, p.y);
        pb.line_to(x, y);
    }
    if close {
        pb.close();
    }
}

fn paint_for(rgba: [u8; 4]) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(rgba[0], rgba[1], rgba[2], rgba[3]);
    paint.anti_alias = true;
    paint
}

fn line_stroke(width: f32) -> Stroke {
    let mut stroke = Stroke::default();
    stroke.width = width;
    stroke.line_cap = LineCap::Round;
    stroke.line_join = LineJoin::Round;
    stroke
}

impl GeometryPaint {
    /// Paint with `fill` at `fill_alpha` and an opaque `stroke` of `width_pt` points.
    pub fn new(fill: Rgb, fill_alpha: f32, stroke: Rgb, width_pt: f32, figure: &FigureSpec) -> Self {
        let stroke_width = figure.points_to_px(width_pt);
        Self {
            fill: fill.with_alpha(fill_alpha),
            stroke: stroke.with_alpha(1.0),
            stroke_width,
            point_radius: figure.points_to_px(3.0).max(stroke_width),
        }
    }
}
