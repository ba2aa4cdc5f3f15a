//! Title and message text drawn with the bundled DejaVu Sans Mono face.

use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_text_mut;
use parcel_common::{ParcelVizError, ParcelVizResult};
use rusttype::{point, Font, Scale};

const FONT_DATA: &[u8] = include_bytes!("../assets/DejaVuSansMono.ttf");

/// The bundled font at one pixel size.
#[derive(Clone)]
pub struct Typeface {
    font: Font<'static>,
    scale: Scale,
}

impl std::fmt::Debug for Typeface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Typeface").field("scale", &self.scale.y).finish()
    }
}

impl Typeface {
    /// Typeface for a size given in points at the given resolution.
    pub fn from_points(size_pt: f32, dpi: u32) -> ParcelVizResult<Self> {
        let font = Font::try_from_bytes(FONT_DATA).ok_or_else(|| {
            ParcelVizError::Composition("bundled font could not be loaded".to_string())
        })?;
        let px = (size_pt * dpi as f32 / 72.0).max(6.0);
        Ok(Self {
            font,
            scale: Scale::uniform(px),
        })
    }

    pub fn font(&self) -> &Font<'static> {
        &self.font
    }

    /// Baseline-to-baseline distance in pixels.
    pub fn line_height(&self) -> f32 {
        let v = self.font.v_metrics(self.scale);
        v.ascent - v.descent + v.line_gap
    }

    /// Advance width of a single line, kerning included.
    pub fn text_width(&self, text: &str) -> f32 {
        self.font
            .layout(text, self.scale, point(0.0, 0.0))
            .last()
            .map(|g| g.position().x + g.unpositioned().h_metrics().advance_width)
            .unwrap_or(0.0)
    }

    /// Greedy word wrap to `max_width` pixels. Words that cannot fit on a
    /// line of their own are split between characters.
    pub fn wrap(&self, text: &str, max_width: f32) -> Vec<String> {
        let mut lines = Vec::new();
        for paragraph in text.lines() {
            let mut current = String::new();
            for word in paragraph.split_whitespace() {
                let candidate = if current.is_empty() {
                    word.to_string()
                } else {
                    format!("{} {}", current, word)
                };
                if self.text_width(&candidate) <= max_width {
                    current = candidate;
                    continue;
                }

                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                for ch in word.chars() {
                    current.push(ch);
                    if self.text_width(&current) > max_width && current.chars().count() > 1 {
                        current.pop();
                        lines.push(std::mem::replace(&mut current, ch.to_string()));
                    }
                }
            }
            if !current.is_empty() {
                lines.push(current);
            }
        }
        lines
    }

    /// Draw one line with the top of its line box at `(x, y)`.
    pub fn draw(&self, image: &mut RgbaImage, text: &str, x: f32, y: f32, color: Rgba<u8>) {
        draw_text_mut(
            image,
            color,
            x.round() as i32,
            y.round() as i32,
            self.scale,
            &self.font,
            text,
        );
    }
}
