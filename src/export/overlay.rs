//! Export watermark compositing.
//!
//! The watermark is drawn onto a copy of the frame: a darkened band at the
//! top holding a status dot, and a darkened band at the bottom holding the
//! caption.

use super::font::{self, GLYPH_ADVANCE, GLYPH_HEIGHT, GLYPH_WIDTH};
use crate::capture::{Frame, FrameError, BYTES_PER_PIXEL};

/// Band darkening factor applied to RGB.
const BAND_SHADE: f32 = 0.35;

const CAPTION_COLOR: [u8; 3] = [255, 255, 255];

/// Small indicator drawn in the top band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusGlyph {
    /// Still capture from the live view.
    #[default]
    Live,
    /// Frame taken while recording.
    Recording,
}

impl StatusGlyph {
    pub fn color(self) -> [u8; 3] {
        match self {
            StatusGlyph::Live => [148, 0, 211],
            StatusGlyph::Recording => [230, 30, 30],
        }
    }
}

/// Caption and status stamp for exported frames.
#[derive(Debug, Clone)]
pub struct Watermark {
    caption: String,
    band_height: u32,
}

impl Watermark {
    pub fn new(caption: impl Into<String>, band_height: u32) -> Self {
        Self {
            caption: caption.into(),
            band_height,
        }
    }

    pub fn caption(&self) -> &str {
        &self.caption
    }

    /// Band height actually used for a frame of `height` rows.
    ///
    /// Bands never cover more than half the frame each.
    pub fn effective_band(&self, height: u32) -> u32 {
        self.band_height.min(height / 2)
    }

    /// Returns a stamped copy of `frame`. The input is never modified.
    pub fn apply(&self, frame: &Frame, status: StatusGlyph) -> Result<Frame, FrameError> {
        frame.validate()?;
        let mut out = frame.clone();

        let height = out.height();
        let band = self.effective_band(height);
        if band == 0 {
            return Ok(out);
        }

        let bottom = height - band;
        shade_rows(&mut out, 0, band);
        shade_rows(&mut out, bottom, height);

        self.draw_status(&mut out, band, status);
        self.draw_caption(&mut out, bottom, band);
        Ok(out)
    }

    fn draw_status(&self, frame: &mut Frame, band: u32, status: StatusGlyph) {
        let radius = (band / 4).max(1) as i64;
        let cx = (band / 2) as i64;
        let cy = (band / 2) as i64;
        let color = status.color();

        for y in (cy - radius)..=(cy + radius) {
            for x in (cx - radius)..=(cx + radius) {
                let (dx, dy) = (x - cx, y - cy);
                if dx * dx + dy * dy <= radius * radius && y >= 0 && x >= 0 {
                    put_rgb(frame, x as u32, y as u32, color);
                }
            }
        }
    }

    fn draw_caption(&self, frame: &mut Frame, band_top: u32, band: u32) {
        // Two rows of padding around the glyph height
        let scale = (band / (GLYPH_HEIGHT + 2)).max(1);
        let text_w = font::text_width(&self.caption) * scale;
        let text_h = GLYPH_HEIGHT * scale;
        if text_h > band {
            return;
        }

        let x0 = frame.width().saturating_sub(text_w) / 2;
        let y0 = band_top + (band - text_h) / 2;

        for (i, c) in self.caption.chars().enumerate() {
            let cell_x = x0 + i as u32 * GLYPH_ADVANCE * scale;
            for gy in 0..GLYPH_HEIGHT {
                for gx in 0..GLYPH_WIDTH {
                    if !font::is_lit(c, gx, gy) {
                        continue;
                    }
                    for sy in 0..scale {
                        for sx in 0..scale {
                            put_rgb(
                                frame,
                                cell_x + gx * scale + sx,
                                y0 + gy * scale + sy,
                                CAPTION_COLOR,
                            );
                        }
                    }
                }
            }
        }
    }
}

impl Default for Watermark {
    fn default() -> Self {
        Self::new("SPECTRAL TINT", 24)
    }
}

fn shade_rows(frame: &mut Frame, from: u32, to: u32) {
    let stride = frame.stride();
    let start = from as usize * stride;
    let end = to as usize * stride;
    for px in frame.pixels_mut()[start..end].chunks_exact_mut(BYTES_PER_PIXEL) {
        for c in &mut px[..3] {
            *c = (f32::from(*c) * BAND_SHADE).round() as u8;
        }
    }
}

/// Writes RGB at `(x, y)`; out-of-bounds writes are dropped.
fn put_rgb(frame: &mut Frame, x: u32, y: u32, rgb: [u8; 3]) {
    if x >= frame.width() || y >= frame.height() {
        return;
    }
    let i = y as usize * frame.stride() + x as usize * BYTES_PER_PIXEL;
    frame.pixels_mut()[i..i + 3].copy_from_slice(&rgb);
}
