//! Per-pixel spectral tint transform.
//!
//! The transform runs in four separate stages (spectral pass, darkness,
//! contrast, blend) followed by a hard clamp. The stages are kept apart
//! so each constant can be tested on its own.

use serde::{Deserialize, Serialize};

/// Fraction of red light passed by the filter.
pub const RED_TRANSMISSION: f32 = 0.25;
/// Fraction of green light passed by the filter.
pub const GREEN_TRANSMISSION: f32 = 0.05;
/// Fraction of blue light passed by the filter.
pub const BLUE_TRANSMISSION: f32 = 0.95;
/// Overall darkening applied after the spectral pass.
pub const DARKNESS_FACTOR: f32 = 0.55;
/// Portion of the red input leaked into blue (violet shift).
pub const VIOLET_MIX: f32 = 0.18;
/// Contrast expansion factor around [`CONTRAST_MIDPOINT`].
pub const CONTRAST_BOOST: f32 = 1.2;
/// Pivot value for the contrast stage.
pub const CONTRAST_MIDPOINT: f32 = 128.0;

/// Filter intensity, always within `[0.0, 1.0]`.
///
/// `0.0` leaves pixels untouched, `1.0` applies the full filter.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(from = "f32", into = "f32")]
pub struct Intensity(f32);

impl Intensity {
    /// No filtering.
    pub const OFF: Intensity = Intensity(0.0);
    /// Full filtering.
    pub const FULL: Intensity = Intensity(1.0);
    /// Session default: near-full darkness.
    pub const DEFAULT: Intensity = Intensity(0.85);

    /// Creates an intensity, clamping into `[0.0, 1.0]`. NaN maps to zero.
    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            return Self::OFF;
        }
        Self(value.clamp(0.0, 1.0))
    }

    /// Maps a 0-100 control value onto `[0.0, 1.0]`. Values above 100 saturate.
    pub fn from_percent(percent: u8) -> Self {
        Self::new(f32::from(percent.min(100)) / 100.0)
    }

    /// Returns the raw scalar.
    #[inline]
    pub fn value(self) -> f32 {
        self.0
    }

    /// Returns the value as a 0-100 control position.
    pub fn percent(self) -> u8 {
        (self.0 * 100.0).round() as u8
    }

    /// True when the filter has no visible effect.
    #[inline]
    pub fn is_off(self) -> bool {
        self.0 <= 0.0
    }
}

impl Default for Intensity {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<f32> for Intensity {
    fn from(value: f32) -> Self {
        Self::new(value)
    }
}

impl From<Intensity> for f32 {
    fn from(intensity: Intensity) -> Self {
        intensity.0
    }
}

/// Stage 1: asymmetric band-pass with a red-into-blue leak.
#[inline]
pub fn spectral_pass(r: f32, g: f32, b: f32) -> [f32; 3] {
    [
        r * RED_TRANSMISSION,
        g * GREEN_TRANSMISSION,
        b * BLUE_TRANSMISSION + r * VIOLET_MIX,
    ]
}

/// Stage 2: uniform darkening.
#[inline]
pub fn darken(channels: [f32; 3]) -> [f32; 3] {
    channels.map(|c| c * DARKNESS_FACTOR)
}

/// Stage 3: contrast expansion around the midpoint.
#[inline]
pub fn contrast(channels: [f32; 3]) -> [f32; 3] {
    channels.map(|f| (f - CONTRAST_MIDPOINT) * CONTRAST_BOOST + CONTRAST_MIDPOINT)
}

/// Stage 4: convex blend between the original and filtered channel.
#[inline]
pub fn blend(original: f32, filtered: f32, t: f32) -> f32 {
    original * (1.0 - t) + filtered * t
}

/// Stage 5: round to nearest and hard-clamp into the 8-bit range.
#[inline]
pub fn clamp_channel(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Stateless spectral tint transform.
///
/// Deterministic: identical inputs always give identical outputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColorTransform;

impl ColorTransform {
    /// Returns the unblended, unclamped filter output for one pixel.
    #[inline]
    pub fn filtered(r: u8, g: u8, b: u8) -> [f32; 3] {
        let pass = spectral_pass(f32::from(r), f32::from(g), f32::from(b));
        contrast(darken(pass))
    }

    /// Transforms one RGBA pixel. Alpha is copied through unchanged.
    #[inline]
    pub fn apply(pixel: [u8; 4], intensity: Intensity) -> [u8; 4] {
        if intensity.is_off() {
            return pixel;
        }

        let t = intensity.value();
        let [r, g, b, a] = pixel;
        let [fr, fg, fb] = Self::filtered(r, g, b);

        [
            clamp_channel(blend(f32::from(r), fr, t)),
            clamp_channel(blend(f32::from(g), fg, t)),
            clamp_channel(blend(f32::from(b), fb, t)),
            a,
        ]
    }

    /// Transforms an interleaved RGBA slice in place.
    ///
    /// Trailing bytes that do not form a whole pixel are left untouched;
    /// callers validate buffer shape beforehand.
    pub fn apply_slice(pixels: &mut [u8], intensity: Intensity) {
        if intensity.is_off() {
            return;
        }
        for px in pixels.chunks_exact_mut(4) {
            let out = Self::apply([px[0], px[1], px[2], px[3]], intensity);
            px.copy_from_slice(&out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 0.01
    }

    #[test]
    fn test_spectral_pass_white() {
        let [r, g, b] = spectral_pass(255.0, 255.0, 255.0);
        assert!(approx(r, 63.75));
        assert!(approx(g, 12.75));
        assert!(approx(b, 288.15));
    }

    #[test]
    fn test_blue_has_no_leak_into_red() {
        let [r, g, _] = spectral_pass(0.0, 0.0, 255.0);
        assert_eq!(r, 0.0);
        assert_eq!(g, 0.0);
    }

    #[test]
    fn test_darken_and_contrast_stages() {
        let dark = darken([100.0, 0.0, 200.0]);
        assert!(approx(dark[0], 55.0));
        assert!(approx(dark[2], 110.0));

        // Midpoint is a fixed point of the contrast stage
        let c = contrast([128.0, 0.0, 255.0]);
        assert!(approx(c[0], 128.0));
        assert!(approx(c[1], -25.6));
        assert!(approx(c[2], 280.4));
    }

    #[test]
    fn test_zero_intensity_is_identity() {
        let px = [12, 200, 99, 7];
        assert_eq!(ColorTransform::apply(px, Intensity::OFF), px);
    }

    #[test]
    fn test_full_intensity_white() {
        let [r, g, b, a] = ColorTransform::apply([255, 255, 255, 255], Intensity::FULL);
        // Reference value is 16.475 before rounding
        assert!((16..=17).contains(&r), "red was {}", r);
        assert_eq!(g, 0);
        assert!((164..=165).contains(&b), "blue was {}", b);
        assert_eq!(a, 255);
    }

    #[test]
    fn test_clamp_channel_saturates() {
        assert_eq!(clamp_channel(-40.0), 0);
        assert_eq!(clamp_channel(300.0), 255);
        assert_eq!(clamp_channel(127.6), 128);
    }

    #[test]
    fn test_intensity_clamps_and_maps_percent() {
        assert_eq!(Intensity::new(1.7).value(), 1.0);
        assert_eq!(Intensity::new(-0.2).value(), 0.0);
        assert_eq!(Intensity::new(f32::NAN), Intensity::OFF);
        assert_eq!(Intensity::from_percent(50).value(), 0.5);
        assert_eq!(Intensity::from_percent(250), Intensity::FULL);
        assert_eq!(Intensity::default().percent(), 85);
    }

    #[test]
    fn test_apply_slice_preserves_alpha() {
        let mut buf = vec![255, 128, 0, 42, 10, 20, 30, 200];
        ColorTransform::apply_slice(&mut buf, Intensity::FULL);
        assert_eq!(buf[3], 42);
        assert_eq!(buf[7], 200);
    }
}
