//! Colour constants and 0-255 conversions for RGB outputs.
//!
//! Patterns work in normalized `Srgb` values; these helpers cover the
//! 8-bit component style scripts usually write colours in.

use palette::Srgb;

pub const BLACK: Srgb = Srgb::new(0.0, 0.0, 0.0);
pub const WHITE: Srgb = Srgb::new(1.0, 1.0, 1.0);
pub const RED: Srgb = Srgb::new(1.0, 0.0, 0.0);
pub const GREEN: Srgb = Srgb::new(0.0, 1.0, 0.0);
pub const BLUE: Srgb = Srgb::new(0.0, 0.0, 1.0);

/// Colours visited by [`crate::Pattern::cycle`] when none are given.
pub const CYCLE_COLORS: [Srgb; 3] = [RED, GREEN, BLUE];

/// Converts a normalized colour to 0-255 components, rounding to nearest.
pub fn to_255(color: Srgb) -> [u8; 3] {
    let scale = |v: f32| (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u8;
    [scale(color.red), scale(color.green), scale(color.blue)]
}

/// Converts 0-255 components to a normalized colour.
pub fn from_255(color: [u8; 3]) -> Srgb {
    let [r, g, b] = color;
    Srgb::new(f32::from(r) / 255.0, f32::from(g) / 255.0, f32::from(b) / 255.0)
}
