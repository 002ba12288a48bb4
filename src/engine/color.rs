//! Contrast color selection for highlight marks
//!
//! Category colors paint the mark background; the mark text flips between
//! black and white based on perceived luminance so keywords stay readable
//! on any background the user picks.

use thiserror::Error;

// =============================================================================
// Types
// =============================================================================

/// Mark text color used over light backgrounds
pub const BLACK: &str = "#000000";

/// Mark text color used over dark backgrounds
pub const WHITE: &str = "#ffffff";

/// Parsed RGB components of a hex color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorError {
    #[error("invalid hex color: {0:?}")]
    InvalidHex(String),
}

// =============================================================================
// Parsing
// =============================================================================

/// Parse a `#rgb` or `#rrggbb` hex color into its components.
///
/// Three-digit colors expand per CSS shorthand: `#fa0` is `#ffaa00`.
pub fn parse_hex(color: &str) -> Result<Rgb, ColorError> {
    let digits = match color.strip_prefix('#') {
        Some(d) => d,
        None => return Err(ColorError::InvalidHex(color.to_string())),
    };

    let nibbles: Option<Vec<u8>> = digits
        .chars()
        .map(|c| c.to_digit(16).map(|d| d as u8))
        .collect();
    let nibbles = match nibbles {
        Some(n) => n,
        None => return Err(ColorError::InvalidHex(color.to_string())),
    };

    match *nibbles.as_slice() {
        [r, g, b] => Ok(Rgb {
            r: r * 17,
            g: g * 17,
            b: b * 17,
        }),
        [r1, r0, g1, g0, b1, b0] => Ok(Rgb {
            r: r1 * 16 + r0,
            g: g1 * 16 + g0,
            b: b1 * 16 + b0,
        }),
        _ => Err(ColorError::InvalidHex(color.to_string())),
    }
}

// =============================================================================
// Luminance
// =============================================================================

/// Perceived luminance in [0, 1] using the ITU-R BT.601 weights.
pub fn luminance(rgb: Rgb) -> f64 {
    (0.299 * rgb.r as f64 + 0.587 * rgb.g as f64 + 0.114 * rgb.b as f64) / 255.0
}

/// Pick the readable mark text color for a given background.
///
/// Backgrounds with luminance above 0.5 get black text, the rest get white.
pub fn contrast_color(background: &str) -> Result<&'static str, ColorError> {
    let rgb = parse_hex(background)?;
    if luminance(rgb) > 0.5 {
        Ok(BLACK)
    } else {
        Ok(WHITE)
    }
}

// =============================================================================
// Tests
// =============================================================================
