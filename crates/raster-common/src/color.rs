//! Colour spaces and packed true-colour pixels.
//!
//! Pixels are packed as `0x00RRGGBB` in a `u32`.

use serde::{Deserialize, Serialize};

use crate::error::{RasterError, RasterResult};

/// Colour model of a decoded tile or composed canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorSpace {
    /// Black and white only.
    Monochrome,
    Grayscale,
    /// At most 256 distinct colours.
    Palette,
    Rgb,
}

impl ColorSpace {
    /// Unify a canvas tag with the tag of a tile painted onto it.
    ///
    /// Monochrome adopts the tile's tag; Palette and Grayscale widen to
    /// RGB as soon as a tile of any other model is painted.
    pub fn promote(self, tile: ColorSpace) -> ColorSpace {
        let mut current = self;
        if current == ColorSpace::Monochrome && tile != ColorSpace::Monochrome {
            current = tile;
        }
        if current == ColorSpace::Palette && tile != ColorSpace::Palette {
            current = ColorSpace::Rgb;
        }
        if current == ColorSpace::Grayscale && tile != ColorSpace::Grayscale {
            current = ColorSpace::Rgb;
        }
        current
    }

    /// Generality rank: Monochrome < Grayscale = Palette < Rgb.
    pub fn rank(self) -> u8 {
        match self {
            ColorSpace::Monochrome => 0,
            ColorSpace::Grayscale | ColorSpace::Palette => 1,
            ColorSpace::Rgb => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ColorSpace::Monochrome => "monochrome",
            ColorSpace::Grayscale => "grayscale",
            ColorSpace::Palette => "palette",
            ColorSpace::Rgb => "rgb",
        }
    }
}

impl std::fmt::Display for ColorSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pack an RGB triple.
#[inline]
pub fn true_color(r: u8, g: u8, b: u8) -> u32 {
    ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}

#[inline]
pub fn red(color: u32) -> u8 {
    ((color >> 16) & 0xff) as u8
}

#[inline]
pub fn green(color: u32) -> u8 {
    ((color >> 8) & 0xff) as u8
}

#[inline]
pub fn blue(color: u32) -> u8 {
    (color & 0xff) as u8
}

pub const BLACK: u32 = 0x000000;
pub const WHITE: u32 = 0xffffff;

/// Parse `RRGGBB` or `#RRGGBB` into a packed colour.
pub fn parse_hex_color(s: &str) -> RasterResult<u32> {
    let hex = s.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(RasterError::config(format!(
            "invalid hex color '{}', expected RRGGBB",
            s
        )));
    }
    u32::from_str_radix(hex, 16)
        .map_err(|e| RasterError::config(format!("invalid hex color '{}': {}", s, e)))
}

/// Format a packed colour as `#rrggbb`.
pub fn format_hex_color(color: u32) -> String {
    format!("#{:06x}", color & 0xffffff)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ColorSpace; 4] = [
        ColorSpace::Monochrome,
        ColorSpace::Grayscale,
        ColorSpace::Palette,
        ColorSpace::Rgb,
    ];

    #[test]
    fn test_pack_unpack() {
        let c = true_color(0x12, 0x34, 0x56);
        assert_eq!(c, 0x123456);
        assert_eq!(red(c), 0x12);
        assert_eq!(green(c), 0x34);
        assert_eq!(blue(c), 0x56);
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("ff8000").unwrap(), 0xff8000);
        assert_eq!(parse_hex_color("#00FF00").unwrap(), 0x00ff00);
        assert!(parse_hex_color("fff").is_err());
        assert!(parse_hex_color("gg0000").is_err());
        assert_eq!(format_hex_color(0x0a0b0c), "#0a0b0c");
    }

    #[test]
    fn test_promotion_rules() {
        use ColorSpace::*;
        assert_eq!(Monochrome.promote(Monochrome), Monochrome);
        assert_eq!(Monochrome.promote(Grayscale), Grayscale);
        assert_eq!(Monochrome.promote(Palette), Palette);
        assert_eq!(Palette.promote(Palette), Palette);
        assert_eq!(Palette.promote(Grayscale), Rgb);
        assert_eq!(Grayscale.promote(Monochrome), Rgb);
        assert_eq!(Rgb.promote(Monochrome), Rgb);
    }

    #[test]
    fn test_promotion_monotone_and_idempotent() {
        for canvas in ALL {
            for tile in ALL {
                let once = canvas.promote(tile);
                assert!(once.rank() >= canvas.rank());
                assert_eq!(once.promote(tile), once);
            }
        }
    }
}
