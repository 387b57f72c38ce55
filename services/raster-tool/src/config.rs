//! Tool defaults.
//!
//! Precedence, lowest first: built-in defaults, `RASTER_PYRAMID_*`
//! environment variables, the YAML file given with `--config`, then
//! command line flags.

use std::path::Path;

use anyhow::{Context, Result};
use ingestion::IngestOptions;
use pyramid::PyramidConfig;
use raster_common::{color, parse_hex_color, ImageFormat};
use serde::{Deserialize, Serialize};

/// Contents of the `--config` YAML file. Every section and field is
/// optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub load: IngestOptions,
    pub pyramid: PyramidSection,
    pub render: RenderSection,
}

/// Pyramid and topmost build options; colours are hex strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PyramidSection {
    pub format: Option<ImageFormat>,
    pub quality: Option<u8>,
    pub topmost_tile_size: Option<u32>,
    pub neighbor_tolerance: Option<f64>,
    pub transparent_color: Option<String>,
    pub background_color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSection {
    pub format: ImageFormat,
    pub quality: u8,
    pub transparent_color: Option<String>,
    pub background_color: Option<String>,
}

impl Default for RenderSection {
    fn default() -> Self {
        Self {
            format: ImageFormat::Png,
            quality: 75,
            transparent_color: None,
            background_color: None,
        }
    }
}

impl ToolConfig {
    /// Load the YAML file at `path`.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// The parsed file, or defaults when no file was given.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Environment settings overlaid with the `pyramid` section.
    pub fn pyramid_config(&self) -> Result<PyramidConfig> {
        let mut config = PyramidConfig::from_env();
        let section = &self.pyramid;
        if let Some(format) = section.format {
            config.format = format;
        }
        if let Some(quality) = section.quality {
            config.quality = quality;
        }
        if let Some(size) = section.topmost_tile_size {
            config.tile_size = size;
        }
        if let Some(tolerance) = section.neighbor_tolerance {
            config.neighbor_tolerance = tolerance;
        }
        if let Some(hex) = &section.transparent_color {
            config.transparent_color = Some(parse_color(hex)?);
        }
        if let Some(hex) = &section.background_color {
            config.background_color = parse_color(hex)?;
        }
        Ok(config.normalized())
    }

    /// Transparent and background colours for rendering.
    pub fn render_colors(&self) -> Result<(Option<u32>, u32)> {
        let transparent = self
            .render
            .transparent_color
            .as_deref()
            .map(parse_color)
            .transpose()?;
        let background = match &self.render.background_color {
            Some(hex) => parse_color(hex)?,
            None => color::BLACK,
        };
        Ok((transparent, background))
    }
}

/// Parse `#RRGGBB` or `RRGGBB`.
pub fn parse_color(hex: &str) -> Result<u32> {
    parse_hex_color(hex).with_context(|| format!("Invalid colour '{}'", hex))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = ToolConfig::from_yaml("").unwrap();
        assert_eq!(config, ToolConfig::default());
        assert_eq!(config.load.tile_size, 512);
        assert_eq!(config.render.format, ImageFormat::Png);
    }

    #[test]
    fn test_sections_parse() {
        let yaml = r##"
load:
  tile_size: 1024
  format: png
  epsg_override: 3003
pyramid:
  format: jpeg
  quality: 95
  background_color: "#ffffff"
render:
  transparent_color: "00ff00"
"##;
        let config = ToolConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.load.tile_size, 1024);
        assert_eq!(config.load.format, Some(ImageFormat::Png));
        assert_eq!(config.load.epsg_override, Some(3003));
        assert_eq!(config.load.quality, 75);

        let pyramid = config.pyramid_config().unwrap();
        assert_eq!(pyramid.format, ImageFormat::Jpeg);
        assert_eq!(pyramid.quality, 90);
        assert_eq!(pyramid.background_color, 0xffffff);

        let (transparent, background) = config.render_colors().unwrap();
        assert_eq!(transparent, Some(0x00ff00));
        assert_eq!(background, color::BLACK);
    }

    #[test]
    fn test_bad_colour_is_reported() {
        let config = ToolConfig::from_yaml("render:\n  background_color: nope\n").unwrap();
        let err = config.render_colors().unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_unknown_format_rejected() {
        assert!(ToolConfig::from_yaml("load:\n  format: bmp\n").is_err());
    }
}
