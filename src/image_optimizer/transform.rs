//! Option-to-transform mapping with bounds checking
//!
//! [`TransformSpecBuilder`] turns [`ParsedOptions`] into a validated
//! [`TransformSpec`] under the configured [`TransformLimits`]. Every check is
//! evaluated independently; [`TransformSpecBuilder::violations`] reports all of
//! them and [`TransformSpecBuilder::build`] fails with the first in the order
//! width, height, fit, quality, format.

use std::fmt;
use std::str::FromStr;

use super::error::ImageError;
use super::params::{ParsedOptions, FIT, FORMAT, HEIGHT, QUALITY, WIDTH};

/// Formats the raster codec can encode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
    Gif,
    WebP,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::WebP => "webp",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::WebP => "image/webp",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::WebP => "webp",
        }
    }

    pub fn supports_transparency(&self) -> bool {
        !matches!(self, Self::Jpeg)
    }
}

impl FromStr for OutputFormat {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            "gif" => Ok(OutputFormat::Gif),
            "webp" => Ok(OutputFormat::WebP),
            _ => Err(ImageError::unsupported_format(s)),
        }
    }
}

/// How source dimensions map onto the requested box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FitMode {
    /// Fit inside the box preserving aspect ratio, upscaling allowed
    Scale,
    /// Like `Scale` but never enlarges (default)
    #[default]
    ScaleDown,
    /// Fill the box preserving aspect ratio, centre-cropping the overflow
    Cover,
    /// Fit inside the box and pad to its exact size
    Contain,
    /// Cut the box out of the top-left corner without resampling
    Crop,
}

impl FitMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FitMode::Scale => "scale",
            FitMode::ScaleDown => "scaledown",
            FitMode::Cover => "cover",
            FitMode::Contain => "contain",
            FitMode::Crop => "crop",
        }
    }
}

impl FromStr for FitMode {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "scale" => Ok(FitMode::Scale),
            "scaledown" => Ok(FitMode::ScaleDown),
            "cover" => Ok(FitMode::Cover),
            "contain" => Ok(FitMode::Contain),
            "crop" => Ok(FitMode::Crop),
            _ => Err(ImageError::invalid_fit(s)),
        }
    }
}

impl fmt::Display for FitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated transform for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformSpec {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fit: FitMode,
    pub quality: u8,
    /// Lower-cased format name; may still be one the codec cannot encode
    pub format: String,
    /// Largest output (width, height); a side derived from the source aspect
    /// ratio is held to it as well
    pub max_output: (u32, u32),
}

impl TransformSpec {
    /// False when neither dimension is set and no resize step should run
    pub fn resizes(&self) -> bool {
        self.width.is_some() || self.height.is_some()
    }
}

/// Configured bounds applied to every request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformLimits {
    pub max_width: u32,
    pub max_height: u32,
    /// When set and non-empty, replaces the `max_width` bound
    pub allowed_widths: Option<Vec<u32>>,
    /// When set and non-empty, replaces the `max_height` bound
    pub allowed_heights: Option<Vec<u32>>,
    /// Lower-cased; empty means any format reaches the codec
    pub allowed_formats: Vec<String>,
    pub default_quality: u8,
}

impl TransformLimits {
    /// Output bound per side: the largest allow-listed value, else the max
    pub fn output_bounds(&self) -> (u32, u32) {
        let bound = |allowed: &Option<Vec<u32>>, max: u32| match allowed {
            Some(list) if !list.is_empty() => list.iter().copied().max().unwrap_or(max),
            _ => max,
        };
        (
            bound(&self.allowed_widths, self.max_width),
            bound(&self.allowed_heights, self.max_height),
        )
    }
}

impl Default for TransformLimits {
    fn default() -> Self {
        Self {
            max_width: 2000,
            max_height: 2000,
            allowed_widths: None,
            allowed_heights: None,
            allowed_formats: ["jpg", "jpeg", "png", "gif", "webp"]
                .iter()
                .map(|f| f.to_string())
                .collect(),
            default_quality: 85,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransformSpecBuilder {
    limits: TransformLimits,
}

/// Every check evaluated on its own
struct Checked {
    width: Result<Option<u32>, ImageError>,
    height: Result<Option<u32>, ImageError>,
    fit: Result<FitMode, ImageError>,
    quality: Result<u8, ImageError>,
    format: Result<String, ImageError>,
}

impl TransformSpecBuilder {
    pub fn new(mut limits: TransformLimits) -> Self {
        limits.allowed_formats = limits
            .allowed_formats
            .iter()
            .map(|f| f.to_ascii_lowercase())
            .collect();
        Self { limits }
    }

    pub fn limits(&self) -> &TransformLimits {
        &self.limits
    }

    /// Validate `options` for a source file with extension `source_extension`
    pub fn build(
        &self,
        options: &ParsedOptions,
        source_extension: &str,
    ) -> Result<TransformSpec, ImageError> {
        let checked = self.check(options, source_extension);
        Ok(TransformSpec {
            width: checked.width?,
            height: checked.height?,
            fit: checked.fit?,
            quality: checked.quality?,
            format: checked.format?,
            max_output: self.limits.output_bounds(),
        })
    }

    /// All validation failures, in reporting order
    pub fn violations(&self, options: &ParsedOptions, source_extension: &str) -> Vec<ImageError> {
        let checked = self.check(options, source_extension);
        [
            checked.width.err(),
            checked.height.err(),
            checked.fit.err(),
            checked.quality.err(),
            checked.format.err(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    fn check(&self, options: &ParsedOptions, source_extension: &str) -> Checked {
        Checked {
            width: check_dimension(
                options.lookup(WIDTH),
                "width",
                self.limits.max_width,
                self.limits.allowed_widths.as_deref(),
            ),
            height: check_dimension(
                options.lookup(HEIGHT),
                "height",
                self.limits.max_height,
                self.limits.allowed_heights.as_deref(),
            ),
            fit: self.check_fit(options.lookup(FIT)),
            quality: self.check_quality(options.lookup(QUALITY)),
            format: self.check_format(options.lookup(FORMAT), source_extension),
        }
    }

    fn check_fit(&self, raw: Option<Option<&str>>) -> Result<FitMode, ImageError> {
        match raw {
            None => Ok(FitMode::default()),
            Some(None) => Err(ImageError::invalid_fit("")),
            Some(Some(value)) => value.parse(),
        }
    }

    fn check_quality(&self, raw: Option<Option<&str>>) -> Result<u8, ImageError> {
        match raw {
            None => Ok(self.limits.default_quality),
            Some(None) => Err(ImageError::invalid_quality("")),
            Some(Some(value)) => match value.parse::<u8>() {
                Ok(q) if (1..=100).contains(&q) => Ok(q),
                _ => Err(ImageError::invalid_quality(value)),
            },
        }
    }

    fn check_format(
        &self,
        raw: Option<Option<&str>>,
        source_extension: &str,
    ) -> Result<String, ImageError> {
        match raw {
            None => Ok(source_extension.to_ascii_lowercase()),
            Some(None) => Err(ImageError::invalid_format("")),
            Some(Some(value)) => {
                let format = value.to_ascii_lowercase();
                if self.limits.allowed_formats.is_empty()
                    || self.limits.allowed_formats.contains(&format)
                {
                    Ok(format)
                } else {
                    Err(ImageError::invalid_format(value))
                }
            }
        }
    }
}

fn check_dimension(
    raw: Option<Option<&str>>,
    param: &'static str,
    max: u32,
    allowed: Option<&[u32]>,
) -> Result<Option<u32>, ImageError> {
    let value = match raw {
        None => return Ok(None),
        Some(None) => return Err(ImageError::invalid_dimension(param, "")),
        Some(Some(value)) => value,
    };

    let parsed: u32 = value
        .parse()
        .map_err(|_| ImageError::invalid_dimension(param, value))?;

    match allowed {
        Some(list) if !list.is_empty() => {
            if list.contains(&parsed) {
                Ok(Some(parsed))
            } else {
                Err(ImageError::invalid_dimension(param, value))
            }
        }
        _ => {
            if (1..=max).contains(&parsed) {
                Ok(Some(parsed))
            } else {
                Err(ImageError::invalid_dimension(param, value))
            }
        }
    }
}
