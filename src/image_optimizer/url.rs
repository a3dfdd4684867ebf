//! Image URL construction
//!
//! Builds `/<prefix>/<options>/<source>/<path>` URLs with the option segment
//! rendered in canonical order, so equal transforms always produce the same
//! (cache-friendly) URL.

use std::fmt;

use super::params::{ParsedOptions, FIT, FORMAT, HEIGHT, QUALITY, VERSION, WIDTH};
use super::transform::FitMode;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlBuilder {
    prefix: String,
    source: String,
    path: String,
    options: ParsedOptions,
}

impl UrlBuilder {
    pub fn new(source: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    /// Route prefix, e.g. `img`
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn width(mut self, width: u32) -> Self {
        self.options.set(WIDTH, width.to_string());
        self
    }

    pub fn w(self, width: u32) -> Self {
        self.width(width)
    }

    pub fn height(mut self, height: u32) -> Self {
        self.options.set(HEIGHT, height.to_string());
        self
    }

    pub fn h(self, height: u32) -> Self {
        self.height(height)
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.options.set(FORMAT, format.into());
        self
    }

    pub fn f(self, format: impl Into<String>) -> Self {
        self.format(format)
    }

    pub fn webp(self) -> Self {
        self.format("webp")
    }

    pub fn png(self) -> Self {
        self.format("png")
    }

    pub fn jpg(self) -> Self {
        self.format("jpg")
    }

    pub fn gif(self) -> Self {
        self.format("gif")
    }

    pub fn quality(mut self, quality: u8) -> Self {
        self.options.set(QUALITY, quality.to_string());
        self
    }

    pub fn q(self, quality: u8) -> Self {
        self.quality(quality)
    }

    pub fn fit(mut self, fit: FitMode) -> Self {
        self.options.set(FIT, fit.as_str());
        self
    }

    pub fn scale(self) -> Self {
        self.fit(FitMode::Scale)
    }

    pub fn scale_down(self) -> Self {
        self.fit(FitMode::ScaleDown)
    }

    pub fn cover(self) -> Self {
        self.fit(FitMode::Cover)
    }

    pub fn contain(self) -> Self {
        self.fit(FitMode::Contain)
    }

    pub fn crop(self) -> Self {
        self.fit(FitMode::Crop)
    }

    /// Cache-buster; changes the URL without affecting the transform
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.options.set(VERSION, version.into());
        self
    }

    pub fn v(self, version: impl Into<String>) -> Self {
        self.version(version)
    }

    pub fn options(&self) -> &ParsedOptions {
        &self.options
    }

    pub fn url(&self) -> String {
        let options = self.options.serialize();
        let parts = [
            self.prefix.trim_matches('/'),
            options.as_str(),
            self.source.trim_matches('/'),
            self.path.trim_start_matches('/'),
        ];

        let joined = parts
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("/");

        format!("/{}", joined)
    }
}

impl fmt::Display for UrlBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}
