//! Image option handling and transformation
//!
//! Covers everything between the raw option segment of a URL and the encoded
//! response body:
//! - option segment parsing and canonical serialization
//! - bounds-checked transform specs
//! - URL building for clients of the proxy
//! - the raster codec (decode, fit, encode)
//!
//! # URL Format
//!
//! ```text
//! /[prefix/]w=800,h=600,fit=cover,q=80,f=webp/media/photos/cat.jpg
//! ```

pub mod encoder;
pub mod error;
pub mod params;
pub mod processor;
pub mod transform;
pub mod url;

// Re-export commonly used types
pub use encoder::{EncodedImage, EncoderFactory, ImageEncoder};
pub use error::ImageError;
pub use params::ParsedOptions;
pub use processor::{ImageCodec, ProcessedImage, RasterCodec};
pub use transform::{FitMode, OutputFormat, TransformLimits, TransformSpec, TransformSpecBuilder};
pub use url::UrlBuilder;
