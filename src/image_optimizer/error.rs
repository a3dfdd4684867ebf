//! Image option and codec error types
//!
//! Provides structured error handling with HTTP status mapping. Option
//! validation errors are client errors; codec failures are server errors.

use std::fmt;

use crate::error::ProxyError;

/// Errors that can occur while validating options or running the codec
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    // === Option Errors ===
    /// Width or height missing, malformed, out of bounds or not allow-listed
    InvalidDimension { param: &'static str, value: String },
    /// Quality missing, malformed or outside 1-100
    InvalidQuality { value: String },
    /// Format not in the allowed formats list
    InvalidFormat { value: String },
    /// Fit mode not recognized
    InvalidFit { value: String },

    // === Codec Errors ===
    /// Failed to decode image data
    DecodeFailed { message: String },
    /// Resize, crop or pad failed
    ResizeFailed { message: String },
    /// The codec has no encoder for this format
    UnsupportedFormat { format: String },
    /// Encoding to output format failed
    EncodeFailed { format: String, message: String },
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageError::InvalidDimension { param, value } => {
                write!(f, "Invalid {}: {}", param, value)
            }
            ImageError::InvalidQuality { value } => write!(f, "Invalid quality: {}", value),
            ImageError::InvalidFormat { value } => write!(f, "Invalid format: {}", value),
            ImageError::InvalidFit { value } => write!(f, "Invalid fit: {}", value),

            ImageError::DecodeFailed { message } => {
                write!(f, "Failed to decode image: {}", message)
            }
            ImageError::ResizeFailed { message } => write!(f, "Resize failed: {}", message),
            ImageError::UnsupportedFormat { format } => {
                write!(f, "Unsupported output format: {}", format)
            }
            ImageError::EncodeFailed { format, message } => {
                write!(f, "Failed to encode to {}: {}", format, message)
            }
        }
    }
}

impl std::error::Error for ImageError {}

impl ImageError {
    /// Maps image errors to HTTP status codes
    ///
    /// Status mapping:
    /// - InvalidDimension, InvalidQuality, InvalidFormat, InvalidFit → 400
    /// - DecodeFailed, ResizeFailed, UnsupportedFormat, EncodeFailed → 500
    pub fn to_http_status(&self) -> u16 {
        match self {
            ImageError::InvalidDimension { .. }
            | ImageError::InvalidQuality { .. }
            | ImageError::InvalidFormat { .. }
            | ImageError::InvalidFit { .. } => 400,

            ImageError::DecodeFailed { .. }
            | ImageError::ResizeFailed { .. }
            | ImageError::UnsupportedFormat { .. }
            | ImageError::EncodeFailed { .. } => 500,
        }
    }

    /// Helper constructors for common error patterns
    pub fn invalid_dimension(param: &'static str, value: impl Into<String>) -> Self {
        ImageError::InvalidDimension {
            param,
            value: value.into(),
        }
    }

    pub fn invalid_quality(value: impl Into<String>) -> Self {
        ImageError::InvalidQuality {
            value: value.into(),
        }
    }

    pub fn invalid_format(value: impl Into<String>) -> Self {
        ImageError::InvalidFormat {
            value: value.into(),
        }
    }

    pub fn invalid_fit(value: impl Into<String>) -> Self {
        ImageError::InvalidFit {
            value: value.into(),
        }
    }

    pub fn decode_failed(message: impl Into<String>) -> Self {
        ImageError::DecodeFailed {
            message: message.into(),
        }
    }

    pub fn resize_failed(message: impl Into<String>) -> Self {
        ImageError::ResizeFailed {
            message: message.into(),
        }
    }

    pub fn unsupported_format(format: impl Into<String>) -> Self {
        ImageError::UnsupportedFormat {
            format: format.into(),
        }
    }

    pub fn encode_failed(format: impl Into<String>, message: impl Into<String>) -> Self {
        ImageError::EncodeFailed {
            format: format.into(),
            message: message.into(),
        }
    }
}

impl From<ImageError> for ProxyError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::InvalidDimension { param, value } => {
                ProxyError::InvalidDimension { param, value }
            }
            ImageError::InvalidQuality { value } => ProxyError::InvalidQuality { value },
            ImageError::InvalidFormat { value } => ProxyError::InvalidFormat { value },
            ImageError::InvalidFit { value } => ProxyError::InvalidFit { value },
            ImageError::DecodeFailed { message } => ProxyError::DecodeFailure { message },
            other @ (ImageError::ResizeFailed { .. }
            | ImageError::UnsupportedFormat { .. }
            | ImageError::EncodeFailed { .. }) => ProxyError::EncodeFailure {
                message: other.to_string(),
            },
        }
    }
}
