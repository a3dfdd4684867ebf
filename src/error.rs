// Error types module

use thiserror::Error;

/// Centralized error type for the image proxy
///
/// Every rejection the request pipeline can produce is one variant here, so the
/// HTTP status mapping lives in exactly one place.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProxyError {
    /// Request URL does not match the configured route shape
    #[error("No route matches path: {path}")]
    RouteNotMatched { path: String },

    /// Source key is not configured
    #[error("Unknown source: {source_key}")]
    UnknownSource { source_key: String },

    /// Path contains a parent-directory segment
    #[error("Directory traversal not allowed: {path}")]
    DirectoryTraversal { path: String },

    /// Path rejected by the source's validator
    #[error("Path not allowed: {path}")]
    PathNotAllowed { path: String },

    /// Resource does not exist in the storage backend
    #[error("Image not found: {path}")]
    NotFound { path: String },

    /// Width or height is missing, malformed, out of bounds or not allow-listed
    #[error("Invalid {param}: {value}")]
    InvalidDimension { param: &'static str, value: String },

    /// Quality is missing, malformed or outside 1-100
    #[error("Invalid quality: {value}")]
    InvalidQuality { value: String },

    /// Output format is not in the allowed formats list
    #[error("Invalid format: {value}")]
    InvalidFormat { value: String },

    /// Fit mode is not one of scale, scaledown, cover, contain, crop
    #[error("Invalid fit: {value}")]
    InvalidFit { value: String },

    /// Client exceeded its request quota for this path
    #[error("Rate limit exceeded for {identity}")]
    RateLimited { identity: String },

    /// Load or transform did not finish within the configured timeout
    #[error("{stage} timed out after {timeout_ms}ms")]
    UpstreamTimeout { stage: &'static str, timeout_ms: u64 },

    /// Stored bytes could not be decoded as an image
    #[error("Failed to decode image: {message}")]
    DecodeFailure { message: String },

    /// Transform or encode step failed (including unencodable formats)
    #[error("Failed to encode image: {message}")]
    EncodeFailure { message: String },

    /// Storage backend failed for a reason other than absence
    #[error("Storage error: {message}")]
    Storage { message: String },

    /// Request was cancelled before the pipeline finished
    #[error("Request cancelled")]
    Cancelled,
}

impl ProxyError {
    /// Maps proxy errors to HTTP status codes
    ///
    /// Status mapping:
    /// - RouteNotMatched, UnknownSource, NotFound → 404
    /// - DirectoryTraversal, PathNotAllowed → 403
    /// - InvalidDimension, InvalidQuality, InvalidFormat, InvalidFit → 400
    /// - RateLimited → 429 (the pipeline may turn it into a redirect)
    /// - Cancelled → 499 (client closed request)
    /// - UpstreamTimeout, DecodeFailure, EncodeFailure, Storage → 500
    pub fn to_http_status(&self) -> u16 {
        match self {
            ProxyError::RouteNotMatched { .. }
            | ProxyError::UnknownSource { .. }
            | ProxyError::NotFound { .. } => 404,

            ProxyError::DirectoryTraversal { .. } | ProxyError::PathNotAllowed { .. } => 403,

            ProxyError::InvalidDimension { .. }
            | ProxyError::InvalidQuality { .. }
            | ProxyError::InvalidFormat { .. }
            | ProxyError::InvalidFit { .. } => 400,

            ProxyError::RateLimited { .. } => 429,

            ProxyError::Cancelled => 499,

            ProxyError::UpstreamTimeout { .. }
            | ProxyError::DecodeFailure { .. }
            | ProxyError::EncodeFailure { .. }
            | ProxyError::Storage { .. } => 500,
        }
    }

    /// Stable machine-readable name, used in logs and JSON error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::RouteNotMatched { .. } => "route_not_matched",
            ProxyError::UnknownSource { .. } => "unknown_source",
            ProxyError::DirectoryTraversal { .. } => "directory_traversal",
            ProxyError::PathNotAllowed { .. } => "path_not_allowed",
            ProxyError::NotFound { .. } => "not_found",
            ProxyError::InvalidDimension { .. } => "invalid_dimension",
            ProxyError::InvalidQuality { .. } => "invalid_quality",
            ProxyError::InvalidFormat { .. } => "invalid_format",
            ProxyError::InvalidFit { .. } => "invalid_fit",
            ProxyError::RateLimited { .. } => "rate_limited",
            ProxyError::UpstreamTimeout { .. } => "upstream_timeout",
            ProxyError::DecodeFailure { .. } => "decode_failure",
            ProxyError::EncodeFailure { .. } => "encode_failure",
            ProxyError::Storage { .. } => "storage_error",
            ProxyError::Cancelled => "cancelled",
        }
    }

    /// True for errors caused by the request itself (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.to_http_status())
    }

    /// JSON body sent with error responses
    pub fn to_json_body(&self) -> String {
        serde_json::json!({
            "error": self.kind(),
            "message": self.to_string(),
            "status": self.to_http_status(),
        })
        .to_string()
    }
}
