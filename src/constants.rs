// Constants module - centralized default values for configuration
//
// This module defines all default values used throughout the codebase.
// Using constants instead of magic numbers improves maintainability
// and makes it easier to understand and modify defaults.

// =============================================================================
// Server defaults
// =============================================================================

/// Default listen address
pub const DEFAULT_ADDRESS: &str = "0.0.0.0";

/// Default listen port
pub const DEFAULT_PORT: u16 = 8080;

/// Default runtime environment; rate limits only apply in production
pub const DEFAULT_ENVIRONMENT: &str = "production";

/// Default request timeout in seconds (applies to load and transform each)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default maximum URI length (8 KB)
pub const DEFAULT_MAX_URI_LENGTH: usize = 8192;

// =============================================================================
// Source defaults
// =============================================================================

/// Backend used by a source entry that does not name one
pub const DEFAULT_SOURCE_BACKEND: &str = "public";

// =============================================================================
// Transform defaults
// =============================================================================

/// Default output quality when the URL has no `q` option
pub const DEFAULT_QUALITY: u8 = 85;

/// Default maximum width in pixels
pub const DEFAULT_MAX_WIDTH: u32 = 2000;

/// Default maximum height in pixels
pub const DEFAULT_MAX_HEIGHT: u32 = 2000;

/// Default formats a request may ask for
pub const DEFAULT_ALLOWED_FORMATS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

// =============================================================================
// Rate limit defaults
// =============================================================================

/// Default requests allowed per identity per window
pub const DEFAULT_RATE_LIMIT_MAX_ATTEMPTS: u64 = 10;

/// Default fixed window length in seconds
pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;

/// Default prefix for rate limit identities
pub const DEFAULT_RATE_LIMIT_KEY_PREFIX: &str = "image-proxy";
