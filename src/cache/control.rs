//! Cache-Control header synthesis for transformed images.
//!
//! Transformed images are addressed by URLs that encode the full transform
//! (plus an optional cache-buster), so responses are safe to cache publicly
//! for a long time. The header value is built once from configuration and
//! reused for every successful response.
//!
//! Directive order is fixed:
//! `public, max-age, s-maxage, immutable, stale-while-revalidate, stale-if-error`
//!
//! # Example
//!
//! ```rust
//! use imgproxy::cache::{CacheControlBuilder, CacheControlConfig};
//!
//! let config = CacheControlConfig {
//!     max_age: Some(2592000),
//!     s_maxage: Some(2592000),
//!     immutable: true,
//!     stale_while_revalidate: None,
//!     stale_if_error: None,
//! };
//! assert_eq!(
//!     CacheControlBuilder::build(&config),
//!     "public, max-age=2592000, s-maxage=2592000, immutable"
//! );
//! ```

use serde::Deserialize;

/// Configured caching directives, all durations in seconds.
///
/// Zero or absent durations are omitted from the header.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CacheControlConfig {
    #[serde(default = "default_max_age")]
    pub max_age: Option<u64>,

    #[serde(default = "default_max_age")]
    pub s_maxage: Option<u64>,

    #[serde(default = "default_immutable")]
    pub immutable: bool,

    #[serde(default)]
    pub stale_while_revalidate: Option<u64>,

    #[serde(default)]
    pub stale_if_error: Option<u64>,
}

fn default_max_age() -> Option<u64> {
    Some(2_592_000) // 30 days
}

fn default_immutable() -> bool {
    true
}

impl Default for CacheControlConfig {
    fn default() -> Self {
        Self {
            max_age: default_max_age(),
            s_maxage: default_max_age(),
            immutable: default_immutable(),
            stale_while_revalidate: None,
            stale_if_error: None,
        }
    }
}

pub struct CacheControlBuilder;

impl CacheControlBuilder {
    /// Build the `Cache-Control` header value.
    ///
    /// Always starts with `public`; the output is byte-stable for equal
    /// configuration.
    pub fn build(config: &CacheControlConfig) -> String {
        let mut parts = vec!["public".to_string()];

        let mut push_seconds = |name: &str, value: Option<u64>| {
            if let Some(secs) = value.filter(|secs| *secs > 0) {
                parts.push(format!("{}={}", name, secs));
            }
        };

        push_seconds("max-age", config.max_age);
        push_seconds("s-maxage", config.s_maxage);

        if config.immutable {
            parts.push("immutable".to_string());
        }

        if let Some(secs) = config.stale_while_revalidate.filter(|secs| *secs > 0) {
            parts.push(format!("stale-while-revalidate={}", secs));
        }
        if let Some(secs) = config.stale_if_error.filter(|secs| *secs > 0) {
            parts.push(format!("stale-if-error={}", secs));
        }

        parts.join(", ")
    }
}
