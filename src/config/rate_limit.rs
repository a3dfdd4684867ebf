//! Rate limiting configuration types.
//!
//! One fixed-window quota per `(client ip, request path)` identity, backed by
//! either an in-process counter map or Redis for multi-instance deployments.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{
    DEFAULT_RATE_LIMIT_KEY_PREFIX, DEFAULT_RATE_LIMIT_MAX_ATTEMPTS, DEFAULT_RATE_LIMIT_WINDOW_SECS,
};

/// What a rate limited client receives
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OnLimit {
    /// 429 with `Retry-After`
    #[default]
    Reject,
    /// 302 to the untransformed image
    Redirect,
}

/// Counter backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CounterStoreConfig {
    #[default]
    Memory,
    Redis { url: String },
}

fn default_max_attempts() -> u64 {
    DEFAULT_RATE_LIMIT_MAX_ATTEMPTS
}

fn default_key_prefix() -> String {
    DEFAULT_RATE_LIMIT_KEY_PREFIX.to_string()
}

fn default_window_seconds() -> u64 {
    DEFAULT_RATE_LIMIT_WINDOW_SECS
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Enable rate limiting (only honoured in the production environment)
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u64,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
    /// Limit each transform of an image separately
    #[serde(default)]
    pub key_includes_options: bool,
    #[serde(default)]
    pub on_limit: OnLimit,
    #[serde(default)]
    pub store: CounterStoreConfig,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_attempts: default_max_attempts(),
            key_prefix: default_key_prefix(),
            window_seconds: default_window_seconds(),
            key_includes_options: false,
            on_limit: OnLimit::default(),
            store: CounterStoreConfig::default(),
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }
}
