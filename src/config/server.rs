//! Server configuration types.
//!
//! This module defines the server-level configuration including:
//! - Address and port bindings
//! - Runtime environment (rate limiting is production-only)
//! - Request timeout applied to image load and transform
//! - URI length limit checked before routing
//! - Proxies trusted to forward the client address
//!
//! Default values are sourced from `crate::constants`.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

use crate::constants::{
    DEFAULT_ADDRESS, DEFAULT_ENVIRONMENT, DEFAULT_MAX_URI_LENGTH, DEFAULT_PORT,
    DEFAULT_REQUEST_TIMEOUT_SECS,
};

fn default_address() -> String {
    DEFAULT_ADDRESS.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_environment() -> String {
    DEFAULT_ENVIRONMENT.to_string()
}

// Default timeout values
fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_max_uri_length() -> usize {
    DEFAULT_MAX_URI_LENGTH
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Runtime environment name, e.g. `production` or `local`
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Seconds allowed for each of load and transform
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(default = "default_max_uri_length")]
    pub max_uri_length: usize,
    /// Load balancers whose `X-Forwarded-For` is believed; empty means the
    /// TCP peer is always the client
    #[serde(default)]
    pub trusted_proxies: Vec<IpAddr>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            environment: default_environment(),
            request_timeout: default_request_timeout(),
            max_uri_length: default_max_uri_length(),
            trusted_proxies: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    /// Convert to SecurityLimits from security module
    pub fn to_security_limits(&self) -> crate::security::SecurityLimits {
        crate::security::SecurityLimits {
            max_uri_length: self.max_uri_length,
            trusted_proxies: self.trusted_proxies.clone(),
        }
    }
}
