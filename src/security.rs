//! Security Validation Module
//!
//! Guards every image request before any storage or codec work happens:
//! - Rejects oversized URIs before routing (414)
//! - Rejects parent-directory segments anywhere in a path (403)
//! - Decides whose `X-Forwarded-For` header may name the client
//!
//! The traversal check is the one rule no validator configuration can turn
//! off. It is applied to the relative path by the source resolver and again to
//! the full path by every compiled path validator.

use std::net::IpAddr;

use crate::error::ProxyError;

/// Security validation error types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityError {
    /// Path traversal attempt detected (403)
    PathTraversal { path: String },
    /// URI too long (414)
    UriTooLong { length: usize, limit: usize },
}

impl std::fmt::Display for SecurityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecurityError::PathTraversal { path } => {
                write!(f, "Path traversal attempt detected: {}", path)
            }
            SecurityError::UriTooLong { length, limit } => {
                write!(f, "URI length {} exceeds limit {}", length, limit)
            }
        }
    }
}

impl std::error::Error for SecurityError {}

impl SecurityError {
    pub fn to_http_status(&self) -> u16 {
        match self {
            SecurityError::PathTraversal { .. } => 403,
            SecurityError::UriTooLong { .. } => 414,
        }
    }
}

impl From<SecurityError> for ProxyError {
    fn from(err: SecurityError) -> Self {
        match err {
            SecurityError::PathTraversal { path } => ProxyError::DirectoryTraversal { path },
            // Oversized URIs are answered by the HTTP binding before routing;
            // reaching the pipeline with one means the route cannot match.
            SecurityError::UriTooLong { length, .. } => ProxyError::RouteNotMatched {
                path: format!("<{} bytes>", length),
            },
        }
    }
}

/// Default limits for security validation
#[derive(Debug, Clone)]
pub struct SecurityLimits {
    /// Maximum URI length (default: 8192 bytes)
    pub max_uri_length: usize,
    /// Peers allowed to report the client address in `X-Forwarded-For`
    pub trusted_proxies: Vec<IpAddr>,
}

impl Default for SecurityLimits {
    fn default() -> Self {
        Self {
            max_uri_length: 8192, // 8 KB
            trusted_proxies: Vec::new(),
        }
    }
}

impl SecurityLimits {
    pub fn is_trusted_proxy(&self, ip: &IpAddr) -> bool {
        self.trusted_proxies.contains(ip)
    }
}

/// Validate URI length
pub fn validate_uri_length(uri: &str, limit: usize) -> Result<(), SecurityError> {
    let length = uri.len();
    if length > limit {
        return Err(SecurityError::UriTooLong { length, limit });
    }
    Ok(())
}

/// Check for path traversal attempts
///
/// Any occurrence of `..` is rejected, not only whole `..` segments, so
/// `a/..b/c.jpg` is refused as well. Also detects:
/// - %2e%2e (URL-encoded `..`, any case) in case a path was never decoded
/// - null bytes (path truncation attack)
pub fn check_path_traversal(path: &str) -> Result<(), SecurityError> {
    let path_lower = path.to_ascii_lowercase();

    if path.contains("..")
        || path_lower.contains("%2e%2e")
        || path_lower.contains(".%2e")
        || path_lower.contains("%2e.")
        || path.contains('\0')
    {
        return Err(SecurityError::PathTraversal {
            path: path.to_string(),
        });
    }

    Ok(())
}

/// Convenience form of [`check_path_traversal`] for boolean validators
pub fn is_traversal(path: &str) -> bool {
    check_path_traversal(path).is_err()
}
