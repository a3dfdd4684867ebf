//! Special endpoint handlers for the proxy.
//!
//! This module provides response generators for built-in endpoints and for
//! requests rejected before they reach the image pipeline:
//! - `/health` - Health check endpoint
//! - 405 for methods other than GET and HEAD
//! - 414 for URIs over the configured limit
//!
//! Functions return [`ProxyResponse`] instead of writing directly to session,
//! which keeps response generation testable.

use std::time::Instant;

use crate::pipeline::ProxyResponse;
use crate::security::SecurityError;

pub const HEALTH_PATH: &str = "/health";

fn json(status: u16, body: serde_json::Value) -> ProxyResponse {
    ProxyResponse::new(status)
        .with_header("Content-Type", "application/json")
        .with_body(body.to_string())
}

/// Generate response for /health endpoint.
///
/// Returns health status with uptime and version information.
pub fn handle_health(start_time: Instant) -> ProxyResponse {
    json(
        200,
        serde_json::json!({
            "status": "healthy",
            "uptime_seconds": start_time.elapsed().as_secs(),
            "version": env!("CARGO_PKG_VERSION")
        }),
    )
}

pub fn method_not_allowed(method: &str) -> ProxyResponse {
    json(
        405,
        serde_json::json!({
            "error": "method_not_allowed",
            "message": format!("Method {} is not allowed", method),
            "status": 405
        }),
    )
    .with_header("Allow", "GET, HEAD")
}

pub fn security_rejection(error: &SecurityError) -> ProxyResponse {
    let status = error.to_http_status();
    json(
        status,
        serde_json::json!({
            "error": "security_violation",
            "message": error.to_string(),
            "status": status
        }),
    )
}
