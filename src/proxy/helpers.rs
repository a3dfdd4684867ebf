//! Proxy utility functions.
//!
//! This module contains helper functions for request processing:
//! - Client IP detection (X-Forwarded-For from trusted proxies only)
//! - Request path decoding
//! - Writing a complete [`ProxyResponse`] to a Pingora session

use std::borrow::Cow;
use std::net::IpAddr;

use pingora_core::Result;
use pingora_http::ResponseHeader;
use pingora_proxy::Session;

use crate::pipeline::ProxyResponse;
use crate::security::SecurityLimits;

/// Extract the client IP address used for logging and rate limiting.
///
/// `X-Forwarded-For` is only consulted when the TCP peer is a trusted proxy;
/// otherwise the header is client-controlled and ignored.
pub fn get_client_ip(session: &Session, limits: &SecurityLimits) -> String {
    let forwarded_for = session
        .req_header()
        .headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok());

    let peer = session.client_addr().map(|addr| match addr.as_inet() {
        Some(inet) => inet.ip().to_string(),
        None => addr.to_string(),
    });

    client_ip_from(forwarded_for, peer, limits)
}

/// Pick the client IP from an X-Forwarded-For value and the peer address.
///
/// The header reads `"client, proxy1, proxy2"`, each proxy appending the
/// address it received from. Walking from the right past trusted proxies
/// gives the first address no trusted hop vouches past, which is the client.
pub fn client_ip_from(
    forwarded_for: Option<&str>,
    peer: Option<String>,
    limits: &SecurityLimits,
) -> String {
    let peer_trusted = peer
        .as_deref()
        .and_then(|p| p.parse::<IpAddr>().ok())
        .is_some_and(|ip| limits.is_trusted_proxy(&ip));

    if peer_trusted {
        if let Some(header) = forwarded_for {
            let mut candidate = None;
            for entry in header.rsplit(',').map(str::trim) {
                match entry.parse::<IpAddr>() {
                    Ok(ip) if limits.is_trusted_proxy(&ip) => candidate = Some(ip),
                    Ok(ip) => return ip.to_string(),
                    // Garbage in the chain: stop at the last address vouched for
                    Err(_) => break,
                }
            }
            if let Some(ip) = candidate {
                return ip.to_string();
            }
        }
    }

    peer.unwrap_or_else(|| "unknown".to_string())
}

/// Percent-decode the request path; undecodable input is used as-is
pub fn decode_path(path: &str) -> Cow<'_, str> {
    urlencoding::decode(path).unwrap_or(Cow::Borrowed(path))
}

/// Write `response` to the session, setting `Content-Length`.
///
/// HEAD requests get the same headers without a body.
pub async fn write_response(
    session: &mut Session,
    response: &ProxyResponse,
    head_only: bool,
) -> Result<()> {
    let mut header = ResponseHeader::build(response.status, Some(response.headers.len() + 1))?;
    for (name, value) in &response.headers {
        header.insert_header(name.clone(), value.as_str())?;
    }
    header.insert_header("Content-Length", response.body.len().to_string())?;

    let body_empty = head_only || response.body.is_empty();
    session
        .write_response_header(Box::new(header), body_empty)
        .await?;

    if !body_empty {
        session
            .write_response_body(Some(response.body.clone()), true)
            .await?;
    }

    Ok(())
}
