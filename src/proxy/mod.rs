// Proxy module - Pingora ProxyHttp implementation
// Every request is answered in request_filter; no upstream peer is selected.

pub mod helpers;
pub mod special_endpoints;

use async_trait::async_trait;
use pingora_core::upstreams::peer::HttpPeer;
use pingora_core::Result;
use pingora_proxy::{ProxyHttp, Session};
use std::sync::Arc;
use std::time::Instant;

use crate::pipeline::{ImageProxy, RequestContext};
use crate::security::{self, SecurityLimits};

/// ImageProxyService implements the Pingora ProxyHttp trait
/// Handles method and URI guards, health checks and the image pipeline
pub struct ImageProxyService {
    proxy: Arc<ImageProxy>,
    security_limits: SecurityLimits,
    /// Service start time (for uptime calculation in /health endpoint)
    start_time: Instant,
}

impl ImageProxyService {
    pub fn new(proxy: Arc<ImageProxy>, security_limits: SecurityLimits) -> Self {
        Self {
            proxy,
            security_limits,
            start_time: Instant::now(),
        }
    }

    pub fn image_proxy(&self) -> &ImageProxy {
        &self.proxy
    }
}

#[async_trait]
impl ProxyHttp for ImageProxyService {
    type CTX = RequestContext;

    /// Create a new request context for each incoming request
    fn new_ctx(&self) -> Self::CTX {
        RequestContext::new("GET", "/", "unknown")
    }

    /// Never reached: request_filter always answers
    async fn upstream_peer(
        &self,
        _session: &mut Session,
        ctx: &mut Self::CTX,
    ) -> Result<Box<HttpPeer>> {
        tracing::error!(
            request_id = %ctx.request_id(),
            "Request reached upstream selection"
        );
        Err(pingora_core::Error::explain(
            pingora_core::ErrorType::InternalError,
            "image proxy has no upstream peers",
        ))
    }

    async fn request_filter(&self, session: &mut Session, ctx: &mut Self::CTX) -> Result<bool> {
        let req = session.req_header();
        let method = req.method.as_str().to_string();
        let raw_path = req.uri.path().to_string();
        let uri = req.uri.to_string();
        let client_ip = helpers::get_client_ip(session, &self.security_limits);
        let head_only = method == "HEAD";

        let path = helpers::decode_path(&raw_path).into_owned();
        *ctx = RequestContext::new(method.clone(), path, client_ip);

        // 1. Validate URI length before anything else looks at it
        if let Err(security_error) =
            security::validate_uri_length(&uri, self.security_limits.max_uri_length)
        {
            tracing::warn!(
                request_id = %ctx.request_id(),
                client_ip = %ctx.client_ip(),
                error = %security_error,
                "URI too long"
            );
            let response = special_endpoints::security_rejection(&security_error);
            helpers::write_response(session, &response, head_only).await?;
            return Ok(true);
        }

        // 2. GET and HEAD only
        if method != "GET" && method != "HEAD" {
            tracing::warn!(
                request_id = %ctx.request_id(),
                client_ip = %ctx.client_ip(),
                method = %method,
                "Method not allowed"
            );
            let response = special_endpoints::method_not_allowed(&method);
            helpers::write_response(session, &response, head_only).await?;
            return Ok(true);
        }

        // 3. Health check
        if raw_path == special_endpoints::HEALTH_PATH {
            let response = special_endpoints::handle_health(self.start_time);
            helpers::write_response(session, &response, head_only).await?;
            return Ok(true);
        }

        // 4. Image pipeline
        let response = self.proxy.handle(ctx).await;
        helpers::write_response(session, &response, head_only).await?;

        Ok(true)
    }

    /// Log request completion for debugging
    async fn logging(
        &self,
        session: &mut Session,
        e: Option<&pingora_core::Error>,
        ctx: &mut Self::CTX,
    ) {
        let status = session
            .response_written()
            .map(|resp| resp.status.as_u16())
            .unwrap_or(500);

        match e {
            Some(error) => tracing::error!(
                request_id = %ctx.request_id(),
                method = %ctx.method(),
                path = %ctx.path(),
                state = %ctx.state(),
                status = status,
                error = %error,
                "Request failed"
            ),
            None => tracing::debug!(
                request_id = %ctx.request_id(),
                method = %ctx.method(),
                path = %ctx.path(),
                state = %ctx.state(),
                status = status,
                "Request completed"
            ),
        }
    }
}
