// Request pipeline module - carries one request from URL to encoded image
//
// States run strictly in order and any failure short-circuits:
//   Start -> RateLimitCheck -> SourceResolve -> PathValidate -> OptionsParse
//         -> TransformValidate -> Load -> Transform -> HeaderBuild -> Respond
// Every validation step runs before the first storage call.

use bytes::Bytes;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::config::{Config, OnLimit};
use crate::error::ProxyError;
use crate::image_optimizer::{ImageCodec, ProcessedImage, TransformSpec, TransformSpecBuilder};
use crate::path_validator::ValidatorRegistry;
use crate::rate_limit::{RateLimitError, RateLimitGate};
use crate::router::{RouteMatch, Router};
use crate::source::{ResolvedRequest, SourceResolver};
use crate::storage::BlobStore;

/// Where a request currently is in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Start,
    RateLimitCheck,
    SourceResolve,
    PathValidate,
    OptionsParse,
    TransformValidate,
    Load,
    Transform,
    HeaderBuild,
    Respond,
    /// Terminal failure, tagged with the error kind
    Failed(&'static str),
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Start => "start",
            PipelineState::RateLimitCheck => "rate_limit_check",
            PipelineState::SourceResolve => "source_resolve",
            PipelineState::PathValidate => "path_validate",
            PipelineState::OptionsParse => "options_parse",
            PipelineState::TransformValidate => "transform_validate",
            PipelineState::Load => "load",
            PipelineState::Transform => "transform",
            PipelineState::HeaderBuild => "header_build",
            PipelineState::Respond => "respond",
            PipelineState::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Respond | PipelineState::Failed(_))
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request context that holds all information about an HTTP request
/// as it flows through the pipeline
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: String,
    method: String,
    path: String,
    client_ip: String,
    timestamp: u64,
    state: PipelineState,
    cancelled: Arc<AtomicBool>,
}

impl RequestContext {
    /// Create a new RequestContext from HTTP request information
    /// Automatically generates a unique request ID (UUID v4) and captures current timestamp
    pub fn new(method: impl Into<String>, path: impl Into<String>, client_ip: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            method: method.into(),
            path: path.into(),
            client_ip: client_ip.into(),
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
            state: PipelineState::Start,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get the unique request ID
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn client_ip(&self) -> &str {
        &self.client_ip
    }

    /// Get the request timestamp (Unix epoch seconds)
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Shared flag; setting it aborts the pipeline at the next transition
    pub fn cancellation_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Move to `next`, failing with `Cancelled` if the client went away
    fn advance(&mut self, next: PipelineState) -> Result<(), ProxyError> {
        if self.is_cancelled() {
            return Err(ProxyError::Cancelled);
        }
        self.state = next;
        Ok(())
    }

    fn fail(&mut self, error: &ProxyError) {
        self.state = PipelineState::Failed(error.kind());
    }
}

/// Complete response produced by the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl ProxyResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// First header named `name` (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// JSON error response with the error's status
    pub fn from_error(error: &ProxyError) -> Self {
        Self::new(error.to_http_status())
            .with_header("Content-Type", "application/json")
            .with_body(error.to_json_body())
    }

    pub fn redirect(location: impl Into<String>) -> Self {
        Self::new(302).with_header("Location", location)
    }
}

/// Rate limiting as deployed: gate, deny policy and key shape
#[derive(Debug, Clone)]
pub struct RateLimitPolicy {
    pub gate: RateLimitGate,
    pub on_limit: OnLimit,
    pub key_includes_options: bool,
}

enum Outcome {
    Image(ProcessedImage),
    Redirect(String),
}

/// The image proxy: immutable component snapshots plus injected collaborators
pub struct ImageProxy {
    router: Router,
    resolver: SourceResolver,
    specs: TransformSpecBuilder,
    store: Arc<dyn BlobStore>,
    codec: Arc<dyn ImageCodec>,
    cache_control: String,
    rate_limit: Option<RateLimitPolicy>,
    load_timeout: Duration,
    transform_timeout: Duration,
}

impl ImageProxy {
    pub fn new(
        router: Router,
        resolver: SourceResolver,
        specs: TransformSpecBuilder,
        store: Arc<dyn BlobStore>,
        codec: Arc<dyn ImageCodec>,
    ) -> Self {
        let default_timeout = Duration::from_secs(crate::constants::DEFAULT_REQUEST_TIMEOUT_SECS);
        Self {
            router,
            resolver,
            specs,
            store,
            codec,
            cache_control: crate::cache::CacheControlBuilder::build(&Default::default()),
            rate_limit: None,
            load_timeout: default_timeout,
            transform_timeout: default_timeout,
        }
    }

    /// Build every component from a validated configuration
    ///
    /// `gate` is only kept when rate limiting is active for the environment.
    pub fn from_config(
        config: &Config,
        registry: &ValidatorRegistry,
        store: Arc<dyn BlobStore>,
        codec: Arc<dyn ImageCodec>,
        gate: Option<RateLimitGate>,
    ) -> Result<Self, String> {
        let router = Router::new(config.route.enabled, config.route.normalized_prefix())
            .map_err(|e| format!("Failed to compile route patterns: {}", e))?;
        let resolver = config.build_resolver(registry)?;
        let specs = TransformSpecBuilder::new(config.transform_limits());

        let mut proxy = Self::new(router, resolver, specs, store, codec)
            .with_cache_control(config.cache_control_header())
            .with_timeout(config.server.request_timeout());

        if config.rate_limit_active() {
            if let Some(gate) = gate {
                proxy = proxy.with_rate_limit(RateLimitPolicy {
                    gate,
                    on_limit: config.rate_limit.on_limit,
                    key_includes_options: config.rate_limit.key_includes_options,
                });
            }
        }

        Ok(proxy)
    }

    pub fn with_cache_control(mut self, header: impl Into<String>) -> Self {
        self.cache_control = header.into();
        self
    }

    pub fn with_rate_limit(mut self, policy: RateLimitPolicy) -> Self {
        self.rate_limit = Some(policy);
        self
    }

    /// Same timeout for load and transform
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_timeouts(timeout, timeout)
    }

    pub fn with_timeouts(mut self, load: Duration, transform: Duration) -> Self {
        self.load_timeout = load;
        self.transform_timeout = transform;
        self
    }

    pub fn cache_control(&self) -> &str {
        &self.cache_control
    }

    pub fn resolver(&self) -> &SourceResolver {
        &self.resolver
    }

    pub fn rate_limited(&self) -> bool {
        self.rate_limit.is_some()
    }

    /// Run the pipeline and turn any failure into an error response
    pub async fn handle(&self, ctx: &mut RequestContext) -> ProxyResponse {
        let started = Instant::now();

        match self.process(ctx).await {
            Ok(Outcome::Image(image)) => {
                tracing::info!(
                    request_id = %ctx.request_id(),
                    client_ip = %ctx.client_ip(),
                    path = %ctx.path(),
                    status = 200,
                    format = image.format.as_str(),
                    original_width = image.original_size.0,
                    original_height = image.original_size.1,
                    width = image.output_size.0,
                    height = image.output_size.1,
                    bytes = image.data.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Image served"
                );
                ProxyResponse::new(200)
                    .with_header("Content-Type", image.content_type)
                    .with_header("Cache-Control", self.cache_control.clone())
                    .with_body(image.data)
            }
            Ok(Outcome::Redirect(location)) => {
                tracing::info!(
                    request_id = %ctx.request_id(),
                    client_ip = %ctx.client_ip(),
                    location = %location,
                    status = 302,
                    "Rate limited request redirected to original"
                );
                ProxyResponse::redirect(location)
            }
            Err(error) => {
                let failed_at = ctx.state();
                ctx.fail(&error);
                tracing::warn!(
                    request_id = %ctx.request_id(),
                    client_ip = %ctx.client_ip(),
                    path = %ctx.path(),
                    state = %failed_at,
                    error_kind = error.kind(),
                    status = error.to_http_status(),
                    error = %error,
                    "Request rejected"
                );

                let response = ProxyResponse::from_error(&error);
                match (&error, &self.rate_limit) {
                    (ProxyError::RateLimited { .. }, Some(policy)) => response.with_header(
                        "Retry-After",
                        policy.gate.window().as_secs().max(1).to_string(),
                    ),
                    _ => response,
                }
            }
        }
    }

    async fn process(&self, ctx: &mut RequestContext) -> Result<Outcome, ProxyError> {
        ctx.advance(PipelineState::Start)?;
        let route = self.router.route(ctx.path(), &self.resolver)?;

        if let Some(policy) = &self.rate_limit {
            ctx.advance(PipelineState::RateLimitCheck)?;
            if let Some(outcome) = self.check_rate_limit(policy, ctx, &route).await? {
                return Ok(outcome);
            }
        }

        ctx.advance(PipelineState::SourceResolve)?;
        if self.resolver.source(&route.source).is_none() {
            return Err(ProxyError::UnknownSource {
                source_key: route.source.clone(),
            });
        }

        ctx.advance(PipelineState::PathValidate)?;
        let resolved = self.resolver.resolve(&route.source, &route.path)?;

        ctx.advance(PipelineState::OptionsParse)?;
        let options = &route.options;

        ctx.advance(PipelineState::TransformValidate)?;
        let spec = self.specs.build(options, &route.source_extension())?;

        ctx.advance(PipelineState::Load)?;
        let data = self.load(&resolved).await?;

        ctx.advance(PipelineState::Transform)?;
        let image = self.transform(data, spec).await?;

        ctx.advance(PipelineState::HeaderBuild)?;
        ctx.advance(PipelineState::Respond)?;
        Ok(Outcome::Image(image))
    }

    async fn check_rate_limit(
        &self,
        policy: &RateLimitPolicy,
        ctx: &RequestContext,
        route: &RouteMatch,
    ) -> Result<Option<Outcome>, ProxyError> {
        let key_path = route.rate_limit_path(policy.key_includes_options);

        match policy.gate.check(ctx.client_ip(), &key_path).await {
            Ok(()) => Ok(None),
            Err(RateLimitError::Exceeded { identity, .. }) => match policy.on_limit {
                OnLimit::Reject => Err(ProxyError::RateLimited { identity }),
                OnLimit::Redirect => Ok(Some(Outcome::Redirect(format!(
                    "/{}",
                    route.original_path()
                )))),
            },
            // The gate already failed open on store errors
            Err(RateLimitError::Store(_)) => Ok(None),
        }
    }

    async fn load(&self, resolved: &ResolvedRequest) -> Result<Bytes, ProxyError> {
        let fetch = async {
            if !self
                .store
                .exists(&resolved.backend_id, &resolved.full_path)
                .await?
            {
                return Err(ProxyError::NotFound {
                    path: resolved.full_path.clone(),
                });
            }
            let data = self
                .store
                .read(&resolved.backend_id, &resolved.full_path)
                .await?;
            Ok::<Bytes, ProxyError>(data)
        };

        tokio::time::timeout(self.load_timeout, fetch)
            .await
            .map_err(|_| ProxyError::UpstreamTimeout {
                stage: "load",
                timeout_ms: self.load_timeout.as_millis() as u64,
            })?
    }

    async fn transform(&self, data: Bytes, spec: TransformSpec) -> Result<ProcessedImage, ProxyError> {
        let codec = Arc::clone(&self.codec);
        let task = tokio::task::spawn_blocking(move || codec.transform(&data, &spec));

        let joined = tokio::time::timeout(self.transform_timeout, task)
            .await
            .map_err(|_| ProxyError::UpstreamTimeout {
                stage: "transform",
                timeout_ms: self.transform_timeout.as_millis() as u64,
            })?;

        let result = joined.map_err(|e| ProxyError::EncodeFailure {
            message: format!("Transform task failed: {}", e),
        })?;

        Ok(result?)
    }
}

impl fmt::Debug for ImageProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageProxy")
            .field("router", &self.router)
            .field("sources", &self.resolver.source_count())
            .field("cache_control", &self.cache_control)
            .field("rate_limit", &self.rate_limit)
            .field("load_timeout", &self.load_timeout)
            .field("transform_timeout", &self.transform_timeout)
            .finish_non_exhaustive()
    }
}
