//! Per-client, per-path Rate Limiting with Fixed Windows
//!
//! Each request is counted against an identity built as
//! `<key_prefix>:<client_ip>:<path>`, so the same client hitting different
//! images is limited independently. A request is allowed while its count in
//! the current window is at most `max_attempts`.
//!
//! Counters live behind the [`RateCounterStore`] trait:
//! - [`InMemoryCounterStore`]: process-local fixed windows in a bounded,
//!   expiring `moka` cache (single instance)
//! - [`RedisCounterStore`]: `SET NX EX` + `INCR` in one transaction, shared
//!   across instances
//!
//! A failing store never blocks traffic: the gate logs a warning and allows
//! the request.
//!
//! ## Configuration Example
//!
//! ```yaml
//! server:
//!   environment: production   # limits only apply in production
//!
//! rate_limit:
//!   enabled: true
//!   max_attempts: 10
//!   window_seconds: 60
//!   key_prefix: image-proxy
//!   on_limit: reject          # or redirect
//!   store:
//!     type: redis
//!     url: "redis://127.0.0.1:6379"
//! ```

use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use redis::aio::ConnectionManager;
use redis::Client;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{CounterStoreConfig, RateLimitConfig};

/// Maximum number of identities tracked by the in-memory store
const DEFAULT_MAX_TRACKED_IDENTITIES: u64 = 100_000;

/// Rate limiting failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitError {
    /// Identity exceeded its quota for the current window
    Exceeded { identity: String, retry_after: Duration },
    /// Counter store could not be reached or answered garbage
    Store(String),
}

impl std::fmt::Display for RateLimitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RateLimitError::Exceeded { identity, retry_after } => write!(
                f,
                "Rate limit exceeded for {} (retry after {}s)",
                identity,
                retry_after.as_secs()
            ),
            RateLimitError::Store(message) => write!(f, "Rate counter store error: {}", message),
        }
    }
}

impl std::error::Error for RateLimitError {}

/// Atomic increment-and-read of a windowed counter
#[async_trait]
pub trait RateCounterStore: Send + Sync {
    /// Count this hit and return the number of hits in the current window
    async fn increment(&self, identity: &str, window: Duration) -> Result<u64, RateLimitError>;
}

/// One identity's hits in its current window
struct WindowCounter {
    count: AtomicU64,
    window: Duration,
}

/// Each counter lives exactly one window from its first hit
struct WindowExpiry;

impl Expiry<String, Arc<WindowCounter>> for WindowExpiry {
    fn expire_after_create(
        &self,
        _identity: &String,
        counter: &Arc<WindowCounter>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(counter.window)
    }
}

/// Process-local fixed-window counters
///
/// Backed by a bounded `moka` cache: counters expire individually when their
/// window ends, and at capacity the cache's frequency-aware admission keeps
/// hot identities over one-off ones. Live counters are never dropped in bulk,
/// so flooding the store with fresh identities cannot reset anyone's quota.
pub struct InMemoryCounterStore {
    counters: Cache<String, Arc<WindowCounter>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::with_capacity_limit(DEFAULT_MAX_TRACKED_IDENTITIES)
    }

    /// Store that tracks at most `max_tracked` identities
    pub fn with_capacity_limit(max_tracked: u64) -> Self {
        Self {
            counters: Cache::builder()
                .max_capacity(max_tracked.max(1))
                .expire_after(WindowExpiry)
                .build(),
        }
    }

    /// Live identities, after pending expirations and evictions are applied
    pub async fn tracked_count(&self) -> u64 {
        self.counters.run_pending_tasks().await;
        self.counters.entry_count()
    }
}

impl Default for InMemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateCounterStore for InMemoryCounterStore {
    async fn increment(&self, identity: &str, window: Duration) -> Result<u64, RateLimitError> {
        let counter = self
            .counters
            .get_with(identity.to_string(), async move {
                Arc::new(WindowCounter {
                    count: AtomicU64::new(0),
                    window,
                })
            })
            .await;

        Ok(counter.count.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

/// Redis-backed counters shared by every proxy instance
///
/// The first hit in a window creates the key with its TTL, so the window
/// starts at the first request rather than on a wall-clock boundary. Key
/// creation and the increment run in one MULTI/EXEC, so a key never exists
/// without an expiry.
pub struct RedisCounterStore {
    connection: ConnectionManager,
}

impl RedisCounterStore {
    pub async fn connect(redis_url: &str) -> Result<Self, RateLimitError> {
        let client = Client::open(redis_url)
            .map_err(|e| RateLimitError::Store(format!("Invalid Redis URL: {}", e)))?;

        // Connection manager handles reconnection
        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| RateLimitError::Store(format!("Failed to connect to Redis: {}", e)))?;

        Ok(Self { connection })
    }
}

/// `SET identity 0 EX window NX` then `INCR identity`, as one transaction
fn window_increment(identity: &str, window: Duration) -> redis::Pipeline {
    let mut pipe = redis::pipe();
    pipe.atomic()
        .cmd("SET")
        .arg(identity)
        .arg(0)
        .arg("EX")
        .arg(window.as_secs().max(1))
        .arg("NX")
        .ignore()
        .cmd("INCR")
        .arg(identity);
    pipe
}

#[async_trait]
impl RateCounterStore for RedisCounterStore {
    async fn increment(&self, identity: &str, window: Duration) -> Result<u64, RateLimitError> {
        let mut conn = self.connection.clone();

        let (count,): (u64,) = window_increment(identity, window)
            .query_async(&mut conn)
            .await
            .map_err(|e| RateLimitError::Store(e.to_string()))?;

        Ok(count)
    }
}

/// Decides whether a request exceeds its per-identity quota
#[derive(Clone)]
pub struct RateLimitGate {
    store: Arc<dyn RateCounterStore>,
    max_attempts: u64,
    window: Duration,
    key_prefix: String,
}

impl RateLimitGate {
    pub fn new(
        store: Arc<dyn RateCounterStore>,
        max_attempts: u64,
        window: Duration,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            max_attempts: max_attempts.max(1),
            window,
            key_prefix: key_prefix.into(),
        }
    }

    pub fn max_attempts(&self) -> u64 {
        self.max_attempts
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// `<prefix>:<client_ip>:<path>`
    pub fn identity(&self, client_ip: &str, path: &str) -> String {
        format!("{}:{}:{}", self.key_prefix, client_ip, path)
    }

    /// True when `identity` is still within quota
    ///
    /// Store failures allow the request.
    pub async fn allow(&self, identity: &str) -> bool {
        match self.store.increment(identity, self.window).await {
            Ok(count) => count <= self.max_attempts,
            Err(e) => {
                tracing::warn!(
                    identity = %identity,
                    error = %e,
                    "Rate counter store failed, allowing request"
                );
                true
            }
        }
    }

    /// Count a request for `client_ip` on `path`
    pub async fn check(&self, client_ip: &str, path: &str) -> Result<(), RateLimitError> {
        let identity = self.identity(client_ip, path);
        if self.allow(&identity).await {
            Ok(())
        } else {
            tracing::warn!(
                identity = %identity,
                max_attempts = self.max_attempts,
                window_secs = self.window.as_secs(),
                "Rate limit exceeded"
            );
            Err(RateLimitError::Exceeded {
                identity,
                retry_after: self.window,
            })
        }
    }
}

impl RateLimitGate {
    /// Build the gate and its counter store from configuration
    pub async fn from_config(config: &RateLimitConfig) -> Result<Self, RateLimitError> {
        let store: Arc<dyn RateCounterStore> = match &config.store {
            CounterStoreConfig::Memory => Arc::new(InMemoryCounterStore::new()),
            CounterStoreConfig::Redis { url } => {
                Arc::new(RedisCounterStore::connect(url).await?)
            }
        };

        Ok(Self::new(
            store,
            config.max_attempts,
            config.window(),
            config.key_prefix.clone(),
        ))
    }
}

impl std::fmt::Debug for RateLimitGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitGate")
            .field("max_attempts", &self.max_attempts)
            .field("window", &self.window)
            .field("key_prefix", &self.key_prefix)
            .finish_non_exhaustive()
    }
}
