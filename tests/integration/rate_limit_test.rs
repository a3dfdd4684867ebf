// Rate limiting through the full pipeline

use super::test_harness::*;
use imgproxy::config::{Config, OnLimit};
use imgproxy::image_optimizer::RasterCodec;
use imgproxy::path_validator::ValidatorRegistry;
use imgproxy::pipeline::{ImageProxy, RateLimitPolicy, RequestContext};
use imgproxy::rate_limit::{InMemoryCounterStore, RateLimitGate};
use std::sync::Arc;
use std::time::Duration;

fn policy(max_attempts: u64, on_limit: OnLimit, key_includes_options: bool) -> RateLimitPolicy {
    RateLimitPolicy {
        gate: RateLimitGate::new(
            Arc::new(InMemoryCounterStore::new()),
            max_attempts,
            Duration::from_secs(60),
            "image-proxy",
        ),
        on_limit,
        key_includes_options,
    }
}

#[tokio::test]
async fn test_reject_after_max_attempts() {
    let (_, store) = memory_store();
    let proxy = build_proxy(store).with_rate_limit(policy(2, OnLimit::Reject, false));

    assert_eq!(get(&proxy, "/w=10/media/photo.jpg").await.status, 200);
    assert_eq!(get(&proxy, "/w=10/media/photo.jpg").await.status, 200);

    let response = get(&proxy, "/w=10/media/photo.jpg").await;
    assert_eq!(response.status, 429);
    assert_eq!(error_kind(&response), "rate_limited");
    assert_eq!(response.header("Retry-After"), Some("60"));
}

#[tokio::test]
async fn test_redirect_to_original_path() {
    let (_, store) = memory_store();
    let proxy = build_proxy(store).with_rate_limit(policy(1, OnLimit::Redirect, false));

    assert_eq!(get(&proxy, "/w=10/media/photo.jpg").await.status, 200);

    let response = get(&proxy, "/w=10/media/photo.jpg").await;
    assert_eq!(response.status, 302);
    assert_eq!(response.header("Location"), Some("/media/photo.jpg"));
    assert!(response.body.is_empty());
}

#[tokio::test]
async fn test_transforms_share_quota_by_default() {
    let (_, store) = memory_store();
    let proxy = build_proxy(store).with_rate_limit(policy(1, OnLimit::Reject, false));

    assert_eq!(get(&proxy, "/w=10/media/photo.jpg").await.status, 200);
    assert_eq!(get(&proxy, "/w=20/media/photo.jpg").await.status, 429);
}

#[tokio::test]
async fn test_options_in_key_separate_transforms() {
    let (_, store) = memory_store();
    let proxy = build_proxy(store).with_rate_limit(policy(1, OnLimit::Reject, true));

    assert_eq!(get(&proxy, "/w=10/media/photo.jpg").await.status, 200);
    assert_eq!(get(&proxy, "/w=20/media/photo.jpg").await.status, 200);
    assert_eq!(get(&proxy, "/w=10/media/photo.jpg").await.status, 429);
}

#[tokio::test]
async fn test_paths_and_clients_are_independent() {
    let (_, store) = memory_store();
    let proxy = build_proxy(store).with_rate_limit(policy(1, OnLimit::Reject, false));

    assert_eq!(get(&proxy, "/w=10/media/photo.jpg").await.status, 200);
    assert_eq!(get(&proxy, "/w=10/assets/logo.png").await.status, 200);

    let mut other_client = RequestContext::new("GET", "/w=10/media/photo.jpg", "203.0.113.9");
    assert_eq!(proxy.handle(&mut other_client).await.status, 200);

    assert_eq!(get(&proxy, "/w=10/media/photo.jpg").await.status, 429);
}

#[tokio::test]
async fn test_unmatched_routes_are_not_counted() {
    let (_, store) = memory_store();
    let proxy = build_proxy(store).with_rate_limit(policy(1, OnLimit::Reject, false));

    for _ in 0..3 {
        assert_eq!(get(&proxy, "/media/photo.jpg").await.status, 404);
    }
    assert_eq!(get(&proxy, "/w=10/media/photo.jpg").await.status, 200);
}

const LIMITED_CONFIG: &str = r#"
server:
  environment: ENVIRONMENT
backends:
  public:
    type: memory
sources:
  media: public
rate_limit:
  enabled: true
  max_attempts: 1
"#;

async fn proxy_for_environment(environment: &str) -> ImageProxy {
    let config =
        Config::from_yaml_with_env(&LIMITED_CONFIG.replace("ENVIRONMENT", environment)).unwrap();
    config.validate().unwrap();

    let gate = RateLimitGate::from_config(&config.rate_limit).await.unwrap();
    let (_, store) = memory_store();
    ImageProxy::from_config(
        &config,
        &ValidatorRegistry::new(),
        store,
        Arc::new(RasterCodec::new()),
        Some(gate),
    )
    .unwrap()
}

#[tokio::test]
async fn test_limit_only_applies_in_production() {
    let production = proxy_for_environment("production").await;
    assert!(production.rate_limited());
    assert_eq!(get(&production, "/w=10/media/photo.jpg").await.status, 200);
    assert_eq!(get(&production, "/w=10/media/photo.jpg").await.status, 429);

    let development = proxy_for_environment("development").await;
    assert!(!development.rate_limited());
    for _ in 0..3 {
        assert_eq!(get(&development, "/w=10/media/photo.jpg").await.status, 200);
    }
}

#[tokio::test]
async fn test_flood_of_new_paths_keeps_existing_denial() {
    let (_, store) = memory_store();
    let proxy = build_proxy(store).with_rate_limit(policy(1, OnLimit::Reject, false));

    assert_eq!(get(&proxy, "/w=10/media/photo.jpg").await.status, 200);
    assert_eq!(get(&proxy, "/w=10/media/photo.jpg").await.status, 429);

    // Each distinct path is a fresh identity; none of them exist in storage
    for i in 0..2_000 {
        let path = format!("/w=10/media/flood-{}.jpg", i);
        let mut ctx = RequestContext::new("GET", &path, "203.0.113.66");
        assert_eq!(proxy.handle(&mut ctx).await.status, 404);
    }

    assert_eq!(get(&proxy, "/w=10/media/photo.jpg").await.status, 429);
}
