// End-to-end pipeline tests: URL in, encoded image or error out

use super::test_harness::*;
use async_trait::async_trait;
use bytes::Bytes;
use imgproxy::image_optimizer::{RasterCodec, TransformLimits, TransformSpecBuilder};
use imgproxy::pipeline::{ImageProxy, PipelineState, RequestContext};
use imgproxy::router::Router;
use imgproxy::storage::{BlobStore, StorageError};
use mockall::mock;
use std::sync::Arc;
use std::time::Duration;

mock! {
    pub Store {}

    #[async_trait]
    impl BlobStore for Store {
        async fn exists(&self, backend_id: &str, path: &str) -> Result<bool, StorageError>;
        async fn read(&self, backend_id: &str, path: &str) -> Result<Bytes, StorageError>;
    }
}

/// Store that never calls back in time
struct SlowStore;

#[async_trait]
impl BlobStore for SlowStore {
    async fn exists(&self, _backend_id: &str, _path: &str) -> Result<bool, StorageError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(true)
    }

    async fn read(&self, _backend_id: &str, _path: &str) -> Result<Bytes, StorageError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(Bytes::new())
    }
}

fn untouched_store() -> Arc<dyn BlobStore> {
    let mut store = MockStore::new();
    store.expect_exists().never();
    store.expect_read().never();
    Arc::new(store)
}

#[tokio::test]
async fn test_resize_width_preserves_aspect_ratio() {
    let (_, store) = memory_store();
    let proxy = build_proxy(store);

    let response = get(&proxy, "/w=100/media/photo.jpg").await;

    assert_eq!(response.status, 200);
    assert_eq!(response.header("Content-Type"), Some("image/jpeg"));
    assert_eq!(
        response.header("Cache-Control"),
        Some("public, max-age=2592000, s-maxage=2592000, immutable")
    );

    let decoded = image::load_from_memory(&response.body).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (100, 50));
}

#[tokio::test]
async fn test_format_conversion_with_root() {
    let (_, store) = memory_store();
    let proxy = build_proxy(store);

    let response = get(&proxy, "/w=32,f=webp/assets/logo.png").await;

    assert_eq!(response.status, 200);
    assert_eq!(response.header("Content-Type"), Some("image/webp"));
    assert_eq!(&response.body[0..4], b"RIFF");
}

#[tokio::test]
async fn test_scaledown_never_upscales() {
    let (_, store) = memory_store();
    let proxy = build_proxy(store);

    let response = get(&proxy, "/w=400,h=400/media/photo.jpg").await;
    let decoded = image::load_from_memory(&response.body).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (200, 100));

    let response = get(&proxy, "/w=400,h=400,fit=scale/media/photo.jpg").await;
    let decoded = image::load_from_memory(&response.body).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (400, 200));
}

#[tokio::test]
async fn test_cover_and_contain_fill_the_box() {
    let (_, store) = memory_store();
    let proxy = build_proxy(store);

    for fit in ["cover", "contain", "crop"] {
        let path = format!("/w=50,h=50,fit={},f=png/media/photo.jpg", fit);
        let response = get(&proxy, &path).await;
        assert_eq!(response.status, 200, "fit={}", fit);

        let decoded = image::load_from_memory(&response.body).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (50, 50), "fit={}", fit);
    }
}

#[tokio::test]
async fn test_narrow_source_output_stays_within_limits() {
    let (backend, store) = memory_store();
    backend.insert("sliver.jpg", Bytes::from(jpeg_fixture(1, 100)));
    let proxy = build_proxy(store);

    for fit in ["scale", "cover", "contain"] {
        let path = format!("/w=2000,fit={},f=png/media/sliver.jpg", fit);
        let response = get(&proxy, &path).await;
        assert_eq!(response.status, 200, "fit={}", fit);

        let decoded = image::load_from_memory(&response.body).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (20, 2000), "fit={}", fit);
    }
}

#[tokio::test]
async fn test_invalid_fit_is_400_without_loading() {
    let proxy = build_proxy(untouched_store());

    let response = get(&proxy, "/w=100,fit=invalid/media/photo.jpg").await;

    assert_eq!(response.status, 400);
    assert_eq!(error_kind(&response), "invalid_fit");
}

#[tokio::test]
async fn test_oversized_width_is_400_without_loading() {
    let proxy = build_proxy(untouched_store());

    let response = get(&proxy, "/w=5000/media/photo.jpg").await;
    assert_eq!(response.status, 400);
    assert_eq!(error_kind(&response), "invalid_dimension");

    let response = get(&proxy, "/q=150/media/photo.jpg").await;
    assert_eq!(response.status, 400);
    assert_eq!(error_kind(&response), "invalid_quality");
}

#[tokio::test]
async fn test_traversal_is_403_without_loading() {
    let proxy = build_proxy(untouched_store());

    for path in [
        "/w=100/media/../secret.jpg",
        "/w=100/media/a/../../secret.jpg",
        "/w=100/media/%2e%2e/secret.jpg",
    ] {
        let response = get(&proxy, path).await;
        assert_eq!(response.status, 403, "{}", path);
        assert_eq!(error_kind(&response), "directory_traversal");
    }
}

#[tokio::test]
async fn test_unknown_source_is_404_without_loading() {
    let proxy = build_proxy(untouched_store());

    let response = get(&proxy, "/w=100/thumbs/photo.jpg").await;
    assert_eq!(response.status, 404);
    assert_eq!(error_kind(&response), "unknown_source");
}

#[tokio::test]
async fn test_missing_image_is_404() {
    let (_, store) = memory_store();
    let proxy = build_proxy(store);

    let response = get(&proxy, "/w=100/media/missing.jpg").await;
    assert_eq!(response.status, 404);
    assert_eq!(error_kind(&response), "not_found");
}

#[tokio::test]
async fn test_unmatched_route_is_404() {
    let proxy = build_proxy(untouched_store());

    for path in ["/", "/media/photo.jpg", "/w=100/media/photo", "/w=1.5/media/photo.jpg"] {
        let response = get(&proxy, path).await;
        assert_eq!(response.status, 404, "{}", path);
        assert_eq!(error_kind(&response), "route_not_matched");
    }
}

#[tokio::test]
async fn test_undecodable_bytes_are_500() {
    let (backend, store) = memory_store();
    backend.insert("broken.jpg", Bytes::from_static(b"not an image"));
    let proxy = build_proxy(store);

    let response = get(&proxy, "/w=100/media/broken.jpg").await;
    assert_eq!(response.status, 500);
    assert_eq!(error_kind(&response), "decode_failure");
}

#[tokio::test]
async fn test_unencodable_format_is_500() {
    let (backend, store) = memory_store();
    backend.insert("photo.bmp", Bytes::from(jpeg_fixture(10, 10)));

    let proxy = ImageProxy::new(
        Router::new(true, "").unwrap(),
        explicit_resolver(),
        TransformSpecBuilder::new(TransformLimits {
            allowed_formats: Vec::new(),
            ..TransformLimits::default()
        }),
        store,
        Arc::new(RasterCodec::new()),
    );

    // Source extension becomes the output format and no encoder exists for it
    let response = get(&proxy, "/w=5/media/photo.bmp").await;
    assert_eq!(response.status, 500);
    assert_eq!(error_kind(&response), "encode_failure");
}

#[tokio::test]
async fn test_storage_failure_is_500() {
    let mut store = MockStore::new();
    store.expect_exists().returning(|_, _| Ok(true));
    store
        .expect_read()
        .returning(|_, _| Err(StorageError::Backend("connection reset".to_string())));
    let proxy = build_proxy(Arc::new(store));

    let response = get(&proxy, "/w=100/media/photo.jpg").await;
    assert_eq!(response.status, 500);
    assert_eq!(error_kind(&response), "storage_error");
}

#[tokio::test]
async fn test_load_timeout() {
    let proxy = build_proxy(Arc::new(SlowStore))
        .with_timeouts(Duration::from_millis(50), Duration::from_secs(5));

    let response = get(&proxy, "/w=100/media/photo.jpg").await;
    assert_eq!(response.status, 500);
    assert_eq!(error_kind(&response), "upstream_timeout");
}

#[tokio::test]
async fn test_store_receives_rooted_path() {
    let mut store = MockStore::new();
    store
        .expect_exists()
        .withf(|backend, path| backend == "public" && path == "uploads/images/logo.png")
        .times(1)
        .returning(|_, _| Ok(false));
    store.expect_read().never();
    let proxy = build_proxy(Arc::new(store));

    let response = get(&proxy, "/w=10/assets/logo.png").await;
    assert_eq!(response.status, 404);
}

#[tokio::test]
async fn test_cancelled_request_stops_before_loading() {
    let proxy = build_proxy(untouched_store());
    let mut ctx = RequestContext::new("GET", "/w=100/media/photo.jpg", "198.51.100.7");
    ctx.cancel();

    let response = proxy.handle(&mut ctx).await;
    assert_eq!(response.status, 499);
    assert_eq!(ctx.state(), PipelineState::Failed("cancelled"));
}

#[tokio::test]
async fn test_context_reaches_respond() {
    let (_, store) = memory_store();
    let proxy = build_proxy(store);
    let mut ctx = RequestContext::new("GET", "/h=20/media/photo.jpg", "198.51.100.7");

    let response = proxy.handle(&mut ctx).await;
    assert_eq!(response.status, 200);
    assert_eq!(ctx.state(), PipelineState::Respond);
}
