// Shared fixtures for in-process pipeline tests

use bytes::Bytes;
use image::{DynamicImage, ImageOutputFormat, RgbImage};
use imgproxy::image_optimizer::{RasterCodec, TransformLimits, TransformSpecBuilder};
use imgproxy::pipeline::{ImageProxy, ProxyResponse, RequestContext};
use imgproxy::router::Router;
use imgproxy::source::{Addressing, SourceConfig, SourceResolver};
use imgproxy::storage::{BackendRegistry, BlobStore, MemoryBackend};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;

/// Encode a solid-colour RGB image of the given size
pub fn jpeg_fixture(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, image::Rgb([200, 80, 40]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageOutputFormat::Jpeg(90))
        .unwrap();
    out.into_inner()
}

pub fn png_fixture(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, image::Rgb([10, 120, 240]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageOutputFormat::Png)
        .unwrap();
    out.into_inner()
}

/// Memory backend `public` holding `photo.jpg` (200x100) and
/// `uploads/images/logo.png` (64x64)
pub fn memory_store() -> (MemoryBackend, Arc<dyn BlobStore>) {
    let backend = MemoryBackend::new();
    backend.insert("photo.jpg", Bytes::from(jpeg_fixture(200, 100)));
    backend.insert("uploads/images/logo.png", Bytes::from(png_fixture(64, 64)));

    let mut registry = BackendRegistry::new();
    registry.register("public", Arc::new(backend.clone()));
    (backend, Arc::new(registry))
}

/// `media` (no root) and `assets` (root `uploads/images`) on backend `public`
pub fn explicit_resolver() -> SourceResolver {
    let mut sources = HashMap::new();
    sources.insert("media".to_string(), SourceConfig::backend("public"));
    sources.insert(
        "assets".to_string(),
        SourceConfig::backend("public").with_root("uploads/images"),
    );
    SourceResolver::new(sources, Addressing::ExplicitSource)
}

pub fn build_proxy(store: Arc<dyn BlobStore>) -> ImageProxy {
    ImageProxy::new(
        Router::new(true, "").unwrap(),
        explicit_resolver(),
        TransformSpecBuilder::new(TransformLimits::default()),
        store,
        Arc::new(RasterCodec::new()),
    )
}

pub async fn get(proxy: &ImageProxy, path: &str) -> ProxyResponse {
    let mut ctx = RequestContext::new("GET", path, "198.51.100.7");
    proxy.handle(&mut ctx).await
}

pub fn error_kind(response: &ProxyResponse) -> String {
    let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
    body["error"].as_str().unwrap_or_default().to_string()
}
