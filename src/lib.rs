// Imgproxy Library
// Image transformation proxy: routing, source resolution, path allow-lists,
// bounds-checked transforms and CDN cache headers

pub mod cache;
pub mod config;
pub mod constants;
pub mod error;
pub mod image_optimizer;
pub mod logging;
pub mod path_validator;
pub mod pipeline;
pub mod proxy;
pub mod rate_limit;
pub mod router;
pub mod security;
pub mod source;
pub mod storage;
