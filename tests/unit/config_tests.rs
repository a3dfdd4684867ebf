// Configuration loading and snapshot building tests

use imgproxy::config::*;
use imgproxy::path_validator::{ValidatePath, ValidatorRegistry};
use imgproxy::source::Addressing;
use std::io::Write;
use tempfile::NamedTempFile;

const FULL_CONFIG: &str = r#"
server:
  address: "127.0.0.1"
  port: 9090
  environment: production
  request_timeout: 10

logging:
  level: debug
  format: text

route:
  prefix: img
  addressing: explicit_source

backends:
  public:
    type: memory
  bucket:
    type: s3
    bucket: images
    region: us-east-1
    endpoint: "http://localhost:9000"

sources:
  media: public
  archive:
    backend: bucket
    root: archive/2024
    validator:
      patterns: ["archive/2024/**/*.jpg"]
  avatars:
    backend: public
    validator:
      named: avatars_only

path_validator:
  extensions: [jpg, png, webp]

rate_limit:
  enabled: true
  max_attempts: 5
  key_prefix: thumbs
  on_limit: redirect

default_quality: 75

cache:
  max_age: 3600
  s_maxage: 0
  immutable: false
  stale_while_revalidate: 60

allowed_widths: [100, 200, 400]
allowed_formats: [jpg, webp]
"#;

fn registry() -> ValidatorRegistry {
    let mut registry = ValidatorRegistry::new();
    registry.register("avatars_only", |path: &str| path.starts_with("avatars/"));
    registry
}

#[test]
fn test_full_config_parses_and_validates() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(FULL_CONFIG.as_bytes()).unwrap();
    file.flush().unwrap();

    let config = Config::from_file(file.path()).unwrap();
    config.validate().unwrap();

    assert_eq!(config.server.listen_addr(), "127.0.0.1:9090");
    assert_eq!(config.route.normalized_prefix(), "img");
    assert_eq!(config.backends.len(), 2);
    assert_eq!(config.rate_limit.on_limit, OnLimit::Redirect);
    assert!(config.rate_limit_active());
}

#[test]
fn test_cache_header_from_config() {
    let config = Config::from_yaml_with_env(FULL_CONFIG).unwrap();
    assert_eq!(
        config.cache_control_header(),
        "public, max-age=3600, stale-while-revalidate=60"
    );
}

#[test]
fn test_resolver_snapshot() {
    let config = Config::from_yaml_with_env(FULL_CONFIG).unwrap();
    let resolver = config.build_resolver(&registry()).unwrap();

    assert_eq!(resolver.source_count(), 3);
    assert_eq!(resolver.addressing(), &Addressing::ExplicitSource);

    // Own validator sees the rooted path
    let archive = resolver.resolve("archive", "may/a.jpg").unwrap();
    assert_eq!(archive.full_path, "archive/2024/may/a.jpg");
    assert_eq!(archive.backend_id, "bucket");
    assert!(resolver.resolve("archive", "may/a.png").is_err());

    // Global fallback applies to the shorthand source
    assert!(resolver.resolve("media", "a.webp").is_ok());
    assert!(resolver.resolve("media", "a.gif").is_err());

    // Named predicate replaces the fallback
    let avatars = resolver.source("avatars").unwrap();
    assert!(avatars.validator.as_ref().unwrap().validate("avatars/a.gif"));
}

#[test]
fn test_transform_limits_snapshot() {
    let limits = Config::from_yaml_with_env(FULL_CONFIG)
        .unwrap()
        .transform_limits();

    assert_eq!(limits.default_quality, 75);
    assert_eq!(limits.allowed_widths, Some(vec![100, 200, 400]));
    assert!(limits.allowed_heights.is_none());
    assert_eq!(limits.max_height, 2000);
}

#[test]
fn test_missing_registry_entry_fails_build() {
    let config = Config::from_yaml_with_env(FULL_CONFIG).unwrap();
    assert!(config.build_resolver(&ValidatorRegistry::new()).is_err());
}

#[test]
fn test_invalid_yaml_is_error() {
    assert!(Config::from_yaml_with_env("sources: [unclosed").is_err());
}

#[test]
fn test_unknown_backend_type_is_error() {
    let yaml = r#"
backends:
  public:
    type: ftp
sources:
  media: public
"#;
    assert!(Config::from_yaml_with_env(yaml).is_err());
}
