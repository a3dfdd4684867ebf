// Source resolution tests

use imgproxy::error::ProxyError;
use imgproxy::path_validator::{PathValidator, PredicateValidator};
use imgproxy::source::{Addressing, ResolvedRequest, SourceConfig, SourceResolver};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

fn resolver(entries: Vec<(&str, SourceConfig)>, addressing: Addressing) -> SourceResolver {
    SourceResolver::new(
        entries
            .into_iter()
            .map(|(key, config)| (key.to_string(), config))
            .collect::<HashMap<_, _>>(),
        addressing,
    )
}

#[test]
fn test_validator_receives_full_path() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&seen);
    let validator = PredicateValidator::new("capture", move |path: &str| {
        captured.lock().push(path.to_string());
        true
    });

    let resolver = resolver(
        vec![(
            "media",
            SourceConfig::backend("public")
                .with_root("uploads/images")
                .with_validator(validator),
        )],
        Addressing::ExplicitSource,
    );

    let resolved = resolver.resolve("media", "photo.jpg").unwrap();
    assert_eq!(
        resolved,
        ResolvedRequest {
            backend_id: "public".to_string(),
            full_path: "uploads/images/photo.jpg".to_string(),
        }
    );
    assert_eq!(*seen.lock(), vec!["uploads/images/photo.jpg".to_string()]);
}

#[test]
fn test_root_scoped_directory_rule() {
    let resolver = resolver(
        vec![(
            "media",
            SourceConfig::backend("public")
                .with_root("/uploads/")
                .with_validator(PathValidator::new().directories(["uploads/images"])),
        )],
        Addressing::ExplicitSource,
    );

    assert!(resolver.resolve("media", "images/a.jpg").is_ok());
    assert_eq!(
        resolver.resolve("media", "docs/a.jpg"),
        Err(ProxyError::PathNotAllowed {
            path: "uploads/docs/a.jpg".to_string()
        })
    );
}

#[test]
fn test_unknown_source_is_404() {
    let resolver = resolver(
        vec![("media", SourceConfig::backend("public"))],
        Addressing::ExplicitSource,
    );

    let err = resolver.resolve("thumbs", "a.jpg").unwrap_err();
    assert_eq!(
        err,
        ProxyError::UnknownSource {
            source_key: "thumbs".to_string()
        }
    );
    assert_eq!(err.to_http_status(), 404);
}

#[test]
fn test_traversal_checked_before_validator() {
    let called = Arc::new(Mutex::new(false));
    let flag = Arc::clone(&called);
    let resolver = resolver(
        vec![(
            "media",
            SourceConfig::backend("public").with_validator(PredicateValidator::new(
                "allow_all",
                move |_: &str| {
                    *flag.lock() = true;
                    true
                },
            )),
        )],
        Addressing::ExplicitSource,
    );

    let err = resolver.resolve("media", "../secret.jpg").unwrap_err();
    assert!(matches!(err, ProxyError::DirectoryTraversal { .. }));
    assert_eq!(err.to_http_status(), 403);
    assert!(!*called.lock());
}

#[test]
fn test_longest_prefix_wins() {
    let resolver = resolver(
        vec![
            ("", SourceConfig::backend("public")),
            ("avatars", SourceConfig::backend("avatars")),
            ("avatars/large", SourceConfig::backend("large")),
        ],
        Addressing::PathPrefix {
            default_source: String::new(),
        },
    );

    let location = resolver.locate("avatars/large/me.png").unwrap();
    assert_eq!(location.source, "avatars/large");
    assert_eq!(location.path, "me.png");

    let resolved = resolver.resolve(&location.source, &location.path).unwrap();
    assert_eq!(resolved.backend_id, "large");

    let location = resolver.locate("avatars/me.png").unwrap();
    assert_eq!(location.source, "avatars");

    // A partial segment is not a prefix match
    let location = resolver.locate("avatarsx/me.png").unwrap();
    assert_eq!(location.source, "");
    assert_eq!(location.path, "avatarsx/me.png");
}

#[test]
fn test_explicit_addressing_needs_source_and_path() {
    let resolver = resolver(
        vec![("media", SourceConfig::backend("public"))],
        Addressing::ExplicitSource,
    );

    assert!(resolver.locate("media").is_err());
    assert!(resolver.locate("media/").is_err());
    let location = resolver.locate("/media/a/b.jpg").unwrap();
    assert_eq!(location.source, "media");
    assert_eq!(location.path, "a/b.jpg");
}
