// Option segment, transform spec and URL builder tests

use imgproxy::image_optimizer::{
    FitMode, ImageError, ParsedOptions, TransformLimits, TransformSpecBuilder, UrlBuilder,
};
use rstest::rstest;

fn builder() -> TransformSpecBuilder {
    TransformSpecBuilder::new(TransformLimits::default())
}

#[test]
fn test_parse_resolves_aliases() {
    let options = ParsedOptions::parse("w=100,h=50,f=webp");

    assert_eq!(options.get("width"), Some("100"));
    assert_eq!(options.get("height"), Some("50"));
    assert_eq!(options.get("format"), Some("webp"));
    assert_eq!(options.len(), 3);
}

#[test]
fn test_parse_keeps_unknown_keys() {
    let options = ParsedOptions::parse("w=100,blur=5");
    assert_eq!(options.get("blur"), Some("5"));

    let spec = builder().build(&options, "jpg").unwrap();
    assert_eq!(spec.width, Some(100));
}

#[test]
fn test_serialize_round_trip_through_url_builder() {
    let url = UrlBuilder::new("media", "photo.jpg").width(100).webp();
    let segment = url.options().serialize();
    assert_eq!(segment, "w=100,f=webp");

    let parsed = ParsedOptions::parse(&segment);
    assert_eq!(parsed.get("width"), Some("100"));
    assert_eq!(parsed.get("format"), Some("webp"));
}

#[test]
fn test_url_builder_canonical_order() {
    let url = UrlBuilder::new("media", "/photos/cat.jpg")
        .prefix("img")
        .v("3")
        .q(80)
        .cover()
        .h(600)
        .w(800);

    assert_eq!(
        url.url(),
        "/img/w=800,h=600,fit=cover,q=80,v=3/media/photos/cat.jpg"
    );
    assert_eq!(url.to_string(), url.url());
}

#[test]
fn test_version_never_affects_spec() {
    let with_version = builder()
        .build(&ParsedOptions::parse("w=100,v=7"), "png")
        .unwrap();
    let without = builder()
        .build(&ParsedOptions::parse("w=100"), "png")
        .unwrap();
    assert_eq!(with_version, without);
}

#[test]
fn test_defaults() {
    let spec = builder().build(&ParsedOptions::new(), "JPG").unwrap();

    assert_eq!(spec.width, None);
    assert_eq!(spec.height, None);
    assert_eq!(spec.fit, FitMode::ScaleDown);
    assert_eq!(spec.quality, 85);
    assert_eq!(spec.format, "jpg");
    assert!(!spec.resizes());
}

#[rstest]
#[case("w=5000", ImageError::invalid_dimension("width", "5000"))]
#[case("h=0", ImageError::invalid_dimension("height", "0"))]
#[case("w=abc", ImageError::invalid_dimension("width", "abc"))]
#[case("q=150", ImageError::invalid_quality("150"))]
#[case("q=0", ImageError::invalid_quality("0"))]
#[case("fit=invalid", ImageError::invalid_fit("invalid"))]
#[case("f=tiff", ImageError::invalid_format("tiff"))]
fn test_each_violation_in_isolation(#[case] segment: &str, #[case] expected: ImageError) {
    let err = builder()
        .build(&ParsedOptions::parse(segment), "jpg")
        .unwrap_err();
    assert_eq!(err, expected);
}

#[test]
fn test_all_violations_reported() {
    let violations = builder().violations(
        &ParsedOptions::parse("w=5000,h=0,fit=wobble,q=101,f=bmp"),
        "jpg",
    );
    assert_eq!(violations.len(), 5);
}

#[test]
fn test_allow_lists_replace_bounds() {
    let builder = TransformSpecBuilder::new(TransformLimits {
        allowed_widths: Some(vec![150, 300]),
        allowed_formats: vec!["WEBP".to_string()],
        ..TransformLimits::default()
    });

    assert_eq!(
        builder
            .build(&ParsedOptions::parse("w=300,f=webp"), "jpg")
            .unwrap()
            .width,
        Some(300)
    );
    assert!(builder
        .build(&ParsedOptions::parse("w=200"), "jpg")
        .is_err());
    assert!(builder
        .build(&ParsedOptions::parse("f=png"), "jpg")
        .is_err());
}
