// Path validator and glob matching tests

use imgproxy::path_validator::glob::matches;
use imgproxy::path_validator::{PathValidator, PredicateValidator, SourceValidator, ValidatePath};
use rstest::rstest;

#[rstest]
#[case("images/sub/a.jpg", "images/**/*.jpg", true)]
#[case("images/a.jpg", "images/**/*.jpg", true)]
#[case("images/a.jpg", "images/*.jpg", true)]
#[case("images/sub/a.jpg", "images/*.jpg", false)]
#[case("images/a.jpeg", "images/a.jp?g", true)]
#[case("images/a.jpg", "images/a.jp?g", false)]
#[case("deep/er/x.png", "**", true)]
#[case("prefix/images/a.jpg", "images/*.jpg", false)]
fn test_glob_matching(#[case] path: &str, #[case] pattern: &str, #[case] expected: bool) {
    assert_eq!(matches(path, pattern), expected);
}

#[test]
fn test_glob_literal_characters_are_escaped() {
    assert!(matches("a+b/(1).jpg", "a+b/(1).jpg"));
    assert!(!matches("aab/1xjpg", "a+b/1.jpg"));
}

#[rstest]
#[case("../etc/passwd")]
#[case("images/../secret.jpg")]
#[case("images/..hidden.jpg")]
#[case("images/%2e%2e/secret.jpg")]
fn test_traversal_always_rejected(#[case] path: &str) {
    let validators = [
        PathValidator::new(),
        PathValidator::new().directories(["images"]),
        PathValidator::new().matching(["**"]).unwrap(),
        PathValidator::new().with_extensions(["jpg", "passwd"]),
    ];
    for validator in &validators {
        assert!(!validator.validate(path), "{:?} accepted {}", validator, path);
    }
}

#[test]
fn test_unconfigured_validator_accepts() {
    let validator = PathValidator::new();
    assert!(validator.is_unrestricted());
    assert!(validator.validate("anything/at/all.bmp"));
}

#[test]
fn test_directory_prefix_needs_separator() {
    let validator = PathValidator::new().directories(["images/"]);
    assert!(validator.validate("images/a.jpg"));
    assert!(!validator.validate("images-private/a.jpg"));
    assert!(!validator.validate("images"));
}

#[test]
fn test_categories_combine_with_and() {
    let validator = PathValidator::new()
        .directories(["uploads", "avatars"])
        .matching(["**/*.jpg", "**/*.png"])
        .unwrap()
        .with_extensions([".JPG"]);

    assert!(validator.validate("uploads/2024/a.jpg"));
    assert!(validator.validate("avatars/a.jpg"));
    // Passes directory and pattern, fails extension
    assert!(!validator.validate("uploads/a.png"));
    // Passes pattern and extension, fails directory
    assert!(!validator.validate("other/a.jpg"));
}

#[test]
fn test_predicate_validator_through_capability() {
    let validator: SourceValidator =
        PredicateValidator::new("even_length", |path: &str| path.len() % 2 == 0).into();

    assert!(validator.validate("ab.jpg"));
    assert!(!validator.validate("abc.jpg"));
    assert!(validator.describe().contains("even_length"));
}
