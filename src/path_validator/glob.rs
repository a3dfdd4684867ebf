//! Restricted glob matching for path allow-lists
//!
//! Supported syntax:
//! - `**/` zero or more whole path segments
//! - `**` any characters, separators included
//! - `*` any characters except `/`
//! - `?` exactly one character
//!
//! Everything else matches literally. Matching is anchored at both ends.

use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GlobError {
    #[error("Empty glob pattern")]
    Empty,

    #[error("Invalid glob pattern '{pattern}': {message}")]
    Invalid { pattern: String, message: String },
}

/// A glob compiled once at configuration time and reused across requests
#[derive(Debug, Clone)]
pub struct GlobPattern {
    pattern: String,
    regex: Regex,
}

impl GlobPattern {
    pub fn new(pattern: &str) -> Result<Self, GlobError> {
        if pattern.is_empty() {
            return Err(GlobError::Empty);
        }

        let regex = Regex::new(&glob_to_regex(pattern)).map_err(|e| GlobError::Invalid {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

impl PartialEq for GlobPattern {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

impl Eq for GlobPattern {}

impl std::fmt::Display for GlobPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.pattern)
    }
}

/// Convert a glob into an anchored regex source string
///
/// The pattern is escaped first, so the substitutions below only ever see the
/// escaped wildcard forms. Order matters: `**/` before `**` before `*`.
fn glob_to_regex(pattern: &str) -> String {
    let escaped = regex::escape(pattern)
        .replace(r"\*\*/", "(?:.*/)?")
        .replace(r"\*\*", ".*")
        .replace(r"\*", "[^/]*")
        .replace(r"\?", ".");
    format!("^{}$", escaped)
}

/// One-shot match, compiling the pattern on every call
///
/// Invalid patterns never match. Prefer [`GlobPattern`] on hot paths.
pub fn matches(path: &str, pattern: &str) -> bool {
    GlobPattern::new(pattern)
        .map(|glob| glob.matches(path))
        .unwrap_or(false)
}
