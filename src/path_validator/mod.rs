//! Path allow-list validation
//!
//! A [`PathValidator`] composes three independent rule categories:
//! directory prefixes, glob patterns and file extensions. A path must pass
//! every configured category (AND) and any single rule within a category (OR).
//! Unconfigured categories pass vacuously. The traversal check always runs
//! first and cannot be disabled.
//!
//! Sources may instead carry an externally supplied predicate; both shapes are
//! exposed to the resolver through [`SourceValidator`].

pub mod glob;

pub use glob::{GlobError, GlobPattern};

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::security;

/// Capability shared by every kind of path validator
pub trait ValidatePath: Send + Sync {
    /// Returns true when `path` is allowed
    fn validate(&self, path: &str) -> bool;
}

/// Compiled directory / pattern / extension allow-list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathValidator {
    directories: Vec<String>,
    patterns: Vec<GlobPattern>,
    extensions: BTreeSet<String>,
}

impl PathValidator {
    /// Validator with no categories configured (only traversal is checked)
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to paths under any of `dirs`
    ///
    /// A trailing `/` on a directory is optional; `images` allows
    /// `images/a.jpg` but not `images-private/a.jpg`.
    pub fn directories<I, S>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for dir in dirs {
            let trimmed = dir.as_ref().trim_end_matches('/');
            if trimmed.is_empty() {
                continue;
            }
            let prefix = format!("{}/", trimmed);
            if !self.directories.contains(&prefix) {
                self.directories.push(prefix);
            }
        }
        self
    }

    /// Restrict to paths matching any of the glob `patterns`
    pub fn matching<I, S>(mut self, patterns: I) -> Result<Self, GlobError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for pattern in patterns {
            let glob = GlobPattern::new(pattern.as_ref())?;
            if !self.patterns.contains(&glob) {
                self.patterns.push(glob);
            }
        }
        Ok(self)
    }

    /// Restrict to paths with any of `extensions` (case-insensitive, leading dot optional)
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for ext in extensions {
            let normalized = ext.as_ref().trim_start_matches('.').to_ascii_lowercase();
            if !normalized.is_empty() {
                self.extensions.insert(normalized);
            }
        }
        self
    }

    /// True when no category is configured
    pub fn is_unrestricted(&self) -> bool {
        self.directories.is_empty() && self.patterns.is_empty() && self.extensions.is_empty()
    }

    pub fn directory_rules(&self) -> &[String] {
        &self.directories
    }

    pub fn pattern_rules(&self) -> &[GlobPattern] {
        &self.patterns
    }

    pub fn extension_rules(&self) -> impl Iterator<Item = &str> {
        self.extensions.iter().map(String::as_str)
    }

    pub fn validate(&self, path: &str) -> bool {
        if security::is_traversal(path) {
            return false;
        }

        if !self.directories.is_empty()
            && !self.directories.iter().any(|dir| path.starts_with(dir))
        {
            return false;
        }

        if !self.patterns.is_empty() && !self.patterns.iter().any(|glob| glob.matches(path)) {
            return false;
        }

        if !self.extensions.is_empty() {
            match path_extension(path) {
                Some(ext) if self.extensions.contains(&ext) => {}
                _ => return false,
            }
        }

        true
    }
}

impl ValidatePath for PathValidator {
    fn validate(&self, path: &str) -> bool {
        PathValidator::validate(self, path)
    }
}

/// Lower-cased extension of the last path segment, if any
pub fn path_extension(path: &str) -> Option<String> {
    let file_name = path.rsplit('/').next()?;
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

type PredicateFn = dyn Fn(&str) -> bool + Send + Sync;

/// Adapter around an externally supplied `(full_path) -> bool` function
#[derive(Clone)]
pub struct PredicateValidator {
    name: String,
    predicate: Arc<PredicateFn>,
}

impl PredicateValidator {
    pub fn new<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl ValidatePath for PredicateValidator {
    fn validate(&self, path: &str) -> bool {
        (self.predicate)(path)
    }
}

impl fmt::Debug for PredicateValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicateValidator")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// The two validator shapes a source can be configured with
///
/// Selected once at configuration load; request handling only ever calls
/// [`ValidatePath::validate`].
#[derive(Debug, Clone)]
pub enum SourceValidator {
    Rules(PathValidator),
    Predicate(PredicateValidator),
}

impl SourceValidator {
    pub fn describe(&self) -> String {
        match self {
            SourceValidator::Rules(rules) => format!(
                "rules(directories={}, patterns={}, extensions={})",
                rules.directory_rules().len(),
                rules.pattern_rules().len(),
                rules.extension_rules().count()
            ),
            SourceValidator::Predicate(predicate) => format!("named({})", predicate.name()),
        }
    }
}

impl ValidatePath for SourceValidator {
    fn validate(&self, path: &str) -> bool {
        match self {
            SourceValidator::Rules(rules) => rules.validate(path),
            SourceValidator::Predicate(predicate) => predicate.validate(path),
        }
    }
}

impl From<PathValidator> for SourceValidator {
    fn from(rules: PathValidator) -> Self {
        SourceValidator::Rules(rules)
    }
}

impl From<PredicateValidator> for SourceValidator {
    fn from(predicate: PredicateValidator) -> Self {
        SourceValidator::Predicate(predicate)
    }
}

/// Named predicates registered by the embedding program
///
/// Configuration refers to them with `validator: { named: <name> }`.
#[derive(Debug, Clone, Default)]
pub struct ValidatorRegistry {
    validators: HashMap<String, PredicateValidator>,
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, predicate: F) -> &mut Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        let name = name.into();
        self.validators
            .insert(name.clone(), PredicateValidator::new(name, predicate));
        self
    }

    pub fn get(&self, name: &str) -> Option<PredicateValidator> {
        self.validators.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.validators.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
