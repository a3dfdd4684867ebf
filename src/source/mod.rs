//! Source resolution
//!
//! Maps a logical source plus a relative path onto a concrete
//! `(backend_id, full_path)` pair. Two addressing schemes are supported, one
//! per deployment:
//! - explicit: the first path segment names the source (`media/photo.jpg`)
//! - path prefix: the longest configured source key that prefixes the path
//!   at a segment boundary wins, falling back to a default source when none
//!   does. Declaration order in the config file plays no part: `cdn/thumbs`
//!   beats `cdn` wherever either is listed.
//!
//! Validators always see the full path, root included.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ProxyError;
use crate::path_validator::{SourceValidator, ValidatePath};
use crate::security;

/// Canonical, load-time normalized configuration of one source
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub backend_id: String,
    pub root: Option<String>,
    pub validator: Option<Arc<SourceValidator>>,
}

impl SourceConfig {
    /// String shorthand: a source that is just a backend id
    pub fn backend(backend_id: impl Into<String>) -> Self {
        Self {
            backend_id: backend_id.into(),
            root: None,
            validator: None,
        }
    }

    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        let root = root.into();
        let trimmed = root.trim_matches('/');
        self.root = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
        self
    }

    pub fn with_validator(mut self, validator: impl Into<SourceValidator>) -> Self {
        self.validator = Some(Arc::new(validator.into()));
        self
    }

    /// Root-prefixed path handed to validators and storage
    pub fn full_path(&self, relative_path: &str) -> String {
        match &self.root {
            Some(root) => format!("{}/{}", root, relative_path),
            None => relative_path.to_string(),
        }
    }
}

/// Output of resolution, consumed immediately by the load step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRequest {
    pub backend_id: String,
    pub full_path: String,
}

/// How the source is encoded in the request path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Addressing {
    /// `<source>/<path>`
    ExplicitSource,
    /// `<prefix>/<path>` with longest-prefix matching, else `default_source`
    PathPrefix { default_source: String },
}

/// Source key and source-relative path extracted from a request path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub source: String,
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct SourceResolver {
    sources: HashMap<String, SourceConfig>,
    addressing: Addressing,
    // Keys sorted longest first, used by the prefix scheme
    prefixes: Vec<String>,
}

impl SourceResolver {
    pub fn new(sources: HashMap<String, SourceConfig>, addressing: Addressing) -> Self {
        let mut prefixes: Vec<String> = sources
            .keys()
            .filter(|key| !key.is_empty())
            .cloned()
            .collect();
        prefixes.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        Self {
            sources,
            addressing,
            prefixes,
        }
    }

    pub fn addressing(&self) -> &Addressing {
        &self.addressing
    }

    pub fn source(&self, key: &str) -> Option<&SourceConfig> {
        self.sources.get(key)
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Split the path that follows the options segment into source and path
    ///
    /// Under prefix addressing the longest matching source key wins, whatever
    /// order the sources were declared in. A key only matches whole segments,
    /// so `cdn` never claims `cdnx/a.jpg`.
    pub fn locate(&self, rest: &str) -> Result<SourceLocation, ProxyError> {
        let rest = rest.trim_start_matches('/');

        match &self.addressing {
            Addressing::ExplicitSource => match rest.split_once('/') {
                Some((source, path)) if !source.is_empty() && !path.is_empty() => {
                    Ok(SourceLocation {
                        source: source.to_string(),
                        path: path.to_string(),
                    })
                }
                _ => Err(ProxyError::RouteNotMatched {
                    path: rest.to_string(),
                }),
            },
            Addressing::PathPrefix { default_source } => {
                for prefix in &self.prefixes {
                    if let Some(path) = rest
                        .strip_prefix(prefix.as_str())
                        .and_then(|after| after.strip_prefix('/'))
                    {
                        return Ok(SourceLocation {
                            source: prefix.clone(),
                            path: path.to_string(),
                        });
                    }
                }
                Ok(SourceLocation {
                    source: default_source.clone(),
                    path: rest.to_string(),
                })
            }
        }
    }

    /// Check the relative path, compute the full path and run the validator
    pub fn resolve(
        &self,
        source_key: &str,
        relative_path: &str,
    ) -> Result<ResolvedRequest, ProxyError> {
        let config = self
            .sources
            .get(source_key)
            .ok_or_else(|| ProxyError::UnknownSource {
                source_key: source_key.to_string(),
            })?;

        security::check_path_traversal(relative_path)?;

        let full_path = config.full_path(relative_path);

        if let Some(validator) = &config.validator {
            if !validator.validate(&full_path) {
                return Err(ProxyError::PathNotAllowed { path: full_path });
            }
        }

        Ok(ResolvedRequest {
            backend_id: config.backend_id.clone(),
            full_path,
        })
    }
}
