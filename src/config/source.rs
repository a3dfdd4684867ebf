//! Route, backend, source and validator configuration types.
//!
//! Source entries accept two YAML shapes:
//! - a bare backend id: `media: public`
//! - a record: `media: { backend: public, root: uploads/images, validator: ... }`
//!
//! Both are normalized into [`crate::source::SourceConfig`] once at load time.

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_SOURCE_BACKEND;
use crate::path_validator::{PathValidator, SourceValidator, ValidatorRegistry};
use crate::source::{Addressing, SourceConfig};

/// Which addressing scheme the route uses
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AddressingMode {
    /// `<options>/<source>/<path>`
    #[default]
    ExplicitSource,
    /// `<options>/<path>`, source picked by longest matching prefix
    PathPrefix,
}

fn default_route_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RouteConfig {
    #[serde(default = "default_route_enabled")]
    pub enabled: bool,
    /// Leading path segment(s) before the options segment, e.g. `img`
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub addressing: AddressingMode,
    /// Source used by `path_prefix` addressing when no prefix matches
    #[serde(default)]
    pub default_source: String,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            enabled: default_route_enabled(),
            prefix: String::new(),
            addressing: AddressingMode::default(),
            default_source: String::new(),
        }
    }
}

impl RouteConfig {
    /// Prefix without surrounding slashes
    pub fn normalized_prefix(&self) -> &str {
        self.prefix.trim_matches('/')
    }

    pub fn addressing(&self) -> Addressing {
        match self.addressing {
            AddressingMode::ExplicitSource => Addressing::ExplicitSource,
            AddressingMode::PathPrefix => Addressing::PathPrefix {
                default_source: self.default_source.clone(),
            },
        }
    }
}

/// S3 backend settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct S3BackendConfig {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible stores (MinIO, LocalStack)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
}

/// One storage backend, tagged by `type`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    Filesystem { root: String },
    Memory,
    S3(S3BackendConfig),
}

impl BackendConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            BackendConfig::Filesystem { .. } => "filesystem",
            BackendConfig::Memory => "memory",
            BackendConfig::S3(_) => "s3",
        }
    }
}

/// Path validator settings
///
/// Either rule lists or the name of a registered predicate, never both.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidatorConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub directories: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patterns: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub named: Option<String>,
}

impl ValidatorConfig {
    fn has_rules(&self) -> bool {
        !self.directories.is_empty() || !self.patterns.is_empty() || !self.extensions.is_empty()
    }

    pub fn build(&self, registry: &ValidatorRegistry) -> Result<SourceValidator, String> {
        if let Some(name) = &self.named {
            if self.has_rules() {
                return Err(format!(
                    "Validator '{}' cannot also declare directories, patterns or extensions",
                    name
                ));
            }
            return registry
                .get(name)
                .map(SourceValidator::from)
                .ok_or_else(|| format!("Unknown named validator '{}'", name));
        }

        let validator = PathValidator::new()
            .directories(&self.directories)
            .matching(&self.patterns)
            .map_err(|e| e.to_string())?
            .with_extensions(&self.extensions);

        Ok(validator.into())
    }
}

fn default_source_backend() -> String {
    DEFAULT_SOURCE_BACKEND.to_string()
}

/// Raw source entry as written in YAML
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum SourceEntry {
    Backend(String),
    Detailed {
        #[serde(default = "default_source_backend")]
        backend: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        root: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        validator: Option<ValidatorConfig>,
    },
}

impl SourceEntry {
    pub fn backend_id(&self) -> &str {
        match self {
            SourceEntry::Backend(backend) => backend,
            SourceEntry::Detailed { backend, .. } => backend,
        }
    }

    pub fn root(&self) -> Option<&str> {
        match self {
            SourceEntry::Backend(_) => None,
            SourceEntry::Detailed { root, .. } => root.as_deref(),
        }
    }

    pub fn validator(&self) -> Option<&ValidatorConfig> {
        match self {
            SourceEntry::Backend(_) => None,
            SourceEntry::Detailed { validator, .. } => validator.as_ref(),
        }
    }

    /// Normalize into the canonical form, applying `fallback` when the entry
    /// has no validator of its own
    pub fn to_source_config(
        &self,
        registry: &ValidatorRegistry,
        fallback: Option<&ValidatorConfig>,
    ) -> Result<SourceConfig, String> {
        let mut config = SourceConfig::backend(self.backend_id());

        if let Some(root) = self.root() {
            config = config.with_root(root);
        }

        if let Some(validator) = self.validator().or(fallback) {
            config = config.with_validator(validator.build(registry)?);
        }

        Ok(config)
    }
}
