// Configuration module

use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::cache::{CacheControlBuilder, CacheControlConfig};
use crate::constants::{
    DEFAULT_ALLOWED_FORMATS, DEFAULT_MAX_HEIGHT, DEFAULT_MAX_WIDTH, DEFAULT_QUALITY,
};
use crate::image_optimizer::TransformLimits;
use crate::logging::LoggingConfig;
use crate::path_validator::ValidatorRegistry;
use crate::source::{SourceConfig, SourceResolver};

// Submodules
pub mod rate_limit;
pub mod server;
pub mod source;

pub use rate_limit::{CounterStoreConfig, OnLimit, RateLimitConfig};
pub use server::ServerConfig;
pub use source::{
    AddressingMode, BackendConfig, RouteConfig, S3BackendConfig, SourceEntry, ValidatorConfig,
};

fn default_quality() -> u8 {
    DEFAULT_QUALITY
}

fn default_max_width() -> u32 {
    DEFAULT_MAX_WIDTH
}

fn default_max_height() -> u32 {
    DEFAULT_MAX_HEIGHT
}

fn default_allowed_formats() -> Vec<String> {
    DEFAULT_ALLOWED_FORMATS
        .iter()
        .map(|f| f.to_string())
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub route: RouteConfig,
    #[serde(default)]
    pub backends: HashMap<String, BackendConfig>,
    #[serde(default)]
    pub sources: HashMap<String, SourceEntry>,
    /// Applied to sources that declare no validator of their own
    #[serde(default)]
    pub path_validator: Option<ValidatorConfig>,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default = "default_quality")]
    pub default_quality: u8,
    #[serde(default)]
    pub cache: CacheControlConfig,
    #[serde(default = "default_max_width")]
    pub max_width: u32,
    #[serde(default = "default_max_height")]
    pub max_height: u32,
    #[serde(default)]
    pub allowed_widths: Option<Vec<u32>>,
    #[serde(default)]
    pub allowed_heights: Option<Vec<u32>>,
    #[serde(default = "default_allowed_formats")]
    pub allowed_formats: Vec<String>,
}

impl Config {
    pub fn from_yaml_with_env(yaml: &str) -> Result<Self, String> {
        // Replace ${VAR_NAME} with environment variable values
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").map_err(|e| e.to_string())?;

        // First, check that all referenced environment variables exist
        let mut values = HashMap::new();
        for caps in re.captures_iter(yaml) {
            let var_name = &caps[1];
            let value = std::env::var(var_name).map_err(|_| {
                format!(
                    "Environment variable '{}' is referenced but not set",
                    var_name
                )
            })?;
            values.insert(var_name.to_string(), value);
        }

        let substituted = re.replace_all(yaml, |caps: &regex::Captures| {
            values.get(&caps[1]).cloned().unwrap_or_default()
        });

        serde_yaml::from_str(&substituted).map_err(|e| e.to_string())
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        Self::from_yaml_with_env(&yaml)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.sources.is_empty() {
            return Err("At least one source must be configured".to_string());
        }

        for (key, entry) in &self.sources {
            let backend = entry.backend_id();
            if backend.trim().is_empty() {
                return Err(format!("Source '{}' has an empty backend", key));
            }
            if !self.backends.contains_key(backend) {
                return Err(format!(
                    "Source '{}' refers to undeclared backend '{}'",
                    key, backend
                ));
            }
            if let Some(root) = entry.root() {
                if root.contains("..") {
                    return Err(format!(
                        "Source '{}' has root '{}' containing '..'",
                        key, root
                    ));
                }
            }
        }

        for (id, backend) in &self.backends {
            match backend {
                BackendConfig::Filesystem { root } if root.trim().is_empty() => {
                    return Err(format!("Backend '{}' has an empty filesystem root", id));
                }
                BackendConfig::S3(s3) if s3.bucket.trim().is_empty() => {
                    return Err(format!("Backend '{}' has an empty S3 bucket", id));
                }
                _ => {}
            }
        }

        if self.route.addressing == AddressingMode::PathPrefix
            && !self.sources.contains_key(&self.route.default_source)
        {
            return Err(format!(
                "Default source '{}' is not configured (required by path_prefix addressing)",
                self.route.default_source
            ));
        }

        if !(1..=100).contains(&self.default_quality) {
            return Err(format!(
                "default_quality must be between 1 and 100, got {}",
                self.default_quality
            ));
        }

        if self.max_width == 0 || self.max_height == 0 {
            return Err("max_width and max_height must be greater than 0".to_string());
        }

        for (name, list) in [
            ("allowed_widths", &self.allowed_widths),
            ("allowed_heights", &self.allowed_heights),
        ] {
            if list.as_ref().is_some_and(|values| values.contains(&0)) {
                return Err(format!("{} cannot contain 0", name));
            }
        }

        if self.server.request_timeout == 0 {
            return Err("server.request_timeout must be greater than 0".to_string());
        }

        if self.rate_limit.max_attempts < 1 {
            return Err("rate_limit.max_attempts must be at least 1".to_string());
        }

        if self.rate_limit.window_seconds == 0 {
            return Err("rate_limit.window_seconds must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Normalize every source entry into an immutable resolver
    pub fn build_resolver(&self, registry: &ValidatorRegistry) -> Result<SourceResolver, String> {
        let mut sources: HashMap<String, SourceConfig> = HashMap::new();
        for (key, entry) in &self.sources {
            let config = entry
                .to_source_config(registry, self.path_validator.as_ref())
                .map_err(|e| format!("Source '{}': {}", key, e))?;
            sources.insert(key.clone(), config);
        }
        Ok(SourceResolver::new(sources, self.route.addressing()))
    }

    pub fn transform_limits(&self) -> TransformLimits {
        TransformLimits {
            max_width: self.max_width,
            max_height: self.max_height,
            allowed_widths: self.allowed_widths.clone(),
            allowed_heights: self.allowed_heights.clone(),
            allowed_formats: self.allowed_formats.clone(),
            default_quality: self.default_quality,
        }
    }

    pub fn cache_control_header(&self) -> String {
        CacheControlBuilder::build(&self.cache)
    }

    /// Rate limiting is a production-only policy
    pub fn rate_limit_active(&self) -> bool {
        self.rate_limit.enabled && self.server.is_production()
    }
}
