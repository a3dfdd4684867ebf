// Router module - splits a request path into options, source and path

use regex::Regex;

use crate::error::ProxyError;
use crate::image_optimizer::ParsedOptions;
use crate::source::SourceResolver;

/// Shape of a well-formed options segment (`w=100,h=50,f=webp`)
const OPTIONS_PATTERN: &str = r"^([a-zA-Z]+=[a-zA-Z0-9]+,?)+$";

/// Last path segment must carry an extension
const PATH_PATTERN: &str = r"^.+\.[a-zA-Z0-9]+$";

/// A request path that matched the image route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    /// Raw options segment as it appeared in the URL
    pub options_segment: String,
    pub options: ParsedOptions,
    pub source: String,
    /// Source-relative path, not yet validated
    pub path: String,
}

impl RouteMatch {
    /// Path used in the rate limit identity
    ///
    /// `<source>/<path>`, with the options segment prepended when each
    /// transform of an image is limited separately.
    pub fn rate_limit_path(&self, include_options: bool) -> String {
        let bare = self.original_path();
        if include_options {
            format!("{}/{}", self.options_segment, bare)
        } else {
            bare
        }
    }

    /// `<source>/<path>` without the options segment
    pub fn original_path(&self) -> String {
        if self.source.is_empty() {
            self.path.clone()
        } else {
            format!("{}/{}", self.source, self.path)
        }
    }

    /// Source file extension, lower-cased, empty when absent
    pub fn source_extension(&self) -> String {
        crate::path_validator::path_extension(&self.path).unwrap_or_default()
    }
}

pub struct Router {
    enabled: bool,
    // Prefix segments without surrounding slashes
    prefix: String,
    options_re: Regex,
    path_re: Regex,
}

impl Router {
    pub fn new(enabled: bool, prefix: impl Into<String>) -> Result<Self, regex::Error> {
        let prefix = prefix.into();
        Ok(Router {
            enabled,
            prefix: prefix.trim_matches('/').to_string(),
            options_re: Regex::new(OPTIONS_PATTERN)?,
            path_re: Regex::new(PATH_PATTERN)?,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Match `request_path` against `[<prefix>/]<options>/<rest>`
    ///
    /// The source is then located in `<rest>` by the resolver's addressing
    /// scheme. The path itself is not checked for traversal here.
    pub fn route(
        &self,
        request_path: &str,
        resolver: &SourceResolver,
    ) -> Result<RouteMatch, ProxyError> {
        let not_matched = || ProxyError::RouteNotMatched {
            path: request_path.to_string(),
        };

        if !self.enabled {
            return Err(not_matched());
        }

        let mut remaining = request_path.trim_start_matches('/');

        if !self.prefix.is_empty() {
            remaining = remaining
                .strip_prefix(self.prefix.as_str())
                .and_then(|rest| rest.strip_prefix('/'))
                .ok_or_else(not_matched)?;
        }

        let (options_segment, rest) = remaining.split_once('/').ok_or_else(not_matched)?;

        if !self.options_re.is_match(options_segment) {
            return Err(not_matched());
        }

        let location = resolver.locate(rest).map_err(|_| not_matched())?;

        if !self.path_re.is_match(&location.path) {
            return Err(not_matched());
        }

        Ok(RouteMatch {
            options_segment: options_segment.to_string(),
            options: ParsedOptions::parse(options_segment),
            source: location.source,
            path: location.path,
        })
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("enabled", &self.enabled)
            .field("prefix", &self.prefix)
            .finish()
    }
}
