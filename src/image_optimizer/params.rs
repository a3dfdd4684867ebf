//! URL option segment parsing and serialization
//!
//! The option segment is a comma-separated list of `key=value` pairs, e.g.
//! `w=800,h=600,q=80,f=webp`. Short aliases resolve to canonical names:
//!
//! | alias | canonical |
//! |-------|-----------|
//! | `w`   | `width`   |
//! | `h`   | `height`  |
//! | `q`   | `quality` |
//! | `f`   | `format`  |
//! | `v`   | `version` |
//!
//! Parsing never fails. Values are kept as raw strings and checked later by
//! the transform spec builder.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

pub const WIDTH: &str = "width";
pub const HEIGHT: &str = "height";
pub const FIT: &str = "fit";
pub const QUALITY: &str = "quality";
pub const FORMAT: &str = "format";
pub const VERSION: &str = "version";

/// Canonical serialization order with the short key emitted for each option
const SERIALIZE_ORDER: [(&str, &str); 6] = [
    (WIDTH, "w"),
    (HEIGHT, "h"),
    (FIT, "fit"),
    (QUALITY, "q"),
    (FORMAT, "f"),
    (VERSION, "v"),
];

/// Resolve a short alias to its canonical option name
pub fn canonical_name(key: &str) -> &str {
    match key {
        "w" => WIDTH,
        "h" => HEIGHT,
        "q" => QUALITY,
        "f" => FORMAT,
        "v" => VERSION,
        other => other,
    }
}

/// Option name to raw value, `None` when the piece had no `=`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedOptions {
    values: BTreeMap<String, Option<String>>,
}

impl ParsedOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an option segment such as `w=100,h=50,f=webp`
    ///
    /// Later duplicates overwrite earlier ones, after alias resolution, so
    /// `w=1,width=2` yields width `2`.
    pub fn parse(segment: &str) -> Self {
        let mut options = Self::new();

        for part in segment.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }

            match part.split_once('=') {
                Some((key, value)) => {
                    let key = key.trim();
                    if key.is_empty() {
                        continue;
                    }
                    options.insert(key, Some(value.trim().to_string()));
                }
                None => options.insert(part, None),
            }
        }

        options
    }

    fn insert(&mut self, key: &str, value: Option<String>) {
        self.values.insert(canonical_name(key).to_string(), value);
    }

    /// Set an option by canonical name or alias
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        self.insert(key, Some(value.into()));
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<Option<String>> {
        self.values.remove(canonical_name(key))
    }

    /// Value of an option that was given with `=`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(canonical_name(key))
            .and_then(|value| value.as_deref())
    }

    /// Distinguishes absent (`None`) from present without a value (`Some(None)`)
    pub fn lookup(&self, key: &str) -> Option<Option<&str>> {
        self.values
            .get(canonical_name(key))
            .map(|value| value.as_deref())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(canonical_name(key))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.values
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_deref()))
    }

    /// Render the canonical option segment
    ///
    /// Only the six known options are emitted, in the fixed order
    /// `width,height,fit,quality,format,version`, using short keys. Options
    /// without a value are skipped.
    pub fn serialize(&self) -> String {
        SERIALIZE_ORDER
            .iter()
            .filter_map(|(name, short)| {
                self.get(name)
                    .filter(|value| !value.is_empty())
                    .map(|value| format!("{}={}", short, value))
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl FromStr for ParsedOptions {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for ParsedOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}
