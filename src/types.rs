//! Shared value types: data tokens, URL schemes and name validation.

use crate::error::ContextError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^[a-z0-9_-]+$").expect("valid name regex"));

/// Opaque identifier returned by a [`Storage`](crate::storage::Storage) on save.
///
/// The generic layer never inspects its structure; only the backend that
/// issued a token knows how to interpret it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataToken(String);

impl DataToken {
    pub fn new(value: impl Into<String>) -> Self {
        DataToken(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for DataToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DataToken {
    fn from(value: &str) -> Self {
        DataToken(value.to_string())
    }
}

impl From<String> for DataToken {
    fn from(value: String) -> Self {
        DataToken(value)
    }
}

impl AsRef<str> for DataToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// How a public URL should be rendered
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UrlScheme {
    /// Path-only URL (or the configured public URL as-is when it is already absolute)
    #[default]
    Relative,
    /// Absolute URL using the configured host and its scheme
    Absolute,
    /// Absolute URL with the given scheme, e.g. `https`
    WithScheme(String),
}

impl std::str::FromStr for UrlScheme {
    type Err = ContextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "relative" => Ok(UrlScheme::Relative),
            "absolute" => Ok(UrlScheme::Absolute),
            other if other.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.') => {
                Ok(UrlScheme::WithScheme(other.to_ascii_lowercase()))
            }
            other => Err(ContextError::Config(format!("Invalid URL scheme: {}", other))),
        }
    }
}

/// Check a context or format name against `^[a-z0-9_-]+$` (case-insensitive).
pub fn is_valid_name(name: &str) -> bool {
    NAME_PATTERN.is_match(name)
}

pub(crate) fn validate_name(kind: &'static str, name: &str) -> Result<(), ContextError> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(ContextError::InvalidName {
            kind,
            name: name.to_string(),
        })
    }
}
