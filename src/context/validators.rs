//! Upload validator configuration.
//!
//! Contexts only store and hand out these entries; running them is up to
//! whatever accepts the upload.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// One validator: a kind plus free-form parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorConfig {
    pub kind: String,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl ValidatorConfig {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: Map::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    /// The generic "is this a well-formed uploaded file" check.
    pub fn file() -> Self {
        Self::new("file")
    }

    pub fn image() -> Self {
        Self::new("image")
    }

    pub fn pdf() -> Self {
        Self::file()
            .with_param("extensions", vec!["pdf"])
            .with_param("mime_types", vec!["application/pdf"])
    }
}

/// File category of a context
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextKind {
    #[default]
    Generic,
    Image,
    Pdf,
}

impl ContextKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextKind::Generic => "generic",
            ContextKind::Image => "image",
            ContextKind::Pdf => "pdf",
        }
    }

    pub fn default_validators(&self) -> Vec<ValidatorConfig> {
        match self {
            ContextKind::Generic => vec![ValidatorConfig::file()],
            ContextKind::Image => vec![ValidatorConfig::image()],
            ContextKind::Pdf => vec![ValidatorConfig::pdf()],
        }
    }
}

impl fmt::Display for ContextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContextKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "generic" | "file" => Ok(ContextKind::Generic),
            "image" => Ok(ContextKind::Image),
            "pdf" => Ok(ContextKind::Pdf),
            other => Err(format!("Unknown context kind: {}", other)),
        }
    }
}
