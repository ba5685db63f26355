//! Configuration System
//!
//! Contexts are declared in TOML: a `[defaults]` table merged under every
//! `[contexts.<name>]` table, plus `[logging]`. Sources are layered by
//! [`ConfigLoader`]: built-in defaults, the global user file, the workspace
//! files, then `UPFILE__*` environment variables.

use crate::context::{ContextKind, ValidatorConfig};
use crate::error::ContextError;
use crate::formatter::{FormatterRegistry, FormatterSpec};
use crate::logging::LoggingConfig;
use crate::storage::StorageConfig;
use crate::types::is_valid_name;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;
pub use merge::{expand_storage_aliases, merge_tables, merge_values, substitute_placeholder};

/// Placeholder replaced by the context name inside storage settings
pub const CONTEXT_PLACEHOLDER: &str = "{context}";

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpfileConfig {
    /// Settings every context inherits
    #[serde(default)]
    pub defaults: ContextConfig,

    /// Context definitions by name
    #[serde(default)]
    pub contexts: BTreeMap<String, ContextConfig>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings of one context, or the shared defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ContextKind>,

    /// Storage table; `kind` selects the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub formatters: BTreeMap<String, FormatterSpec>,

    /// Replaces the kind's default validators when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validators: Option<Vec<ValidatorConfig>>,
}

impl ContextConfig {
    /// Parsed storage settings, if any were given.
    pub fn storage_config(&self) -> Result<Option<StorageConfig>, ContextError> {
        let Some(storage) = &self.storage else {
            return Ok(None);
        };
        let mut storage = storage.clone();
        expand_storage_aliases(&mut storage);
        if let serde_json::Value::Object(table) = &mut storage {
            table
                .entry("kind")
                .or_insert_with(|| serde_json::Value::from("local_filesystem"));
        }
        serde_json::from_value(storage)
            .map(Some)
            .map_err(|e| ContextError::Config(format!("Invalid storage settings: {}", e)))
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    Context(String, String),
    Format(String, String, String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Context(name, msg) => {
                write!(f, "Context '{}': {}", name, msg)
            }
            ValidationError::Format(context, format, msg) => {
                write!(f, "Context '{}', format '{}': {}", context, format, msg)
            }
            ValidationError::Logging(msg) => {
                write!(f, "Logging: {}", msg)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

impl UpfileConfig {
    /// Effective settings of context `name`: its table merged over `[defaults]`,
    /// with `{context}` in storage settings replaced by the name.
    pub fn context_config(&self, name: &str) -> Result<ContextConfig, ContextError> {
        let own = self
            .contexts
            .get(name)
            .ok_or_else(|| ContextError::UnknownContext(name.to_string()))?;

        let mut merged = to_value(&self.defaults)?;
        let mut overlay = to_value(own)?;
        for value in [&mut merged, &mut overlay] {
            if let Some(storage) = value.get_mut("storage") {
                expand_storage_aliases(storage);
            }
        }
        merge_tables(&mut merged, overlay);
        if let Some(storage) = merged.get_mut("storage") {
            substitute_placeholder(storage, CONTEXT_PLACEHOLDER, name);
        }

        serde_json::from_value(merged).map_err(|e| {
            ContextError::Config(format!("Context '{}': invalid settings: {}", name, e))
        })
    }

    /// Validate against the built-in formatter kinds.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        self.validate_with(&FormatterRegistry::default())
    }

    /// Validate the entire configuration, collecting every problem.
    pub fn validate_with(&self, registry: &FormatterRegistry) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        for name in self.contexts.keys() {
            if !is_valid_name(name) {
                errors.push(ValidationError::Context(
                    name.clone(),
                    "name must match ^[a-z0-9_-]+$".to_string(),
                ));
                continue;
            }
            let context = match self.context_config(name) {
                Ok(context) => context,
                Err(e) => {
                    errors.push(ValidationError::Context(name.clone(), e.to_string()));
                    continue;
                }
            };
            if let Err(e) = context.storage_config() {
                errors.push(ValidationError::Context(name.clone(), e.to_string()));
            }
            for (format, spec) in &context.formatters {
                if !is_valid_name(format) {
                    errors.push(ValidationError::Format(
                        name.clone(),
                        format.clone(),
                        "name must match ^[a-z0-9_-]+$".to_string(),
                    ));
                }
                if !registry.has_kind(&spec.kind) {
                    errors.push(ValidationError::Format(
                        name.clone(),
                        format.clone(),
                        format!("unknown formatter kind '{}'", spec.kind),
                    ));
                }
                if let Some(Ok(Some(from))) = (spec.kind == "from").then(|| spec.str_param("from")) {
                    if !context.formatters.contains_key(from) {
                        errors.push(ValidationError::Format(
                            name.clone(),
                            format.clone(),
                            format!("derives from unknown format '{}'", from),
                        ));
                    }
                }
            }
        }

        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn to_value(config: &ContextConfig) -> Result<serde_json::Value, ContextError> {
    serde_json::to_value(config)
        .map_err(|e| ContextError::Config(format!("Failed to encode context settings: {}", e)))
}
