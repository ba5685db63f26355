//! Contexts
//!
//! A context is a named file category ("avatar", "document") binding one
//! storage backend, an immutable set of named formatters, and the validator
//! configuration applied at upload time. Contexts are assembled through
//! [`ContextBuilder`]; raw formatter configuration is resolved against a
//! [`FormatterRegistry`] once, at build time.

pub mod generation;
pub mod lock;
pub mod manager;
pub mod validators;

pub use generation::GenerationReport;
pub use lock::TokenLocks;
pub use manager::ContextManager;
pub use validators::{ContextKind, ValidatorConfig};

use crate::error::ContextError;
use crate::formatter::{Formatter, FormatterRegistry, FormatterSet, FormatterSpec};
use crate::storage::{FileSource, LocalStorageConfig, Storage, StorageConfig};
use crate::types::{validate_name, DataToken, UrlScheme};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// A formatter as handed to the builder: raw configuration or a ready instance
pub enum FormatterEntry {
    Spec(FormatterSpec),
    Instance(Box<dyn Formatter>),
}

impl fmt::Debug for FormatterEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatterEntry::Spec(spec) => f.debug_tuple("Spec").field(spec).finish(),
            FormatterEntry::Instance(formatter) => {
                f.debug_tuple("Instance").field(formatter).finish()
            }
        }
    }
}

impl From<FormatterSpec> for FormatterEntry {
    fn from(spec: FormatterSpec) -> Self {
        FormatterEntry::Spec(spec)
    }
}

impl From<Box<dyn Formatter>> for FormatterEntry {
    fn from(formatter: Box<dyn Formatter>) -> Self {
        FormatterEntry::Instance(formatter)
    }
}

#[derive(Debug)]
enum StorageEntry {
    Config(StorageConfig),
    Instance(Arc<dyn Storage>),
}

/// Builder for [`Context`]
#[derive(Debug)]
pub struct ContextBuilder {
    name: String,
    kind: ContextKind,
    storage: Option<StorageEntry>,
    formatters: Vec<(String, FormatterEntry)>,
    validators: Option<Vec<ValidatorConfig>>,
    registry: Option<FormatterRegistry>,
}

impl ContextBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ContextKind::default(),
            storage: None,
            formatters: Vec::new(),
            validators: None,
            registry: None,
        }
    }

    /// Context kind; decides the default validators.
    pub fn kind(mut self, kind: ContextKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(StorageEntry::Instance(storage));
        self
    }

    /// Storage opened at build time.
    pub fn storage_config(mut self, config: StorageConfig) -> Self {
        self.storage = Some(StorageEntry::Config(config));
        self
    }

    /// Add a ready formatter under `name`.
    pub fn formatter<F: Formatter + 'static>(mut self, name: impl Into<String>, formatter: F) -> Self {
        self.formatters
            .push((name.into(), FormatterEntry::Instance(Box::new(formatter))));
        self
    }

    /// Add a formatter (raw or instantiated) under `name`.
    pub fn formatter_entry(mut self, name: impl Into<String>, entry: impl Into<FormatterEntry>) -> Self {
        self.formatters.push((name.into(), entry.into()));
        self
    }

    /// Replace the validator list. Without this the kind's defaults apply.
    pub fn validators(mut self, validators: Vec<ValidatorConfig>) -> Self {
        self.validators = Some(validators);
        self
    }

    /// Registry used to build raw formatter entries. Defaults to the built-in kinds.
    pub fn registry(mut self, registry: FormatterRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Validate names, open the storage, and instantiate every formatter.
    ///
    /// Formatters keep the order they were added in.
    pub fn build(self) -> Result<Context, ContextError> {
        validate_name("context", &self.name)?;

        let storage = match self.storage {
            Some(StorageEntry::Instance(storage)) => storage,
            Some(StorageEntry::Config(config)) => config.open()?,
            None => default_storage(&self.name).open()?,
        };

        let registry = self.registry.unwrap_or_default();
        let mut formatters = FormatterSet::new(self.name.clone());
        for (format, entry) in self.formatters {
            validate_name("format", &format)?;
            let formatter = match entry {
                FormatterEntry::Spec(spec) => registry.build(&spec).map_err(|e| match e {
                    ContextError::Config(message) => ContextError::Config(format!(
                        "Context '{}', format '{}': {}",
                        self.name, format, message
                    )),
                    other => other,
                })?,
                FormatterEntry::Instance(formatter) => formatter,
            };
            formatters.insert(&format, formatter)?;
        }

        for format in formatters.names() {
            let dependency = formatters.get(format).and_then(|f| f.dependency());
            if let Some(dependency) = dependency {
                if !formatters.contains(dependency) {
                    return Err(ContextError::UnknownFormat {
                        context: self.name.clone(),
                        format: dependency.to_string(),
                    });
                }
            }
        }

        let validators = self
            .validators
            .unwrap_or_else(|| self.kind.default_validators());

        info!(
            context = %self.name,
            kind = %self.kind,
            formats = formatters.len(),
            "Context built"
        );
        Ok(Context {
            name: self.name,
            kind: self.kind,
            storage,
            formatters,
            validators,
            locks: TokenLocks::new(),
        })
    }
}

/// Local storage under `uploads/{name}`, served from `/uploads/{name}`.
pub fn default_storage(name: &str) -> StorageConfig {
    let mut config = LocalStorageConfig::with_root(PathBuf::from("uploads").join(name));
    config.public_url = format!("/uploads/{}", name);
    StorageConfig::LocalFilesystem(config)
}

/// A named file category: storage, formatters and validators
#[derive(Debug)]
pub struct Context {
    name: String,
    kind: ContextKind,
    storage: Arc<dyn Storage>,
    formatters: FormatterSet,
    validators: Vec<ValidatorConfig>,
    locks: TokenLocks,
}

impl Context {
    pub fn builder(name: impl Into<String>) -> ContextBuilder {
        ContextBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ContextKind {
        self.kind
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn has_formatter(&self, format: &str) -> bool {
        self.formatters.contains(format)
    }

    /// The formatter registered as `format`, or [`ContextError::UnknownFormat`].
    pub fn formatter(&self, format: &str) -> Result<Arc<dyn Formatter>, ContextError> {
        self.formatters
            .get(format)
            .cloned()
            .ok_or_else(|| ContextError::UnknownFormat {
                context: self.name.clone(),
                format: format.to_string(),
            })
    }

    /// Registered format names, in registration order.
    pub fn formatter_names(&self) -> &[String] {
        self.formatters.names()
    }

    pub fn validators(&self) -> &[ValidatorConfig] {
        &self.validators
    }

    pub fn locks(&self) -> &TokenLocks {
        &self.locks
    }

    /// Persist a new source file in this context's storage.
    pub fn save_file(
        &self,
        source: FileSource<'_>,
        original_name: Option<&str>,
    ) -> Result<DataToken, ContextError> {
        let data = self.storage.save_file(source, original_name)?;
        info!(context = %self.name, data = %data, "Saved source file");
        Ok(data)
    }

    pub fn url(
        &self,
        data: &DataToken,
        format: Option<&str>,
        scheme: &UrlScheme,
    ) -> Result<String, ContextError> {
        if let Some(format) = format {
            if !self.has_formatter(format) {
                return Err(ContextError::UnknownFormat {
                    context: self.name.clone(),
                    format: format.to_string(),
                });
            }
        }
        Ok(self.storage.url(data, format, scheme)?)
    }

    /// Derived formats currently stored for `data`.
    pub fn format_list(&self, data: &DataToken) -> Vec<String> {
        self.storage.format_list(data)
    }

    /// Delete one derived format, or the source and all of its formats.
    pub fn delete(&self, data: &DataToken, format: Option<&str>) -> bool {
        let deleted = match format {
            Some(format) => self.storage.delete_formatted_file(data, format),
            None => self.storage.delete_file(data),
        };
        debug!(
            context = %self.name,
            data = %data,
            format = ?format,
            deleted,
            "Delete requested"
        );
        deleted
    }
}
