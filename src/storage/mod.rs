//! Storage
//!
//! Persistence for uploaded source files and their named derived formats.
//! A backend hands out an opaque [`DataToken`] on save; every later lookup of
//! the source or one of its formats goes through that token.

pub mod local;
pub mod memory;
pub mod mime;
pub mod naming;

pub use local::{LocalStorage, LocalStorageConfig, NamingStrategy};
pub use memory::{MemoryStorage, MemoryStorageConfig};

use crate::error::StorageError;
use crate::types::{DataToken, UrlScheme};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Bytes to persist, either as a file to copy or as in-memory content
#[derive(Debug, Clone, Copy)]
pub enum FileSource<'a> {
    /// Copy the file at this path
    Path(&'a Path),
    /// Write these bytes; `extension` is `None` when it could not be determined
    Content {
        bytes: &'a [u8],
        extension: Option<&'a str>,
    },
}

impl<'a> FileSource<'a> {
    /// Sanitized, lowercased extension of the source, if any.
    pub fn extension(&self) -> Option<String> {
        match self {
            FileSource::Path(path) => extension_of(path),
            FileSource::Content { extension, .. } => {
                extension.and_then(naming::sanitize_extension)
            }
        }
    }

    /// Load the full contents of the source.
    pub fn read_bytes(&self) -> Result<std::borrow::Cow<'a, [u8]>, StorageError> {
        match self {
            FileSource::Path(path) => Ok(std::borrow::Cow::Owned(std::fs::read(path)?)),
            FileSource::Content { bytes, .. } => Ok(std::borrow::Cow::Borrowed(bytes)),
        }
    }
}

/// A location readable with plain byte-stream access
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadPath {
    pub path: PathBuf,
    /// `true` when the backend materialized a copy the caller must delete;
    /// `false` when the path is the live stored file.
    pub temporary: bool,
}

impl ReadPath {
    pub fn live(path: PathBuf) -> Self {
        Self {
            path,
            temporary: false,
        }
    }

    pub fn temporary(path: PathBuf) -> Self {
        Self {
            path,
            temporary: true,
        }
    }
}

/// Storage contract consumed by contexts.
///
/// Implementations must keep `file_exists(d, Some(f)) => file_exists(d, None)`:
/// a derived format never outlives its source.
pub trait Storage: Send + Sync + fmt::Debug {
    /// Persist a brand-new source file and return its token.
    ///
    /// The extension of `original_name` wins over the source's own extension.
    fn save_file(
        &self,
        source: FileSource<'_>,
        original_name: Option<&str>,
    ) -> Result<DataToken, StorageError>;

    /// Persist `source` as the derived `format` of an existing source.
    ///
    /// The returned token is the unchanged `data`.
    fn save_formatted_file(
        &self,
        data: &DataToken,
        source: FileSource<'_>,
        format: &str,
    ) -> Result<DataToken, StorageError>;

    /// Never fails; invalid tokens resolve to `false`.
    fn file_exists(&self, data: &DataToken, format: Option<&str>) -> bool;

    /// Resolve a readable path, or [`StorageError::NotFound`].
    fn read_path(&self, data: &DataToken, format: Option<&str>) -> Result<ReadPath, StorageError>;

    fn url(
        &self,
        data: &DataToken,
        format: Option<&str>,
        scheme: &UrlScheme,
    ) -> Result<String, StorageError>;

    fn file_size(&self, data: &DataToken, format: Option<&str>) -> Result<u64, StorageError>;

    /// Base name including the extension.
    fn file_name(&self, data: &DataToken, format: Option<&str>) -> Result<String, StorageError>;

    fn extension(
        &self,
        data: &DataToken,
        format: Option<&str>,
    ) -> Result<Option<String>, StorageError> {
        let name = self.file_name(data, format)?;
        Ok(extension_of(Path::new(&name)))
    }

    fn mime_type(&self, data: &DataToken, format: Option<&str>) -> Result<String, StorageError> {
        let extension = self.extension(data, format)?;
        Ok(mime::from_extension(extension.as_deref()).to_string())
    }

    /// Delete the source and every derived format. `false` if nothing existed.
    fn delete_file(&self, data: &DataToken) -> bool;

    /// Delete one derived format. `false` if it did not exist.
    fn delete_formatted_file(&self, data: &DataToken, format: &str) -> bool;

    /// Derived formats currently persisted for `data`, sorted by name.
    fn format_list(&self, data: &DataToken) -> Vec<String>;

    /// Whether [`FileSource::Path`] is accepted directly. Callers fall back to
    /// [`FileSource::Content`] otherwise.
    fn accepts_paths(&self) -> bool {
        true
    }
}

/// Backend selection as it appears in configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageConfig {
    #[serde(alias = "local", alias = "fs")]
    LocalFilesystem(LocalStorageConfig),
    #[serde(alias = "memory")]
    InMemory(MemoryStorageConfig),
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::LocalFilesystem(LocalStorageConfig::default())
    }
}

impl StorageConfig {
    /// Instantiate the configured backend.
    pub fn open(&self) -> Result<Arc<dyn Storage>, StorageError> {
        match self {
            StorageConfig::LocalFilesystem(config) => Ok(Arc::new(LocalStorage::new(config.clone())?)),
            StorageConfig::InMemory(config) => Ok(Arc::new(MemoryStorage::with_config(config.clone()))),
        }
    }

    /// Resolve relative filesystem roots against `base`.
    pub fn resolve_relative_to(&mut self, base: &Path) {
        if let StorageConfig::LocalFilesystem(config) = self {
            if config.root.is_relative() {
                config.root = base.join(&config.root);
            }
        }
    }
}

/// Sanitized, lowercased extension of a path, if it has a usable one.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(naming::sanitize_extension)
}
