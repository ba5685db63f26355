//! In-memory storage
//!
//! Keeps every file in process memory. It has no random file access: read
//! paths are temporary copies the caller must delete, and paths handed to
//! the save operations are read into memory first.

use crate::error::StorageError;
use crate::storage::naming;
use crate::storage::{FileSource, ReadPath, Storage};
use crate::types::{is_valid_name, DataToken, UrlScheme};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use tracing::debug;

/// In-memory backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryStorageConfig {
    /// Prefix for generated URLs
    #[serde(default = "default_url_prefix")]
    pub url_prefix: String,
}

fn default_url_prefix() -> String {
    "memory://".to_string()
}

impl Default for MemoryStorageConfig {
    fn default() -> Self {
        Self {
            url_prefix: default_url_prefix(),
        }
    }
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    file_name: String,
    bytes: Vec<u8>,
    formats: BTreeMap<String, Vec<u8>>,
}

/// Process-local [`Storage`]
#[derive(Debug, Default)]
pub struct MemoryStorage {
    config: MemoryStorageConfig,
    entries: RwLock<HashMap<DataToken, MemoryEntry>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: MemoryStorageConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Stored bytes for `(data, format)`.
    pub fn bytes(&self, data: &DataToken, format: Option<&str>) -> Option<Vec<u8>> {
        let entries = self.entries.read();
        let entry = entries.get(data)?;
        match format {
            None => Some(entry.bytes.clone()),
            Some(format) => entry.formats.get(format).cloned(),
        }
    }

    /// Number of stored source files.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn with_entry<T>(
        &self,
        data: &DataToken,
        format: Option<&str>,
        f: impl FnOnce(&MemoryEntry, &[u8]) -> T,
    ) -> Result<T, StorageError> {
        let entries = self.entries.read();
        let entry = entries
            .get(data)
            .ok_or_else(|| StorageError::not_found(data.as_str(), format))?;
        let bytes = match format {
            None => entry.bytes.as_slice(),
            Some(format) => entry
                .formats
                .get(format)
                .ok_or_else(|| StorageError::not_found(data.as_str(), Some(format)))?
                .as_slice(),
        };
        Ok(f(entry, bytes))
    }
}

impl Storage for MemoryStorage {
    fn save_file(
        &self,
        source: FileSource<'_>,
        original_name: Option<&str>,
    ) -> Result<DataToken, StorageError> {
        let extension = original_name
            .and_then(|name| crate::storage::extension_of(std::path::Path::new(name)))
            .or_else(|| source.extension());
        let file_name = original_name
            .and_then(naming::sanitize_original_name)
            .unwrap_or_else(|| naming::with_extension("file", extension.as_deref()));
        let bytes = source.read_bytes()?.into_owned();

        let token = DataToken::new(format!("{}/{}", uuid::Uuid::new_v4().simple(), file_name));
        self.entries.write().insert(
            token.clone(),
            MemoryEntry {
                file_name,
                bytes,
                formats: BTreeMap::new(),
            },
        );
        debug!(data = %token, "Stored source file in memory");
        Ok(token)
    }

    fn save_formatted_file(
        &self,
        data: &DataToken,
        source: FileSource<'_>,
        format: &str,
    ) -> Result<DataToken, StorageError> {
        if !is_valid_name(format) {
            return Err(StorageError::Config(format!("Invalid format name: {:?}", format)));
        }
        let bytes = source.read_bytes()?.into_owned();
        let mut entries = self.entries.write();
        let entry = entries
            .get_mut(data)
            .ok_or_else(|| StorageError::not_found(data.as_str(), None))?;
        entry.formats.insert(format.to_string(), bytes);
        Ok(data.clone())
    }

    fn file_exists(&self, data: &DataToken, format: Option<&str>) -> bool {
        let entries = self.entries.read();
        match (entries.get(data), format) {
            (Some(_), None) => true,
            (Some(entry), Some(format)) => entry.formats.contains_key(format),
            (None, _) => false,
        }
    }

    fn read_path(&self, data: &DataToken, format: Option<&str>) -> Result<ReadPath, StorageError> {
        let (suffix, bytes) = self.with_entry(data, format, |entry, bytes| {
            let suffix = crate::storage::extension_of(std::path::Path::new(&entry.file_name))
                .map(|ext| format!(".{}", ext))
                .unwrap_or_default();
            (suffix, bytes.to_vec())
        })?;

        let mut file = tempfile::Builder::new()
            .prefix("upfile-mem-")
            .suffix(&suffix)
            .tempfile()?;
        file.write_all(&bytes)?;
        let path = file
            .into_temp_path()
            .keep()
            .map_err(|e| StorageError::IoError(e.error))?;
        Ok(ReadPath::temporary(path))
    }

    fn url(
        &self,
        data: &DataToken,
        format: Option<&str>,
        _scheme: &UrlScheme,
    ) -> Result<String, StorageError> {
        Ok(match format {
            Some(format) => format!("{}{}?format={}", self.config.url_prefix, data, format),
            None => format!("{}{}", self.config.url_prefix, data),
        })
    }

    fn file_size(&self, data: &DataToken, format: Option<&str>) -> Result<u64, StorageError> {
        self.with_entry(data, format, |_, bytes| bytes.len() as u64)
    }

    fn file_name(&self, data: &DataToken, format: Option<&str>) -> Result<String, StorageError> {
        self.with_entry(data, format, |entry, _| entry.file_name.clone())
    }

    fn delete_file(&self, data: &DataToken) -> bool {
        self.entries.write().remove(data).is_some()
    }

    fn delete_formatted_file(&self, data: &DataToken, format: &str) -> bool {
        self.entries
            .write()
            .get_mut(data)
            .map(|entry| entry.formats.remove(format).is_some())
            .unwrap_or(false)
    }

    fn format_list(&self, data: &DataToken) -> Vec<String> {
        self.entries
            .read()
            .get(data)
            .map(|entry| entry.formats.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn accepts_paths(&self) -> bool {
        false
    }
}
