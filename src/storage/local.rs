//! Local filesystem storage
//!
//! Source files live at `{root}/{subdir}/{filename}` and derived formats at
//! `{root}/{subdir}/{format}/{filename}`: the filename is stable across the
//! source and every format, only the containing folder changes.

use crate::error::StorageError;
use crate::storage::naming::{self, make_token, parse_token};
use crate::storage::{FileSource, ReadPath, Storage};
use crate::types::{is_valid_name, DataToken, UrlScheme};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// How stored filenames are chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingStrategy {
    /// Random alphanumeric stem
    #[default]
    Random,
    /// Sanitized original name when it is safe and free, random otherwise
    Original,
    /// `blake3` digest of the content; identical bytes map to the same token
    ContentHash,
}

/// Local backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalStorageConfig {
    /// Directory holding all stored files
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// URL prefix under which `root` is served (relative or absolute)
    #[serde(default = "default_public_url")]
    pub public_url: String,

    /// Scheme and host used for absolute URLs, e.g. `https://cdn.example.com`
    #[serde(default)]
    pub host_info: Option<String>,

    /// Source files per subdirectory before a new one is opened
    #[serde(default = "default_max_files_per_dir")]
    pub max_files_per_dir: usize,

    #[serde(default = "default_dir_name_length")]
    pub dir_name_length: usize,

    #[serde(default = "default_file_name_length")]
    pub file_name_length: usize,

    #[serde(default)]
    pub naming: NamingStrategy,
}

fn default_root() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_public_url() -> String {
    "/uploads".to_string()
}

fn default_max_files_per_dir() -> usize {
    1000
}

fn default_dir_name_length() -> usize {
    4
}

fn default_file_name_length() -> usize {
    16
}

impl Default for LocalStorageConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            public_url: default_public_url(),
            host_info: None,
            max_files_per_dir: default_max_files_per_dir(),
            dir_name_length: default_dir_name_length(),
            file_name_length: default_file_name_length(),
            naming: NamingStrategy::default(),
        }
    }
}

impl LocalStorageConfig {
    pub fn with_root<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            ..Self::default()
        }
    }
}

/// Filesystem-backed [`Storage`]
#[derive(Debug)]
pub struct LocalStorage {
    root: PathBuf,
    config: LocalStorageConfig,
}

impl LocalStorage {
    /// Open storage at the configured root, creating it if needed.
    pub fn new(config: LocalStorageConfig) -> Result<Self, StorageError> {
        if config.max_files_per_dir == 0 {
            return Err(StorageError::Config(
                "max_files_per_dir must be at least 1".to_string(),
            ));
        }
        fs::create_dir_all(&config.root).map_err(|e| {
            StorageError::IoError(std::io::Error::new(
                e.kind(),
                format!("Failed to create storage root at {:?}: {}", config.root, e),
            ))
        })?;
        let root = dunce::canonicalize(&config.root)?;
        Ok(Self { root, config })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &LocalStorageConfig {
        &self.config
    }

    fn source_path(&self, subdir: &str, file_name: &str) -> PathBuf {
        self.root.join(subdir).join(file_name)
    }

    fn format_path(&self, subdir: &str, format: &str, file_name: &str) -> PathBuf {
        self.root.join(subdir).join(format).join(file_name)
    }

    /// Path of `(data, format)` if the token parses and the format name is valid.
    fn resolve(&self, data: &DataToken, format: Option<&str>) -> Option<PathBuf> {
        let (subdir, file_name) = parse_token(data)?;
        match format {
            None => Some(self.source_path(subdir, file_name)),
            Some(format) if is_valid_name(format) => {
                Some(self.format_path(subdir, format, file_name))
            }
            Some(_) => None,
        }
    }

    fn existing_path(&self, data: &DataToken, format: Option<&str>) -> Result<PathBuf, StorageError> {
        if !self.file_exists(data, format) {
            return Err(StorageError::not_found(data.as_str(), format));
        }
        self.resolve(data, format)
            .ok_or_else(|| StorageError::InvalidToken(data.to_string()))
    }

    /// Pick a subdirectory with room for one more source file.
    ///
    /// Existing candidates are shuffled to spread writes; a fresh name is
    /// generated when all of them are full.
    fn choose_subdir(&self) -> Result<String, StorageError> {
        let mut candidates: Vec<String> = WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_dir())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .filter(|name| naming::is_valid_subdir(name))
            .collect();
        candidates.shuffle(&mut rand::thread_rng());

        for candidate in candidates {
            let count = fs::read_dir(self.root.join(&candidate))?
                .filter_map(Result::ok)
                .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
                .count();
            if count < self.config.max_files_per_dir {
                return Ok(candidate);
            }
        }

        loop {
            let name = naming::random_name(self.config.dir_name_length);
            if !self.root.join(&name).exists() {
                debug!(subdir = %name, "Opening new storage subdirectory");
                return Ok(name);
            }
        }
    }

    fn random_file_name(&self, subdir: &str, extension: Option<&str>) -> String {
        loop {
            let stem = naming::random_name(self.config.file_name_length);
            let name = naming::with_extension(&stem, extension);
            if !self.source_path(subdir, &name).exists() {
                return name;
            }
        }
    }

    /// Write `source` to `target` atomically (temp file in the same directory, then rename).
    fn write_atomic(&self, target: &Path, source: FileSource<'_>) -> Result<(), StorageError> {
        let parent = target.parent().ok_or_else(|| {
            StorageError::Config(format!("Target {:?} has no parent directory", target))
        })?;
        fs::create_dir_all(parent)?;

        let file_name = target
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file");
        let temp_path = parent.join(format!(".{}.{}.tmp", file_name, naming::random_name(8)));

        let written = match source {
            FileSource::Path(path) => fs::copy(path, &temp_path).map(|_| ()),
            FileSource::Content { bytes, .. } => fs::write(&temp_path, bytes),
        };
        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(StorageError::IoError(e));
        }

        fs::rename(&temp_path, target).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            StorageError::IoError(std::io::Error::new(
                e.kind(),
                format!("Failed to rename temp file to {:?}: {}", target, e),
            ))
        })
    }

    fn save_content_addressed(
        &self,
        source: FileSource<'_>,
        extension: Option<&str>,
    ) -> Result<DataToken, StorageError> {
        let bytes = source.read_bytes()?;
        let hex = blake3::hash(&bytes).to_hex();
        let subdir = &hex.as_str()[0..2];
        let file_name = naming::with_extension(&hex.as_str()[..32], extension);
        let token = make_token(subdir, &file_name);

        if self.file_exists(&token, None) {
            debug!(data = %token, "Content already stored, reusing token");
            return Ok(token);
        }
        self.write_atomic(
            &self.source_path(subdir, &file_name),
            FileSource::Content {
                bytes: &bytes,
                extension,
            },
        )?;
        Ok(token)
    }

    fn remove_format_dir_if_empty(&self, subdir: &str, format: &str) {
        let dir = self.root.join(subdir).join(format);
        // fails while other files remain, which is fine
        let _ = fs::remove_dir(dir);
    }

    fn absolute_base(&self) -> Result<&str, StorageError> {
        self.config.host_info.as_deref().ok_or_else(|| {
            StorageError::Config("host_info is required for absolute URLs".to_string())
        })
    }
}

impl Storage for LocalStorage {
    fn save_file(
        &self,
        source: FileSource<'_>,
        original_name: Option<&str>,
    ) -> Result<DataToken, StorageError> {
        let extension = original_name
            .and_then(|name| crate::storage::extension_of(Path::new(name)))
            .or_else(|| source.extension());
        let extension = extension.filter(|ext| !naming::is_blacklisted(ext));

        if self.config.naming == NamingStrategy::ContentHash {
            return self.save_content_addressed(source, extension.as_deref());
        }

        let subdir = self.choose_subdir()?;
        let preserved = match self.config.naming {
            // format directories share the subdirectory, so a kept name needs an extension
            NamingStrategy::Original => original_name
                .and_then(naming::sanitize_original_name)
                .and_then(|name| {
                    if name.contains('.') {
                        Some(name)
                    } else {
                        extension
                            .as_deref()
                            .map(|ext| naming::with_extension(&name, Some(ext)))
                            .filter(|name| naming::is_valid_file_name(name))
                    }
                })
                .filter(|name| !self.source_path(&subdir, name).exists()),
            _ => None,
        };
        let file_name = match preserved {
            Some(name) => name,
            None => self.random_file_name(&subdir, extension.as_deref()),
        };

        let token = make_token(&subdir, &file_name);
        self.write_atomic(&self.source_path(&subdir, &file_name), source)
            .map_err(|e| StorageError::WriteFailed {
                data: token.to_string(),
                format: None,
                reason: e.to_string(),
            })?;
        debug!(data = %token, "Stored source file");
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
        let (subdir, file_name) =
            parse_token(data).ok_or_else(|| StorageError::InvalidToken(data.to_string()))?;
        if !self.source_path(subdir, file_name).is_file() {
            return Err(StorageError::not_found(data.as_str(), None));
        }

        self.write_atomic(&self.format_path(subdir, format, file_name), source)
            .map_err(|e| StorageError::WriteFailed {
                data: data.to_string(),
                format: Some(format.to_string()),
                reason: e.to_string(),
            })?;
        debug!(data = %data, format, "Stored formatted file");
        Ok(data.clone())
    }

    fn file_exists(&self, data: &DataToken, format: Option<&str>) -> bool {
        let Some((subdir, file_name)) = parse_token(data) else {
            return false;
        };
        let source_exists = self.source_path(subdir, file_name).is_file();
        match format {
            None => source_exists,
            Some(format) => {
                source_exists
                    && is_valid_name(format)
                    && self.format_path(subdir, format, file_name).is_file()
            }
        }
    }

    fn read_path(&self, data: &DataToken, format: Option<&str>) -> Result<ReadPath, StorageError> {
        self.existing_path(data, format).map(ReadPath::live)
    }

    fn url(
        &self,
        data: &DataToken,
        format: Option<&str>,
        scheme: &UrlScheme,
    ) -> Result<String, StorageError> {
        let (subdir, file_name) =
            parse_token(data).ok_or_else(|| StorageError::InvalidToken(data.to_string()))?;
        let relative = match format {
            Some(format) if is_valid_name(format) => format!("{}/{}/{}", subdir, format, file_name),
            Some(format) => {
                return Err(StorageError::Config(format!("Invalid format name: {:?}", format)))
            }
            None => format!("{}/{}", subdir, file_name),
        };
        let url = format!("{}/{}", self.config.public_url.trim_end_matches('/'), relative);

        let absolute = |url: String| -> Result<String, StorageError> {
            if url.contains("://") {
                return Ok(url);
            }
            let host = self.absolute_base()?;
            if let Some(rest) = url.strip_prefix("//") {
                let host_scheme = host.split_once("://").map(|(s, _)| s).unwrap_or("https");
                return Ok(format!("{}://{}", host_scheme, rest));
            }
            Ok(format!("{}{}", host.trim_end_matches('/'), url))
        };

        match scheme {
            UrlScheme::Relative => Ok(url),
            UrlScheme::Absolute => absolute(url),
            UrlScheme::WithScheme(wanted) => {
                let url = absolute(url)?;
                let rest = url.split_once("://").map(|(_, rest)| rest).unwrap_or(&url);
                Ok(format!("{}://{}", wanted, rest))
            }
        }
    }

    fn file_size(&self, data: &DataToken, format: Option<&str>) -> Result<u64, StorageError> {
        let path = self.existing_path(data, format)?;
        Ok(fs::metadata(path)?.len())
    }

    fn file_name(&self, data: &DataToken, format: Option<&str>) -> Result<String, StorageError> {
        self.existing_path(data, format)?;
        let (_, file_name) =
            parse_token(data).ok_or_else(|| StorageError::InvalidToken(data.to_string()))?;
        Ok(file_name.to_string())
    }

    fn delete_file(&self, data: &DataToken) -> bool {
        let Some((subdir, file_name)) = parse_token(data) else {
            return false;
        };
        let source = self.source_path(subdir, file_name);
        if !source.is_file() {
            return false;
        }
        for format in self.format_list(data) {
            self.delete_formatted_file(data, &format);
        }
        match fs::remove_file(&source) {
            Ok(()) => true,
            Err(e) => {
                warn!(data = %data, error = %e, "Failed to delete source file");
                false
            }
        }
    }

    fn delete_formatted_file(&self, data: &DataToken, format: &str) -> bool {
        let Some((subdir, file_name)) = parse_token(data) else {
            return false;
        };
        if !is_valid_name(format) {
            return false;
        }
        let path = self.format_path(subdir, format, file_name);
        if !path.is_file() {
            return false;
        }
        match fs::remove_file(&path) {
            Ok(()) => {
                self.remove_format_dir_if_empty(subdir, format);
                true
            }
            Err(e) => {
                warn!(data = %data, format, error = %e, "Failed to delete formatted file");
                false
            }
        }
    }

    fn format_list(&self, data: &DataToken) -> Vec<String> {
        let Some((subdir, file_name)) = parse_token(data) else {
            return Vec::new();
        };
        if !self.source_path(subdir, file_name).is_file() {
            return Vec::new();
        }
        let mut formats: Vec<String> = WalkDir::new(self.root.join(subdir))
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_dir())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .filter(|format| is_valid_name(format))
            .filter(|format| self.format_path(subdir, format, file_name).is_file())
            .collect();
        formats.sort();
        formats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn storage(temp_dir: &TempDir) -> LocalStorage {
        LocalStorage::new(LocalStorageConfig::with_root(temp_dir.path())).unwrap()
    }

    fn content(bytes: &[u8]) -> FileSource<'_> {
        FileSource::Content {
            bytes,
            extension: Some("txt"),
        }
    }

    #[test]
    fn test_save_and_read_source() {
        let temp_dir = TempDir::new().unwrap();
        let storage = storage(&temp_dir);

        let data = storage.save_file(content(b"hello"), Some("a.txt")).unwrap();
        assert!(parse_token(&data).is_some());
        assert!(storage.file_exists(&data, None));

        let read = storage.read_path(&data, None).unwrap();
        assert!(!read.temporary);
        assert_eq!(fs::read(&read.path).unwrap(), b"hello");
        assert_eq!(storage.file_size(&data, None).unwrap(), 5);
        assert_eq!(storage.mime_type(&data, None).unwrap(), "text/plain");
    }

    #[test]
    fn test_format_path_layout() {
        let temp_dir = TempDir::new().unwrap();
        let storage = storage(&temp_dir);

        let data = storage.save_file(content(b"src"), None).unwrap();
        let returned = storage
            .save_formatted_file(&data, content(b"small"), "small")
            .unwrap();
        assert_eq!(returned, data);

        let (subdir, file_name) = parse_token(&data).unwrap();
        let expected = storage.root().join(subdir).join("small").join(file_name);
        assert_eq!(storage.read_path(&data, Some("small")).unwrap().path, expected);
        assert_eq!(storage.format_list(&data), vec!["small".to_string()]);
    }

    #[test]
    fn test_invalid_tokens_do_not_exist() {
        let temp_dir = TempDir::new().unwrap();
        let storage = storage(&temp_dir);

        for raw in ["", "nope", "../../etc/passwd", "a/b/c"] {
            let token = DataToken::new(raw);
            assert!(!storage.file_exists(&token, None));
            assert!(!storage.file_exists(&token, Some("small")));
            assert!(storage.format_list(&token).is_empty());
            assert!(!storage.delete_file(&token));
        }
    }

    #[test]
    fn test_read_missing_format_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let storage = storage(&temp_dir);
        let data = storage.save_file(content(b"src"), None).unwrap();

        match storage.read_path(&data, Some("missing")) {
            Err(StorageError::NotFound { format, .. }) => {
                assert_eq!(format.as_deref(), Some("missing"))
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_formatted_file_requires_source() {
        let temp_dir = TempDir::new().unwrap();
        let storage = storage(&temp_dir);
        let result = storage.save_formatted_file(&DataToken::new("abcd/x.txt"), content(b"x"), "small");
        assert!(matches!(result, Err(StorageError::NotFound { .. })));
    }

    #[test]
    fn test_delete_file_removes_formats() {
        let temp_dir = TempDir::new().unwrap();
        let storage = storage(&temp_dir);
        let data = storage.save_file(content(b"src"), None).unwrap();
        storage.save_formatted_file(&data, content(b"a"), "a").unwrap();
        storage.save_formatted_file(&data, content(b"b"), "b").unwrap();

        assert!(storage.delete_file(&data));
        assert!(!storage.file_exists(&data, None));
        assert!(!storage.file_exists(&data, Some("a")));
        assert!(!storage.delete_file(&data), "second delete is a no-op");
    }

    #[test]
    fn test_delete_formatted_file_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let storage = storage(&temp_dir);
        let data = storage.save_file(content(b"src"), None).unwrap();
        storage.save_formatted_file(&data, content(b"a"), "a").unwrap();

        assert!(storage.delete_formatted_file(&data, "a"));
        assert!(!storage.delete_formatted_file(&data, "a"));
        assert!(storage.file_exists(&data, None));
        assert!(storage.format_list(&data).is_empty());
    }

    #[test]
    fn test_subdir_cap_opens_new_directory() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = LocalStorageConfig::with_root(temp_dir.path());
        config.max_files_per_dir = 2;
        let storage = LocalStorage::new(config).unwrap();

        let tokens: Vec<DataToken> = (0..5)
            .map(|_| storage.save_file(content(b"x"), None).unwrap())
            .collect();

        let mut per_dir = std::collections::HashMap::new();
        for token in &tokens {
            let (subdir, _) = parse_token(token).unwrap();
            *per_dir.entry(subdir.to_string()).or_insert(0usize) += 1;
        }
        assert!(per_dir.len() >= 3);
        assert!(per_dir.values().all(|&count| count <= 2));
    }

    #[test]
    fn test_original_naming_keeps_safe_names() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = LocalStorageConfig::with_root(temp_dir.path());
        config.naming = NamingStrategy::Original;
        let storage = LocalStorage::new(config).unwrap();

        let data = storage.save_file(content(b"x"), Some("My Report.txt")).unwrap();
        assert_eq!(storage.file_name(&data, None).unwrap(), "My_Report.txt");

        let data = storage.save_file(content(b"x"), Some("evil.php")).unwrap();
        let name = storage.file_name(&data, None).unwrap();
        assert_ne!(name, "evil.php");
        assert!(!name.ends_with(".php"));
    }

    #[test]
    fn test_original_name_never_shadows_format_directory() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = LocalStorageConfig::with_root(temp_dir.path());
        config.naming = NamingStrategy::Original;
        config.max_files_per_dir = 10;
        let storage = LocalStorage::new(config).unwrap();

        let bare = FileSource::Content {
            bytes: b"x",
            extension: None,
        };
        let first = storage.save_file(bare, Some("thumb")).unwrap();
        assert_ne!(storage.file_name(&first, None).unwrap(), "thumb");
        let second = storage.save_file(content(b"y"), Some("b.txt")).unwrap();
        assert_eq!(parse_token(&second).unwrap().0, parse_token(&first).unwrap().0);

        storage.save_formatted_file(&first, content(b"t"), "thumb").unwrap();
        storage.save_formatted_file(&second, content(b"t"), "thumb").unwrap();
        assert!(storage.file_exists(&first, Some("thumb")));
        assert!(storage.file_exists(&second, Some("thumb")));
    }

    #[test]
    fn test_original_name_without_extension_takes_source_extension() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = LocalStorageConfig::with_root(temp_dir.path());
        config.naming = NamingStrategy::Original;
        let storage = LocalStorage::new(config).unwrap();

        let data = storage.save_file(content(b"x"), Some("README")).unwrap();
        assert_eq!(storage.file_name(&data, None).unwrap(), "README.txt");
        storage.save_formatted_file(&data, content(b"r"), "README").unwrap();
        assert!(storage.file_exists(&data, Some("README")));
    }

    #[test]
    fn test_content_hash_naming_deduplicates() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = LocalStorageConfig::with_root(temp_dir.path());
        config.naming = NamingStrategy::ContentHash;
        let storage = LocalStorage::new(config).unwrap();

        let first = storage.save_file(content(b"same bytes"), None).unwrap();
        let second = storage.save_file(content(b"same bytes"), None).unwrap();
        let third = storage.save_file(content(b"other bytes"), None).unwrap();
        assert_eq!(first, second);
        assert_ne!(first, third);

        let hex = blake3::hash(b"same bytes").to_hex();
        assert_eq!(first.as_str(), format!("{}/{}.txt", &hex.as_str()[..2], &hex.as_str()[..32]));
    }

    #[test]
    fn test_url_schemes() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = LocalStorageConfig::with_root(temp_dir.path());
        config.public_url = "/uploads/".to_string();
        config.host_info = Some("http://example.com".to_string());
        let storage = LocalStorage::new(config).unwrap();
        let data = DataToken::new("ab12/pic.png");

        assert_eq!(
            storage.url(&data, None, &UrlScheme::Relative).unwrap(),
            "/uploads/ab12/pic.png"
        );
        assert_eq!(
            storage.url(&data, Some("small"), &UrlScheme::Absolute).unwrap(),
            "http://example.com/uploads/ab12/small/pic.png"
        );
        assert_eq!(
            storage
                .url(&data, None, &UrlScheme::WithScheme("https".to_string()))
                .unwrap(),
            "https://example.com/uploads/ab12/pic.png"
        );
    }

    #[test]
    fn test_absolute_url_without_host_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let storage = storage(&temp_dir);
        let result = storage.url(&DataToken::new("ab12/pic.png"), None, &UrlScheme::Absolute);
        assert!(matches!(result, Err(StorageError::Config(_))));
    }
}
