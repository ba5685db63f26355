//! Upload value object.
//!
//! Tracks one upload attempt from the raw file handed over by the host
//! application to the data token it becomes once saved in a context.

use crate::context::Context;
use crate::error::ContextError;
use crate::storage::{extension_of, mime, FileSource, ReadPath};
use crate::types::DataToken;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    /// No file attached
    Empty,
    /// A raw upload waiting to be saved
    Uploaded,
    /// Backed by a data token in storage
    Initialized,
}

impl UploadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            UploadStatus::Empty => "empty",
            UploadStatus::Uploaded => "uploaded",
            UploadStatus::Initialized => "initialized",
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    status: UploadStatus,
    temp_path: Option<PathBuf>,
    name: Option<String>,
    mime_type: Option<String>,
    size: Option<u64>,
    data: Option<DataToken>,
    changed: bool,
}

impl Default for UploadedFile {
    fn default() -> Self {
        Self::empty()
    }
}

impl UploadedFile {
    pub fn empty() -> Self {
        Self {
            status: UploadStatus::Empty,
            temp_path: None,
            name: None,
            mime_type: None,
            size: None,
            data: None,
            changed: false,
        }
    }

    /// A raw upload at `temp_path`, declared by the client as `name`.
    ///
    /// The MIME type is derived from the declared name, falling back to the
    /// temp file's own extension.
    pub fn uploaded(temp_path: impl Into<PathBuf>, name: Option<&str>) -> Result<Self, ContextError> {
        let temp_path = temp_path.into();
        let size = fs::metadata(&temp_path)?.len();
        let extension = name
            .and_then(|n| extension_of(Path::new(n)))
            .or_else(|| extension_of(&temp_path));
        Ok(Self {
            status: UploadStatus::Uploaded,
            mime_type: Some(mime::from_extension(extension.as_deref()).to_string()),
            name: name.map(str::to_string),
            size: Some(size),
            temp_path: Some(temp_path),
            data: None,
            changed: false,
        })
    }

    /// A file already stored under `data`.
    pub fn initialized(data: DataToken) -> Self {
        Self {
            status: UploadStatus::Initialized,
            data: Some(data),
            ..Self::empty()
        }
    }

    pub fn status(&self) -> UploadStatus {
        self.status
    }

    pub fn is_empty(&self) -> bool {
        self.status == UploadStatus::Empty
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// Token of the stored file, once initialized.
    pub fn data(&self) -> Option<&DataToken> {
        self.data.as_ref()
    }

    /// Point at a different stored file. Marks the value changed when the
    /// token differs.
    pub fn set_data(&mut self, data: DataToken) {
        if self.data.as_ref() != Some(&data) {
            self.changed = true;
        }
        self.status = UploadStatus::Initialized;
        self.temp_path = None;
        self.data = Some(data);
    }

    /// Detach the file. Marks the value changed when a token was held.
    pub fn clear(&mut self) {
        if self.data.is_some() {
            self.changed = true;
        }
        *self = Self {
            changed: self.changed,
            ..Self::empty()
        };
    }

    /// Readable path of the source: the raw upload, or the stored file.
    pub fn read_path(&self, context: &Context) -> Result<ReadPath, ContextError> {
        match (self.status, &self.temp_path, &self.data) {
            (UploadStatus::Uploaded, Some(path), _) => Ok(ReadPath::live(path.clone())),
            (UploadStatus::Initialized, _, Some(data)) => {
                Ok(context.storage().read_path(data, None)?)
            }
            _ => Err(ContextError::Config("Upload has no file attached".to_string())),
        }
    }

    /// Save a raw upload into `context` and switch to the initialized state.
    ///
    /// Already-initialized values return their token unchanged.
    pub fn save(&mut self, context: &Context) -> Result<DataToken, ContextError> {
        match self.status {
            UploadStatus::Initialized => {
                if let Some(data) = &self.data {
                    return Ok(data.clone());
                }
            }
            UploadStatus::Uploaded => {
                if let Some(path) = self.temp_path.clone() {
                    let data = if context.storage().accepts_paths() {
                        context.save_file(FileSource::Path(&path), self.name.as_deref())?
                    } else {
                        let bytes = fs::read(&path)?;
                        let extension = self
                            .name
                            .as_deref()
                            .and_then(|n| extension_of(Path::new(n)))
                            .or_else(|| extension_of(&path));
                        context.save_file(
                            FileSource::Content {
                                bytes: &bytes,
                                extension: extension.as_deref(),
                            },
                            self.name.as_deref(),
                        )?
                    };
                    debug!(context = context.name(), data = %data, "Upload saved");
                    self.set_data(data.clone());
                    return Ok(data);
                }
            }
            UploadStatus::Empty => {}
        }
        Err(ContextError::Config("Upload has no file attached".to_string()))
    }

    /// Whether the token changed since the last call; resets the flag.
    pub fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }
}
