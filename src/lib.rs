//! Upfile: Context-Driven Upload Storage
//!
//! Uploaded files are saved into named contexts. Each context binds a storage
//! backend, a set of named formatters producing derived versions of a file,
//! and the validators applied at upload time. Derived formats are generated
//! in dependency order, with cycle detection and temp-file cleanup.

pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod formatter;
pub mod logging;
pub mod storage;
pub mod types;
pub mod upload;

pub use config::{ConfigLoader, UpfileConfig};
pub use context::{Context, ContextBuilder, ContextManager, GenerationReport};
pub use error::{ContextError, StorageError};
pub use formatter::{Formatter, FormatterRegistry};
pub use storage::{FileSource, LocalStorage, MemoryStorage, Storage};
pub use types::{DataToken, UrlScheme};
pub use upload::{UploadStatus, UploadedFile};
