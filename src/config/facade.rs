//! Config loading entrypoint.

use super::merge::merge_policy;
use super::sources::{global_file, workspace_file};
use super::UpfileConfig;
use crate::error::ContextError;
use config::{Environment, File, FileFormat};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Prefix of environment overrides, e.g. `UPFILE__LOGGING__LEVEL=debug`
pub const ENV_PREFIX: &str = "UPFILE";

/// Loads [`UpfileConfig`] from layered sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace.
    ///
    /// Precedence (highest last): built-in defaults, global file, workspace
    /// `config/config.toml`, workspace `config/{UPFILE_ENV}.toml`, environment.
    pub fn load(workspace_root: &Path) -> Result<UpfileConfig, ContextError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        );

        let config: UpfileConfig = builder.build()?.try_deserialize()?;
        debug!(
            workspace = %workspace_root.display(),
            contexts = config.contexts.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Load a single file on top of the built-in defaults.
    pub fn load_from_file(path: &Path) -> Result<UpfileConfig, ContextError> {
        let config = merge_policy::builder_with_defaults()?
            .add_source(File::from(path).format(FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Parse TOML text on top of the built-in defaults.
    pub fn from_toml_str(toml_str: &str) -> Result<UpfileConfig, ContextError> {
        let config = merge_policy::builder_with_defaults()?
            .add_source(File::from_str(toml_str, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Path of the global configuration file.
    pub fn global_config_path() -> Option<PathBuf> {
        global_file::global_config_path()
    }

    /// Configuration built from the built-in defaults alone.
    pub fn default() -> UpfileConfig {
        Self::from_toml_str("").unwrap_or_default()
    }
}
