//! Workspace config files: `config/config.toml`, then `config/{UPFILE_ENV}.toml`.

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File, FileFormat};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming the env-specific workspace file.
pub const ENV_VAR: &str = "UPFILE_ENV";

const DEFAULT_ENV: &str = "development";

/// Active environment name; `development` when unset.
pub fn env_name() -> String {
    std::env::var(ENV_VAR).unwrap_or_else(|_| DEFAULT_ENV.to_string())
}

/// Workspace files in precedence order, lowest first. Missing files are included.
pub fn candidate_paths(workspace_root: &Path) -> [PathBuf; 2] {
    let config_dir = workspace_root.join("config");
    [
        config_dir.join("config.toml"),
        config_dir.join(format!("{}.toml", env_name())),
    ]
}

/// Add the workspace files that exist to `builder`.
pub fn add_to_builder(
    mut builder: ConfigBuilder<DefaultState>,
    workspace_root: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    for path in candidate_paths(workspace_root) {
        if path.is_file() {
            debug!(config_path = %path.display(), "Loading workspace configuration");
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }
    }
    Ok(builder)
}
