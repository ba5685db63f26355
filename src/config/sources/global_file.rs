//! Global config file: `{config dir}/upfile/config.toml`
//! (`$XDG_CONFIG_HOME/upfile/config.toml` or `~/.config/upfile/config.toml` on Linux).

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File, FileFormat};
use directories::BaseDirs;
use std::path::PathBuf;
use tracing::debug;

/// Path of the global config file, if a home directory can be determined.
pub fn global_config_path() -> Option<PathBuf> {
    BaseDirs::new().map(|dirs| dirs.config_dir().join("upfile").join("config.toml"))
}

/// Add the global config file to `builder` when present.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let Some(path) = global_config_path() else {
        debug!("No home directory; skipping global configuration");
        return Ok(builder);
    };
    if !path.is_file() {
        debug!(config_path = %path.display(), "No global configuration file");
        return Ok(builder);
    }
    let path = dunce::canonicalize(&path).unwrap_or(path);
    debug!(config_path = %path.display(), "Loading global configuration");
    Ok(builder.add_source(File::from(path).format(FileFormat::Toml)))
}
