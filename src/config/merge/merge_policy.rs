//! Built-in defaults applied before any configuration file.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
///
/// Every context gets local storage under `uploads/{context}` unless a file says otherwise.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("defaults.storage.kind", "local_filesystem")?
        .set_default("defaults.storage.root", "uploads/{context}")?
        .set_default("defaults.storage.public_url", "/uploads/{context}")?
        .set_default("logging.level", "info")
}
