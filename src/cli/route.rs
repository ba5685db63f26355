//! CLI route: single route table and run context.

use crate::cli::output::{
    format_config, format_contexts, format_names, format_report, format_validators,
};
use crate::cli::parse::Commands;
use crate::config::{ConfigLoader, UpfileConfig};
use crate::context::ContextManager;
use crate::error::ContextError;
use crate::formatter::FormatterRegistry;
use crate::types::{DataToken, UrlScheme};
use crate::upload::UploadedFile;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Runtime context for CLI execution: workspace, configuration and contexts.
pub struct RunContext {
    workspace_root: PathBuf,
    config: UpfileConfig,
    manager: ContextManager,
}

impl RunContext {
    /// Load configuration and build every context with the built-in formatter kinds.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ContextError> {
        Self::with_registry(workspace_root, config_path, FormatterRegistry::default())
    }

    /// Like [`RunContext::new`], with application formatter kinds registered.
    pub fn with_registry(
        workspace_root: PathBuf,
        config_path: Option<PathBuf>,
        registry: FormatterRegistry,
    ) -> Result<Self, ContextError> {
        let config = match config_path {
            Some(ref path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(&workspace_root)?,
        };
        Self::from_config(workspace_root, config, &registry)
    }

    pub fn from_config(
        workspace_root: PathBuf,
        config: UpfileConfig,
        registry: &FormatterRegistry,
    ) -> Result<Self, ContextError> {
        if let Err(errors) = config.validate_with(registry) {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            return Err(ContextError::Config(messages.join("; ")));
        }
        let manager = ContextManager::from_config(&config, registry, &workspace_root)?;
        Ok(Self {
            workspace_root,
            config,
            manager,
        })
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn config(&self) -> &UpfileConfig {
        &self.config
    }

    pub fn manager(&self) -> &ContextManager {
        &self.manager
    }

    /// Execute a CLI command via the single route table.
    pub fn execute(&self, command: &Commands) -> Result<String, ContextError> {
        let started = Instant::now();
        let result = self.execute_inner(command);
        info!(
            command = command.name(),
            ok = result.is_ok(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Command finished"
        );
        result
    }

    fn execute_inner(&self, command: &Commands) -> Result<String, ContextError> {
        match command {
            Commands::Contexts { json } => format_contexts(&self.manager, *json),
            Commands::Save {
                context,
                file,
                name,
            } => {
                let context = self.manager.get(context)?;
                let name = name.clone().or_else(|| {
                    file.file_name()
                        .and_then(|n| n.to_str())
                        .map(str::to_string)
                });
                let mut upload = UploadedFile::uploaded(file, name.as_deref())?;
                let data = upload.save(&context)?;
                Ok(data.to_string())
            }
            Commands::Generate {
                context,
                data,
                formats,
                regenerate,
                json,
            } => {
                let context = self.manager.get(context)?;
                let data = DataToken::new(data.as_str());
                let requested: Vec<&str> = formats.iter().map(String::as_str).collect();
                let requested = (!requested.is_empty()).then_some(requested.as_slice());
                debug!(context = context.name(), data = %data, formats = ?requested, "Generating");
                let report = context.generate_formats_serialized(&data, requested, *regenerate)?;
                format_report(&report, *json)
            }
            Commands::Formats {
                context,
                data,
                json,
            } => {
                let context = self.manager.get(context)?;
                let formats = context.format_list(&DataToken::new(data.as_str()));
                format_names(&formats, *json)
            }
            Commands::Url {
                context,
                data,
                format,
                scheme,
            } => {
                let context = self.manager.get(context)?;
                let scheme: UrlScheme = scheme.parse()?;
                context.url(&DataToken::new(data.as_str()), format.as_deref(), &scheme)
            }
            Commands::Delete {
                context,
                data,
                format,
            } => {
                let context = self.manager.get(context)?;
                let deleted = context.delete(&DataToken::new(data.as_str()), format.as_deref());
                Ok(if deleted {
                    "Deleted".to_string()
                } else {
                    "Nothing to delete".to_string()
                })
            }
            Commands::Config { context } => match context {
                Some(name) => format_config(&self.config.context_config(name)?),
                None => format_config(&self.config),
            },
            Commands::Validators { context, json } => {
                let context = self.manager.get(context)?;
                format_validators(context.validators(), *json)
            }
        }
    }
}
