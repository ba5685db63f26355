//! Context registry.

use crate::config::UpfileConfig;
use crate::context::{default_storage, Context};
use crate::error::ContextError;
use crate::formatter::FormatterRegistry;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Name -> context lookup
#[derive(Debug, Default)]
pub struct ContextManager {
    contexts: BTreeMap<String, Arc<Context>>,
}

impl ContextManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every context declared in `config`.
    ///
    /// Relative storage roots resolve against `base_dir`. Formatters declared
    /// in configuration are registered in name order.
    pub fn from_config(
        config: &UpfileConfig,
        registry: &FormatterRegistry,
        base_dir: &Path,
    ) -> Result<Self, ContextError> {
        let mut manager = Self::new();
        for name in config.contexts.keys() {
            let context = build_context(config, name, registry, base_dir)?;
            manager.register(context);
        }
        info!(contexts = manager.len(), "Contexts configured");
        Ok(manager)
    }

    /// Register `context`, replacing any context of the same name.
    pub fn register(&mut self, context: Context) -> Option<Arc<Context>> {
        let name = context.name().to_string();
        let previous = self.contexts.insert(name.clone(), Arc::new(context));
        if previous.is_some() {
            warn!(context = %name, "Replaced existing context");
        }
        previous
    }

    pub fn get(&self, name: &str) -> Result<Arc<Context>, ContextError> {
        self.contexts
            .get(name)
            .cloned()
            .ok_or_else(|| ContextError::UnknownContext(name.to_string()))
    }

    pub fn has(&self, name: &str) -> bool {
        self.contexts.contains_key(name)
    }

    /// Context names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.contexts.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Context>> {
        self.contexts.values()
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}

fn build_context(
    config: &UpfileConfig,
    name: &str,
    registry: &FormatterRegistry,
    base_dir: &Path,
) -> Result<Context, ContextError> {
    let settings = config.context_config(name)?;

    let mut storage = settings
        .storage_config()?
        .unwrap_or_else(|| default_storage(name));
    storage.resolve_relative_to(base_dir);

    let mut builder = Context::builder(name)
        .kind(settings.kind.unwrap_or_default())
        .storage_config(storage)
        .registry(registry.clone());
    for (format, spec) in settings.formatters {
        builder = builder.formatter_entry(format, spec);
    }
    if let Some(validators) = settings.validators {
        builder = builder.validators(validators);
    }
    builder.build()
}
