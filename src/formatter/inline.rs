//! Formatter backed by a caller-supplied function.

use crate::error::ContextError;
use crate::formatter::{
    ContextAware, FormatInput, FormatScope, Formatter, FormatterIdentity, Produced,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Transform invoked with the readable input path and the calling formatter.
pub type InlineFn =
    Arc<dyn Fn(&Path, &InlineFormatter) -> Result<Produced, ContextError> + Send + Sync>;

/// Named functions shared between a registry and the formatters it built.
pub(crate) type FunctionTable = Arc<RwLock<HashMap<String, InlineFn>>>;

#[derive(Clone)]
enum Target {
    Bound(InlineFn),
    Named {
        name: String,
        functions: FunctionTable,
    },
}

/// Wraps a function of `(input, formatter) -> output`.
///
/// A named target is looked up on every call, so a function registered after
/// the context was built is still picked up. A name with nothing registered
/// fails at call time.
#[derive(Clone)]
pub struct InlineFormatter {
    target: Target,
    identity: FormatterIdentity,
}

impl InlineFormatter {
    pub fn new<F>(function: F) -> Self
    where
        F: Fn(&Path, &InlineFormatter) -> Result<Produced, ContextError> + Send + Sync + 'static,
    {
        Self::from_fn(Arc::new(function))
    }

    pub fn from_fn(function: InlineFn) -> Self {
        Self {
            target: Target::Bound(function),
            identity: FormatterIdentity::default(),
        }
    }

    pub(crate) fn named(name: impl Into<String>, functions: FunctionTable) -> Self {
        Self {
            target: Target::Named {
                name: name.into(),
                functions,
            },
            identity: FormatterIdentity::default(),
        }
    }

    /// Context and format this formatter is registered under.
    pub fn identity(&self) -> &FormatterIdentity {
        &self.identity
    }

    fn resolve(&self) -> Result<InlineFn, ContextError> {
        match &self.target {
            Target::Bound(function) => Ok(function.clone()),
            Target::Named { name, functions } => {
                functions.read().get(name).cloned().ok_or_else(|| {
                    ContextError::Config(format!(
                        "Inline formatter '{}' in context '{}' references unknown function '{}'",
                        self.identity.label(),
                        self.identity.context,
                        name
                    ))
                })
            }
        }
    }
}

impl fmt::Debug for InlineFormatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let target = match &self.target {
            Target::Bound(_) => "<closure>".to_string(),
            Target::Named { name, .. } => name.clone(),
        };
        f.debug_struct("InlineFormatter")
            .field("target", &target)
            .field("identity", &self.identity)
            .finish()
    }
}

impl Formatter for InlineFormatter {
    fn format(
        &self,
        input: FormatInput<'_>,
        _scope: &mut FormatScope<'_>,
    ) -> Result<Produced, ContextError> {
        let function = self.resolve()?;
        function(input.path, self)
    }

    fn as_context_aware(&mut self) -> Option<&mut dyn ContextAware> {
        Some(self)
    }
}

impl ContextAware for InlineFormatter {
    fn bind_context(&mut self, identity: &FormatterIdentity) {
        self.identity = identity.clone();
    }
}
