//! Formatters
//!
//! A formatter turns a readable file into a derived file. Outputs are
//! [`Produced`] values: either a fresh temporary file the caller owns and must
//! delete, or a passthrough of a path the formatter did not create.
//!
//! Formatters that depend on another named format resolve it through the
//! call-scoped [`FormatScope`], which also carries the set of formatters
//! currently being resolved. Re-entering one of those is reported as a cycle.

pub mod chain;
pub mod command;
pub mod copy;
pub mod derived;
pub mod inline;
pub mod registry;

pub use chain::ChainFormatter;
pub use command::CommandFormatter;
pub use copy::CopyFormatter;
pub use derived::DerivedFormatter;
pub use inline::{InlineFn, InlineFormatter};
pub use registry::{FormatterConstructor, FormatterRegistry, FormatterSpec};

use crate::error::ContextError;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

/// What the input path of a format call holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// The original uploaded file
    Source,
    /// The already-formatted output of the formatter's dependency
    Dependency,
}

#[derive(Debug, Clone, Copy)]
pub struct FormatInput<'a> {
    pub path: &'a Path,
    pub kind: InputKind,
}

impl<'a> FormatInput<'a> {
    pub fn source(path: &'a Path) -> Self {
        Self {
            path,
            kind: InputKind::Source,
        }
    }

    pub fn dependency(path: &'a Path) -> Self {
        Self {
            path,
            kind: InputKind::Dependency,
        }
    }
}

/// Output of a format call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Produced {
    path: PathBuf,
    disposable: bool,
}

impl Produced {
    /// A new temporary file owned by the caller.
    pub fn temporary(path: PathBuf) -> Self {
        Self {
            path,
            disposable: true,
        }
    }

    /// A path the formatter did not create (typically its own input).
    pub fn passthrough(path: PathBuf) -> Self {
        Self {
            path,
            disposable: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_disposable(&self) -> bool {
        self.disposable
    }

    pub fn into_path(self) -> PathBuf {
        self.path
    }

    /// Delete the file if this value owns it. Failures are logged.
    pub fn discard(self) {
        if self.disposable {
            discard_temp_file(&self.path);
        }
    }
}

/// Remove a consumed temp file, logging instead of failing.
pub fn discard_temp_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to delete temp file");
        }
    }
}

/// Create an empty, uniquely named temp file for formatter output.
pub fn temp_output(extension: Option<&str>) -> Result<PathBuf, ContextError> {
    let suffix = extension.map(|ext| format!(".{}", ext)).unwrap_or_default();
    let file = tempfile::Builder::new()
        .prefix("upfile-")
        .suffix(&suffix)
        .tempfile()?;
    file.into_temp_path()
        .keep()
        .map_err(|e| ContextError::IoError(e.error))
}

/// Formatter bound to a context and format name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatterIdentity {
    pub context: String,
    pub format: String,
}

impl FormatterIdentity {
    pub fn label(&self) -> String {
        if self.format.is_empty() {
            "<unbound>".to_string()
        } else {
            self.format.clone()
        }
    }
}

/// Implemented by formatters that want to know which context and format
/// name they were registered under.
pub trait ContextAware {
    fn bind_context(&mut self, identity: &FormatterIdentity);
}

/// A transform from a readable file to a derived file.
pub trait Formatter: Send + Sync + fmt::Debug {
    fn format(
        &self,
        input: FormatInput<'_>,
        scope: &mut FormatScope<'_>,
    ) -> Result<Produced, ContextError>;

    /// Name of the format whose output this formatter consumes, if any.
    fn dependency(&self) -> Option<&str> {
        None
    }

    fn as_context_aware(&mut self) -> Option<&mut dyn ContextAware> {
        None
    }
}

/// Immutable name -> formatter map of one context, in registration order
#[derive(Debug, Default)]
pub struct FormatterSet {
    context: String,
    names: Vec<String>,
    formatters: HashMap<String, Arc<dyn Formatter>>,
}

impl FormatterSet {
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            names: Vec::new(),
            formatters: HashMap::new(),
        }
    }

    /// Register `formatter` under `name`, binding its identity first.
    pub fn insert(
        &mut self,
        name: &str,
        mut formatter: Box<dyn Formatter>,
    ) -> Result<(), ContextError> {
        if self.formatters.contains_key(name) {
            return Err(ContextError::Config(format!(
                "Duplicate format '{}' in context '{}'",
                name, self.context
            )));
        }
        if let Some(aware) = formatter.as_context_aware() {
            aware.bind_context(&FormatterIdentity {
                context: self.context.clone(),
                format: name.to_string(),
            });
        }
        self.names.push(name.to_string());
        self.formatters.insert(name.to_string(), Arc::from(formatter));
        Ok(())
    }

    pub fn context_name(&self) -> &str {
        &self.context
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.formatters.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Formatter>> {
        self.formatters.get(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Call-scoped state for one generation request
pub struct FormatScope<'a> {
    formatters: &'a FormatterSet,
    resolving: Vec<String>,
}

impl<'a> FormatScope<'a> {
    pub fn new(formatters: &'a FormatterSet) -> Self {
        Self {
            formatters,
            resolving: Vec::new(),
        }
    }

    pub fn context_name(&self) -> &str {
        self.formatters.context_name()
    }

    pub fn formatter(&self, name: &str) -> Result<Arc<dyn Formatter>, ContextError> {
        self.formatters
            .get(name)
            .cloned()
            .ok_or_else(|| ContextError::UnknownFormat {
                context: self.context_name().to_string(),
                format: name.to_string(),
            })
    }

    /// Names currently being resolved, outermost first.
    pub fn resolving(&self) -> &[String] {
        &self.resolving
    }

    /// Run the formatter registered as `name`.
    ///
    /// Fails with [`ContextError::Cycle`] when `name` is already being
    /// resolved further up this call.
    pub fn run(&mut self, name: &str, input: FormatInput<'_>) -> Result<Produced, ContextError> {
        if self.resolving.iter().any(|n| n == name) {
            return Err(ContextError::Cycle {
                formatter: name.to_string(),
                context: self.context_name().to_string(),
            });
        }
        let formatter = self.formatter(name)?;
        self.resolving.push(name.to_string());
        let result = formatter.format(input, self);
        self.resolving.pop();
        result
    }
}

/// Run `step` on the output of `previous`, deleting `previous` once consumed.
///
/// When `step` hands back `previous` unchanged, the ownership of `previous`
/// carries over to the result.
pub(crate) fn chain_step(
    previous: Produced,
    step: impl FnOnce(&Path) -> Result<Produced, ContextError>,
) -> Result<Produced, ContextError> {
    match step(previous.path()) {
        Ok(next) if next.path() == previous.path() => Ok(previous),
        Ok(next) => {
            previous.discard();
            Ok(next)
        }
        Err(e) => {
            previous.discard();
            Err(e)
        }
    }
}
