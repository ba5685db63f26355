//! Formatter consuming another format's output.

use crate::error::ContextError;
use crate::formatter::{
    chain_step, ContextAware, FormatInput, FormatScope, Formatter, FormatterIdentity, InputKind,
    Produced,
};
use tracing::debug;

/// Applies `formatter` to the output of the format named `from`.
///
/// Given the raw source, it first runs the `from` formatter through the
/// scope; given [`InputKind::Dependency`] it trusts the input to already be
/// that output and only applies its own step.
#[derive(Debug)]
pub struct DerivedFormatter {
    from: String,
    formatter: Box<dyn Formatter>,
    identity: FormatterIdentity,
}

impl DerivedFormatter {
    pub fn new(from: impl Into<String>, formatter: Box<dyn Formatter>) -> Result<Self, ContextError> {
        let from = from.into();
        crate::types::validate_name("format", &from)?;
        Ok(Self {
            from,
            formatter,
            identity: FormatterIdentity::default(),
        })
    }

    pub fn from_format(&self) -> &str {
        &self.from
    }

    pub fn identity(&self) -> &FormatterIdentity {
        &self.identity
    }
}

impl Formatter for DerivedFormatter {
    fn format(
        &self,
        input: FormatInput<'_>,
        scope: &mut FormatScope<'_>,
    ) -> Result<Produced, ContextError> {
        match input.kind {
            InputKind::Dependency => self.formatter.format(FormatInput::source(input.path), scope),
            InputKind::Source => {
                debug!(
                    context = %scope.context_name(),
                    format = %self.identity.label(),
                    from = %self.from,
                    "Resolving dependency from source"
                );
                let dependency = scope.run(&self.from, input)?;
                let dependency = if dependency.path() == input.path {
                    Produced::passthrough(input.path.to_path_buf())
                } else {
                    dependency
                };
                let formatter = &self.formatter;
                chain_step(dependency, |path| formatter.format(FormatInput::source(path), scope))
            }
        }
    }

    fn dependency(&self) -> Option<&str> {
        Some(&self.from)
    }

    fn as_context_aware(&mut self) -> Option<&mut dyn ContextAware> {
        Some(self)
    }
}

impl ContextAware for DerivedFormatter {
    fn bind_context(&mut self, identity: &FormatterIdentity) {
        self.identity = identity.clone();
        if let Some(aware) = self.formatter.as_context_aware() {
            aware.bind_context(identity);
        }
    }
}
