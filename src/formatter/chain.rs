//! Sequential composition of formatters.

use crate::error::ContextError;
use crate::formatter::{
    chain_step, ContextAware, FormatInput, FormatScope, Formatter, FormatterIdentity, Produced,
};

/// Applies its members in order, each consuming the previous output.
///
/// Intermediate outputs are deleted as soon as the next member has run.
#[derive(Debug)]
pub struct ChainFormatter {
    members: Vec<Box<dyn Formatter>>,
}

impl ChainFormatter {
    pub fn new(members: Vec<Box<dyn Formatter>>) -> Result<Self, ContextError> {
        if members.is_empty() {
            return Err(ContextError::Config(
                "Chain formatter requires a non-empty list of formatters".to_string(),
            ));
        }
        Ok(Self { members })
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl Formatter for ChainFormatter {
    fn format(
        &self,
        input: FormatInput<'_>,
        scope: &mut FormatScope<'_>,
    ) -> Result<Produced, ContextError> {
        let mut members = self.members.iter();
        let first = members.next().ok_or_else(|| {
            ContextError::Config("Chain formatter has no members".to_string())
        })?;

        let mut current = first.format(input, scope)?;
        if current.path() == input.path {
            current = Produced::passthrough(input.path.to_path_buf());
        }
        for member in members {
            current = chain_step(current, |path| member.format(FormatInput::source(path), scope))?;
        }
        Ok(current)
    }

    fn as_context_aware(&mut self) -> Option<&mut dyn ContextAware> {
        Some(self)
    }
}

impl ContextAware for ChainFormatter {
    fn bind_context(&mut self, identity: &FormatterIdentity) {
        for member in &mut self.members {
            if let Some(aware) = member.as_context_aware() {
                aware.bind_context(identity);
            }
        }
    }
}
