//! Byte-for-byte copy formatter.

use crate::error::ContextError;
use crate::formatter::{temp_output, FormatInput, FormatScope, Formatter, Produced};
use crate::storage::{extension_of, naming};

/// Copies its input to a fresh temp file, optionally under a new extension.
#[derive(Debug, Clone, Default)]
pub struct CopyFormatter {
    extension: Option<String>,
}

impl CopyFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extension(extension: &str) -> Result<Self, ContextError> {
        let extension = naming::sanitize_extension(extension).ok_or_else(|| {
            ContextError::Config(format!("Invalid copy extension: {:?}", extension))
        })?;
        Ok(Self {
            extension: Some(extension),
        })
    }
}

impl Formatter for CopyFormatter {
    fn format(
        &self,
        input: FormatInput<'_>,
        _scope: &mut FormatScope<'_>,
    ) -> Result<Produced, ContextError> {
        let extension = self.extension.clone().or_else(|| extension_of(input.path));
        let output = temp_output(extension.as_deref())?;
        if let Err(e) = std::fs::copy(input.path, &output) {
            crate::formatter::discard_temp_file(&output);
            return Err(e.into());
        }
        Ok(Produced::temporary(output))
    }
}
