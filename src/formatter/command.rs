//! Formatter delegating to an external program.

use crate::error::ContextError;
use crate::formatter::{
    discard_temp_file, temp_output, ContextAware, FormatInput, FormatScope, Formatter,
    FormatterIdentity, Produced,
};
use crate::storage::extension_of;
use std::path::Path;
use std::process::Command;
use tracing::{debug, warn};

const INPUT_PLACEHOLDER: &str = "{input}";
const OUTPUT_PLACEHOLDER: &str = "{output}";

/// Runs `program args...`, substituting `{input}` and `{output}` in each
/// argument. The program must write its result to the output path.
///
/// The output extension defaults to the input's.
#[derive(Debug, Clone)]
pub struct CommandFormatter {
    program: String,
    args: Vec<String>,
    extension: Option<String>,
    identity: FormatterIdentity,
}

impl CommandFormatter {
    pub fn new(
        program: impl Into<String>,
        args: Vec<String>,
        extension: Option<String>,
    ) -> Result<Self, ContextError> {
        let program = program.into();
        if program.trim().is_empty() {
            return Err(ContextError::Config(
                "Command formatter requires a non-empty 'program'".to_string(),
            ));
        }
        if !args.iter().any(|arg| arg.contains(OUTPUT_PLACEHOLDER)) {
            return Err(ContextError::Config(format!(
                "Command formatter '{}' never references {}",
                program, OUTPUT_PLACEHOLDER
            )));
        }
        Ok(Self {
            program,
            args,
            extension,
            identity: FormatterIdentity::default(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn expand(&self, input: &Path, output: &Path) -> Vec<String> {
        let input = input.to_string_lossy();
        let output = output.to_string_lossy();
        self.args
            .iter()
            .map(|arg| {
                arg.replace(INPUT_PLACEHOLDER, &input)
                    .replace(OUTPUT_PLACEHOLDER, &output)
            })
            .collect()
    }
}

impl Formatter for CommandFormatter {
    fn format(
        &self,
        input: FormatInput<'_>,
        _scope: &mut FormatScope<'_>,
    ) -> Result<Produced, ContextError> {
        let extension = self.extension.clone().or_else(|| extension_of(input.path));
        let output = temp_output(extension.as_deref())?;
        let args = self.expand(input.path, &output);

        debug!(
            context = %self.identity.context,
            format = %self.identity.label(),
            program = %self.program,
            "Running formatter command"
        );
        let result = Command::new(&self.program).args(&args).output();

        let failure = match result {
            Ok(out) if out.status.success() => return Ok(Produced::temporary(output)),
            Ok(out) => format!(
                "{} exited with {}: {}",
                self.program,
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            ),
            Err(e) => format!("failed to spawn {}: {}", self.program, e),
        };
        warn!(
            context = %self.identity.context,
            format = %self.identity.label(),
            error = %failure,
            "Formatter command failed"
        );
        discard_temp_file(&output);
        Err(ContextError::Transform {
            formatter: self.identity.label(),
            message: failure,
        })
    }

    fn as_context_aware(&mut self) -> Option<&mut dyn ContextAware> {
        Some(self)
    }
}

impl ContextAware for CommandFormatter {
    fn bind_context(&mut self, identity: &FormatterIdentity) {
        self.identity = identity.clone();
    }
}
