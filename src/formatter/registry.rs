//! Formatter registry
//!
//! Maps short formatter kinds (`chain`, `from`, `inline`, `command`, `copy`)
//! to constructors. A registry is built once and handed to whatever builds
//! contexts; applications add their own kinds and named inline functions
//! before that.

use crate::error::ContextError;
use crate::formatter::inline::FunctionTable;
use crate::formatter::{
    ChainFormatter, CommandFormatter, CopyFormatter, DerivedFormatter, Formatter, InlineFormatter,
    Produced,
};
use crate::types::validate_name;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Raw formatter configuration: a kind plus free-form parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatterSpec {
    pub kind: String,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl FormatterSpec {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: Map::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    /// Optional string parameter; present but not a string is an error.
    pub fn str_param(&self, key: &str) -> Result<Option<&str>, ContextError> {
        match self.params.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(self.invalid(key, "a string", other)),
        }
    }

    pub fn required_str(&self, key: &str) -> Result<&str, ContextError> {
        self.str_param(key)?.ok_or_else(|| self.missing(key))
    }

    /// Optional list of strings.
    pub fn string_list(&self, key: &str) -> Result<Vec<String>, ContextError> {
        match self.params.get(key) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    other => Err(self.invalid(key, "a list of strings", other)),
                })
                .collect(),
            Some(other) => Err(self.invalid(key, "a list of strings", other)),
        }
    }

    /// Nested formatter configuration. A bare string is shorthand for `{ kind = "..." }`.
    pub fn nested(&self, key: &str) -> Result<FormatterSpec, ContextError> {
        let value = self.params.get(key).ok_or_else(|| self.missing(key))?;
        Self::from_value(value).map_err(|_| self.invalid(key, "a formatter table", value))
    }

    /// List of nested formatter configurations.
    pub fn nested_list(&self, key: &str) -> Result<Vec<FormatterSpec>, ContextError> {
        let value = self.params.get(key).ok_or_else(|| self.missing(key))?;
        let items = match value {
            Value::Array(items) => items,
            other => return Err(self.invalid(key, "a list of formatter tables", other)),
        };
        items
            .iter()
            .map(|item| {
                Self::from_value(item)
                    .map_err(|_| self.invalid(key, "a list of formatter tables", item))
            })
            .collect()
    }

    fn from_value(value: &Value) -> Result<FormatterSpec, serde_json::Error> {
        match value {
            Value::String(kind) => Ok(FormatterSpec::new(kind.clone())),
            other => serde_json::from_value(other.clone()),
        }
    }

    fn missing(&self, key: &str) -> ContextError {
        ContextError::Config(format!(
            "Formatter kind '{}' requires parameter '{}'",
            self.kind, key
        ))
    }

    fn invalid(&self, key: &str, expected: &str, found: &Value) -> ContextError {
        ContextError::Config(format!(
            "Formatter kind '{}': parameter '{}' must be {}, found {}",
            self.kind, key, expected, found
        ))
    }
}

/// Builds a formatter from its configuration. The registry is passed back in
/// so composite kinds can build their members.
pub type FormatterConstructor = Arc<
    dyn Fn(&FormatterSpec, &FormatterRegistry) -> Result<Box<dyn Formatter>, ContextError>
        + Send
        + Sync,
>;

/// Short kind -> constructor table, plus the named inline functions
#[derive(Clone)]
pub struct FormatterRegistry {
    constructors: HashMap<String, FormatterConstructor>,
    functions: FunctionTable,
}

impl FormatterRegistry {
    /// A registry without any kinds.
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
            functions: Arc::default(),
        }
    }

    /// A registry with the built-in kinds.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.insert("chain", build_chain);
        registry.insert("from", build_derived);
        registry.insert("inline", build_inline);
        registry.insert("command", build_command);
        registry.insert("copy", build_copy);
        registry
    }

    fn insert<F>(&mut self, kind: &str, constructor: F)
    where
        F: Fn(&FormatterSpec, &FormatterRegistry) -> Result<Box<dyn Formatter>, ContextError>
            + Send
            + Sync
            + 'static,
    {
        self.constructors
            .insert(kind.to_string(), Arc::new(constructor));
    }

    /// Register a formatter kind. A later registration of the same kind replaces the earlier one.
    pub fn register<F>(&mut self, kind: &str, constructor: F) -> Result<(), ContextError>
    where
        F: Fn(&FormatterSpec, &FormatterRegistry) -> Result<Box<dyn Formatter>, ContextError>
            + Send
            + Sync
            + 'static,
    {
        validate_name("formatter kind", kind)?;
        self.insert(kind, constructor);
        Ok(())
    }

    /// Register a function usable as `{ kind = "inline", function = "<name>" }`.
    ///
    /// Formatters already built from this registry see the new function too.
    pub fn register_function<F>(&self, name: &str, function: F) -> Result<(), ContextError>
    where
        F: Fn(&Path, &InlineFormatter) -> Result<Produced, ContextError> + Send + Sync + 'static,
    {
        validate_name("inline function", name)?;
        self.functions
            .write()
            .insert(name.to_string(), Arc::new(function));
        Ok(())
    }

    pub fn has_kind(&self, kind: &str) -> bool {
        self.constructors.contains_key(kind)
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.constructors.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    pub fn build(&self, spec: &FormatterSpec) -> Result<Box<dyn Formatter>, ContextError> {
        let constructor = self.constructors.get(&spec.kind).ok_or_else(|| {
            ContextError::Config(format!(
                "Unknown formatter kind '{}' (known: {})",
                spec.kind,
                self.kinds().join(", ")
            ))
        })?;
        constructor(spec, self)
    }
}

impl Default for FormatterRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for FormatterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut functions: Vec<String> = self.functions.read().keys().cloned().collect();
        functions.sort();
        f.debug_struct("FormatterRegistry")
            .field("kinds", &self.kinds())
            .field("functions", &functions)
            .finish()
    }
}

fn build_chain(
    spec: &FormatterSpec,
    registry: &FormatterRegistry,
) -> Result<Box<dyn Formatter>, ContextError> {
    let members = spec
        .nested_list("formatters")?
        .iter()
        .map(|member| registry.build(member))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Box::new(ChainFormatter::new(members)?))
}

fn build_derived(
    spec: &FormatterSpec,
    registry: &FormatterRegistry,
) -> Result<Box<dyn Formatter>, ContextError> {
    let from = spec.required_str("from")?;
    let inner = registry.build(&spec.nested("formatter")?)?;
    Ok(Box::new(DerivedFormatter::new(from, inner)?))
}

fn build_inline(
    spec: &FormatterSpec,
    registry: &FormatterRegistry,
) -> Result<Box<dyn Formatter>, ContextError> {
    let function = spec.required_str("function")?;
    Ok(Box::new(InlineFormatter::named(
        function,
        registry.functions.clone(),
    )))
}

fn build_command(
    spec: &FormatterSpec,
    _registry: &FormatterRegistry,
) -> Result<Box<dyn Formatter>, ContextError> {
    let program = spec.required_str("program")?;
    let args = spec.string_list("args")?;
    let extension = spec.str_param("extension")?.map(str::to_string);
    Ok(Box::new(CommandFormatter::new(program, args, extension)?))
}

fn build_copy(
    spec: &FormatterSpec,
    _registry: &FormatterRegistry,
) -> Result<Box<dyn Formatter>, ContextError> {
    match spec.str_param("extension")? {
        Some(extension) => Ok(Box::new(CopyFormatter::with_extension(extension)?)),
        None => Ok(Box::new(CopyFormatter::new())),
    }
}
