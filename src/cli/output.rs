//! CLI output: error mapping and text/json presentation.

use crate::context::{ContextManager, GenerationReport, ValidatorConfig};
use crate::error::ContextError;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use serde::Serialize;
use serde_json::json;

/// Map domain errors to a string for CLI output.
pub fn map_error(e: &ContextError) -> String {
    if e.is_configuration() {
        format!("configuration error: {}", e)
    } else {
        e.to_string()
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, ContextError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ContextError::Config(format!("Failed to render JSON: {}", e)))
}

/// Render any configuration value as TOML.
pub fn format_config<T: Serialize>(value: &T) -> Result<String, ContextError> {
    toml::to_string_pretty(value)
        .map_err(|e| ContextError::Config(format!("Failed to render TOML: {}", e)))
}

pub fn format_contexts(manager: &ContextManager, as_json: bool) -> Result<String, ContextError> {
    if as_json {
        let rows: Vec<serde_json::Value> = manager
            .iter()
            .map(|context| {
                json!({
                    "name": context.name(),
                    "kind": context.kind().as_str(),
                    "formats": context.formatter_names(),
                    "validators": context.validators().len(),
                })
            })
            .collect();
        return to_json(&rows);
    }
    if manager.is_empty() {
        return Ok("No contexts configured".to_string());
    }
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Context", "Kind", "Formats", "Validators"]);
    for context in manager.iter() {
        let formats = if context.formatter_names().is_empty() {
            "-".to_string()
        } else {
            context.formatter_names().join(", ")
        };
        table.add_row(vec![
            context.name().to_string(),
            context.kind().to_string(),
            formats,
            context.validators().len().to_string(),
        ]);
    }
    Ok(table.to_string())
}

pub fn format_report(report: &GenerationReport, as_json: bool) -> Result<String, ContextError> {
    if as_json {
        return to_json(report);
    }
    let list = |names: &[String]| {
        if names.is_empty() {
            "-".to_string()
        } else {
            names.join(", ")
        }
    };
    Ok(format!(
        "data: {}\ngenerated: {}\nreused: {}\nside effects: {}",
        report.data,
        list(&report.generated),
        list(&report.reused),
        list(&report.side_effects)
    ))
}

pub fn format_names(names: &[String], as_json: bool) -> Result<String, ContextError> {
    if as_json {
        return to_json(names);
    }
    Ok(names.join("\n"))
}

pub fn format_validators(
    validators: &[ValidatorConfig],
    as_json: bool,
) -> Result<String, ContextError> {
    if as_json {
        return to_json(validators);
    }
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Validator", "Parameters"]);
    for validator in validators {
        let params = if validator.params.is_empty() {
            "-".to_string()
        } else {
            serde_json::Value::Object(validator.params.clone()).to_string()
        };
        table.add_row(vec![validator.kind.clone(), params]);
    }
    Ok(table.to_string())
}
