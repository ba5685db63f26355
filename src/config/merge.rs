//! Merge rules: defaults, override order, conflict handling.

pub(crate) mod merge_policy;

use serde_json::{Map, Value};

/// Canonical name of a storage kind alias.
pub fn canonical_storage_kind(kind: &str) -> &str {
    match kind {
        "local" | "fs" => "local_filesystem",
        "memory" => "in_memory",
        other => other,
    }
}

/// Rewrite the `kind` of a storage table to its canonical name.
pub fn expand_storage_aliases(storage: &mut Value) {
    if let Some(Value::String(kind)) = storage.get_mut("kind") {
        let canonical = canonical_storage_kind(kind).to_string();
        *kind = canonical;
    }
}

/// Deep-merge `overlay` into `base`; `overlay` wins.
///
/// Tables merge key by key. Two tables naming different `kind`s describe
/// different things, so the overlay table replaces the base one. Arrays and
/// scalars are replaced; `null` in the overlay leaves the base untouched.
pub fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (_, Value::Null) => {}
        (Value::Object(base), Value::Object(overlay)) => {
            let kinds_differ = matches!(
                (base.get("kind"), overlay.get("kind")),
                (Some(a), Some(b)) if a != b
            );
            if kinds_differ {
                *base = overlay;
                return;
            }
            merge_entries(base, overlay);
        }
        (base, overlay) => *base = overlay,
    }
}

/// Merge two tables key by key without comparing their own `kind`s.
pub fn merge_tables(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => merge_entries(base, overlay),
        (base, overlay) => merge_values(base, overlay),
    }
}

fn merge_entries(base: &mut Map<String, Value>, overlay: Map<String, Value>) {
    for (key, value) in overlay {
        match base.get_mut(&key) {
            Some(existing) => merge_values(existing, value),
            None => {
                base.insert(key, value);
            }
        }
    }
}

/// Replace `placeholder` in every string inside `value`.
pub fn substitute_placeholder(value: &mut Value, placeholder: &str, replacement: &str) {
    match value {
        Value::String(s) if s.contains(placeholder) => {
            *s = s.replace(placeholder, replacement);
        }
        Value::Array(items) => {
            for item in items {
                substitute_placeholder(item, placeholder, replacement);
            }
        }
        Value::Object(table) => {
            for item in table.values_mut() {
                substitute_placeholder(item, placeholder, replacement);
            }
        }
        _ => {}
    }
}
