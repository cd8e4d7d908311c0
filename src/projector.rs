//! Turning raw card fields into single spreadsheet cells

use serde_json::Value;

use crate::types::CardRecord;

/// Separator between supertypes/types and subtypes in a type line.
/// This is the wide '—' character, not '-'.
const TYPE_LINE_SEPARATOR: char = '\u{2014}';

/// How a field's stored value becomes one cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionRule {
    /// Lists yield their first element, everything else passes through
    FirstOfList,
    /// Image URI object: the "normal" size, or any size if that is missing
    ImageUri,
    /// Type line: the last word after the dash
    PrimaryType,
}

impl ExtractionRule {
    pub fn for_field(field: &str) -> Self {
        match field {
            "image_uris" => ExtractionRule::ImageUri,
            "type_line" => ExtractionRule::PrimaryType,
            _ => ExtractionRule::FirstOfList,
        }
    }

    pub fn apply(&self, value: &Value) -> Value {
        match self {
            ExtractionRule::FirstOfList => first_of_list(value),
            ExtractionRule::ImageUri => normal_image_uri(value).map_or(Value::Null, Value::from),
            ExtractionRule::PrimaryType => value
                .as_str()
                .and_then(primary_type)
                .map_or(Value::Null, Value::from),
        }
    }
}

/// Project `field` of `record` into a scalar cell value. Absent fields are null.
pub fn project(record: &CardRecord, field: &str) -> Value {
    match record.get(field) {
        Some(value) => into_cell(ExtractionRule::for_field(field).apply(value)),
        None => Value::Null,
    }
}

fn first_of_list(value: &Value) -> Value {
    match value {
        Value::Array(items) => items.first().cloned().unwrap_or(Value::Null),
        other => other.clone(),
    }
}

/// Pick the "normal" image out of an image URI object
pub fn normal_image_uri(image_uris: &Value) -> Option<&str> {
    match image_uris {
        Value::Object(map) => map
            .get("normal")
            .and_then(Value::as_str)
            .or_else(|| map.values().find_map(Value::as_str)),
        Value::Array(items) => items.iter().find_map(Value::as_str),
        Value::String(uri) => Some(uri),
        _ => None,
    }
}

/// "Creature — Elf Warrior" -> "Warrior", "Land" -> "Land"
pub fn primary_type(type_line: &str) -> Option<&str> {
    let segment = match type_line.split_once(TYPE_LINE_SEPARATOR) {
        Some((_, after)) => after,
        None => type_line,
    };
    segment.split_whitespace().last()
}

/// Sheets only take scalars, so nested values are written as JSON text
fn into_cell(value: Value) -> Value {
    match value {
        Value::Array(_) | Value::Object(_) => Value::String(value.to_string()),
        scalar => scalar,
    }
}
