//! Tool-parameter schema sanitizing
//!
//! Schemas are never rejected: anything that is not an object becomes an empty
//! object schema and unknown keywords are stripped where the target is picky.

use serde_json::{Map, Value};
use tracing::debug;

use crate::ApiFormat;

/// Keywords every target accepts
const RESTRICTED_KEYWORDS: &[&str] = &["type", "description", "properties", "required", "enum", "items"];

/// Numeric bounds Gemini sometimes ships as strings
const INTEGER_BOUNDS: &[&str] = &[
    "minItems",
    "maxItems",
    "minimum",
    "maximum",
    "minLength",
    "maxLength",
    "minProperties",
    "maxProperties",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaSanitizer {
    /// Keeps only `RESTRICTED_KEYWORDS`, recursing through properties and items
    Restricted,
    /// Lowers Gemini's upper-case type names and coerces stringified bounds
    GeminiNormalized,
    /// Leaves a well-formed schema untouched
    Verbatim,
}

impl SchemaSanitizer {
    pub fn for_conversion(source: ApiFormat, target: ApiFormat) -> Self {
        match (source, target) {
            (_, ApiFormat::Gemini) => SchemaSanitizer::Restricted,
            (ApiFormat::Gemini, _) => SchemaSanitizer::GeminiNormalized,
            (ApiFormat::Anthropic, ApiFormat::OpenAI) => SchemaSanitizer::Restricted,
            _ => SchemaSanitizer::Verbatim,
        }
    }

    pub fn sanitize(&self, schema: Option<&Value>) -> Value {
        let Some(Value::Object(schema)) = schema else {
            if schema.is_some_and(|value| !value.is_null()) {
                debug!("Replacing non-object tool schema with an empty object schema");
            }
            return empty_object_schema();
        };

        match self {
            SchemaSanitizer::Restricted => Value::Object(restrict(schema)),
            SchemaSanitizer::GeminiNormalized => Value::Object(normalize(schema)),
            SchemaSanitizer::Verbatim => Value::Object(schema.clone()),
        }
    }
}

pub fn empty_object_schema() -> Value {
    let mut schema = Map::new();
    schema.insert("type".to_string(), Value::String("object".to_string()));
    schema.insert("properties".to_string(), Value::Object(Map::new()));
    Value::Object(schema)
}

fn restrict(schema: &Map<String, Value>) -> Map<String, Value> {
    let mut cleaned = Map::new();

    for (key, value) in schema {
        if !RESTRICTED_KEYWORDS.contains(&key.as_str()) {
            continue;
        }
        let value = match key.as_str() {
            "type" => match single_type(value) {
                Some(kind) => Value::String(kind),
                None => continue,
            },
            "properties" => match value {
                Value::Object(properties) => Value::Object(
                    properties
                        .iter()
                        .map(|(name, property)| (name.clone(), restrict_value(property)))
                        .collect(),
                ),
                _ => continue,
            },
            "items" => match value {
                Value::Array(items) => match items.first() {
                    Some(first) => restrict_value(first),
                    None => continue,
                },
                other => restrict_value(other),
            },
            "required" => match value {
                Value::Array(names) => Value::Array(
                    names.iter().filter(|name| name.is_string()).cloned().collect(),
                ),
                _ => continue,
            },
            _ => value.clone(),
        };
        cleaned.insert(key.clone(), value);
    }

    cleaned
}

fn restrict_value(value: &Value) -> Value {
    match value {
        Value::Object(schema) => Value::Object(restrict(schema)),
        other => other.clone(),
    }
}

/// Collapses `["string", "null"]` style unions to their first concrete type
fn single_type(value: &Value) -> Option<String> {
    match value {
        Value::String(kind) => Some(kind.to_lowercase()),
        Value::Array(kinds) => kinds
            .iter()
            .filter_map(Value::as_str)
            .find(|kind| *kind != "null")
            .map(str::to_lowercase),
        _ => None,
    }
}

fn normalize(schema: &Map<String, Value>) -> Map<String, Value> {
    schema
        .iter()
        .map(|(key, value)| {
            let value = match (key.as_str(), value) {
                ("type", Value::String(kind)) => Value::String(lower_type(kind)),
                (bound, Value::String(raw)) if INTEGER_BOUNDS.contains(&bound) => {
                    match raw.trim().parse::<i64>() {
                        Ok(number) => Value::from(number),
                        Err(_) => value.clone(),
                    }
                }
                (_, Value::Object(nested)) => Value::Object(normalize(nested)),
                (_, Value::Array(items)) => Value::Array(
                    items
                        .iter()
                        .map(|item| match item {
                            Value::Object(nested) => Value::Object(normalize(nested)),
                            other => other.clone(),
                        })
                        .collect(),
                ),
                _ => value.clone(),
            };
            (key.clone(), value)
        })
        .collect()
}

fn lower_type(kind: &str) -> String {
    match kind {
        "STRING" => "string",
        "NUMBER" => "number",
        "INTEGER" => "integer",
        "BOOLEAN" => "boolean",
        "ARRAY" => "array",
        "OBJECT" => "object",
        "NULL" => "null",
        other => return other.to_lowercase(),
    }
    .to_string()
}
