//! Request transformations, one module per target format
//!
//! Each module holds the `TryFrom<(Source, &ConversionContext)>` impls that
//! produce its format. Helpers shared by more than one target live here.

use serde_json::{Map, Value};

use super::ConversionContext;
use crate::clients::settings::claude_max_tokens;
use crate::clients::{ConversionResult, TransformError};

pub mod anthropic;
pub mod gemini;
pub mod openai;

pub use anthropic::reorder_images_first;

/// Name used when a tool result cannot be traced back to its call
pub const UNKNOWN_FUNCTION: &str = "unknown_function";

/// Anthropic requires `max_tokens`. Explicit value first, then the configured
/// default, then the model family table.
pub fn resolve_anthropic_max_tokens(
    explicit: Option<u32>,
    ctx: &ConversionContext<'_>,
) -> ConversionResult<u32> {
    if let Some(max_tokens) = explicit.or(ctx.settings.anthropic_max_tokens) {
        return Ok(max_tokens);
    }
    if ctx.model.is_empty() {
        return Err(TransformError::MissingField("model".to_string()));
    }
    claude_max_tokens(ctx.model).ok_or_else(|| TransformError::UnknownModel(ctx.model.to_string()))
}

/// Gemini function responses must be objects; anything else is wrapped as
/// `{"content": ...}`
pub fn function_response_payload(text: &str) -> Value {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(object)) => Value::Object(object),
        Ok(other) => wrap_content(other),
        Err(_) => wrap_content(Value::String(text.to_string())),
    }
}

/// Reverse of `function_response_payload`: a lone string `content` is
/// unwrapped, any other response is sent as JSON text
pub fn function_response_text(response: &Value) -> String {
    match response.get("content") {
        Some(Value::String(content)) => content.clone(),
        _ => response.to_string(),
    }
}

fn wrap_content(value: Value) -> Value {
    let mut object = Map::new();
    object.insert("content".to_string(), value);
    Value::Object(object)
}
