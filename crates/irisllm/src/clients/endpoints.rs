//! Supported endpoint registry and inbound format detection
//!
//! Requests are classified by path first; bodies that arrive on a path we do
//! not know are classified by shape.
//!
//! # Examples
//!
//! ```rust
//! use irisllm::clients::endpoints::{detect_request, is_supported_endpoint};
//! use irisllm::ApiFormat;
//! use serde_json::json;
//!
//! assert!(is_supported_endpoint("/v1/chat/completions"));
//! assert!(is_supported_endpoint("/v1beta/models/gemini-pro:generateContent"));
//! assert!(!is_supported_endpoint("/v1/unknown"));
//!
//! let request = detect_request(
//!     "/v1beta/models/gemini-2.0-flash:streamGenerateContent",
//!     json!({"contents": [{"role": "user", "parts": [{"text": "hi"}]}]}),
//! )
//! .unwrap();
//! assert_eq!(request.format, ApiFormat::Gemini);
//! assert_eq!(request.model, "gemini-2.0-flash");
//! assert!(request.stream);
//! ```

use serde_json::Value;

use super::{ConversionResult, TransformError};
use crate::apis::{AnthropicApi, ApiDefinition, GeminiApi, OpenAIApi};
use crate::ApiFormat;

/// An inbound request classified once and never mutated afterwards
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRequest {
    pub format: ApiFormat,
    pub model: String,
    pub stream: bool,
    pub body: Value,
}

impl NormalizedRequest {
    /// Same request addressed to another model, as a channel remap requires
    pub fn with_model(&self, model: impl Into<String>) -> NormalizedRequest {
        let model = model.into();
        let mut body = self.body.clone();
        if let Some(slot) = body.get_mut("model") {
            *slot = Value::String(model.clone());
        }
        NormalizedRequest {
            format: self.format,
            model,
            stream: self.stream,
            body,
        }
    }
}

/// Check if the given endpoint path is supported
pub fn is_supported_endpoint(endpoint: &str) -> bool {
    identify_provider(endpoint).is_some()
}

/// Get all supported endpoint paths
pub fn supported_endpoints() -> Vec<&'static str> {
    let mut endpoints = Vec::new();

    for api in OpenAIApi::all_variants() {
        endpoints.push(api.endpoint());
    }

    for api in AnthropicApi::all_variants() {
        endpoints.push(api.endpoint());
    }

    for api in GeminiApi::all_variants() {
        endpoints.push(api.endpoint());
    }

    endpoints
}

/// Identify which format a given endpoint belongs to
pub fn identify_provider(endpoint: &str) -> Option<ApiFormat> {
    if OpenAIApi::from_endpoint(endpoint).is_some() {
        return Some(ApiFormat::OpenAI);
    }

    if AnthropicApi::from_endpoint(endpoint).is_some() {
        return Some(ApiFormat::Anthropic);
    }

    if GeminiApi::from_endpoint(endpoint).is_some() {
        return Some(ApiFormat::Gemini);
    }

    None
}

/// Classify a body by its shape alone
pub fn detect_body_format(body: &Value) -> Option<ApiFormat> {
    let object = body.as_object()?;

    if object.contains_key("contents") {
        return Some(ApiFormat::Gemini);
    }

    let messages = object.get("messages")?.as_array()?;

    if object.contains_key("system") || has_anthropic_blocks(messages) {
        return Some(ApiFormat::Anthropic);
    }

    Some(ApiFormat::OpenAI)
}

fn has_anthropic_blocks(messages: &[Value]) -> bool {
    messages
        .iter()
        .filter_map(|message| message.get("content").and_then(Value::as_array))
        .flatten()
        .any(|block| match block.get("type").and_then(Value::as_str) {
            Some("tool_use") | Some("tool_result") | Some("thinking") => true,
            Some("image") => block.get("source").is_some(),
            _ => false,
        })
}

/// Build the `NormalizedRequest` for an inbound call
pub fn detect_request(path: &str, body: Value) -> ConversionResult<NormalizedRequest> {
    let gemini_path = GeminiApi::parse_path(path);

    let format = match identify_provider(path) {
        Some(format) => format,
        None => detect_body_format(&body).ok_or_else(|| {
            TransformError::UnsupportedConversion(format!(
                "cannot determine the API format of a request to '{}'",
                path
            ))
        })?,
    };

    let body_model = body
        .get("model")
        .and_then(Value::as_str)
        .map(|model| model.to_string());
    let model = match (&gemini_path, body_model) {
        (Some((model, _)), _) => model.clone(),
        (None, Some(model)) => model,
        (None, None) => return Err(TransformError::MissingField("model".to_string())),
    };

    let stream = gemini_path
        .as_ref()
        .map(|(_, api)| api.is_streaming())
        .unwrap_or(false)
        || body.get("stream").and_then(Value::as_bool).unwrap_or(false);

    Ok(NormalizedRequest {
        format,
        model,
        stream,
        body,
    })
}
