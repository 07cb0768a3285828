use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;

use super::ApiDefinition;

const MODELS_PREFIXES: [&str; 3] = ["/v1beta/models/", "/v1/models/", "/models/"];

// Enum for all supported Gemini APIs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeminiApi {
    GenerateContent,
    StreamGenerateContent,
}

impl GeminiApi {
    /// Splits `/v1beta/models/{model}:{method}` into the model and the API it targets
    pub fn parse_path(path: &str) -> Option<(String, GeminiApi)> {
        let path = path.split('?').next().unwrap_or(path);
        let rest = MODELS_PREFIXES
            .iter()
            .find_map(|prefix| path.strip_prefix(prefix))?;
        let (model, method) = rest.rsplit_once(':')?;
        if model.is_empty() {
            return None;
        }
        let api = match method {
            "generateContent" => GeminiApi::GenerateContent,
            "streamGenerateContent" => GeminiApi::StreamGenerateContent,
            _ => return None,
        };
        Some((model.to_string(), api))
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, GeminiApi::StreamGenerateContent)
    }
}

impl ApiDefinition for GeminiApi {
    fn endpoint(&self) -> &'static str {
        match self {
            GeminiApi::GenerateContent => "/v1beta/models/{model}:generateContent",
            GeminiApi::StreamGenerateContent => "/v1beta/models/{model}:streamGenerateContent",
        }
    }

    fn from_endpoint(endpoint: &str) -> Option<Self> {
        GeminiApi::parse_path(endpoint).map(|(_, api)| api)
    }

    fn supports_streaming(&self) -> bool {
        match self {
            GeminiApi::GenerateContent => false,
            GeminiApi::StreamGenerateContent => true,
        }
    }

    fn supports_tools(&self) -> bool {
        true
    }

    fn supports_vision(&self) -> bool {
        true
    }

    fn all_variants() -> Vec<Self> {
        vec![GeminiApi::GenerateContent, GeminiApi::StreamGenerateContent]
    }
}

// ============================================================================
// REQUEST TYPES
// ============================================================================

#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    /// Not part of the Gemini body; read when a client puts the model there,
    /// never written by a conversion since the model travels in the path.
    pub model: Option<String>,
    #[serde(default)]
    pub contents: Vec<Content>,
    #[serde(rename = "system_instruction", alias = "systemInstruction")]
    pub system_instruction: Option<Content>,
    #[serde(alias = "generation_config")]
    pub generation_config: Option<GenerationConfig>,
    pub tools: Option<Vec<GeminiTool>>,
    #[serde(alias = "tool_config")]
    pub tool_config: Option<Value>,
    #[serde(alias = "safety_settings")]
    pub safety_settings: Option<Value>,
    pub stream: Option<bool>,
}

#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Content {
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn new(role: &str, parts: Vec<Part>) -> Self {
        Content {
            role: Some(role.to_string()),
            parts,
        }
    }

    /// Text of every non-thought part joined in order
    pub fn joined_text(&self, separator: &str) -> String {
        self.parts
            .iter()
            .filter(|part| !part.is_thought())
            .filter_map(|part| part.text.as_deref())
            .collect::<Vec<_>>()
            .join(separator)
    }
}

/// A Gemini part carries exactly one of its payload fields in practice
#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    pub text: Option<String>,
    pub thought: Option<bool>,
    #[serde(alias = "thought_signature")]
    pub thought_signature: Option<String>,
    #[serde(alias = "inline_data")]
    pub inline_data: Option<InlineData>,
    #[serde(alias = "function_call")]
    pub function_call: Option<GeminiFunctionCall>,
    #[serde(alias = "function_response")]
    pub function_response: Option<GeminiFunctionResponse>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn thought(text: impl Into<String>) -> Self {
        Part {
            text: Some(text.into()),
            thought: Some(true),
            ..Default::default()
        }
    }

    pub fn inline_data(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Part {
            inline_data: Some(InlineData {
                mime_type: mime_type.into(),
                data: data.into(),
            }),
            ..Default::default()
        }
    }

    pub fn function_call(name: impl Into<String>, args: Value) -> Self {
        Part {
            function_call: Some(GeminiFunctionCall {
                name: name.into(),
                args,
            }),
            ..Default::default()
        }
    }

    pub fn function_response(name: impl Into<String>, response: Value) -> Self {
        Part {
            function_response: Some(GeminiFunctionResponse {
                name: name.into(),
                response,
            }),
            ..Default::default()
        }
    }

    pub fn is_thought(&self) -> bool {
        self.thought.unwrap_or(false)
    }

    /// Whether the part carries anything a backend would accept
    pub fn has_payload(&self) -> bool {
        self.text.as_deref().is_some_and(|t| !t.trim().is_empty())
            || self.inline_data.is_some()
            || self.function_call.is_some()
            || self.function_response.is_some()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    #[serde(alias = "mime_type")]
    pub mime_type: String,
    pub data: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GeminiFunctionCall {
    pub name: String,
    #[serde(default = "empty_object")]
    pub args: Value,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GeminiFunctionResponse {
    pub name: String,
    #[serde(default = "empty_object")]
    pub response: Value,
}

#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: Option<f32>,
    #[serde(alias = "top_p")]
    pub top_p: Option<f32>,
    #[serde(alias = "top_k")]
    pub top_k: Option<u32>,
    #[serde(alias = "max_output_tokens")]
    pub max_output_tokens: Option<u32>,
    #[serde(alias = "stop_sequences")]
    pub stop_sequences: Option<Vec<String>>,
    #[serde(alias = "candidate_count")]
    pub candidate_count: Option<u32>,
    #[serde(rename = "response_mime_type", alias = "responseMimeType")]
    pub response_mime_type: Option<String>,
    #[serde(rename = "response_schema", alias = "responseSchema")]
    pub response_schema: Option<Value>,
    #[serde(alias = "thinking_config")]
    pub thinking_config: Option<GeminiThinkingConfig>,
}

#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeminiThinkingConfig {
    /// -1 asks the model to pick its own budget
    #[serde(alias = "thinking_budget")]
    pub thinking_budget: Option<i64>,
    #[serde(alias = "include_thoughts")]
    pub include_thoughts: Option<bool>,
}

#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeminiTool {
    #[serde(alias = "function_declarations")]
    pub function_declarations: Option<Vec<FunctionDeclaration>>,
}

#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: Option<String>,
    pub parameters: Option<Value>,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

// ============================================================================
// RESPONSE TYPES
// ============================================================================

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GeminiFinishReason {
    #[serde(alias = "stop")]
    Stop,
    #[serde(alias = "length", alias = "max_tokens")]
    MaxTokens,
    #[serde(alias = "safety")]
    Safety,
    #[serde(alias = "recitation")]
    Recitation,
    Blocklist,
    ProhibitedContent,
    Spii,
    MalformedFunctionCall,
    #[serde(other)]
    Other,
}

#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(alias = "usage_metadata")]
    pub usage_metadata: Option<UsageMetadata>,
    #[serde(alias = "model_version")]
    pub model_version: Option<String>,
    #[serde(alias = "response_id")]
    pub response_id: Option<String>,
}

impl GenerateContentResponse {
    /// All parts of the first candidate, empty when there is none
    pub fn first_parts(&self) -> &[Part] {
        self.candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| content.parts.as_slice())
            .unwrap_or(&[])
    }

    pub fn finish_reason(&self) -> Option<&GeminiFinishReason> {
        self.candidates
            .first()
            .and_then(|candidate| candidate.finish_reason.as_ref())
    }
}

#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<Content>,
    #[serde(alias = "finish_reason")]
    pub finish_reason: Option<GeminiFinishReason>,
    pub index: Option<u32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default, alias = "prompt_token_count")]
    pub prompt_token_count: u32,
    #[serde(default, alias = "candidates_token_count")]
    pub candidates_token_count: u32,
    #[serde(default, alias = "total_token_count")]
    pub total_token_count: u32,
}

impl UsageMetadata {
    pub fn new(prompt_token_count: u32, candidates_token_count: u32) -> Self {
        UsageMetadata {
            prompt_token_count,
            candidates_token_count,
            total_token_count: prompt_token_count.saturating_add(candidates_token_count),
        }
    }
}
