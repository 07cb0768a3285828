//! Conversion dispatch
//!
//! Every (source, target) pair resolves once to a [`Conversion`] value; the
//! factory builds the full table up front so a lookup never inspects bodies.
//!
//! # Example
//!
//! ```rust
//! use irisllm::clients::detect_request;
//! use irisllm::{ApiFormat, ConversionSettings, ConverterFactory};
//! use serde_json::json;
//!
//! let factory = ConverterFactory::new(ConversionSettings::default());
//! let request = detect_request(
//!     "/v1/chat/completions",
//!     json!({"model": "claude-3-5-sonnet-20241022", "messages": [{"role": "user", "content": "hi"}]}),
//! )
//! .unwrap();
//!
//! let body = factory.convert_request(&request, ApiFormat::Anthropic).unwrap();
//! assert_eq!(body["max_tokens"], 8192);
//! ```

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::apis::*;
use crate::clients::{ConfigurationError, ConversionResult, ConversionSettings, NormalizedRequest, TransformError};
use crate::streaming::{self, SseEvent, StreamSession, StreamState};
use crate::transformer::request::reorder_images_first;
use crate::transformer::ConversionContext;
use crate::ApiFormat;

// ============================================================================
// CONVERSION
// ============================================================================

/// One (source, target) pair and the converters it runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Conversion {
    /// Same format on both sides, bodies and lines forwarded untouched
    Passthrough(ApiFormat),
    /// Anthropic to Anthropic with images moved ahead of other blocks
    AnthropicImageReorder,
    OpenAIToAnthropic,
    OpenAIToGemini,
    AnthropicToOpenAI,
    AnthropicToGemini,
    GeminiToOpenAI,
    GeminiToAnthropic,
}

impl Conversion {
    pub fn resolve(source: ApiFormat, target: ApiFormat) -> Conversion {
        match (source, target) {
            (ApiFormat::Anthropic, ApiFormat::Anthropic) => Conversion::AnthropicImageReorder,
            (ApiFormat::OpenAI, ApiFormat::Anthropic) => Conversion::OpenAIToAnthropic,
            (ApiFormat::OpenAI, ApiFormat::Gemini) => Conversion::OpenAIToGemini,
            (ApiFormat::Anthropic, ApiFormat::OpenAI) => Conversion::AnthropicToOpenAI,
            (ApiFormat::Anthropic, ApiFormat::Gemini) => Conversion::AnthropicToGemini,
            (ApiFormat::Gemini, ApiFormat::OpenAI) => Conversion::GeminiToOpenAI,
            (ApiFormat::Gemini, ApiFormat::Anthropic) => Conversion::GeminiToAnthropic,
            (format, _) => Conversion::Passthrough(format),
        }
    }

    pub fn source(&self) -> ApiFormat {
        match self {
            Conversion::Passthrough(format) => *format,
            Conversion::AnthropicImageReorder
            | Conversion::AnthropicToOpenAI
            | Conversion::AnthropicToGemini => ApiFormat::Anthropic,
            Conversion::OpenAIToAnthropic | Conversion::OpenAIToGemini => ApiFormat::OpenAI,
            Conversion::GeminiToOpenAI | Conversion::GeminiToAnthropic => ApiFormat::Gemini,
        }
    }

    pub fn target(&self) -> ApiFormat {
        match self {
            Conversion::Passthrough(format) => *format,
            Conversion::AnthropicImageReorder
            | Conversion::OpenAIToAnthropic
            | Conversion::GeminiToAnthropic => ApiFormat::Anthropic,
            Conversion::AnthropicToOpenAI | Conversion::GeminiToOpenAI => ApiFormat::OpenAI,
            Conversion::OpenAIToGemini | Conversion::AnthropicToGemini => ApiFormat::Gemini,
        }
    }

    /// Upstream lines can be forwarded without parsing
    pub fn is_passthrough(&self) -> bool {
        matches!(self, Conversion::Passthrough(_))
    }

    pub fn convert_request(&self, body: Value, ctx: &ConversionContext<'_>) -> ConversionResult<Value> {
        match self {
            Conversion::Passthrough(_) => Ok(body),
            Conversion::AnthropicImageReorder => {
                let mut body = body;
                reorder_images_first(&mut body);
                Ok(body)
            }
            Conversion::OpenAIToAnthropic => convert::<ChatCompletionsRequest, MessagesRequest>(body, ctx),
            Conversion::OpenAIToGemini => convert::<ChatCompletionsRequest, GenerateContentRequest>(body, ctx),
            Conversion::AnthropicToOpenAI => convert::<MessagesRequest, ChatCompletionsRequest>(body, ctx),
            Conversion::AnthropicToGemini => convert::<MessagesRequest, GenerateContentRequest>(body, ctx),
            Conversion::GeminiToOpenAI => convert::<GenerateContentRequest, ChatCompletionsRequest>(body, ctx),
            Conversion::GeminiToAnthropic => convert::<GenerateContentRequest, MessagesRequest>(body, ctx),
        }
    }

    /// `body` is the upstream's reply, in the target format of the request
    pub fn convert_response(&self, body: Value, ctx: &ConversionContext<'_>) -> ConversionResult<Value> {
        match self {
            Conversion::Passthrough(_) | Conversion::AnthropicImageReorder => Ok(body),
            Conversion::OpenAIToAnthropic => convert::<MessagesResponse, ChatCompletionsResponse>(body, ctx),
            Conversion::OpenAIToGemini => convert::<GenerateContentResponse, ChatCompletionsResponse>(body, ctx),
            Conversion::AnthropicToOpenAI => convert::<ChatCompletionsResponse, MessagesResponse>(body, ctx),
            Conversion::AnthropicToGemini => convert::<GenerateContentResponse, MessagesResponse>(body, ctx),
            Conversion::GeminiToOpenAI => convert::<ChatCompletionsResponse, GenerateContentResponse>(body, ctx),
            Conversion::GeminiToAnthropic => convert::<MessagesResponse, GenerateContentResponse>(body, ctx),
        }
    }

    /// One upstream stream chunk to zero or more client events
    ///
    /// Pairs are named by request direction, so the stream flows the other
    /// way: an `OpenAIToAnthropic` client reads OpenAI chunks made from
    /// Anthropic events.
    pub fn convert_stream_chunk(
        &self,
        state: &mut StreamState,
        chunk: Value,
    ) -> ConversionResult<Vec<SseEvent>> {
        match self {
            Conversion::Passthrough(_) => Ok(vec![SseEvent::data(chunk.to_string())]),
            Conversion::AnthropicImageReorder => Ok(streaming::anthropic::reframe(state, chunk)),
            Conversion::OpenAIToAnthropic => {
                streaming::openai::from_anthropic(state, serde_json::from_value(chunk)?)
            }
            Conversion::OpenAIToGemini => {
                streaming::openai::from_gemini(state, serde_json::from_value(chunk)?)
            }
            Conversion::AnthropicToOpenAI => {
                streaming::anthropic::from_openai(state, serde_json::from_value(chunk)?)
            }
            Conversion::AnthropicToGemini => {
                streaming::anthropic::from_gemini(state, serde_json::from_value(chunk)?)
            }
            Conversion::GeminiToOpenAI => {
                streaming::gemini::from_openai(state, serde_json::from_value(chunk)?)
            }
            Conversion::GeminiToAnthropic => {
                streaming::gemini::from_anthropic(state, serde_json::from_value(chunk)?)
            }
        }
    }

    /// Closing events for an upstream that ended without a terminal chunk
    pub fn finish_stream(&self, state: &mut StreamState) -> ConversionResult<Vec<SseEvent>> {
        match self {
            Conversion::Passthrough(_) | Conversion::AnthropicImageReorder => {
                state.close();
                Ok(Vec::new())
            }
            _ => match self.source() {
                ApiFormat::OpenAI => streaming::openai::finish(state),
                ApiFormat::Anthropic => streaming::anthropic::finish(state),
                ApiFormat::Gemini => streaming::gemini::finish(state),
            },
        }
    }
}

fn convert<'a, S, T>(body: Value, ctx: &'a ConversionContext<'a>) -> ConversionResult<Value>
where
    S: DeserializeOwned,
    T: Serialize + TryFrom<(S, &'a ConversionContext<'a>), Error = TransformError>,
{
    let source: S = serde_json::from_value(body)?;
    let target = T::try_from((source, ctx))?;
    Ok(serde_json::to_value(target)?)
}

// ============================================================================
// CAPABILITIES
// ============================================================================

/// What a wire format can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatCapabilities {
    pub streaming: bool,
    pub tools: bool,
    pub vision: bool,
    pub thinking: bool,
    /// Requests are rejected without an explicit token limit
    pub requires_max_tokens: bool,
}

impl FormatCapabilities {
    pub fn of(format: ApiFormat) -> FormatCapabilities {
        match format {
            ApiFormat::OpenAI => Self::from_api(&OpenAIApi::all_variants(), true, false),
            ApiFormat::Anthropic => Self::from_api(&AnthropicApi::all_variants(), true, true),
            ApiFormat::Gemini => Self::from_api(&GeminiApi::all_variants(), true, false),
        }
    }

    fn from_api<T: ApiDefinition>(apis: &[T], thinking: bool, requires_max_tokens: bool) -> Self {
        FormatCapabilities {
            streaming: apis.iter().any(|api| api.supports_streaming()),
            tools: apis.iter().any(|api| api.supports_tools()),
            vision: apis.iter().any(|api| api.supports_vision()),
            thinking,
            requires_max_tokens,
        }
    }
}

// ============================================================================
// FACTORY
// ============================================================================

/// Owns the dispatch table and the settings every conversion reads
#[derive(Debug, Clone)]
pub struct ConverterFactory {
    settings: ConversionSettings,
    table: HashMap<(ApiFormat, ApiFormat), Conversion>,
    capabilities: HashMap<ApiFormat, FormatCapabilities>,
}

impl ConverterFactory {
    pub fn new(settings: ConversionSettings) -> Self {
        let mut table = HashMap::new();
        for source in ApiFormat::all() {
            for target in ApiFormat::all() {
                table.insert((source, target), Conversion::resolve(source, target));
            }
        }
        let capabilities = ApiFormat::all()
            .into_iter()
            .map(|format| (format, FormatCapabilities::of(format)))
            .collect();

        ConverterFactory {
            settings,
            table,
            capabilities,
        }
    }

    pub fn settings(&self) -> &ConversionSettings {
        &self.settings
    }

    pub fn conversion(&self, source: ApiFormat, target: ApiFormat) -> Conversion {
        self.table
            .get(&(source, target))
            .copied()
            .unwrap_or_else(|| Conversion::resolve(source, target))
    }

    /// Lookup by provider names as they appear in channel configuration
    pub fn conversion_for(&self, source: &str, target: &str) -> Result<Conversion, ConfigurationError> {
        Ok(self.conversion(source.parse()?, target.parse()?))
    }

    pub fn capabilities(&self, format: ApiFormat) -> FormatCapabilities {
        self.capabilities
            .get(&format)
            .copied()
            .unwrap_or_else(|| FormatCapabilities::of(format))
    }

    /// Converts a detected request into the body `target` expects
    ///
    /// Streaming is carried by the request itself for OpenAI and Anthropic
    /// targets; Gemini streams through a different path instead.
    pub fn convert_request(&self, request: &NormalizedRequest, target: ApiFormat) -> ConversionResult<Value> {
        let conversion = self.conversion(request.format, target);
        let ctx = ConversionContext::new(&request.model, &self.settings);
        let mut body = conversion.convert_request(request.body.clone(), &ctx)?;

        if request.stream && !conversion.is_passthrough() {
            if let Some(object) = body.as_object_mut() {
                match target {
                    ApiFormat::OpenAI => {
                        object.insert("stream".to_string(), Value::Bool(true));
                        object.insert("stream_options".to_string(), json!({"include_usage": true}));
                    }
                    ApiFormat::Anthropic => {
                        object.insert("stream".to_string(), Value::Bool(true));
                    }
                    ApiFormat::Gemini => {}
                }
            }
        }

        debug!(
            "converted {} request for model {} to {}",
            request.format, request.model, target
        );
        Ok(body)
    }

    /// Converts an upstream `target`-format reply back into the client's `source` format
    pub fn convert_response(
        &self,
        source: ApiFormat,
        target: ApiFormat,
        body: Value,
        model: &str,
    ) -> ConversionResult<Value> {
        let ctx = ConversionContext::new(model, &self.settings);
        self.conversion(source, target).convert_response(body, &ctx)
    }

    /// A fresh session for one streaming reply; never reuse across streams
    pub fn stream_session(&self, source: ApiFormat, target: ApiFormat, model: &str) -> StreamSession {
        StreamSession::new(self.conversion(source, target), model)
    }
}

impl Default for ConverterFactory {
    fn default() -> Self {
        ConverterFactory::new(ConversionSettings::default())
    }
}
