//! Requests targeting the Gemini generateContent API
//!
//! Gemini rejects contents without parts. OpenAI histories get a placeholder
//! empty text part; Anthropic histories go through a cleaning pass instead.

use serde_json::{json, Value};
use tracing::warn;

use super::{function_response_payload, UNKNOWN_FUNCTION};
use crate::apis::*;
use crate::clients::TransformError;
use crate::transformer::reasoning::{budget_for_effort, DYNAMIC_BUDGET};
use crate::transformer::schema::SchemaSanitizer;
use crate::transformer::tool_ids::ToolCallMapping;
use crate::transformer::{parse_arguments, parse_data_url, ConversionContext, ExtractText};
use crate::ApiFormat;

// ============================================================================
// OPENAI -> GEMINI
// ============================================================================

impl TryFrom<(ChatCompletionsRequest, &ConversionContext<'_>)> for GenerateContentRequest {
    type Error = TransformError;

    fn try_from(
        (req, _ctx): (ChatCompletionsRequest, &ConversionContext<'_>),
    ) -> Result<Self, Self::Error> {
        let mapping = ToolCallMapping::from_openai_messages(&req.messages);

        let mut system_texts = Vec::new();
        let mut contents = Vec::new();
        let mut pending_responses = Vec::new();

        for message in req.messages {
            if message.role != Role::Tool && !pending_responses.is_empty() {
                contents.push(Content::new("user", std::mem::take(&mut pending_responses)));
            }

            match message.role {
                Role::System => {
                    let text = message
                        .content
                        .map(|content| content.extract_text())
                        .unwrap_or_default();
                    let text = text.trim();
                    if !text.is_empty() {
                        system_texts.push(text.to_string());
                    }
                }
                Role::User => contents.push(Content::new(
                    "user",
                    non_empty_parts(convert_user_content(message.content)),
                )),
                Role::Assistant => {
                    let mut parts = Vec::new();
                    if let Some(text) = message.content.map(|content| content.extract_text()) {
                        if !text.is_empty() {
                            parts.push(Part::text(text));
                        }
                    }
                    for call in message.tool_calls.unwrap_or_default() {
                        let args = parse_arguments(&call.function.arguments);
                        parts.push(Part::function_call(call.function.name, args));
                    }
                    contents.push(Content::new("model", non_empty_parts(parts)));
                }
                Role::Tool => pending_responses.push(function_response_part(message, &mapping)),
            }
        }
        if !pending_responses.is_empty() {
            contents.push(Content::new("user", pending_responses));
        }

        let sanitizer = SchemaSanitizer::for_conversion(ApiFormat::OpenAI, ApiFormat::Gemini);

        let mut config = GenerationConfig {
            temperature: req.temperature,
            top_p: req.top_p,
            max_output_tokens: req.max_tokens.or(req.max_completion_tokens),
            stop_sequences: req.stop.map(StopSequences::into_vec),
            candidate_count: req.n,
            ..Default::default()
        };
        if let Some(format) = req.response_format {
            match format.kind {
                ResponseFormatType::JsonSchema => {
                    config.response_mime_type = Some("application/json".to_string());
                    config.response_schema = format
                        .json_schema
                        .and_then(|json_schema| json_schema.schema)
                        .map(|schema| sanitizer.sanitize(Some(&schema)));
                }
                ResponseFormatType::JsonObject => {
                    config.response_mime_type = Some("application/json".to_string());
                }
                ResponseFormatType::Text => {}
            }
        }
        if let Some(effort) = req.reasoning_effort {
            config.thinking_config = Some(GeminiThinkingConfig {
                thinking_budget: Some(i64::from(budget_for_effort(effort))),
                include_thoughts: None,
            });
        }

        let declarations: Vec<FunctionDeclaration> = req
            .tools
            .unwrap_or_default()
            .into_iter()
            .map(|tool| FunctionDeclaration {
                parameters: Some(sanitizer.sanitize(tool.function.parameters.as_ref())),
                name: tool.function.name,
                description: tool.function.description,
            })
            .collect();
        let tool_config = if declarations.is_empty() {
            None
        } else {
            req.tool_choice.map(|choice| match choice {
                ToolChoice::Type(ToolChoiceType::Auto) => function_calling_config("AUTO", None),
                ToolChoice::Type(ToolChoiceType::Required) => function_calling_config("ANY", None),
                ToolChoice::Type(ToolChoiceType::None) => function_calling_config("NONE", None),
                ToolChoice::Function { function, .. } => {
                    function_calling_config("ANY", Some(&function.name))
                }
            })
        };

        Ok(GenerateContentRequest {
            model: None,
            contents,
            system_instruction: system_instruction(system_texts.join("\n\n")),
            generation_config: (config != GenerationConfig::default()).then_some(config),
            tools: tools_of(declarations),
            tool_config,
            safety_settings: None,
            stream: None,
        })
    }
}

fn convert_user_content(content: Option<MessageContent>) -> Vec<Part> {
    match content {
        None => Vec::new(),
        Some(MessageContent::Text(text)) => vec![Part::text(text)],
        Some(MessageContent::Parts(parts)) => parts
            .into_iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(Part::text(text)),
                ContentPart::ImageUrl { image_url } => match parse_data_url(&image_url.url) {
                    Some((mime_type, data)) => Some(Part::inline_data(mime_type, data)),
                    None => {
                        warn!(
                            "Dropping image_url part with a remote URL, Gemini only takes inline data here"
                        );
                        None
                    }
                },
                ContentPart::Unsupported => {
                    warn!("Dropping unsupported content part with no Gemini equivalent");
                    None
                }
            })
            .collect(),
    }
}

fn function_response_part(message: Message, mapping: &ToolCallMapping) -> Part {
    let name = message
        .tool_call_id
        .as_deref()
        .and_then(|id| mapping.function_name(id))
        .unwrap_or_else(|| UNKNOWN_FUNCTION.to_string());
    let text = message
        .content
        .map(|content| content.extract_text())
        .unwrap_or_default();
    Part::function_response(name, function_response_payload(&text))
}

/// An empty part list becomes a single empty text part
fn non_empty_parts(parts: Vec<Part>) -> Vec<Part> {
    if parts.is_empty() {
        vec![Part::text("")]
    } else {
        parts
    }
}

// ============================================================================
// ANTHROPIC -> GEMINI
// ============================================================================

impl TryFrom<(MessagesRequest, &ConversionContext<'_>)> for GenerateContentRequest {
    type Error = TransformError;

    fn try_from(
        (req, _ctx): (MessagesRequest, &ConversionContext<'_>),
    ) -> Result<Self, Self::Error> {
        let mapping = ToolCallMapping::from_anthropic_messages(&req.messages);

        let contents = req
            .messages
            .into_iter()
            .map(|message| {
                let parts: Vec<Part> = match message.content {
                    MessagesMessageContent::Single(text) => vec![Part::text(text)],
                    MessagesMessageContent::Blocks(blocks) => blocks
                        .into_iter()
                        .filter_map(|block| convert_anthropic_block(block, &mapping))
                        .collect(),
                };
                let role = if parts.iter().any(|part| part.function_response.is_some()) {
                    "user"
                } else {
                    match message.role {
                        MessagesRole::User => "user",
                        MessagesRole::Assistant => "model",
                    }
                };
                Content::new(role, parts)
            })
            .collect();

        let thinking_config = req
            .thinking
            .filter(ThinkingConfig::is_enabled)
            .map(|thinking| GeminiThinkingConfig {
                thinking_budget: Some(thinking.budget().map(i64::from).unwrap_or(DYNAMIC_BUDGET)),
                include_thoughts: Some(true),
            });
        let config = GenerationConfig {
            temperature: req.temperature,
            top_p: req.top_p,
            top_k: req.top_k,
            max_output_tokens: req.max_tokens,
            stop_sequences: req.stop_sequences,
            thinking_config,
            ..Default::default()
        };

        let sanitizer = SchemaSanitizer::for_conversion(ApiFormat::Anthropic, ApiFormat::Gemini);
        let declarations: Vec<FunctionDeclaration> = req
            .tools
            .unwrap_or_default()
            .into_iter()
            .map(|tool| FunctionDeclaration {
                parameters: Some(sanitizer.sanitize(Some(&tool.input_schema))),
                name: tool.name,
                description: tool.description,
            })
            .collect();
        let tool_config = if declarations.is_empty() {
            None
        } else {
            req.tool_choice.map(|choice| match choice.kind {
                MessagesToolChoiceType::Auto => function_calling_config("AUTO", None),
                MessagesToolChoiceType::Any => function_calling_config("ANY", None),
                MessagesToolChoiceType::None => function_calling_config("NONE", None),
                MessagesToolChoiceType::Tool => {
                    function_calling_config("ANY", choice.name.as_deref())
                }
            })
        };

        Ok(GenerateContentRequest {
            model: None,
            contents: deep_clean(contents),
            system_instruction: system_instruction(
                req.system.map(|system| system.extract_text()).unwrap_or_default(),
            ),
            generation_config: (config != GenerationConfig::default()).then_some(config),
            tools: tools_of(declarations),
            tool_config,
            safety_settings: None,
            stream: None,
        })
    }
}

fn convert_anthropic_block(block: MessagesContentBlock, mapping: &ToolCallMapping) -> Option<Part> {
    match block {
        MessagesContentBlock::Text { text } => Some(Part::text(text)),
        // a signature here came from a Gemini reply relayed to this client,
        // and Gemini expects it back on the following turn
        MessagesContentBlock::Thinking {
            thinking,
            signature,
        } => Some(Part {
            thought_signature: signature,
            ..Part::thought(thinking)
        }),
        MessagesContentBlock::Image {
            source: MessagesImageSource::Base64 { media_type, data },
        } => Some(Part::inline_data(media_type, data)),
        MessagesContentBlock::ToolUse { name, input, .. } => Some(Part::function_call(name, input)),
        MessagesContentBlock::ToolResult {
            tool_use_id,
            content,
            ..
        } => {
            let name = mapping
                .function_name(&tool_use_id)
                .unwrap_or_else(|| UNKNOWN_FUNCTION.to_string());
            let text = content.map(|content| content.extract_text()).unwrap_or_default();
            Some(Part::function_response(name, function_response_payload(&text)))
        }
        other => {
            warn!(
                "Dropping {} block with no Gemini equivalent",
                other.block_type()
            );
            None
        }
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Drops parts with nothing in them, then contents left without parts
fn deep_clean(contents: Vec<Content>) -> Vec<Content> {
    contents
        .into_iter()
        .filter_map(|mut content| {
            content.parts.retain(Part::has_payload);
            (!content.parts.is_empty()).then_some(content)
        })
        .collect()
}

fn system_instruction(text: String) -> Option<Content> {
    let text = text.trim();
    (!text.is_empty()).then(|| Content {
        role: None,
        parts: vec![Part::text(text)],
    })
}

fn tools_of(declarations: Vec<FunctionDeclaration>) -> Option<Vec<GeminiTool>> {
    (!declarations.is_empty()).then(|| {
        vec![GeminiTool {
            function_declarations: Some(declarations),
        }]
    })
}

fn function_calling_config(mode: &str, allowed: Option<&str>) -> Value {
    match allowed {
        Some(name) => json!({"functionCallingConfig": {"mode": mode, "allowedFunctionNames": [name]}}),
        None => json!({"functionCallingConfig": {"mode": mode}}),
    }
}
