//! Requests targeting the Anthropic Messages API

use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

use super::{function_response_text, resolve_anthropic_max_tokens};
use crate::apis::*;
use crate::clients::TransformError;
use crate::transformer::reasoning::{budget_for_effort, clamp_thinking_budget};
use crate::transformer::schema::SchemaSanitizer;
use crate::transformer::tool_ids::ToolCallCorrelator;
use crate::transformer::{
    parse_arguments, parse_data_url, split_thinking, ConversionContext, ExtractText, TextSegment,
};
use crate::ApiFormat;

// ============================================================================
// OPENAI -> ANTHROPIC
// ============================================================================

impl TryFrom<(ChatCompletionsRequest, &ConversionContext<'_>)> for MessagesRequest {
    type Error = TransformError;

    fn try_from(
        (req, ctx): (ChatCompletionsRequest, &ConversionContext<'_>),
    ) -> Result<Self, Self::Error> {
        let max_tokens =
            resolve_anthropic_max_tokens(req.max_tokens.or(req.max_completion_tokens), ctx)?;

        let mut system_prompts = Vec::new();
        let mut messages = Vec::new();
        let mut pending_results = Vec::new();

        for message in req.messages {
            if message.role != Role::Tool && !pending_results.is_empty() {
                messages.push(tool_results_message(std::mem::take(&mut pending_results)));
            }

            match message.role {
                Role::System => {
                    let text = message
                        .content
                        .map(|content| content.extract_text())
                        .unwrap_or_default();
                    if !text.trim().is_empty() {
                        system_prompts.push(text);
                    }
                }
                Role::Tool => pending_results.push(tool_result_block(message)),
                Role::User => {
                    if let Some(content) = convert_openai_content(message.content, Vec::new()) {
                        messages.push(MessagesMessage {
                            role: MessagesRole::User,
                            content,
                        });
                    }
                }
                Role::Assistant => {
                    let tool_uses = message
                        .tool_calls
                        .unwrap_or_default()
                        .into_iter()
                        .map(tool_use_block)
                        .collect();
                    if let Some(content) = convert_openai_content(message.content, tool_uses) {
                        messages.push(MessagesMessage {
                            role: MessagesRole::Assistant,
                            content,
                        });
                    }
                }
            }
        }
        if !pending_results.is_empty() {
            messages.push(tool_results_message(pending_results));
        }

        let sanitizer = SchemaSanitizer::for_conversion(ApiFormat::OpenAI, ApiFormat::Anthropic);
        let tools: Vec<MessagesTool> = req
            .tools
            .unwrap_or_default()
            .into_iter()
            .map(|tool| MessagesTool {
                input_schema: sanitizer.sanitize(tool.function.parameters.as_ref()),
                name: tool.function.name,
                description: tool.function.description,
            })
            .collect();
        let tool_choice = if tools.is_empty() {
            None
        } else {
            convert_openai_tool_choice(req.tool_choice, req.parallel_tool_calls)
        };

        let thinking = req.reasoning_effort.and_then(|effort| {
            let budget = clamp_thinking_budget(budget_for_effort(effort), max_tokens);
            if budget.is_none() {
                debug!(
                    "max_tokens {} leaves no room for a thinking budget, thinking disabled",
                    max_tokens
                );
            }
            budget.map(|budget| ThinkingConfig::Enabled {
                budget_tokens: Some(budget),
            })
        });

        let metadata = req.user.map(|user| {
            let mut metadata = HashMap::new();
            metadata.insert("user_id".to_string(), Value::String(user));
            metadata
        });

        Ok(MessagesRequest {
            model: ctx.model.to_string(),
            messages,
            max_tokens: Some(max_tokens),
            system: (!system_prompts.is_empty())
                .then(|| MessagesSystemPrompt::Single(system_prompts.join("\n\n"))),
            metadata,
            thinking,
            temperature: req.temperature,
            top_p: req.top_p,
            top_k: None,
            stream: req.stream,
            stop_sequences: req.stop.map(StopSequences::into_vec),
            tools: (!tools.is_empty()).then_some(tools),
            tool_choice,
        })
    }
}

/// Text keeps its plain-string form unless it carries thinking markers or
/// has tool calls to sit next to
fn convert_openai_content(
    content: Option<MessageContent>,
    tool_uses: Vec<MessagesContentBlock>,
) -> Option<MessagesMessageContent> {
    let mut blocks = match content {
        None => Vec::new(),
        Some(MessageContent::Text(text)) => {
            let segments = split_thinking(&text);
            if tool_uses.is_empty() && matches!(segments.as_slice(), [TextSegment::Text(_)]) {
                return Some(MessagesMessageContent::Single(text));
            }
            segment_blocks(segments)
        }
        Some(MessageContent::Parts(parts)) => convert_content_parts(parts),
    };
    blocks.extend(tool_uses);

    (!blocks.is_empty()).then_some(MessagesMessageContent::Blocks(blocks))
}

/// Images first, then text in part order
fn convert_content_parts(parts: Vec<ContentPart>) -> Vec<MessagesContentBlock> {
    let mut images = Vec::new();
    let mut texts = Vec::new();

    for part in parts {
        match part {
            ContentPart::ImageUrl { image_url } => images.push(MessagesContentBlock::Image {
                source: convert_image_url(&image_url),
            }),
            ContentPart::Text { text } => texts.extend(segment_blocks(split_thinking(&text))),
            ContentPart::Unsupported => {
                warn!("Dropping unsupported content part with no Anthropic equivalent")
            }
        }
    }

    images.extend(texts);
    images
}

fn segment_blocks(segments: Vec<TextSegment>) -> Vec<MessagesContentBlock> {
    segments
        .into_iter()
        .filter_map(|segment| match segment {
            TextSegment::Text(text) if text.trim().is_empty() => None,
            TextSegment::Text(text) => Some(MessagesContentBlock::Text { text }),
            TextSegment::Thinking(thinking) => Some(MessagesContentBlock::Thinking {
                thinking,
                signature: None,
            }),
        })
        .collect()
}

fn convert_image_url(image_url: &ImageUrl) -> MessagesImageSource {
    match parse_data_url(&image_url.url) {
        Some((media_type, data)) => MessagesImageSource::Base64 { media_type, data },
        None => MessagesImageSource::Url {
            url: image_url.url.clone(),
        },
    }
}

fn tool_use_block(call: ToolCall) -> MessagesContentBlock {
    MessagesContentBlock::ToolUse {
        input: parse_arguments(&call.function.arguments),
        id: call.id,
        name: call.function.name,
    }
}

fn tool_result_block(message: Message) -> MessagesContentBlock {
    MessagesContentBlock::ToolResult {
        tool_use_id: message.tool_call_id.unwrap_or_default(),
        is_error: None,
        content: Some(MessagesMessageContent::Single(
            message
                .content
                .map(|content| content.extract_text())
                .unwrap_or_default(),
        )),
    }
}

/// Consecutive tool messages travel together in one user turn
fn tool_results_message(results: Vec<MessagesContentBlock>) -> MessagesMessage {
    MessagesMessage {
        role: MessagesRole::User,
        content: MessagesMessageContent::Blocks(results),
    }
}

fn convert_openai_tool_choice(
    tool_choice: Option<ToolChoice>,
    parallel_tool_calls: Option<bool>,
) -> Option<MessagesToolChoice> {
    let disable_parallel_tool_use = (parallel_tool_calls == Some(false)).then_some(true);

    let (kind, name) = match tool_choice {
        Some(ToolChoice::Type(ToolChoiceType::Auto)) => (MessagesToolChoiceType::Auto, None),
        Some(ToolChoice::Type(ToolChoiceType::Required)) => (MessagesToolChoiceType::Any, None),
        Some(ToolChoice::Type(ToolChoiceType::None)) => (MessagesToolChoiceType::None, None),
        Some(ToolChoice::Function { function, .. }) => {
            (MessagesToolChoiceType::Tool, Some(function.name))
        }
        None if disable_parallel_tool_use.is_some() => (MessagesToolChoiceType::Auto, None),
        None => return None,
    };

    Some(MessagesToolChoice {
        kind,
        name,
        disable_parallel_tool_use,
    })
}

// ============================================================================
// GEMINI -> ANTHROPIC
// ============================================================================

impl TryFrom<(GenerateContentRequest, &ConversionContext<'_>)> for MessagesRequest {
    type Error = TransformError;

    fn try_from(
        (req, ctx): (GenerateContentRequest, &ConversionContext<'_>),
    ) -> Result<Self, Self::Error> {
        let config = req.generation_config.unwrap_or_default();
        let max_tokens = resolve_anthropic_max_tokens(config.max_output_tokens, ctx)?;

        let mut correlator = ToolCallCorrelator::for_gemini(&req.contents);
        let mut messages = Vec::new();

        for Content { role, parts } in req.contents {
            let blocks: Vec<MessagesContentBlock> = parts
                .into_iter()
                .filter_map(|part| convert_gemini_part(part, &mut correlator))
                .collect();
            if blocks.is_empty() {
                warn!("Skipping Gemini content with no convertible parts, role {:?}", role);
                continue;
            }

            let role = match role.as_deref() {
                Some("model") | Some("assistant") => MessagesRole::Assistant,
                _ => MessagesRole::User,
            };
            messages.push(MessagesMessage {
                role,
                content: collapse_single_text(blocks),
            });
        }

        let system = req
            .system_instruction
            .map(|instruction| instruction.joined_text("\n"))
            .filter(|text| !text.trim().is_empty())
            .map(MessagesSystemPrompt::Single);

        let thinking = config
            .thinking_config
            .and_then(|thinking| thinking.thinking_budget)
            .filter(|budget| *budget > 0)
            .and_then(|budget| {
                clamp_thinking_budget(u32::try_from(budget).unwrap_or(u32::MAX), max_tokens)
            })
            .map(|budget| ThinkingConfig::Enabled {
                budget_tokens: Some(budget),
            });

        let sanitizer = SchemaSanitizer::for_conversion(ApiFormat::Gemini, ApiFormat::Anthropic);
        let tools: Vec<MessagesTool> = req
            .tools
            .unwrap_or_default()
            .into_iter()
            .flat_map(|tool| tool.function_declarations.unwrap_or_default())
            .map(|declaration| MessagesTool {
                input_schema: sanitizer.sanitize(declaration.parameters.as_ref()),
                name: declaration.name,
                description: declaration.description,
            })
            .collect();
        let tool_choice = if tools.is_empty() {
            None
        } else {
            convert_gemini_tool_config(req.tool_config.as_ref())
        };

        Ok(MessagesRequest {
            model: ctx.model.to_string(),
            messages,
            max_tokens: Some(max_tokens),
            system,
            metadata: None,
            thinking,
            temperature: config.temperature,
            top_p: config.top_p,
            top_k: config.top_k,
            stream: req.stream,
            stop_sequences: config.stop_sequences,
            tools: (!tools.is_empty()).then_some(tools),
            tool_choice,
        })
    }
}

fn convert_gemini_part(
    part: Part,
    correlator: &mut ToolCallCorrelator,
) -> Option<MessagesContentBlock> {
    if let Some(call) = part.function_call {
        return Some(MessagesContentBlock::ToolUse {
            id: correlator.next_call_id(&call.name),
            name: call.name,
            input: call.args,
        });
    }
    if let Some(response) = part.function_response {
        return Some(MessagesContentBlock::ToolResult {
            tool_use_id: correlator.next_response_id(&response.name),
            is_error: None,
            content: Some(MessagesMessageContent::Single(function_response_text(
                &response.response,
            ))),
        });
    }
    if let Some(inline) = part.inline_data {
        return Some(MessagesContentBlock::Image {
            source: MessagesImageSource::Base64 {
                media_type: inline.mime_type,
                data: inline.data,
            },
        });
    }

    let text = part.text.filter(|text| !text.is_empty())?;
    if part.thought.unwrap_or(false) {
        Some(MessagesContentBlock::Thinking {
            thinking: text,
            signature: part.thought_signature,
        })
    } else {
        Some(MessagesContentBlock::Text { text })
    }
}

fn collapse_single_text(mut blocks: Vec<MessagesContentBlock>) -> MessagesMessageContent {
    if let [MessagesContentBlock::Text { .. }] = blocks.as_slice() {
        if let Some(MessagesContentBlock::Text { text }) = blocks.pop() {
            return MessagesMessageContent::Single(text);
        }
    }
    MessagesMessageContent::Blocks(blocks)
}

/// `functionCallingConfig.mode` as an Anthropic tool choice
fn convert_gemini_tool_config(tool_config: Option<&Value>) -> Option<MessagesToolChoice> {
    let calling = tool_config?.get("functionCallingConfig")?;
    let mode = calling.get("mode").and_then(Value::as_str)?;
    let allowed: Vec<&str> = calling
        .get("allowedFunctionNames")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let (kind, name) = match mode.to_ascii_uppercase().as_str() {
        "ANY" => match allowed.as_slice() {
            [only] => (MessagesToolChoiceType::Tool, Some(only.to_string())),
            _ => (MessagesToolChoiceType::Any, None),
        },
        "NONE" => (MessagesToolChoiceType::None, None),
        _ => (MessagesToolChoiceType::Auto, None),
    };

    Some(MessagesToolChoice {
        kind,
        name,
        disable_parallel_tool_use: None,
    })
}

// ============================================================================
// ANTHROPIC -> ANTHROPIC
// ============================================================================

/// Moves image blocks ahead of the other blocks of each message, keeping the
/// relative order within both groups. Everything else in the body is untouched.
pub fn reorder_images_first(body: &mut Value) {
    let Some(messages) = body.get_mut("messages").and_then(Value::as_array_mut) else {
        return;
    };

    for message in messages {
        let Some(blocks) = message.get_mut("content").and_then(Value::as_array_mut) else {
            continue;
        };
        let (images, others): (Vec<Value>, Vec<Value>) = blocks
            .drain(..)
            .partition(|block| block.get("type").and_then(Value::as_str) == Some("image"));
        blocks.extend(images);
        blocks.extend(others);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::ConversionSettings;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn convert_openai(body: Value, settings: &ConversionSettings) -> Value {
        let req: ChatCompletionsRequest = serde_json::from_value(body).unwrap();
        let ctx = ConversionContext::new("claude-sonnet-4-20250514", settings);
        let converted = MessagesRequest::try_from((req, &ctx)).unwrap();
        serde_json::to_value(converted).unwrap()
    }

    #[test]
    fn test_openai_system_messages_and_plain_text() {
        let converted = convert_openai(
            json!({
                "model": "gpt-4o",
                "max_tokens": 512,
                "messages": [
                    {"role": "system", "content": "Be brief."},
                    {"role": "system", "content": "Answer in English."},
                    {"role": "user", "content": "Hi"}
                ],
                "stop": "END",
                "temperature": 0.5
            }),
            &ConversionSettings::default(),
        );

        assert_eq!(
            converted,
            json!({
                "model": "claude-sonnet-4-20250514",
                "messages": [{"role": "user", "content": "Hi"}],
                "max_tokens": 512,
                "system": "Be brief.\n\nAnswer in English.",
                "temperature": 0.5,
                "stop_sequences": ["END"]
            })
        );
    }

    #[test]
    fn test_openai_thinking_markers_become_blocks() {
        let converted = convert_openai(
            json!({
                "model": "gpt-4o",
                "messages": [
                    {"role": "assistant", "content": "<thinking>\nplan\n</thinking>\n\nanswer"}
                ]
            }),
            &ConversionSettings::default(),
        );

        assert_eq!(
            converted["messages"][0]["content"],
            json!([
                {"type": "thinking", "thinking": "plan"},
                {"type": "text", "text": "answer"}
            ])
        );
        assert_eq!(converted["max_tokens"], json!(64000));
    }

    #[test]
    fn test_openai_tool_round_trip_merges_tool_results() {
        let converted = convert_openai(
            json!({
                "model": "gpt-4o",
                "max_tokens": 1000,
                "messages": [
                    {"role": "user", "content": "Weather?"},
                    {"role": "assistant", "content": null, "tool_calls": [
                        {"id": "call_1", "type": "function", "function": {"name": "weather", "arguments": "{\"city\":\"Oslo\"}"}},
                        {"id": "call_2", "type": "function", "function": {"name": "weather", "arguments": "{broken"}}
                    ]},
                    {"role": "tool", "tool_call_id": "call_1", "content": "3C"},
                    {"role": "tool", "tool_call_id": "call_2", "content": "21C"},
                    {"role": "assistant", "content": "Cold and warm."}
                ],
                "tools": [{"type": "function", "function": {"name": "weather", "parameters": {"type": "object", "properties": {"city": {"type": "string"}}}}}],
                "tool_choice": "required",
                "parallel_tool_calls": false
            }),
            &ConversionSettings::default(),
        );

        let messages = converted["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(
            messages[1]["content"],
            json!([
                {"type": "tool_use", "id": "call_1", "name": "weather", "input": {"city": "Oslo"}},
                {"type": "tool_use", "id": "call_2", "name": "weather", "input": {}}
            ])
        );
        assert_eq!(
            messages[2],
            json!({"role": "user", "content": [
                {"type": "tool_result", "tool_use_id": "call_1", "content": "3C"},
                {"type": "tool_result", "tool_use_id": "call_2", "content": "21C"}
            ]})
        );
        assert_eq!(
            converted["tools"],
            json!([{"name": "weather", "input_schema": {"type": "object", "properties": {"city": {"type": "string"}}}}])
        );
        assert_eq!(
            converted["tool_choice"],
            json!({"type": "any", "disable_parallel_tool_use": true})
        );
    }

    #[test]
    fn test_openai_images_precede_text() {
        let converted = convert_openai(
            json!({
                "model": "gpt-4o",
                "max_tokens": 100,
                "messages": [{"role": "user", "content": [
                    {"type": "text", "text": "What is this?"},
                    {"type": "image_url", "image_url": {"url": "data:image/png;base64,AAAA"}},
                    {"type": "image_url", "image_url": {"url": "https://example.com/cat.jpg"}}
                ]}]
            }),
            &ConversionSettings::default(),
        );

        assert_eq!(
            converted["messages"][0]["content"],
            json!([
                {"type": "image", "source": {"type": "base64", "media_type": "image/png", "data": "AAAA"}},
                {"type": "image", "source": {"type": "url", "url": "https://example.com/cat.jpg"}},
                {"type": "text", "text": "What is this?"}
            ])
        );
    }

    #[test]
    fn test_openai_reasoning_effort_enables_thinking() {
        let converted = convert_openai(
            json!({
                "model": "o3",
                "max_tokens": 4096,
                "reasoning_effort": "high",
                "messages": [{"role": "user", "content": "Prove it"}]
            }),
            &ConversionSettings::default(),
        );
        assert_eq!(
            converted["thinking"],
            json!({"type": "enabled", "budget_tokens": 4095})
        );

        let converted = convert_openai(
            json!({
                "model": "o3",
                "max_tokens": 512,
                "reasoning_effort": "low",
                "messages": [{"role": "user", "content": "Prove it"}]
            }),
            &ConversionSettings::default(),
        );
        assert_eq!(converted.get("thinking"), None);
    }

    #[test]
    fn test_openai_unknown_model_without_max_tokens_fails() {
        let req: ChatCompletionsRequest = serde_json::from_value(json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": "Hi"}]
        }))
        .unwrap();
        let settings = ConversionSettings::default();
        let ctx = ConversionContext::new("my-private-model", &settings);

        let err = MessagesRequest::try_from((req, &ctx)).unwrap_err();
        assert!(matches!(err, TransformError::UnknownModel(_)));
    }

    #[test]
    fn test_gemini_history_gets_correlated_tool_ids() {
        let req: GenerateContentRequest = serde_json::from_value(json!({
            "system_instruction": {"parts": [{"text": "You are a forecaster."}]},
            "contents": [
                {"role": "user", "parts": [{"text": "Oslo and Rome?"}]},
                {"role": "model", "parts": [
                    {"text": "checking", "thought": true},
                    {"functionCall": {"name": "weather", "args": {"city": "Oslo"}}},
                    {"functionCall": {"name": "weather", "args": {"city": "Rome"}}}
                ]},
                {"role": "user", "parts": [
                    {"functionResponse": {"name": "weather", "response": {"content": "3C"}}},
                    {"functionResponse": {"name": "weather", "response": {"temp": 21}}}
                ]},
                {"role": "model", "parts": [{"text": ""}]}
            ],
            "generationConfig": {"maxOutputTokens": 2048, "topK": 40, "thinkingConfig": {"thinkingBudget": 1500}}
        }))
        .unwrap();
        let settings = ConversionSettings::default();
        let ctx = ConversionContext::new("claude-3-5-sonnet-latest", &settings);

        let converted = serde_json::to_value(MessagesRequest::try_from((req, &ctx)).unwrap()).unwrap();

        assert_eq!(
            converted,
            json!({
                "model": "claude-3-5-sonnet-latest",
                "messages": [
                    {"role": "user", "content": "Oslo and Rome?"},
                    {"role": "assistant", "content": [
                        {"type": "thinking", "thinking": "checking"},
                        {"type": "tool_use", "id": "call_weather_0001", "name": "weather", "input": {"city": "Oslo"}},
                        {"type": "tool_use", "id": "call_weather_0002", "name": "weather", "input": {"city": "Rome"}}
                    ]},
                    {"role": "user", "content": [
                        {"type": "tool_result", "tool_use_id": "call_weather_0001", "content": "3C"},
                        {"type": "tool_result", "tool_use_id": "call_weather_0002", "content": "{\"temp\":21}"}
                    ]}
                ],
                "max_tokens": 2048,
                "system": "You are a forecaster.",
                "thinking": {"type": "enabled", "budget_tokens": 1500},
                "top_k": 40
            })
        );
    }

    #[test]
    fn test_gemini_tool_config_maps_to_tool_choice() {
        let config = json!({"functionCallingConfig": {"mode": "ANY", "allowedFunctionNames": ["weather"]}});
        assert_eq!(
            convert_gemini_tool_config(Some(&config)),
            Some(MessagesToolChoice {
                kind: MessagesToolChoiceType::Tool,
                name: Some("weather".to_string()),
                disable_parallel_tool_use: None,
            })
        );
        assert_eq!(convert_gemini_tool_config(None), None);
    }

    #[test]
    fn test_reorder_images_first_keeps_relative_order() {
        let mut body = json!({
            "model": "claude-3-opus",
            "custom_field": 1,
            "messages": [
                {"role": "user", "content": [
                    {"type": "text", "text": "a"},
                    {"type": "image", "source": {"type": "url", "url": "one"}},
                    {"type": "text", "text": "b"},
                    {"type": "image", "source": {"type": "url", "url": "two"}}
                ]},
                {"role": "assistant", "content": "plain"}
            ]
        });

        reorder_images_first(&mut body);

        assert_eq!(
            body,
            json!({
                "model": "claude-3-opus",
                "custom_field": 1,
                "messages": [
                    {"role": "user", "content": [
                        {"type": "image", "source": {"type": "url", "url": "one"}},
                        {"type": "image", "source": {"type": "url", "url": "two"}},
                        {"type": "text", "text": "a"},
                        {"type": "text", "text": "b"}
                    ]},
                    {"role": "assistant", "content": "plain"}
                ]
            })
        );
    }
}
