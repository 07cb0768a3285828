//! Requests targeting the OpenAI Chat Completions API

use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, warn};

use super::function_response_text;
use crate::apis::*;
use crate::clients::TransformError;
use crate::transformer::reasoning::ReasoningMapper;
use crate::transformer::schema::SchemaSanitizer;
use crate::transformer::tool_ids::ToolCallCorrelator;
use crate::transformer::{data_url, wrap_thinking, ConversionContext, ExtractText};
use crate::ApiFormat;

// ============================================================================
// ANTHROPIC -> OPENAI
// ============================================================================

impl TryFrom<(MessagesRequest, &ConversionContext<'_>)> for ChatCompletionsRequest {
    type Error = TransformError;

    fn try_from(
        (req, ctx): (MessagesRequest, &ConversionContext<'_>),
    ) -> Result<Self, Self::Error> {
        let mut messages = Vec::new();

        if let Some(system) = req.system {
            let text = system.extract_text();
            if !text.trim().is_empty() {
                messages.push(Message::text(Role::System, text));
            }
        }

        for message in req.messages {
            match message.role {
                MessagesRole::User => messages.extend(convert_user_message(message.content)),
                MessagesRole::Assistant => {
                    messages.extend(convert_assistant_message(message.content))
                }
            }
        }
        drop_unanswered_tool_calls(&mut messages);

        let sanitizer = SchemaSanitizer::for_conversion(ApiFormat::Anthropic, ApiFormat::OpenAI);
        let tools: Vec<Tool> = req
            .tools
            .unwrap_or_default()
            .into_iter()
            .map(|tool| {
                let parameters = sanitizer.sanitize(Some(&tool.input_schema));
                function_tool(tool.name, tool.description, parameters)
            })
            .collect();
        let (tool_choice, parallel_tool_calls) =
            convert_anthropic_tool_choice(req.tool_choice, !tools.is_empty());

        if let Some(top_k) = req.top_k {
            debug!("Dropping top_k={}, OpenAI has no equivalent", top_k);
        }

        let mut max_tokens = req.max_tokens;
        let mut max_completion_tokens = None;
        let mut reasoning_effort = None;
        if let Some(thinking) = req.thinking.filter(ThinkingConfig::is_enabled) {
            let mapper = ReasoningMapper::new(ctx.settings);
            reasoning_effort = Some(mapper.effort_for_budget(thinking.budget().map(i64::from))?);
            max_completion_tokens = Some(
                max_tokens
                    .take()
                    .or(ctx.settings.openai_reasoning_max_tokens)
                    .ok_or(TransformError::ReasoningTokensRequired)?,
            );
        }

        let user = req
            .metadata
            .as_ref()
            .and_then(|metadata| metadata.get("user_id"))
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(ChatCompletionsRequest {
            model: ctx.model.to_string(),
            messages,
            temperature: req.temperature,
            top_p: req.top_p,
            max_tokens,
            max_completion_tokens,
            stream: req.stream,
            stop: req.stop_sequences.map(StopSequences::Multiple),
            user,
            tools: (!tools.is_empty()).then_some(tools),
            tool_choice,
            parallel_tool_calls,
            reasoning_effort,
            ..Default::default()
        })
    }
}

/// Tool results become `tool` messages ahead of whatever the user said
fn convert_user_message(content: MessagesMessageContent) -> Vec<Message> {
    let blocks = match content {
        MessagesMessageContent::Single(text) => return vec![Message::text(Role::User, text)],
        MessagesMessageContent::Blocks(blocks) => blocks,
    };

    let mut messages = Vec::new();
    let mut parts = Vec::new();
    for block in blocks {
        match block {
            MessagesContentBlock::ToolResult {
                tool_use_id,
                content,
                ..
            } => messages.push(tool_message(
                tool_use_id,
                content.map(|content| content.extract_text()).unwrap_or_default(),
            )),
            MessagesContentBlock::Text { text } => parts.push(ContentPart::Text { text }),
            MessagesContentBlock::Image { source } => parts.push(ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: image_source_url(source),
                    detail: None,
                },
            }),
            other => warn!(
                "Dropping user {} block with no OpenAI equivalent",
                other.block_type()
            ),
        }
    }

    if let Some(content) = collapse_parts(parts) {
        messages.push(Message {
            role: Role::User,
            content: Some(content),
            name: None,
            tool_calls: None,
            tool_call_id: None,
        });
    }
    messages
}

fn convert_assistant_message(content: MessagesMessageContent) -> Option<Message> {
    let (text, tool_calls) = match content {
        MessagesMessageContent::Single(text) => (text, Vec::new()),
        MessagesMessageContent::Blocks(blocks) => {
            let mut thinking = Vec::new();
            let mut texts = Vec::new();
            let mut tool_calls = Vec::new();
            for block in blocks {
                match block {
                    MessagesContentBlock::Text { text } => texts.push(text),
                    MessagesContentBlock::Thinking { thinking: t, .. } => thinking.push(t),
                    MessagesContentBlock::ToolUse { id, name, input } => {
                        tool_calls.push(tool_call(id, name, &input))
                    }
                    other => warn!(
                        "Dropping assistant {} block with no OpenAI equivalent",
                        other.block_type()
                    ),
                }
            }
            let text = texts.join("\n");
            let text = if thinking.is_empty() {
                text
            } else {
                wrap_thinking(&thinking.join("\n"), &text)
            };
            (text, tool_calls)
        }
    };

    if text.is_empty() && tool_calls.is_empty() {
        return None;
    }

    Some(Message {
        role: Role::Assistant,
        content: (!text.is_empty()).then_some(MessageContent::Text(text)),
        name: None,
        tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
        tool_call_id: None,
    })
}

/// OpenAI rejects a history where a tool call is never answered. Calls with
/// no later `tool` message are removed; an assistant turn left with nothing
/// gets empty content.
fn drop_unanswered_tool_calls(messages: &mut [Message]) {
    let mut answered = HashSet::new();

    for message in messages.iter_mut().rev() {
        if message.role == Role::Tool {
            if let Some(id) = &message.tool_call_id {
                answered.insert(id.clone());
            }
            continue;
        }
        let Some(calls) = message.tool_calls.take() else {
            continue;
        };

        let (kept, dropped): (Vec<ToolCall>, Vec<ToolCall>) =
            calls.into_iter().partition(|call| answered.contains(&call.id));
        if !dropped.is_empty() {
            warn!(
                "Removing {} tool call(s) with no matching tool result",
                dropped.len()
            );
        }

        if !kept.is_empty() {
            message.tool_calls = Some(kept);
        } else if message.content.is_none() {
            message.content = Some(MessageContent::Text(String::new()));
        }
    }
}

fn convert_anthropic_tool_choice(
    tool_choice: Option<MessagesToolChoice>,
    has_tools: bool,
) -> (Option<ToolChoice>, Option<bool>) {
    if !has_tools {
        return (None, None);
    }
    let Some(choice) = tool_choice else {
        return (Some(ToolChoice::Type(ToolChoiceType::Auto)), None);
    };

    let parallel_tool_calls = (choice.disable_parallel_tool_use == Some(true)).then_some(false);
    let tool_choice = match (choice.kind, choice.name) {
        (MessagesToolChoiceType::Auto, _) => ToolChoice::Type(ToolChoiceType::Auto),
        (MessagesToolChoiceType::Any, _) => ToolChoice::Type(ToolChoiceType::Required),
        (MessagesToolChoiceType::None, _) => ToolChoice::Type(ToolChoiceType::None),
        (MessagesToolChoiceType::Tool, Some(name)) => named_tool_choice(name),
        (MessagesToolChoiceType::Tool, None) => ToolChoice::Type(ToolChoiceType::Required),
    };

    (Some(tool_choice), parallel_tool_calls)
}

fn image_source_url(source: MessagesImageSource) -> String {
    match source {
        MessagesImageSource::Base64 { media_type, data } => data_url(&media_type, &data),
        MessagesImageSource::Url { url } => url,
    }
}

// ============================================================================
// GEMINI -> OPENAI
// ============================================================================

impl TryFrom<(GenerateContentRequest, &ConversionContext<'_>)> for ChatCompletionsRequest {
    type Error = TransformError;

    fn try_from(
        (req, ctx): (GenerateContentRequest, &ConversionContext<'_>),
    ) -> Result<Self, Self::Error> {
        let mut correlator = ToolCallCorrelator::for_gemini(&req.contents);
        let mut messages = Vec::new();

        if let Some(instruction) = &req.system_instruction {
            let text = instruction.joined_text("\n");
            if !text.trim().is_empty() {
                messages.push(Message::text(Role::System, text));
            }
        }

        for Content { role, parts } in req.contents {
            match role.as_deref() {
                Some("model") | Some("assistant") => {
                    messages.extend(convert_model_parts(parts, &mut correlator))
                }
                _ => messages.extend(convert_user_parts(parts, &mut correlator)),
            }
        }

        let sanitizer = SchemaSanitizer::for_conversion(ApiFormat::Gemini, ApiFormat::OpenAI);
        let config = req.generation_config.unwrap_or_default();

        let response_format = if config.response_mime_type.as_deref() == Some("application/json") {
            Some(match config.response_schema {
                Some(schema) => ResponseFormat {
                    kind: ResponseFormatType::JsonSchema,
                    json_schema: Some(JsonSchemaFormat {
                        name: "response".to_string(),
                        description: None,
                        schema: Some(sanitizer.sanitize(Some(&schema))),
                        strict: Some(true),
                    }),
                },
                None => ResponseFormat {
                    kind: ResponseFormatType::JsonObject,
                    json_schema: None,
                },
            })
        } else {
            None
        };

        let reasoning_effort = match config.thinking_config.and_then(|t| t.thinking_budget) {
            None | Some(0) => None,
            Some(budget) => match ReasoningMapper::new(ctx.settings).effort_for_budget(Some(budget)) {
                Ok(effort) => Some(effort),
                Err(err) => {
                    debug!("Not forwarding thinking budget {}: {}", budget, err);
                    None
                }
            },
        };

        let tools: Vec<Tool> = req
            .tools
            .unwrap_or_default()
            .into_iter()
            .flat_map(|tool| tool.function_declarations.unwrap_or_default())
            .map(|declaration| {
                let parameters = sanitizer.sanitize(declaration.parameters.as_ref());
                function_tool(declaration.name, declaration.description, parameters)
            })
            .collect();
        let tool_choice = (!tools.is_empty()).then(|| convert_gemini_tool_config(req.tool_config.as_ref()));

        Ok(ChatCompletionsRequest {
            model: ctx.model.to_string(),
            messages,
            temperature: config.temperature,
            top_p: config.top_p,
            max_tokens: config.max_output_tokens,
            stream: req.stream,
            stop: config.stop_sequences.map(StopSequences::Multiple),
            tools: (!tools.is_empty()).then_some(tools),
            tool_choice,
            response_format,
            reasoning_effort,
            ..Default::default()
        })
    }
}

fn convert_user_parts(parts: Vec<Part>, correlator: &mut ToolCallCorrelator) -> Vec<Message> {
    let mut messages = Vec::new();
    let mut content = Vec::new();

    for part in parts {
        if let Some(response) = part.function_response {
            let id = correlator.next_response_id(&response.name);
            messages.push(tool_message(id, function_response_text(&response.response)));
        } else if let Some(inline) = part.inline_data {
            content.push(ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: data_url(&inline.mime_type, &inline.data),
                    detail: None,
                },
            });
        } else if let Some(text) = part.text.filter(|text| !text.is_empty()) {
            content.push(ContentPart::Text { text });
        }
    }

    if let Some(content) = collapse_parts(content) {
        messages.push(Message {
            role: Role::User,
            content: Some(content),
            name: None,
            tool_calls: None,
            tool_call_id: None,
        });
    }
    messages
}

fn convert_model_parts(parts: Vec<Part>, correlator: &mut ToolCallCorrelator) -> Option<Message> {
    let mut thoughts = Vec::new();
    let mut texts = Vec::new();
    let mut tool_calls = Vec::new();

    for part in parts {
        if let Some(call) = part.function_call {
            let id = correlator.next_call_id(&call.name);
            tool_calls.push(tool_call(id, call.name, &call.args));
        } else if let Some(text) = part.text.filter(|text| !text.is_empty()) {
            if part.thought.unwrap_or(false) {
                thoughts.push(text);
            } else {
                texts.push(text);
            }
        }
    }

    let text = texts.join("");
    let text = if thoughts.is_empty() {
        text
    } else {
        wrap_thinking(&thoughts.join("\n"), &text)
    };
    if text.is_empty() && tool_calls.is_empty() {
        return None;
    }

    Some(Message {
        role: Role::Assistant,
        content: (!text.is_empty()).then_some(MessageContent::Text(text)),
        name: None,
        tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
        tool_call_id: None,
    })
}

/// `functionCallingConfig.mode` as an OpenAI tool choice, `auto` by default
fn convert_gemini_tool_config(tool_config: Option<&Value>) -> ToolChoice {
    let Some(calling) = tool_config.and_then(|config| config.get("functionCallingConfig")) else {
        return ToolChoice::Type(ToolChoiceType::Auto);
    };
    let mode = calling
        .get("mode")
        .and_then(Value::as_str)
        .unwrap_or("AUTO")
        .to_ascii_uppercase();
    let allowed: Vec<&str> = calling
        .get("allowedFunctionNames")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    match (mode.as_str(), allowed.as_slice()) {
        ("ANY", [only]) => named_tool_choice(only.to_string()),
        ("ANY", _) => ToolChoice::Type(ToolChoiceType::Required),
        ("NONE", _) => ToolChoice::Type(ToolChoiceType::None),
        _ => ToolChoice::Type(ToolChoiceType::Auto),
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn function_tool(name: String, description: Option<String>, parameters: Value) -> Tool {
    Tool {
        tool_type: "function".to_string(),
        function: Function {
            name,
            description,
            parameters: Some(parameters),
            strict: None,
        },
    }
}

fn named_tool_choice(name: String) -> ToolChoice {
    ToolChoice::Function {
        choice_type: "function".to_string(),
        function: FunctionChoice { name },
    }
}

fn tool_call(id: String, name: String, input: &Value) -> ToolCall {
    ToolCall {
        id,
        call_type: "function".to_string(),
        function: FunctionCall {
            name,
            arguments: input.to_string(),
        },
    }
}

fn tool_message(tool_call_id: String, content: String) -> Message {
    Message {
        role: Role::Tool,
        content: Some(MessageContent::Text(content)),
        name: None,
        tool_calls: None,
        tool_call_id: Some(tool_call_id),
    }
}

/// A lone text part collapses to a plain string
fn collapse_parts(mut parts: Vec<ContentPart>) -> Option<MessageContent> {
    match parts.as_slice() {
        [] => None,
        [ContentPart::Text { .. }] => match parts.pop() {
            Some(ContentPart::Text { text }) => Some(MessageContent::Text(text)),
            _ => None,
        },
        _ => Some(MessageContent::Parts(parts)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{ConfigurationError, ConversionSettings};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn convert_anthropic(body: Value, settings: &ConversionSettings) -> Result<Value, TransformError> {
        let req: MessagesRequest = serde_json::from_value(body).unwrap();
        let ctx = ConversionContext::new("gpt-4o", settings);
        let converted = ChatCompletionsRequest::try_from((req, &ctx))?;
        Ok(serde_json::to_value(converted).unwrap())
    }

    fn convert_gemini(body: Value, settings: &ConversionSettings) -> Value {
        let req: GenerateContentRequest = serde_json::from_value(body).unwrap();
        let ctx = ConversionContext::new("gpt-4o", settings);
        serde_json::to_value(ChatCompletionsRequest::try_from((req, &ctx)).unwrap()).unwrap()
    }

    #[test]
    fn test_anthropic_conversation_with_tools() {
        let converted = convert_anthropic(
            json!({
                "model": "claude-3-5-sonnet",
                "max_tokens": 1024,
                "system": [{"type": "text", "text": "You are terse."}],
                "messages": [
                    {"role": "user", "content": [
                        {"type": "text", "text": "Look at this"},
                        {"type": "image", "source": {"type": "base64", "media_type": "image/png", "data": "AAAA"}}
                    ]},
                    {"role": "assistant", "content": [
                        {"type": "thinking", "thinking": "need weather", "signature": "sig"},
                        {"type": "tool_use", "id": "toolu_1", "name": "weather", "input": {"city": "Oslo"}},
                        {"type": "tool_use", "id": "toolu_2", "name": "clock", "input": {}}
                    ]},
                    {"role": "user", "content": [
                        {"type": "tool_result", "tool_use_id": "toolu_1", "content": [{"type": "text", "text": "3C"}]},
                        {"type": "tool_result", "tool_use_id": "toolu_2", "content": "noon"}
                    ]}
                ],
                "tools": [{"name": "weather", "description": "Weather", "input_schema": {"type": "object", "$schema": "x", "properties": {"city": {"type": "string", "format": "name"}}}}],
                "top_k": 5,
                "stop_sequences": ["END"]
            }),
            &ConversionSettings::default(),
        )
        .unwrap();

        assert_eq!(
            converted,
            json!({
                "model": "gpt-4o",
                "messages": [
                    {"role": "system", "content": "You are terse."},
                    {"role": "user", "content": [
                        {"type": "text", "text": "Look at this"},
                        {"type": "image_url", "image_url": {"url": "data:image/png;base64,AAAA"}}
                    ]},
                    {"role": "assistant", "content": "<thinking>\nneed weather\n</thinking>", "tool_calls": [
                        {"id": "toolu_1", "type": "function", "function": {"name": "weather", "arguments": "{\"city\":\"Oslo\"}"}},
                        {"id": "toolu_2", "type": "function", "function": {"name": "clock", "arguments": "{}"}}
                    ]},
                    {"role": "tool", "content": "3C", "tool_call_id": "toolu_1"},
                    {"role": "tool", "content": "noon", "tool_call_id": "toolu_2"}
                ],
                "max_tokens": 1024,
                "stop": ["END"],
                "tools": [{"type": "function", "function": {"name": "weather", "description": "Weather", "parameters": {"type": "object", "properties": {"city": {"type": "string"}}}}}],
                "tool_choice": "auto"
            })
        );
    }

    #[test]
    fn test_unanswered_tool_calls_are_removed() {
        let converted = convert_anthropic(
            json!({
                "model": "claude-3-5-sonnet",
                "max_tokens": 100,
                "messages": [
                    {"role": "user", "content": "Hi"},
                    {"role": "assistant", "content": [
                        {"type": "tool_use", "id": "toolu_1", "name": "weather", "input": {}}
                    ]},
                    {"role": "user", "content": "Never mind"}
                ]
            }),
            &ConversionSettings::default(),
        )
        .unwrap();

        assert_eq!(
            converted["messages"][1],
            json!({"role": "assistant", "content": ""})
        );
    }

    #[test]
    fn test_redacted_thinking_is_dropped_not_rewritten() {
        let converted = convert_anthropic(
            json!({
                "model": "claude-3-5-sonnet",
                "max_tokens": 100,
                "messages": [
                    {"role": "user", "content": [
                        {"type": "text", "text": "Hi"},
                        {"type": "redacted_thinking", "data": "opaque"}
                    ]},
                    {"role": "assistant", "content": [
                        {"type": "redacted_thinking", "data": "opaque"},
                        {"type": "text", "text": "Hello"}
                    ]}
                ]
            }),
            &ConversionSettings::default(),
        )
        .unwrap();

        assert_eq!(
            converted["messages"],
            json!([
                {"role": "user", "content": "Hi"},
                {"role": "assistant", "content": "Hello"}
            ])
        );
    }

    #[test]
    fn test_thinking_maps_to_reasoning_effort() {
        let settings = ConversionSettings {
            low_reasoning_threshold: Some(4096),
            high_reasoning_threshold: Some(16384),
            ..Default::default()
        };
        let converted = convert_anthropic(
            json!({
                "model": "claude-sonnet-4",
                "max_tokens": 20000,
                "thinking": {"type": "enabled", "budget_tokens": 8000},
                "messages": [{"role": "user", "content": "Think"}]
            }),
            &settings,
        )
        .unwrap();

        assert_eq!(converted["reasoning_effort"], json!("medium"));
        assert_eq!(converted["max_completion_tokens"], json!(20000));
        assert_eq!(converted.get("max_tokens"), None);
    }

    #[test]
    fn test_thinking_without_token_limit_or_thresholds_fails() {
        let settings = ConversionSettings {
            low_reasoning_threshold: Some(4096),
            high_reasoning_threshold: Some(16384),
            ..Default::default()
        };
        let err = convert_anthropic(
            json!({
                "model": "claude-sonnet-4",
                "thinking": {"type": "enabled", "budget_tokens": 8000},
                "messages": [{"role": "user", "content": "Think"}]
            }),
            &settings,
        )
        .unwrap_err();
        assert!(matches!(err, TransformError::ReasoningTokensRequired));

        let err = convert_anthropic(
            json!({
                "model": "claude-sonnet-4",
                "max_tokens": 2000,
                "thinking": {"type": "enabled", "budget_tokens": 8000},
                "messages": [{"role": "user", "content": "Think"}]
            }),
            &ConversionSettings::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            TransformError::Configuration(ConfigurationError::MissingSetting { .. })
        ));
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn test_gemini_repeated_calls_are_correlated() {
        let converted = convert_gemini(
            json!({
                "contents": [
                    {"role": "user", "parts": [{"text": "Oslo and Rome?"}]},
                    {"role": "model", "parts": [
                        {"functionCall": {"name": "weather", "args": {"city": "Oslo"}}},
                        {"functionCall": {"name": "weather", "args": {"city": "Rome"}}}
                    ]},
                    {"role": "user", "parts": [
                        {"functionResponse": {"name": "weather", "response": {"content": "3C"}}},
                        {"functionResponse": {"name": "weather", "response": {"temp": 21}}}
                    ]}
                ]
            }),
            &ConversionSettings::default(),
        );

        assert_eq!(
            converted["messages"],
            json!([
                {"role": "user", "content": "Oslo and Rome?"},
                {"role": "assistant", "tool_calls": [
                    {"id": "call_weather_0001", "type": "function", "function": {"name": "weather", "arguments": "{\"city\":\"Oslo\"}"}},
                    {"id": "call_weather_0002", "type": "function", "function": {"name": "weather", "arguments": "{\"city\":\"Rome\"}"}}
                ]},
                {"role": "tool", "content": "3C", "tool_call_id": "call_weather_0001"},
                {"role": "tool", "content": "{\"temp\":21}", "tool_call_id": "call_weather_0002"}
            ])
        );
    }

    #[test]
    fn test_gemini_generation_config() {
        let converted = convert_gemini(
            json!({
                "systemInstruction": {"parts": [{"text": "Only JSON."}]},
                "contents": [{"role": "user", "parts": [{"text": "List colors"}]}],
                "generationConfig": {
                    "temperature": 0.25,
                    "maxOutputTokens": 300,
                    "stopSequences": ["STOP"],
                    "response_mime_type": "application/json",
                    "response_schema": {"type": "ARRAY", "items": {"type": "STRING"}},
                    "thinkingConfig": {"thinkingBudget": -1}
                },
                "tools": [{"functionDeclarations": [{"name": "lookup", "parameters": {"type": "OBJECT", "properties": {"n": {"type": "INTEGER", "minimum": "1"}}}}]}]
            }),
            &ConversionSettings::default(),
        );

        assert_eq!(
            converted,
            json!({
                "model": "gpt-4o",
                "messages": [
                    {"role": "system", "content": "Only JSON."},
                    {"role": "user", "content": "List colors"}
                ],
                "temperature": 0.25,
                "max_tokens": 300,
                "stop": ["STOP"],
                "tools": [{"type": "function", "function": {"name": "lookup", "parameters": {"type": "object", "properties": {"n": {"type": "integer", "minimum": 1}}}}}],
                "tool_choice": "auto",
                "response_format": {"type": "json_schema", "json_schema": {"name": "response", "schema": {"type": "array", "items": {"type": "string"}}, "strict": true}},
                "reasoning_effort": "high"
            })
        );
    }

    #[test]
    fn test_gemini_budget_without_thresholds_is_not_forwarded() {
        let converted = convert_gemini(
            json!({
                "contents": [{"role": "user", "parts": [{"text": "Hi"}]}],
                "generationConfig": {"thinkingConfig": {"thinkingBudget": 2048}}
            }),
            &ConversionSettings::default(),
        );
        assert_eq!(converted.get("reasoning_effort"), None);
    }
}
