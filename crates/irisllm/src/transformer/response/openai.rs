//! Responses returned to OpenAI clients

use crate::apis::*;
use crate::clients::TransformError;
use crate::transformer::{current_timestamp, random_alphanumeric, wrap_thinking, ConversionContext};

// ============================================================================
// ANTHROPIC -> OPENAI
// ============================================================================

impl TryFrom<(MessagesResponse, &ConversionContext<'_>)> for ChatCompletionsResponse {
    type Error = TransformError;

    fn try_from(
        (resp, ctx): (MessagesResponse, &ConversionContext<'_>),
    ) -> Result<Self, Self::Error> {
        let mut thinking = Vec::new();
        let mut texts = Vec::new();
        let mut tool_calls = Vec::new();

        for block in resp.content {
            match block {
                MessagesContentBlock::Text { text } => texts.push(text),
                MessagesContentBlock::Thinking { thinking: t, .. } => thinking.push(t),
                MessagesContentBlock::ToolUse { id, name, input } => tool_calls.push(ToolCall {
                    id,
                    call_type: "function".to_string(),
                    function: FunctionCall {
                        name,
                        arguments: input.to_string(),
                    },
                }),
                _ => {}
            }
        }

        let finish_reason = if tool_calls.is_empty() {
            resp.stop_reason.map(Into::into).unwrap_or(FinishReason::Stop)
        } else {
            FinishReason::ToolCalls
        };

        Ok(ChatCompletionsResponse {
            id: format!("chatcmpl-{}", resp.id),
            object: "chat.completion".to_string(),
            created: current_timestamp(),
            model: ctx.model.to_string(),
            choices: vec![assistant_choice(
                compose_content(&thinking, &texts),
                tool_calls,
                finish_reason,
            )],
            usage: Some(resp.usage.into()),
            system_fingerprint: None,
        })
    }
}

// ============================================================================
// GEMINI -> OPENAI
// ============================================================================

impl TryFrom<(GenerateContentResponse, &ConversionContext<'_>)> for ChatCompletionsResponse {
    type Error = TransformError;

    fn try_from(
        (resp, ctx): (GenerateContentResponse, &ConversionContext<'_>),
    ) -> Result<Self, Self::Error> {
        let mut thoughts = Vec::new();
        let mut texts = Vec::new();
        let mut tool_calls = Vec::new();

        for part in resp.first_parts() {
            if let Some(call) = &part.function_call {
                tool_calls.push(ToolCall {
                    id: format!("call_{}_{}", call.name, random_alphanumeric(8)),
                    call_type: "function".to_string(),
                    function: FunctionCall {
                        name: call.name.clone(),
                        arguments: call.args.to_string(),
                    },
                });
            } else if let Some(text) = &part.text {
                if part.is_thought() {
                    thoughts.push(text.clone());
                } else {
                    texts.push(text.clone());
                }
            }
        }

        let finish_reason = if tool_calls.is_empty() {
            resp.finish_reason()
                .cloned()
                .map(Into::into)
                .unwrap_or(FinishReason::Stop)
        } else {
            FinishReason::ToolCalls
        };

        Ok(ChatCompletionsResponse {
            id: format!("chatcmpl-{}", random_alphanumeric(29)),
            object: "chat.completion".to_string(),
            created: current_timestamp(),
            model: ctx.model.to_string(),
            choices: vec![assistant_choice(
                compose_content(&thoughts, &texts),
                tool_calls,
                finish_reason,
            )],
            usage: resp.usage_metadata.map(Into::into),
            system_fingerprint: None,
        })
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Concatenated text, reasoning prefixed inside thinking markers
fn compose_content(thinking: &[String], texts: &[String]) -> String {
    let text = texts.concat();
    if thinking.is_empty() {
        text
    } else {
        wrap_thinking(&thinking.join("\n"), &text)
    }
}

/// Content goes null when the message is nothing but tool calls
fn assistant_choice(content: String, tool_calls: Vec<ToolCall>, finish_reason: FinishReason) -> Choice {
    let content = if content.is_empty() && !tool_calls.is_empty() {
        None
    } else {
        Some(content)
    };

    Choice {
        index: 0,
        message: ResponseMessage {
            role: Role::Assistant,
            content,
            refusal: None,
            reasoning_content: None,
            tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
        },
        finish_reason: Some(finish_reason),
        logprobs: None,
    }
}
