//! Responses returned to Anthropic clients

use crate::apis::*;
use crate::clients::TransformError;
use crate::transformer::{
    parse_arguments, random_alphanumeric, split_thinking, ConversionContext, TextSegment,
};

// ============================================================================
// OPENAI -> ANTHROPIC
// ============================================================================

impl TryFrom<(ChatCompletionsResponse, &ConversionContext<'_>)> for MessagesResponse {
    type Error = TransformError;

    fn try_from(
        (resp, ctx): (ChatCompletionsResponse, &ConversionContext<'_>),
    ) -> Result<Self, Self::Error> {
        let choice = resp.choices.into_iter().next();
        let mut content = Vec::new();
        let mut stop_reason = MessagesStopReason::EndTurn;

        if let Some(choice) = choice {
            if let Some(reason) = choice.finish_reason {
                stop_reason = reason.into();
            }
            let message = choice.message;

            for call in message.tool_calls.unwrap_or_default() {
                content.push(MessagesContentBlock::ToolUse {
                    input: parse_arguments(&call.function.arguments),
                    id: call.id,
                    name: call.function.name,
                });
            }
            if let Some(reasoning) = message.reasoning_content.filter(|r| !r.is_empty()) {
                content.push(MessagesContentBlock::Thinking {
                    thinking: reasoning,
                    signature: None,
                });
            }
            if let Some(text) = message.content.filter(|text| !text.is_empty()) {
                content.extend(split_thinking(&text).into_iter().map(|segment| match segment {
                    TextSegment::Text(text) => MessagesContentBlock::Text { text },
                    TextSegment::Thinking(thinking) => MessagesContentBlock::Thinking {
                        thinking,
                        signature: None,
                    },
                }));
            }
        }

        Ok(MessagesResponse {
            id: if resp.id.is_empty() {
                "msg_openai".to_string()
            } else {
                resp.id
            },
            obj_type: "message".to_string(),
            role: MessagesRole::Assistant,
            content,
            model: ctx.model.to_string(),
            stop_reason: Some(stop_reason),
            stop_sequence: None,
            usage: resp.usage.map(Into::into).unwrap_or_default(),
        })
    }
}

// ============================================================================
// GEMINI -> ANTHROPIC
// ============================================================================

impl TryFrom<(GenerateContentResponse, &ConversionContext<'_>)> for MessagesResponse {
    type Error = TransformError;

    fn try_from(
        (resp, ctx): (GenerateContentResponse, &ConversionContext<'_>),
    ) -> Result<Self, Self::Error> {
        let mut content = Vec::new();
        let mut saw_tool_call = false;

        for part in resp.first_parts() {
            if let Some(call) = &part.function_call {
                saw_tool_call = true;
                content.push(MessagesContentBlock::ToolUse {
                    id: format!("toolu_{}", random_alphanumeric(24)),
                    name: call.name.clone(),
                    input: call.args.clone(),
                });
            } else if let Some(text) = part.text.as_ref().filter(|text| !text.is_empty()) {
                content.push(if part.is_thought() {
                    MessagesContentBlock::Thinking {
                        thinking: text.clone(),
                        signature: part.thought_signature.clone(),
                    }
                } else {
                    MessagesContentBlock::Text { text: text.clone() }
                });
            }
        }

        let stop_reason = if saw_tool_call {
            MessagesStopReason::ToolUse
        } else {
            resp.finish_reason()
                .cloned()
                .map(Into::into)
                .unwrap_or(MessagesStopReason::EndTurn)
        };

        Ok(MessagesResponse {
            id: format!("msg_{}", random_alphanumeric(24)),
            obj_type: "message".to_string(),
            role: MessagesRole::Assistant,
            content,
            model: ctx.model.to_string(),
            stop_reason: Some(stop_reason),
            stop_sequence: None,
            usage: resp.usage_metadata.map(Into::into).unwrap_or_default(),
        })
    }
}
