//! Responses returned to Gemini clients

use crate::apis::*;
use crate::clients::TransformError;
use crate::transformer::{parse_arguments, ConversionContext};

// ============================================================================
// OPENAI -> GEMINI
// ============================================================================

impl TryFrom<(ChatCompletionsResponse, &ConversionContext<'_>)> for GenerateContentResponse {
    type Error = TransformError;

    fn try_from(
        (resp, ctx): (ChatCompletionsResponse, &ConversionContext<'_>),
    ) -> Result<Self, Self::Error> {
        let mut parts = Vec::new();
        let mut finish_reason = GeminiFinishReason::Stop;

        if let Some(choice) = resp.choices.into_iter().next() {
            if let Some(reason) = choice.finish_reason {
                finish_reason = reason.into();
            }
            let message = choice.message;
            if let Some(reasoning) = message.reasoning_content.filter(|r| !r.is_empty()) {
                parts.push(Part::thought(reasoning));
            }
            if let Some(text) = message.content.filter(|text| !text.is_empty()) {
                parts.push(Part::text(text));
            }
            for call in message.tool_calls.unwrap_or_default() {
                let args = parse_arguments(&call.function.arguments);
                parts.push(Part::function_call(call.function.name, args));
            }
        }

        Ok(model_response(
            parts,
            finish_reason,
            resp.usage.map(Into::into),
            ctx,
            (!resp.id.is_empty()).then_some(resp.id),
        ))
    }
}

// ============================================================================
// ANTHROPIC -> GEMINI
// ============================================================================

impl TryFrom<(MessagesResponse, &ConversionContext<'_>)> for GenerateContentResponse {
    type Error = TransformError;

    fn try_from(
        (resp, ctx): (MessagesResponse, &ConversionContext<'_>),
    ) -> Result<Self, Self::Error> {
        let parts = resp
            .content
            .into_iter()
            .filter_map(|block| match block {
                MessagesContentBlock::Text { text } if !text.is_empty() => Some(Part::text(text)),
                MessagesContentBlock::Thinking {
                    thinking,
                    signature,
                } => Some(Part {
                    thought_signature: signature,
                    ..Part::thought(thinking)
                }),
                MessagesContentBlock::ToolUse { name, input, .. } => {
                    Some(Part::function_call(name, input))
                }
                _ => None,
            })
            .collect();

        let finish_reason = resp
            .stop_reason
            .map(Into::into)
            .unwrap_or(GeminiFinishReason::Stop);

        Ok(model_response(
            parts,
            finish_reason,
            Some(resp.usage.into()),
            ctx,
            (!resp.id.is_empty()).then_some(resp.id),
        ))
    }
}

/// One candidate at index 0; an empty part list gets a single empty text part
fn model_response(
    parts: Vec<Part>,
    finish_reason: GeminiFinishReason,
    usage_metadata: Option<UsageMetadata>,
    ctx: &ConversionContext<'_>,
    response_id: Option<String>,
) -> GenerateContentResponse {
    let parts = if parts.is_empty() {
        vec![Part::text("")]
    } else {
        parts
    };

    GenerateContentResponse {
        candidates: vec![Candidate {
            content: Some(Content::new("model", parts)),
            finish_reason: Some(finish_reason),
            index: Some(0),
        }],
        usage_metadata,
        model_version: Some(ctx.model.to_string()),
        response_id,
    }
}
