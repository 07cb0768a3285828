//! Gemini `streamGenerateContent` chunks from OpenAI chunks and Anthropic events
//!
//! Text is forwarded as it arrives. Function calls only exist whole in Gemini,
//! so their arguments are buffered and written with the final chunk.

use tracing::debug;

use super::{SseEvent, StreamState, ToolCallBuffer};
use crate::apis::*;
use crate::clients::ConversionResult;
use crate::transformer::{parse_arguments, random_alphanumeric};

// ============================================================================
// OPENAI -> GEMINI
// ============================================================================

pub fn from_openai(
    state: &mut StreamState,
    chunk: ChatCompletionsStreamResponse,
) -> ConversionResult<Vec<SseEvent>> {
    let mut events = Vec::new();
    if state.is_closed() {
        return Ok(events);
    }

    if let Some(reason) = state.pending_finish.take() {
        if let Some(usage) = chunk.usage {
            state.record_usage(usage);
        }
        events.push(final_chunk(state, reason.into())?);
        return Ok(events);
    }

    ensure_started(state, &chunk.id);
    if let Some(usage) = chunk.usage.clone() {
        state.record_usage(usage);
    }

    let Some(choice) = chunk.choices.into_iter().next() else {
        return Ok(events);
    };
    let delta = choice.delta;

    let mut parts = Vec::new();
    if let Some(reasoning) = delta.reasoning_content.filter(|r| !r.is_empty()) {
        parts.push(Part::thought(reasoning));
    }
    if let Some(text) = delta.content.filter(|text| !text.is_empty()) {
        parts.push(Part::text(text));
    }
    if !parts.is_empty() {
        events.push(SseEvent::json(&candidate_chunk(state, parts, None))?);
    }

    for tool in delta.tool_calls.unwrap_or_default() {
        let ordinal = state.tool_calls.len() as u32;
        let buffer = state
            .tool_calls
            .entry(tool.index)
            .or_insert_with(|| ToolCallBuffer {
                content_index: ordinal,
                ..Default::default()
            });
        if let Some(id) = tool.id {
            buffer.id = id;
        }
        if let Some(function) = tool.function {
            if let Some(name) = function.name.filter(|name| !name.is_empty()) {
                buffer.name = name;
            }
            if let Some(arguments) = function.arguments {
                buffer.arguments.push_str(&arguments);
            }
        }
        state.saw_tool_call = true;
    }

    if let Some(reason) = choice.finish_reason {
        match chunk.usage {
            Some(_) => events.push(final_chunk(state, reason.into())?),
            None => state.pending_finish = Some(reason),
        }
    }

    Ok(events)
}

// ============================================================================
// ANTHROPIC -> GEMINI
// ============================================================================

pub fn from_anthropic(
    state: &mut StreamState,
    event: MessagesStreamEvent,
) -> ConversionResult<Vec<SseEvent>> {
    let mut events = Vec::new();
    if state.is_closed() {
        return Ok(events);
    }

    match event {
        MessagesStreamEvent::MessageStart { message } => {
            ensure_started(state, &message.id);
            state.record_usage(message.usage.into());
        }

        MessagesStreamEvent::ContentBlockStart {
            index,
            content_block: MessagesContentBlock::ToolUse { id, name, input },
        } => {
            ensure_started(state, "");
            let ordinal = state.tool_calls.len() as u32;
            let arguments = match &input {
                serde_json::Value::Object(map) if !map.is_empty() => input.to_string(),
                _ => String::new(),
            };
            state.saw_tool_call = true;
            state.tool_calls.insert(
                index,
                ToolCallBuffer {
                    id,
                    name,
                    arguments,
                    content_index: ordinal,
                    ..Default::default()
                },
            );
        }

        MessagesStreamEvent::ContentBlockDelta { index, delta } => {
            ensure_started(state, "");
            match delta {
                MessagesContentDelta::TextDelta { text } if !text.is_empty() => {
                    events.push(SseEvent::json(&candidate_chunk(
                        state,
                        vec![Part::text(text)],
                        None,
                    ))?);
                }
                MessagesContentDelta::ThinkingDelta { thinking } if !thinking.is_empty() => {
                    events.push(SseEvent::json(&candidate_chunk(
                        state,
                        vec![Part::thought(thinking)],
                        None,
                    ))?);
                }
                MessagesContentDelta::InputJsonDelta { partial_json } => {
                    match state.tool_calls.get_mut(&index) {
                        Some(tool) => tool.arguments.push_str(&partial_json),
                        None => debug!("argument delta for unknown content block {}", index),
                    }
                }
                _ => {}
            }
        }

        MessagesStreamEvent::MessageDelta { delta, usage } => {
            ensure_started(state, "");
            let prompt_tokens = match usage.input_tokens {
                0 => state.usage.as_ref().map_or(0, |u| u.prompt_tokens),
                tokens => tokens,
            };
            state.record_usage(Usage::new(prompt_tokens, usage.output_tokens));

            if let Some(stop_reason) = delta.stop_reason {
                events.push(final_chunk(state, stop_reason.into())?);
            }
        }

        MessagesStreamEvent::MessageStop => {
            events.extend(finish(state)?);
        }

        MessagesStreamEvent::Error { error } => {
            debug!("upstream stream error: {}", error);
            events.push(SseEvent::data(serde_json::json!({ "error": error }).to_string()));
        }

        MessagesStreamEvent::ContentBlockStart { .. }
        | MessagesStreamEvent::ContentBlockStop { .. }
        | MessagesStreamEvent::Ping => {}
    }

    Ok(events)
}

// ============================================================================
// END OF STREAM
// ============================================================================

/// Flushes buffered calls when upstream ends without a finish reason
pub fn finish(state: &mut StreamState) -> ConversionResult<Vec<SseEvent>> {
    if state.is_closed() {
        return Ok(Vec::new());
    }
    if !state.has_sent_start {
        state.close();
        return Ok(Vec::new());
    }

    let finish_reason = state
        .pending_finish
        .take()
        .map(Into::into)
        .unwrap_or(GeminiFinishReason::Stop);
    Ok(vec![final_chunk(state, finish_reason)?])
}

// ============================================================================
// HELPERS
// ============================================================================

fn ensure_started(state: &mut StreamState, upstream_id: &str) {
    if state.has_sent_start {
        return;
    }
    state.has_sent_start = true;
    state.message_id = if upstream_id.is_empty() {
        random_alphanumeric(24)
    } else {
        upstream_id.to_string()
    };
}

fn candidate_chunk(
    state: &StreamState,
    parts: Vec<Part>,
    finish_reason: Option<GeminiFinishReason>,
) -> GenerateContentResponse {
    GenerateContentResponse {
        candidates: vec![Candidate {
            content: Some(Content::new("model", parts)),
            finish_reason,
            index: Some(0),
        }],
        usage_metadata: None,
        model_version: Some(state.model.clone()),
        response_id: Some(state.message_id.clone()),
    }
}

/// Buffered calls, the finish reason and usage in one last chunk
fn final_chunk(
    state: &mut StreamState,
    finish_reason: GeminiFinishReason,
) -> ConversionResult<SseEvent> {
    let mut parts: Vec<Part> = state
        .tools_in_order()
        .into_iter()
        .map(|tool| Part::function_call(tool.name.clone(), parse_arguments(&tool.arguments)))
        .collect();
    if parts.is_empty() {
        parts.push(Part::text(""));
    }

    let mut chunk = candidate_chunk(state, parts, Some(finish_reason));
    chunk.usage_metadata = Some(state.usage.take().map(Into::into).unwrap_or_default());

    state.finish_sent = true;
    state.close();
    SseEvent::json(&chunk)
}
