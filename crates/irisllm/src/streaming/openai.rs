//! OpenAI `chat.completion.chunk` streams from Anthropic events and Gemini chunks
//!
//! Every chunk carries one choice at index 0. The first chunk written also
//! carries `role: assistant`, and exactly one chunk carries a finish reason.

use tracing::warn;

use super::{SseEvent, StreamState, ToolCallBuffer};
use crate::apis::*;
use crate::clients::ConversionResult;
use crate::transformer::tool_ids::positional_call_id;
use crate::transformer::{current_timestamp, random_alphanumeric};

// ============================================================================
// ANTHROPIC -> OPENAI
// ============================================================================

pub fn from_anthropic(
    state: &mut StreamState,
    event: MessagesStreamEvent,
) -> ConversionResult<Vec<SseEvent>> {
    let mut events = Vec::new();
    if state.is_closed() {
        return Ok(events);
    }
    ensure_stream_id(state);

    match event {
        MessagesStreamEvent::MessageStart { message } => {
            state.record_usage(message.usage.into());
        }

        MessagesStreamEvent::ContentBlockStart {
            index,
            content_block: MessagesContentBlock::ToolUse { id, name, .. },
        } => {
            let ordinal = state.allocate_tool_ordinal();
            state.saw_tool_call = true;
            state.tool_calls.insert(
                index,
                ToolCallBuffer {
                    id: id.clone(),
                    name: name.clone(),
                    content_index: ordinal,
                    ..Default::default()
                },
            );
            events.push(emit_chunk(
                state,
                MessageDelta {
                    tool_calls: Some(vec![ToolCallDelta {
                        index: ordinal,
                        id: Some(id),
                        call_type: Some("function".to_string()),
                        function: Some(FunctionCallDelta {
                            name: Some(name),
                            arguments: Some(String::new()),
                        }),
                    }]),
                    ..Default::default()
                },
                None,
                None,
            )?);
        }

        MessagesStreamEvent::ContentBlockDelta { index, delta } => match delta {
            MessagesContentDelta::TextDelta { text } if !text.is_empty() => {
                events.push(emit_chunk(state, content_delta(text), None, None)?);
            }
            MessagesContentDelta::InputJsonDelta { partial_json } if !partial_json.is_empty() => {
                let Some(tool) = state.tool_calls.get_mut(&index) else {
                    warn!("argument delta for unknown content block {}", index);
                    return Ok(events);
                };
                tool.arguments.push_str(&partial_json);
                let ordinal = tool.content_index;
                events.push(emit_chunk(
                    state,
                    MessageDelta {
                        tool_calls: Some(vec![arguments_delta(ordinal, partial_json)]),
                        ..Default::default()
                    },
                    None,
                    None,
                )?);
            }
            _ => {}
        },

        MessagesStreamEvent::MessageDelta { delta, usage } => {
            let prompt_tokens = match usage.input_tokens {
                0 => state.usage.as_ref().map_or(0, |u| u.prompt_tokens),
                tokens => tokens,
            };
            let usage = Usage::new(prompt_tokens, usage.output_tokens);

            if let Some(stop_reason) = delta.stop_reason {
                if !state.finish_sent {
                    events.push(finish_chunk(state, stop_reason.into(), Some(usage))?);
                }
            } else {
                state.record_usage(usage);
            }
        }

        MessagesStreamEvent::MessageStop => {
            if state.has_sent_start && !state.finish_sent {
                let usage = state.usage.take();
                events.push(finish_chunk(state, FinishReason::Stop, usage)?);
            }
            state.close();
        }

        MessagesStreamEvent::Error { error } => {
            warn!("upstream stream error: {}", error);
            events.push(SseEvent::data(
                serde_json::json!({ "error": error }).to_string(),
            ));
        }

        MessagesStreamEvent::ContentBlockStart { .. }
        | MessagesStreamEvent::ContentBlockStop { .. }
        | MessagesStreamEvent::Ping => {}
    }

    Ok(events)
}

// ============================================================================
// GEMINI -> OPENAI
// ============================================================================

pub fn from_gemini(
    state: &mut StreamState,
    chunk: GenerateContentResponse,
) -> ConversionResult<Vec<SseEvent>> {
    let mut events = Vec::new();
    if state.is_closed() {
        return Ok(events);
    }
    ensure_stream_id(state);

    let mut text = String::new();
    let mut reasoning = String::new();
    let mut tool_calls = Vec::new();

    for part in chunk.first_parts() {
        if let Some(call) = &part.function_call {
            let number = state.next_call_number(&call.name);
            let ordinal = state.allocate_tool_ordinal();
            state.saw_tool_call = true;
            tool_calls.push(ToolCallDelta {
                index: ordinal,
                id: Some(positional_call_id(&call.name, number)),
                call_type: Some("function".to_string()),
                function: Some(FunctionCallDelta {
                    name: Some(call.name.clone()),
                    arguments: Some(call.args.to_string()),
                }),
            });
        } else if let Some(part_text) = &part.text {
            if part.is_thought() {
                reasoning.push_str(part_text);
            } else {
                text.push_str(part_text);
            }
        }
    }

    if !reasoning.is_empty() {
        events.push(emit_chunk(
            state,
            MessageDelta {
                reasoning_content: Some(reasoning),
                ..Default::default()
            },
            None,
            None,
        )?);
    }
    if !text.is_empty() {
        events.push(emit_chunk(state, content_delta(text), None, None)?);
    }
    if !tool_calls.is_empty() {
        events.push(emit_chunk(
            state,
            MessageDelta {
                tool_calls: Some(tool_calls),
                ..Default::default()
            },
            None,
            None,
        )?);
    }

    if let Some(usage) = chunk.usage_metadata.clone() {
        state.record_usage(usage.into());
    }

    if let Some(reason) = chunk.finish_reason() {
        let finish_reason = if state.saw_tool_call {
            FinishReason::ToolCalls
        } else {
            reason.clone().into()
        };
        let usage = state.usage.take();
        events.push(finish_chunk(state, finish_reason, usage)?);
        state.close();
    }

    Ok(events)
}

// ============================================================================
// END OF STREAM
// ============================================================================

/// Writes the finish chunk upstream never sent
pub fn finish(state: &mut StreamState) -> ConversionResult<Vec<SseEvent>> {
    let mut events = Vec::new();
    if state.is_closed() {
        return Ok(events);
    }

    if state.has_sent_start && !state.finish_sent {
        let finish_reason = if state.saw_tool_call {
            FinishReason::ToolCalls
        } else {
            FinishReason::Stop
        };
        let usage = state.usage.take();
        events.push(finish_chunk(state, finish_reason, usage)?);
    }
    state.close();
    Ok(events)
}

// ============================================================================
// HELPERS
// ============================================================================

fn ensure_stream_id(state: &mut StreamState) {
    if state.message_id.is_empty() {
        state.message_id = format!("chatcmpl-{}", random_alphanumeric(29));
        state.created = current_timestamp();
    }
}

pub(crate) fn create_openai_chunk(
    state: &StreamState,
    delta: MessageDelta,
    finish_reason: Option<FinishReason>,
    usage: Option<Usage>,
) -> ChatCompletionsStreamResponse {
    ChatCompletionsStreamResponse {
        id: state.message_id.clone(),
        object: "chat.completion.chunk".to_string(),
        created: state.created,
        model: state.model.clone(),
        choices: vec![StreamChoice {
            index: 0,
            delta,
            finish_reason,
            logprobs: None,
        }],
        usage,
        system_fingerprint: None,
    }
}

/// The first chunk of a stream announces the assistant role
fn emit_chunk(
    state: &mut StreamState,
    mut delta: MessageDelta,
    finish_reason: Option<FinishReason>,
    usage: Option<Usage>,
) -> ConversionResult<SseEvent> {
    if !state.has_sent_start {
        state.has_sent_start = true;
        delta.role = Some(Role::Assistant);
    }
    SseEvent::json(&create_openai_chunk(state, delta, finish_reason, usage))
}

fn finish_chunk(
    state: &mut StreamState,
    finish_reason: FinishReason,
    usage: Option<Usage>,
) -> ConversionResult<SseEvent> {
    state.finish_sent = true;
    let usage = usage.unwrap_or_default();
    emit_chunk(state, MessageDelta::default(), Some(finish_reason), Some(usage))
}

fn content_delta(text: String) -> MessageDelta {
    MessageDelta {
        content: Some(text),
        ..Default::default()
    }
}

fn arguments_delta(ordinal: u32, arguments: String) -> ToolCallDelta {
    ToolCallDelta {
        index: ordinal,
        id: None,
        call_type: None,
        function: Some(FunctionCallDelta {
            name: None,
            arguments: Some(arguments),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn anthropic_event(body: Value) -> MessagesStreamEvent {
        serde_json::from_value(body).unwrap()
    }

    fn drive_anthropic(state: &mut StreamState, bodies: Vec<Value>) -> Vec<Value> {
        let mut chunks = Vec::new();
        for body in bodies {
            for event in from_anthropic(state, anthropic_event(body)).unwrap() {
                assert_eq!(event.event, None);
                chunks.push(serde_json::from_str(&event.data).unwrap());
            }
        }
        chunks
    }

    #[test]
    fn test_anthropic_text_stream_yields_one_content_and_one_finish_chunk() {
        let mut state = StreamState::new("gpt-client");
        let chunks = drive_anthropic(
            &mut state,
            vec![
                json!({"type": "message_start", "message": {"id": "msg_1", "type": "message", "role": "assistant",
                    "content": [], "model": "claude-3-5-sonnet", "stop_reason": null, "stop_sequence": null,
                    "usage": {"input_tokens": 9, "output_tokens": 1}}}),
                json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}),
                json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "Hi"}}),
                json!({"type": "content_block_stop", "index": 0}),
                json!({"type": "message_delta", "delta": {"stop_reason": "end_turn", "stop_sequence": null}, "usage": {"output_tokens": 2}}),
                json!({"type": "message_stop"}),
            ],
        );

        assert_eq!(chunks.len(), 2);
        let id = chunks[0]["id"].as_str().unwrap();
        assert!(id.starts_with("chatcmpl-"));
        assert_eq!(id.len(), "chatcmpl-".len() + 29);
        assert_eq!(chunks[1]["id"], json!(id));
        assert_eq!(chunks[0]["object"], json!("chat.completion.chunk"));
        assert_eq!(chunks[0]["model"], json!("gpt-client"));
        assert_eq!(
            chunks[0]["choices"],
            json!([{"index": 0, "delta": {"role": "assistant", "content": "Hi"}, "finish_reason": null}])
        );
        assert_eq!(
            chunks[1]["choices"],
            json!([{"index": 0, "delta": {}, "finish_reason": "stop"}])
        );
        assert_eq!(
            chunks[1]["usage"],
            json!({"prompt_tokens": 9, "completion_tokens": 2, "total_tokens": 11})
        );
        assert!(state.is_closed());
    }

    #[test]
    fn test_anthropic_tool_use_stream() {
        let mut state = StreamState::new("gpt-client");
        let chunks = drive_anthropic(
            &mut state,
            vec![
                json!({"type": "message_start", "message": {"id": "msg_1", "role": "assistant", "usage": {"input_tokens": 4}}}),
                json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}),
                json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "Sure"}}),
                json!({"type": "content_block_stop", "index": 0}),
                json!({"type": "content_block_start", "index": 1, "content_block": {"type": "tool_use", "id": "toolu_1", "name": "weather", "input": {}}}),
                json!({"type": "content_block_delta", "index": 1, "delta": {"type": "input_json_delta", "partial_json": "{\"city\""}}),
                json!({"type": "content_block_delta", "index": 1, "delta": {"type": "input_json_delta", "partial_json": ":\"Oslo\"}"}}),
                json!({"type": "content_block_stop", "index": 1}),
                json!({"type": "message_delta", "delta": {"stop_reason": "tool_use"}, "usage": {"output_tokens": 7}}),
                json!({"type": "message_stop"}),
            ],
        );

        assert_eq!(chunks.len(), 5);
        assert_eq!(
            chunks[1]["choices"][0]["delta"],
            json!({"tool_calls": [{"index": 0, "id": "toolu_1", "type": "function",
                "function": {"name": "weather", "arguments": ""}}]})
        );
        assert_eq!(
            chunks[3]["choices"][0]["delta"],
            json!({"tool_calls": [{"index": 0, "function": {"arguments": ":\"Oslo\"}"}}]})
        );
        assert_eq!(chunks[4]["choices"][0]["finish_reason"], json!("tool_calls"));
    }

    #[test]
    fn test_anthropic_ping_and_thinking_emit_nothing() {
        let mut state = StreamState::new("gpt-client");
        let chunks = drive_anthropic(
            &mut state,
            vec![
                json!({"type": "ping"}),
                json!({"type": "content_block_start", "index": 0, "content_block": {"type": "thinking", "thinking": ""}}),
                json!({"type": "content_block_delta", "index": 0, "delta": {"type": "thinking_delta", "thinking": "hmm"}}),
                json!({"type": "content_block_delta", "index": 0, "delta": {"type": "signature_delta", "signature": "s"}}),
            ],
        );
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_message_stop_without_delta_sends_finish() {
        let mut state = StreamState::new("gpt-client");
        let chunks = drive_anthropic(
            &mut state,
            vec![
                json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "x"}}),
                json!({"type": "message_stop"}),
            ],
        );
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1]["choices"][0]["finish_reason"], json!("stop"));
    }

    #[test]
    fn test_gemini_stream_with_repeated_calls() {
        let mut state = StreamState::new("gpt-client");
        let mut chunks = Vec::new();
        for body in [
            json!({"candidates": [{"content": {"role": "model", "parts": [{"text": "Two lookups"}]}}]}),
            json!({"candidates": [{"content": {"role": "model", "parts": [
                {"functionCall": {"name": "weather", "args": {"city": "Oslo"}}},
                {"functionCall": {"name": "weather", "args": {"city": "Rome"}}}
            ]}, "finishReason": "STOP"}],
            "usageMetadata": {"promptTokenCount": 5, "candidatesTokenCount": 3, "totalTokenCount": 8}}),
        ] {
            let chunk: GenerateContentResponse = serde_json::from_value(body).unwrap();
            for event in from_gemini(&mut state, chunk).unwrap() {
                chunks.push(serde_json::from_str::<Value>(&event.data).unwrap());
            }
        }

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0]["choices"][0]["delta"]["role"], json!("assistant"));
        assert_eq!(chunks[0]["choices"][0]["delta"]["content"], json!("Two lookups"));
        let calls = &chunks[1]["choices"][0]["delta"]["tool_calls"];
        assert_eq!(calls[0]["id"], json!("call_weather_0001"));
        assert_eq!(calls[1]["id"], json!("call_weather_0002"));
        assert_eq!(calls[1]["index"], json!(1));
        assert_eq!(calls[1]["function"]["arguments"], json!("{\"city\":\"Rome\"}"));
        assert_eq!(chunks[2]["choices"][0]["finish_reason"], json!("tool_calls"));
        assert_eq!(chunks[2]["usage"]["total_tokens"], json!(8));
        assert!(state.is_closed());
    }

    #[test]
    fn test_finish_closes_open_stream() {
        let mut state = StreamState::new("gpt-client");
        let chunk: GenerateContentResponse =
            serde_json::from_value(json!({"candidates": [{"content": {"parts": [{"text": "partial"}]}}]})).unwrap();
        from_gemini(&mut state, chunk).unwrap();

        let events = finish(&mut state).unwrap();
        assert_eq!(events.len(), 1);
        let chunk: Value = serde_json::from_str(&events[0].data).unwrap();
        assert_eq!(chunk["choices"][0]["finish_reason"], json!("stop"));
        assert!(finish(&mut state).unwrap().is_empty());
    }

    #[test]
    fn test_gemini_stream_without_usage_reports_zero_usage() {
        let mut state = StreamState::new("gpt-client");
        let chunk: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [{"text": "Hi"}]}, "finishReason": "STOP"}]
        }))
        .unwrap();

        let events = from_gemini(&mut state, chunk).unwrap();
        let last: Value = serde_json::from_str(&events[events.len() - 1].data).unwrap();
        assert_eq!(last["choices"][0]["finish_reason"], json!("stop"));
        assert_eq!(
            last["usage"],
            json!({"prompt_tokens": 0, "completion_tokens": 0, "total_tokens": 0})
        );
    }
}
