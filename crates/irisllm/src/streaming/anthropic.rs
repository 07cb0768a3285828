//! Anthropic event streams synthesized from OpenAI and Gemini chunks
//!
//! Every stream opens with `message_start`, runs through numbered content
//! blocks and ends with `message_delta` + `message_stop`. Block indices come
//! from [`StreamState::allocate_content_index`], so no two blocks share one.

use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{SseEvent, StreamState, ToolCallBuffer};
use crate::apis::*;
use crate::clients::ConversionResult;
use crate::transformer::{current_millis, current_timestamp, random_alphanumeric};

// ============================================================================
// OPENAI -> ANTHROPIC
// ============================================================================

pub fn from_openai(
    state: &mut StreamState,
    chunk: ChatCompletionsStreamResponse,
) -> ConversionResult<Vec<SseEvent>> {
    let mut events = Vec::new();
    if state.is_closed() {
        return Ok(events);
    }

    // The chunk after a finish reason carries the usage when include_usage is on
    if let Some(reason) = state.pending_finish.take() {
        let usage = chunk.usage.or_else(|| state.usage.take());
        close_message(state, reason.into(), usage, &mut events)?;
        return Ok(events);
    }

    if let Some(usage) = chunk.usage.clone() {
        state.record_usage(usage);
    }

    let Some(choice) = chunk.choices.into_iter().next() else {
        return Ok(events);
    };
    let delta = choice.delta;
    let tool_deltas = delta.tool_calls.unwrap_or_default();

    let meaningful = delta.role.is_some()
        || delta.content.as_deref().is_some_and(|c| !c.is_empty())
        || delta.reasoning_content.as_deref().is_some_and(|r| !r.is_empty())
        || !tool_deltas.is_empty()
        || choice.finish_reason.is_some();
    if meaningful {
        ensure_message_start(state, format!("msg_{}", current_millis()), &mut events)?;
    }

    if let Some(reasoning) = delta.reasoning_content.filter(|r| !r.is_empty()) {
        push_thinking(state, reasoning, &mut events)?;
    }

    if let Some(text) = delta.content.filter(|text| !text.is_empty()) {
        push_text(state, text, &mut events)?;
    }

    for tool in tool_deltas {
        push_tool_fragment(state, tool, &mut events)?;
    }

    if let Some(reason) = choice.finish_reason {
        match chunk.usage {
            Some(usage) => close_message(state, reason.into(), Some(usage), &mut events)?,
            None => state.pending_finish = Some(reason),
        }
    }

    Ok(events)
}

fn push_tool_fragment(
    state: &mut StreamState,
    tool: ToolCallDelta,
    events: &mut Vec<SseEvent>,
) -> ConversionResult<()> {
    let position = tool.index;
    let function = tool.function.unwrap_or_default();

    if !state.tool_calls.contains_key(&position) {
        let id = tool
            .id
            .unwrap_or_else(|| format!("call_{}_{}", current_timestamp(), position));
        let name = function
            .name
            .clone()
            .unwrap_or_else(|| format!("tool_{}", position));
        let content_index = state.allocate_content_index();
        state.saw_tool_call = true;

        events.push(SseEvent::anthropic(&MessagesStreamEvent::ContentBlockStart {
            index: content_index,
            content_block: MessagesContentBlock::ToolUse {
                id: id.clone(),
                name: name.clone(),
                input: json!({}),
            },
        })?);

        state.tool_calls.insert(
            position,
            ToolCallBuffer {
                id,
                name,
                content_index,
                ..Default::default()
            },
        );
    }

    let Some(fragment) = function.arguments.filter(|args| !args.is_empty()) else {
        return Ok(());
    };
    let Some(buffer) = state.tool_calls.get_mut(&position) else {
        return Ok(());
    };

    let forward = buffer.push_fragment(&fragment);
    if forward.is_empty() {
        debug!("holding back partial escape in tool call {}", buffer.id);
        return Ok(());
    }

    events.push(SseEvent::anthropic(&MessagesStreamEvent::ContentBlockDelta {
        index: buffer.content_index,
        delta: MessagesContentDelta::InputJsonDelta {
            partial_json: forward,
        },
    })?);
    Ok(())
}

// ============================================================================
// GEMINI -> ANTHROPIC
// ============================================================================

pub fn from_gemini(
    state: &mut StreamState,
    chunk: GenerateContentResponse,
) -> ConversionResult<Vec<SseEvent>> {
    let mut events = Vec::new();
    if state.is_closed() {
        return Ok(events);
    }

    ensure_message_start(state, format!("msg_{}", random_alphanumeric(24)), &mut events)?;

    for part in chunk.first_parts() {
        if let Some(call) = &part.function_call {
            close_open_text_blocks(state, &mut events)?;
            push_complete_tool(state, &call.name, &call.args, &mut events)?;
        } else if let Some(text) = part.text.as_ref().filter(|text| !text.is_empty()) {
            if part.is_thought() {
                push_thinking(state, text.clone(), &mut events)?;
            } else {
                push_text(state, text.clone(), &mut events)?;
            }
        }
    }

    if let Some(usage) = chunk.usage_metadata.clone() {
        state.record_usage(usage.into());
    }

    if let Some(reason) = chunk.finish_reason() {
        let stop_reason = if state.saw_tool_call {
            MessagesStopReason::ToolUse
        } else {
            reason.clone().into()
        };
        let usage = state.usage.take();
        close_message(state, stop_reason, usage, &mut events)?;
    }

    Ok(events)
}

/// A Gemini call arrives whole: start, one argument delta, stop
fn push_complete_tool(
    state: &mut StreamState,
    name: &str,
    args: &Value,
    events: &mut Vec<SseEvent>,
) -> ConversionResult<()> {
    let index = state.allocate_content_index();
    state.saw_tool_call = true;

    events.push(SseEvent::anthropic(&MessagesStreamEvent::ContentBlockStart {
        index,
        content_block: MessagesContentBlock::ToolUse {
            id: format!("toolu_{}", random_alphanumeric(24)),
            name: name.to_string(),
            input: json!({}),
        },
    })?);

    let has_arguments = match args {
        Value::Null => false,
        Value::Object(map) => !map.is_empty(),
        _ => true,
    };
    if has_arguments {
        events.push(SseEvent::anthropic(&MessagesStreamEvent::ContentBlockDelta {
            index,
            delta: MessagesContentDelta::InputJsonDelta {
                partial_json: args.to_string(),
            },
        })?);
    }

    events.push(SseEvent::anthropic(&MessagesStreamEvent::ContentBlockStop { index })?);
    Ok(())
}

// ============================================================================
// SAME FORMAT
// ============================================================================

/// Re-frames an Anthropic event without touching its payload
pub fn reframe(state: &mut StreamState, chunk: Value) -> Vec<SseEvent> {
    if state.is_closed() {
        return Vec::new();
    }

    let event = chunk
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("message")
        .to_string();
    state.has_sent_start = true;
    if event == "message_stop" {
        state.close();
    }
    vec![SseEvent::named(event, chunk.to_string())]
}

// ============================================================================
// END OF STREAM
// ============================================================================

/// Closes whatever is still open when upstream ends without a finish reason
pub fn finish(state: &mut StreamState) -> ConversionResult<Vec<SseEvent>> {
    let mut events = Vec::new();
    if state.is_closed() {
        return Ok(events);
    }
    if !state.has_sent_start {
        state.close();
        return Ok(events);
    }

    let stop_reason = match state.pending_finish.take() {
        Some(reason) => reason.into(),
        None if state.saw_tool_call => MessagesStopReason::ToolUse,
        None => MessagesStopReason::EndTurn,
    };
    let usage = state.usage.take();
    close_message(state, stop_reason, usage, &mut events)?;
    Ok(events)
}

// ============================================================================
// HELPERS
// ============================================================================

fn ensure_message_start(
    state: &mut StreamState,
    message_id: String,
    events: &mut Vec<SseEvent>,
) -> ConversionResult<()> {
    if state.has_sent_start {
        return Ok(());
    }
    state.has_sent_start = true;
    state.message_id = message_id;

    events.push(SseEvent::anthropic(&MessagesStreamEvent::MessageStart {
        message: MessagesStreamMessage {
            id: state.message_id.clone(),
            obj_type: "message".to_string(),
            role: MessagesRole::Assistant,
            content: Vec::new(),
            model: state.model.clone(),
            stop_reason: None,
            stop_sequence: None,
            usage: MessagesUsage::default(),
        },
    })?);
    Ok(())
}

fn push_text(
    state: &mut StreamState,
    text: String,
    events: &mut Vec<SseEvent>,
) -> ConversionResult<()> {
    close_thinking_block(state, events)?;

    let index = match state.text_block_index.filter(|_| state.text_block_started) {
        Some(index) => index,
        None => {
            let index = state.allocate_content_index();
            state.text_block_started = true;
            state.text_block_index = Some(index);
            events.push(SseEvent::anthropic(&MessagesStreamEvent::ContentBlockStart {
                index,
                content_block: MessagesContentBlock::Text {
                    text: String::new(),
                },
            })?);
            index
        }
    };

    events.push(SseEvent::anthropic(&MessagesStreamEvent::ContentBlockDelta {
        index,
        delta: MessagesContentDelta::TextDelta { text },
    })?);
    Ok(())
}

fn push_thinking(
    state: &mut StreamState,
    thinking: String,
    events: &mut Vec<SseEvent>,
) -> ConversionResult<()> {
    if state.text_block_started {
        // thinking after text would reorder the answer, keep it out
        warn!("dropping reasoning that arrived after answer text");
        return Ok(());
    }

    let index = match state.thinking_block_index {
        Some(index) => index,
        None => {
            let index = state.allocate_content_index();
            state.thinking_block_index = Some(index);
            events.push(SseEvent::anthropic(&MessagesStreamEvent::ContentBlockStart {
                index,
                content_block: MessagesContentBlock::Thinking {
                    thinking: String::new(),
                    signature: None,
                },
            })?);
            index
        }
    };

    events.push(SseEvent::anthropic(&MessagesStreamEvent::ContentBlockDelta {
        index,
        delta: MessagesContentDelta::ThinkingDelta { thinking },
    })?);
    Ok(())
}

fn close_thinking_block(state: &mut StreamState, events: &mut Vec<SseEvent>) -> ConversionResult<()> {
    if let Some(index) = state.thinking_block_index.take() {
        events.push(SseEvent::anthropic(&MessagesStreamEvent::ContentBlockStop { index })?);
    }
    Ok(())
}

/// Text and thinking blocks end before a whole tool block is written
fn close_open_text_blocks(
    state: &mut StreamState,
    events: &mut Vec<SseEvent>,
) -> ConversionResult<()> {
    close_thinking_block(state, events)?;
    if state.text_block_started {
        state.text_block_started = false;
        if let Some(index) = state.text_block_index.take() {
            events.push(SseEvent::anthropic(&MessagesStreamEvent::ContentBlockStop { index })?);
        }
    }
    Ok(())
}

/// Tool blocks in opening order, then text, then the closing pair
fn close_message(
    state: &mut StreamState,
    stop_reason: MessagesStopReason,
    usage: Option<Usage>,
    events: &mut Vec<SseEvent>,
) -> ConversionResult<()> {
    close_thinking_block(state, events)?;

    let tool_indices: Vec<u32> = state
        .tools_in_order()
        .iter()
        .map(|tool| tool.content_index)
        .collect();
    for index in tool_indices {
        events.push(SseEvent::anthropic(&MessagesStreamEvent::ContentBlockStop { index })?);
    }

    if state.text_block_started {
        state.text_block_started = false;
        if let Some(index) = state.text_block_index {
            events.push(SseEvent::anthropic(&MessagesStreamEvent::ContentBlockStop { index })?);
        }
    }

    events.push(SseEvent::anthropic(&MessagesStreamEvent::MessageDelta {
        delta: MessagesMessageDelta {
            stop_reason: Some(stop_reason),
            stop_sequence: None,
        },
        usage: usage.map(Into::into).unwrap_or_default(),
    })?);
    events.push(SseEvent::anthropic(&MessagesStreamEvent::MessageStop)?);

    state.finish_sent = true;
    state.close();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn openai_chunk(body: Value) -> ChatCompletionsStreamResponse {
        serde_json::from_value(body).unwrap()
    }

    fn gemini_chunk(body: Value) -> GenerateContentResponse {
        serde_json::from_value(body).unwrap()
    }

    fn payloads(events: &[SseEvent]) -> Vec<Value> {
        events
            .iter()
            .map(|event| serde_json::from_str(&event.data).unwrap())
            .collect()
    }

    fn names(events: &[SseEvent]) -> Vec<&str> {
        events
            .iter()
            .map(|event| event.event.as_deref().unwrap())
            .collect()
    }

    #[test]
    fn test_openai_text_stream() {
        let mut state = StreamState::new("claude-client");

        let first = from_openai(
            &mut state,
            openai_chunk(json!({"id": "c1", "choices": [{"index": 0, "delta": {"role": "assistant"}, "finish_reason": null}]})),
        )
        .unwrap();
        assert_eq!(names(&first), vec!["message_start"]);
        let start = &payloads(&first)[0];
        assert!(start["message"]["id"].as_str().unwrap().starts_with("msg_"));
        assert_eq!(start["message"]["model"], json!("claude-client"));
        assert_eq!(start["message"]["usage"], json!({"input_tokens": 0, "output_tokens": 0}));
        assert_eq!(start["message"]["stop_reason"], Value::Null);

        let text = from_openai(
            &mut state,
            openai_chunk(json!({"choices": [{"index": 0, "delta": {"content": "Hel"}, "finish_reason": null}]})),
        )
        .unwrap();
        assert_eq!(names(&text), vec!["content_block_start", "content_block_delta"]);
        assert_eq!(
            payloads(&text),
            vec![
                json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}),
                json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "Hel"}}),
            ]
        );

        let more = from_openai(
            &mut state,
            openai_chunk(json!({"choices": [{"index": 0, "delta": {"content": "lo"}, "finish_reason": "stop"}],
                "usage": {"prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5}})),
        )
        .unwrap();
        assert_eq!(
            names(&more),
            vec!["content_block_delta", "content_block_stop", "message_delta", "message_stop"]
        );
        assert_eq!(
            payloads(&more)[2],
            json!({"type": "message_delta", "delta": {"stop_reason": "end_turn", "stop_sequence": null},
                "usage": {"input_tokens": 3, "output_tokens": 2}})
        );

        assert!(state.is_closed());
        let after = from_openai(
            &mut state,
            openai_chunk(json!({"choices": [{"index": 0, "delta": {"content": "late"}}]})),
        )
        .unwrap();
        assert!(after.is_empty());
    }

    #[test]
    fn test_openai_tool_stream_closes_tools_before_text() {
        let mut state = StreamState::new("claude-client");
        let mut events = Vec::new();

        for body in [
            json!({"choices": [{"index": 0, "delta": {"role": "assistant", "content": "Let me check"}}]}),
            json!({"choices": [{"index": 0, "delta": {"tool_calls": [{"index": 0, "id": "call_abc", "type": "function", "function": {"name": "weather", "arguments": ""}}]}}]}),
            json!({"choices": [{"index": 0, "delta": {"tool_calls": [{"index": 0, "function": {"arguments": "{\"city\":"}}]}}]}),
            json!({"choices": [{"index": 0, "delta": {"tool_calls": [{"index": 0, "function": {"arguments": "\"Oslo\"}"}}]}}]}),
            json!({"choices": [{"index": 0, "delta": {}, "finish_reason": "tool_calls"}]}),
        ] {
            events.extend(from_openai(&mut state, openai_chunk(body)).unwrap());
        }

        // usage arrives in its own chunk after the finish reason
        assert!(!state.is_closed());
        events.extend(
            from_openai(
                &mut state,
                openai_chunk(json!({"choices": [], "usage": {"prompt_tokens": 10, "completion_tokens": 4, "total_tokens": 14}})),
            )
            .unwrap(),
        );

        let payloads = payloads(&events);
        assert_eq!(
            names(&events),
            vec![
                "message_start",
                "content_block_start",
                "content_block_delta",
                "content_block_start",
                "content_block_delta",
                "content_block_delta",
                "content_block_stop",
                "content_block_stop",
                "message_delta",
                "message_stop",
            ]
        );
        assert_eq!(
            payloads[3]["content_block"],
            json!({"type": "tool_use", "id": "call_abc", "name": "weather", "input": {}})
        );
        assert_eq!(payloads[3]["index"], json!(1));
        assert_eq!(payloads[4]["delta"]["partial_json"], json!("{\"city\":"));
        assert_eq!(payloads[6], json!({"type": "content_block_stop", "index": 1}));
        assert_eq!(payloads[7], json!({"type": "content_block_stop", "index": 0}));
        assert_eq!(payloads[8]["delta"]["stop_reason"], json!("tool_use"));
        assert_eq!(payloads[8]["usage"], json!({"input_tokens": 10, "output_tokens": 4}));
    }

    #[test]
    fn test_openai_tool_defaults_and_empty_fragments() {
        let mut state = StreamState::new("claude-client");

        let events = from_openai(
            &mut state,
            openai_chunk(json!({"choices": [{"index": 0, "delta": {"tool_calls": [{"index": 2, "function": {"arguments": "\\"}}]}}]})),
        )
        .unwrap();

        let payloads = payloads(&events);
        assert_eq!(payloads.len(), 2);
        let block = &payloads[1]["content_block"];
        assert!(block["id"].as_str().unwrap().starts_with("call_"));
        assert!(block["id"].as_str().unwrap().ends_with("_2"));
        assert_eq!(block["name"], json!("tool_2"));
    }

    #[test]
    fn test_openai_reasoning_becomes_thinking_block() {
        let mut state = StreamState::new("claude-client");
        let mut events = Vec::new();
        for body in [
            json!({"choices": [{"index": 0, "delta": {"role": "assistant", "reasoning_content": "hmm"}}]}),
            json!({"choices": [{"index": 0, "delta": {"content": "Answer"}}]}),
        ] {
            events.extend(from_openai(&mut state, openai_chunk(body)).unwrap());
        }
        events.extend(finish(&mut state).unwrap());

        let payloads = payloads(&events);
        assert_eq!(payloads[1]["content_block"]["type"], json!("thinking"));
        assert_eq!(payloads[2]["delta"], json!({"type": "thinking_delta", "thinking": "hmm"}));
        assert_eq!(payloads[3], json!({"type": "content_block_stop", "index": 0}));
        assert_eq!(payloads[4]["index"], json!(1));
        assert_eq!(payloads[payloads.len() - 2]["delta"]["stop_reason"], json!("end_turn"));
    }

    #[test]
    fn test_gemini_stream_with_function_call() {
        let mut state = StreamState::new("claude-client");
        let mut events = Vec::new();

        for body in [
            json!({"candidates": [{"content": {"role": "model", "parts": [{"text": "Checking"}]}}]}),
            json!({"candidates": [{"content": {"role": "model", "parts": [{"functionCall": {"name": "weather", "args": {"city": "Oslo"}}}]},
                "finishReason": "STOP"}],
                "usageMetadata": {"promptTokenCount": 8, "candidatesTokenCount": 5, "totalTokenCount": 13}}),
        ] {
            events.extend(from_gemini(&mut state, gemini_chunk(body)).unwrap());
        }

        assert_eq!(
            names(&events),
            vec![
                "message_start",
                "content_block_start",
                "content_block_delta",
                "content_block_stop",
                "content_block_start",
                "content_block_delta",
                "content_block_stop",
                "message_delta",
                "message_stop",
            ]
        );
        let payloads = payloads(&events);
        assert_eq!(payloads[3], json!({"type": "content_block_stop", "index": 0}));
        assert_eq!(payloads[4]["index"], json!(1));
        assert!(payloads[4]["content_block"]["id"].as_str().unwrap().starts_with("toolu_"));
        assert_eq!(
            payloads[5]["delta"],
            json!({"type": "input_json_delta", "partial_json": "{\"city\":\"Oslo\"}"})
        );
        assert_eq!(payloads[7]["delta"]["stop_reason"], json!("tool_use"));
        assert_eq!(payloads[7]["usage"], json!({"input_tokens": 8, "output_tokens": 5}));
        assert!(state.is_closed());
    }

    #[test]
    fn test_every_opened_block_is_closed_once() {
        let mut state = StreamState::new("claude-client");
        let mut events = Vec::new();
        for body in [
            json!({"candidates": [{"content": {"parts": [{"text": "a"}]}}]}),
            json!({"candidates": [{"content": {"parts": [{"functionCall": {"name": "f", "args": {}}}]}}]}),
            json!({"candidates": [{"content": {"parts": [{"text": "b"}]}}]}),
            json!({"candidates": [{"content": {"parts": [{"functionCall": {"name": "f", "args": {}}}]}}]}),
        ] {
            events.extend(from_gemini(&mut state, gemini_chunk(body)).unwrap());
        }
        events.extend(finish(&mut state).unwrap());

        let mut opened = Vec::new();
        let mut closed = Vec::new();
        for payload in payloads(&events) {
            match payload["type"].as_str().unwrap() {
                "content_block_start" => opened.push(payload["index"].as_u64().unwrap()),
                "content_block_stop" => closed.push(payload["index"].as_u64().unwrap()),
                _ => {}
            }
        }
        assert_eq!(opened, vec![0, 1, 2, 3]);
        closed.sort();
        assert_eq!(closed, opened);
        assert_eq!(names(&events).last(), Some(&"message_stop"));
    }

    #[test]
    fn test_finish_without_start_is_silent() {
        let mut state = StreamState::new("claude-client");
        assert!(finish(&mut state).unwrap().is_empty());
        assert!(state.is_closed());
    }

    #[test]
    fn test_reframe_keeps_payload() {
        let mut state = StreamState::new("claude-client");
        let event = json!({"type": "ping"});
        let events = reframe(&mut state, event.clone());
        assert_eq!(events, vec![SseEvent::named("ping", event.to_string())]);

        reframe(&mut state, json!({"type": "message_stop"}));
        assert!(state.is_closed());
        assert!(reframe(&mut state, json!({"type": "ping"})).is_empty());
    }
}
