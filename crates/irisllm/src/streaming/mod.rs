//! Streaming conversions between the three SSE grammars
//!
//! Converters here are plain functions. Everything a stream accumulates lives
//! in a [`StreamState`] owned by the caller and passed in with every chunk, so
//! one state belongs to exactly one open stream and concurrent streams never
//! see each other's buffers.
//!
//! Modules are named by the grammar they *emit*:
//!
//! - [`anthropic`] - typed `event:`/`data:` pairs from OpenAI and Gemini chunks
//! - [`openai`] - `chat.completion.chunk` objects from Anthropic events and Gemini chunks
//! - [`gemini`] - `GenerateContentResponse` chunks from OpenAI chunks and Anthropic events
//! - [`relay`] - line-level driver that frames upstream SSE and applies end markers

use std::collections::BTreeMap;
use std::fmt::Display;

use serde::Serialize;

use crate::apis::{FinishReason, MessagesStreamEvent, Usage};
use crate::clients::ConversionResult;
use crate::transformer::tool_ids::OccurrenceCounter;

pub mod anthropic;
pub mod gemini;
pub mod openai;
pub mod relay;

pub use relay::StreamSession;

// ============================================================================
// SSE EVENTS
// ============================================================================

/// One Server-Sent Event ready to be written to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

impl SseEvent {
    pub fn data(data: impl Into<String>) -> Self {
        SseEvent {
            event: None,
            data: data.into(),
        }
    }

    pub fn named(event: impl Into<String>, data: impl Into<String>) -> Self {
        SseEvent {
            event: Some(event.into()),
            data: data.into(),
        }
    }

    /// A bare `data:` event carrying the JSON of `value`
    pub fn json<T: Serialize>(value: &T) -> ConversionResult<Self> {
        Ok(SseEvent::data(serde_json::to_string(value)?))
    }

    /// An Anthropic event paired with its `event:` name
    pub fn anthropic(event: &MessagesStreamEvent) -> ConversionResult<Self> {
        Ok(SseEvent::named(
            event.event_name(),
            serde_json::to_string(event)?,
        ))
    }
}

impl Display for SseEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.event {
            Some(event) => write!(f, "event: {}\ndata: {}\n\n", event, self.data),
            None => write!(f, "data: {}\n\n", self.data),
        }
    }
}

// ============================================================================
// STREAM STATE
// ============================================================================

/// A tool call being assembled from fragments
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolCallBuffer {
    pub id: String,
    pub name: String,
    /// Every argument fragment received so far, verbatim
    pub arguments: String,
    /// Escape sequence held back until the fragment that completes it
    pub pending: String,
    /// Content-block index (Anthropic) or tool ordinal (OpenAI) in the output
    pub content_index: u32,
}

/// Accumulation state of one open stream
///
/// Created for the first chunk of a conversation and dropped with it. Once
/// [`StreamState::close`] has been called every converter ignores further input.
#[derive(Debug, Clone, Default)]
pub struct StreamState {
    pub message_id: String,
    /// The client's model name, echoed in every emitted chunk
    pub model: String,
    pub created: u64,
    pub has_sent_start: bool,
    pub text_block_started: bool,
    pub text_block_index: Option<u32>,
    pub thinking_block_index: Option<u32>,
    /// Keyed by the upstream's own tool index
    pub tool_calls: BTreeMap<u32, ToolCallBuffer>,
    pub saw_tool_call: bool,
    pub finish_sent: bool,
    /// OpenAI finish reason waiting for the usage chunk that follows it
    pub pending_finish: Option<FinishReason>,
    pub usage: Option<Usage>,
    call_numbers: OccurrenceCounter,
    next_content_index: u32,
    next_tool_ordinal: u32,
    closed: bool,
}

impl StreamState {
    pub fn new(model: impl Into<String>) -> Self {
        StreamState {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Hands out content-block indices; never returns the same index twice
    pub fn allocate_content_index(&mut self) -> u32 {
        let index = self.next_content_index;
        self.next_content_index += 1;
        index
    }

    pub fn next_content_index(&self) -> u32 {
        self.next_content_index
    }

    /// Position of the next call in an OpenAI `tool_calls` array
    pub fn allocate_tool_ordinal(&mut self) -> u32 {
        let ordinal = self.next_tool_ordinal;
        self.next_tool_ordinal += 1;
        ordinal
    }

    /// 1-based count of calls to `name` seen on this stream
    pub fn next_call_number(&mut self, name: &str) -> usize {
        self.call_numbers.next(name)
    }

    /// Tool buffers in the order their blocks were opened
    pub fn tools_in_order(&self) -> Vec<&ToolCallBuffer> {
        let mut tools: Vec<&ToolCallBuffer> = self.tool_calls.values().collect();
        tools.sort_by_key(|tool| tool.content_index);
        tools
    }

    pub fn record_usage(&mut self, usage: Usage) {
        self.usage = Some(usage);
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn close(&mut self) {
        self.closed = true;
        self.tool_calls.clear();
        self.pending_finish = None;
    }
}

// ============================================================================
// ARGUMENT FRAGMENTS
// ============================================================================

/// Byte offset where a trailing, not yet complete JSON escape begins
///
/// Covers a lone `\`, a `\u` with fewer than four hex digits, and a complete
/// high-surrogate `\uD8xx` whose low half has not arrived yet.
pub fn incomplete_escape_start(fragment: &str) -> Option<usize> {
    let bytes = fragment.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'\\' {
            i += 1;
            continue;
        }
        let Some(&next) = bytes.get(i + 1) else {
            return Some(i);
        };
        if next != b'u' {
            i += 2;
            continue;
        }
        if bytes.len() < i + 6 {
            return Some(i);
        }
        if i + 6 == bytes.len() && is_high_surrogate(&bytes[i + 2..i + 6]) {
            return Some(i);
        }
        i += 6;
    }

    None
}

fn is_high_surrogate(hex: &[u8]) -> bool {
    std::str::from_utf8(hex)
        .ok()
        .and_then(|hex| u16::from_str_radix(hex, 16).ok())
        .is_some_and(|unit| (0xD800..=0xDBFF).contains(&unit))
}

impl ToolCallBuffer {
    /// Appends a raw fragment and returns the part that is safe to forward
    ///
    /// An incomplete escape at the end is held back and prefixed to the next
    /// fragment, so forwarded pieces always concatenate to valid JSON text.
    pub fn push_fragment(&mut self, fragment: &str) -> String {
        self.arguments.push_str(fragment);

        let mut combined = std::mem::take(&mut self.pending);
        combined.push_str(fragment);

        if let Some(split) = incomplete_escape_start(&combined) {
            self.pending = combined.split_off(split);
        }
        combined
    }
}
