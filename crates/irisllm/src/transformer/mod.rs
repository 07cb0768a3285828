//! Non-streaming conversions between the three wire formats
//!
//! The organization follows the data flow of a proxied call:
//!
//! 1. **Leaf helpers** - schema sanitizing, reasoning budgets, tool-call id
//!    correlation and the finish-reason tables
//! 2. **Request transformations** - `request::*`, one module per target format
//! 3. **Response transformations** - `response::*`, one module per target format
//!
//! Conversions are `TryFrom` impls over `(source, &ConversionContext)` so the
//! caller's model and settings travel with every call without global state.

use rand::distributions::Alphanumeric;
use rand::Rng;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

use crate::apis::{
    ContentPart, MessageContent, MessagesContentBlock, MessagesMessageContent, MessagesSystemPrompt,
};
use crate::clients::ConversionSettings;

pub mod finish_reason;
pub mod reasoning;
pub mod request;
pub mod response;
pub mod schema;
pub mod tool_ids;

// ============================================================================
// CONVERSION CONTEXT
// ============================================================================

/// What a conversion needs beyond the body itself
#[derive(Debug, Clone, Copy)]
pub struct ConversionContext<'a> {
    /// The model the client asked for, echoed back in responses
    pub model: &'a str,
    pub settings: &'a ConversionSettings,
}

impl<'a> ConversionContext<'a> {
    pub fn new(model: &'a str, settings: &'a ConversionSettings) -> Self {
        ConversionContext { model, settings }
    }
}

// ============================================================================
// UTILITY TRAITS - Shared traits for content manipulation
// ============================================================================

/// Plain text carried by a content value, thinking excluded
pub trait ExtractText {
    fn extract_text(&self) -> String;
}

impl ExtractText for MessageContent {
    fn extract_text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts.extract_text(),
        }
    }
}

impl ExtractText for Vec<ContentPart> {
    fn extract_text(&self) -> String {
        self.iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl ExtractText for Vec<MessagesContentBlock> {
    fn extract_text(&self) -> String {
        self.iter()
            .filter_map(|block| match block {
                MessagesContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl ExtractText for MessagesMessageContent {
    fn extract_text(&self) -> String {
        match self {
            MessagesMessageContent::Single(text) => text.clone(),
            MessagesMessageContent::Blocks(blocks) => blocks.extract_text(),
        }
    }
}

impl ExtractText for MessagesSystemPrompt {
    fn extract_text(&self) -> String {
        match self {
            MessagesSystemPrompt::Single(text) => text.clone(),
            MessagesSystemPrompt::Blocks(blocks) => blocks.extract_text(),
        }
    }
}

// ============================================================================
// THINKING MARKERS
// ============================================================================

static THINKING_REGEX: OnceLock<Regex> = OnceLock::new();

fn thinking_regex() -> &'static Regex {
    THINKING_REGEX.get_or_init(|| {
        Regex::new(r"(?s)<thinking>\s*(.*?)\s*</thinking>").expect("Thinking regex is valid")
    })
}

/// One run of text split out of a possibly tagged string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextSegment {
    Text(String),
    Thinking(String),
}

/// Splits `<thinking>` sections out of `text`, in document order. Blank
/// segments are dropped; untagged input comes back as a single text segment.
pub fn split_thinking(text: &str) -> Vec<TextSegment> {
    let regex = thinking_regex();
    if !regex.is_match(text) {
        return vec![TextSegment::Text(text.to_string())];
    }

    let mut segments = Vec::new();
    let mut cursor = 0;
    for captures in regex.captures_iter(text) {
        let (Some(whole), Some(inner)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        let before = text[cursor..whole.start()].trim();
        if !before.is_empty() {
            segments.push(TextSegment::Text(before.to_string()));
        }
        if !inner.as_str().is_empty() {
            segments.push(TextSegment::Thinking(inner.as_str().to_string()));
        }
        cursor = whole.end();
    }
    let after = text[cursor..].trim();
    if !after.is_empty() {
        segments.push(TextSegment::Text(after.to_string()));
    }
    segments
}

/// Marks reasoning text so it survives a trip through a format without a
/// native place for it
pub fn wrap_thinking(thinking: &str, content: &str) -> String {
    if content.is_empty() {
        format!("<thinking>\n{}\n</thinking>", thinking)
    } else {
        format!("<thinking>\n{}\n</thinking>\n\n{}", thinking, content)
    }
}

// ============================================================================
// SHARED HELPERS
// ============================================================================

/// Helper to create a current unix timestamp
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

pub fn current_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default()
}

pub fn random_alphanumeric(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

pub fn random_lowercase(len: usize) -> String {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

pub fn random_digits(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// Splits `data:<mime>;base64,<payload>` into its mime type and payload
pub fn parse_data_url(url: &str) -> Option<(String, String)> {
    let rest = url.strip_prefix("data:")?;
    let (header, data) = rest.split_once(',')?;
    let mime_type = header.strip_suffix(";base64")?;
    let mime_type = if mime_type.is_empty() {
        "image/jpeg"
    } else {
        mime_type
    };
    Some((mime_type.to_string(), data.to_string()))
}

pub fn data_url(mime_type: &str, data: &str) -> String {
    format!("data:{};base64,{}", mime_type, data)
}

/// Tool arguments as JSON; anything unparseable becomes `{}`
pub fn parse_arguments(arguments: &str) -> Value {
    if arguments.trim().is_empty() {
        return Value::Object(Map::new());
    }
    match serde_json::from_str::<Value>(arguments) {
        Ok(value) => value,
        Err(err) => {
            warn!("Invalid tool arguments, sending an empty object: {}", err);
            Value::Object(Map::new())
        }
    }
}

/// Renders a tool result or response payload as the plain string the
/// OpenAI and Anthropic formats carry
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
