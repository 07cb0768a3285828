//! Tool-call id correlation
//!
//! OpenAI and Anthropic tie a tool result to its call by an explicit id, Gemini
//! by function name and position. A `ToolCallMapping` is built fresh from each
//! request's own history and dropped with it.

use std::collections::HashMap;

use crate::apis::{Content, Message, MessagesContentBlock, MessagesMessage, MessagesMessageContent};

/// `(function name, 1-based occurrence) -> call id` and `call id -> function name`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolCallMapping {
    by_occurrence: HashMap<(String, usize), String>,
    names: HashMap<String, String>,
}

impl ToolCallMapping {
    /// Gemini history has no ids: the k-th call to `name` gets `call_{name}_{k:04}`
    pub fn from_gemini_contents(contents: &[Content]) -> Self {
        let mut mapping = ToolCallMapping::default();
        let mut calls = OccurrenceCounter::default();

        let function_calls = contents
            .iter()
            .flat_map(|content| content.parts.iter())
            .filter_map(|part| part.function_call.as_ref());
        for call in function_calls {
            let occurrence = calls.next(&call.name);
            mapping.insert(&call.name, occurrence, positional_call_id(&call.name, occurrence));
        }

        mapping
    }

    pub fn from_anthropic_messages(messages: &[MessagesMessage]) -> Self {
        let mut mapping = ToolCallMapping::default();
        let mut calls = OccurrenceCounter::default();

        for message in messages {
            let MessagesMessageContent::Blocks(blocks) = &message.content else {
                continue;
            };
            for block in blocks {
                if let MessagesContentBlock::ToolUse { id, name, .. } = block {
                    let occurrence = calls.next(name);
                    mapping.insert(name, occurrence, id.clone());
                }
            }
        }

        mapping
    }

    pub fn from_openai_messages(messages: &[Message]) -> Self {
        let mut mapping = ToolCallMapping::default();
        let mut calls = OccurrenceCounter::default();

        let tool_calls = messages
            .iter()
            .filter_map(|message| message.tool_calls.as_ref())
            .flatten();
        for call in tool_calls {
            let occurrence = calls.next(&call.function.name);
            mapping.insert(&call.function.name, occurrence, call.id.clone());
        }

        mapping
    }

    pub fn insert(&mut self, name: &str, occurrence: usize, call_id: String) {
        self.names.insert(call_id.clone(), name.to_string());
        self.by_occurrence.insert((name.to_string(), occurrence), call_id);
    }

    /// Id of the `occurrence`-th call to `name`; unknown pairs get the
    /// positional id so both sides of a call still agree
    pub fn call_id(&self, name: &str, occurrence: usize) -> String {
        self.by_occurrence
            .get(&(name.to_string(), occurrence))
            .cloned()
            .unwrap_or_else(|| positional_call_id(name, occurrence))
    }

    /// Function name behind a call id, falling back to ids shaped `call_<name>_<suffix>`
    pub fn function_name(&self, call_id: &str) -> Option<String> {
        self.names
            .get(call_id)
            .cloned()
            .or_else(|| name_from_call_id(call_id))
    }

    pub fn len(&self) -> usize {
        self.by_occurrence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_occurrence.is_empty()
    }
}

/// Walks a Gemini history handing out ids for calls and responses. The k-th
/// response to `name` pairs with the k-th call to `name`.
#[derive(Debug, Clone)]
pub struct ToolCallCorrelator {
    mapping: ToolCallMapping,
    calls: OccurrenceCounter,
    responses: OccurrenceCounter,
}

impl ToolCallCorrelator {
    pub fn new(mapping: ToolCallMapping) -> Self {
        ToolCallCorrelator {
            mapping,
            calls: OccurrenceCounter::default(),
            responses: OccurrenceCounter::default(),
        }
    }

    pub fn for_gemini(contents: &[Content]) -> Self {
        Self::new(ToolCallMapping::from_gemini_contents(contents))
    }

    pub fn next_call_id(&mut self, name: &str) -> String {
        let occurrence = self.calls.next(name);
        self.mapping.call_id(name, occurrence)
    }

    pub fn next_response_id(&mut self, name: &str) -> String {
        let occurrence = self.responses.next(name);
        self.mapping.call_id(name, occurrence)
    }

    pub fn mapping(&self) -> &ToolCallMapping {
        &self.mapping
    }
}

#[derive(Debug, Clone, Default)]
pub struct OccurrenceCounter {
    counts: HashMap<String, usize>,
}

impl OccurrenceCounter {
    /// 1-based occurrence number of this sighting of `name`
    pub fn next(&mut self, name: &str) -> usize {
        let count = self.counts.entry(name.to_string()).or_insert(0);
        *count += 1;
        *count
    }
}

pub fn positional_call_id(name: &str, occurrence: usize) -> String {
    format!("call_{}_{:04}", name, occurrence)
}

/// `call_get_weather_0001` -> `get_weather`
pub fn name_from_call_id(call_id: &str) -> Option<String> {
    let rest = call_id.strip_prefix("call_")?;
    let (name, _suffix) = rest.rsplit_once('_')?;
    (!name.is_empty()).then(|| name.to_string())
}
