//! Line-level SSE relay
//!
//! The transport hands every upstream line to [`StreamSession::push_line`]
//! and writes whatever comes back to the client. Framing, end-of-stream
//! sentinels and malformed chunks are handled here so the state machines
//! only ever see parsed JSON.

use serde_json::Value;
use tracing::{debug, warn};

use super::StreamState;
use crate::factory::Conversion;
use crate::ApiFormat;

const DONE_SENTINEL: &str = "[DONE]";

/// One open stream: its conversion, its own state and nothing shared
#[derive(Debug)]
pub struct StreamSession {
    conversion: Conversion,
    state: StreamState,
    ended: bool,
}

impl StreamSession {
    pub fn new(conversion: Conversion, model: impl Into<String>) -> Self {
        StreamSession {
            conversion,
            state: StreamState::new(model),
            ended: false,
        }
    }

    pub fn conversion(&self) -> Conversion {
        self.conversion
    }

    pub fn state(&self) -> &StreamState {
        &self.state
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Feeds one upstream line, newline stripped, and returns the SSE text to write
    pub fn push_line(&mut self, line: &str) -> Vec<String> {
        if self.ended {
            return Vec::new();
        }
        let line = line.trim_end_matches('\r');

        if self.conversion.is_passthrough() {
            if data_payload(line) == Some(DONE_SENTINEL) {
                self.ended = true;
                self.state.close();
            }
            return vec![format!("{}\n", line)];
        }

        let Some(data) = data_payload(line) else {
            return Vec::new();
        };
        if data.is_empty() || data == DONE_SENTINEL {
            return self.end();
        }

        let chunk: Value = match serde_json::from_str(data) {
            Ok(chunk) => chunk,
            Err(_) if data.contains(DONE_SENTINEL) => {
                debug!("end-of-stream sentinel inside malformed chunk");
                return self.end();
            }
            Err(err) => {
                warn!(
                    "forwarding malformed {} chunk ({} bytes) unchanged: {}",
                    self.conversion.target(),
                    data.len(),
                    err
                );
                return vec![format!("data: {}\n\n", data)];
            }
        };

        let mut output = match self.conversion.convert_stream_chunk(&mut self.state, chunk) {
            Ok(events) => events.iter().map(ToString::to_string).collect(),
            Err(err) => {
                warn!(
                    "forwarding unconvertible {} chunk unchanged: {}",
                    self.conversion.target(),
                    err
                );
                vec![format!("data: {}\n\n", data)]
            }
        };

        if self.state.is_closed() {
            self.ended = true;
            output.extend(self.end_marker());
        }
        output
    }

    /// Upstream EOF: close whatever is still open
    pub fn finish(&mut self) -> Vec<String> {
        if self.ended {
            return Vec::new();
        }
        if self.conversion.is_passthrough() {
            self.ended = true;
            self.state.close();
            return Vec::new();
        }
        self.end()
    }

    fn end(&mut self) -> Vec<String> {
        let mut output: Vec<String> = match self.conversion.finish_stream(&mut self.state) {
            Ok(events) => events.iter().map(ToString::to_string).collect(),
            Err(err) => {
                warn!("failed to close {} stream: {}", self.conversion.source(), err);
                Vec::new()
            }
        };
        self.state.close();
        self.ended = true;
        output.extend(self.end_marker());
        output
    }

    /// The client reads the source format of the request
    fn end_marker(&self) -> Option<String> {
        match self.conversion.source() {
            ApiFormat::OpenAI => Some(format!("data: {}\n\n", DONE_SENTINEL)),
            ApiFormat::Anthropic | ApiFormat::Gemini => None,
        }
    }
}

fn data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn push_all(session: &mut StreamSession, lines: &[&str]) -> Vec<String> {
        lines
            .iter()
            .flat_map(|line| session.push_line(line))
            .collect()
    }

    #[test]
    fn test_passthrough_forwards_every_line() {
        let mut session = StreamSession::new(Conversion::Passthrough(ApiFormat::OpenAI), "gpt-4o");
        let output = push_all(
            &mut session,
            &["data: {\"id\":\"1\"}", "", ": keep-alive", "data: [DONE]", "data: after"],
        );

        assert_eq!(
            output,
            vec!["data: {\"id\":\"1\"}\n", "\n", ": keep-alive\n", "data: [DONE]\n"]
        );
        assert!(session.is_ended());
        assert!(session.finish().is_empty());
    }

    #[test]
    fn test_anthropic_upstream_to_openai_client_gets_done_marker() {
        let mut session = StreamSession::new(Conversion::OpenAIToAnthropic, "gpt-client");
        let text = json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "Hi"}});
        let stop = json!({"type": "message_delta", "delta": {"stop_reason": "end_turn"}, "usage": {"output_tokens": 1}});
        let lines = [
            "event: content_block_delta".to_string(),
            format!("data: {}", text),
            String::new(),
            "event: message_delta".to_string(),
            format!("data: {}", stop),
            String::new(),
            "event: message_stop".to_string(),
            "data: {\"type\":\"message_stop\"}".to_string(),
        ];

        let output: Vec<String> = lines.iter().flat_map(|line| session.push_line(line)).collect();

        assert_eq!(output.len(), 3);
        assert!(output[0].starts_with("data: {"));
        assert!(output[0].contains("\"content\":\"Hi\""));
        assert!(output[1].contains("\"finish_reason\":\"stop\""));
        assert_eq!(output[2], "data: [DONE]\n\n");
        assert!(session.is_ended());
    }

    #[test]
    fn test_openai_done_closes_anthropic_stream() {
        let mut session = StreamSession::new(Conversion::AnthropicToOpenAI, "claude-client");
        let mut output = push_all(
            &mut session,
            &["data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hey\"}}]}", ""],
        );
        output.extend(session.push_line("data: [DONE]"));

        assert!(output[0].starts_with("event: message_start\n"));
        assert!(output[output.len() - 2].starts_with("event: message_delta\n"));
        assert_eq!(
            output.last().map(String::as_str),
            Some("event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n")
        );
        assert!(session.push_line("data: {\"choices\":[]}").is_empty());
    }

    #[test]
    fn test_malformed_chunks() {
        let mut session = StreamSession::new(Conversion::OpenAIToGemini, "gpt-client");
        assert_eq!(session.push_line("data: {not json"), vec!["data: {not json\n\n"]);
        assert!(!session.is_ended());

        let output = session.push_line("data: garbage [DONE] garbage");
        assert_eq!(output, vec!["data: [DONE]\n\n"]);
        assert!(session.is_ended());
    }

    #[test]
    fn test_unconvertible_chunk_is_forwarded() {
        let mut session = StreamSession::new(Conversion::GeminiToAnthropic, "gemini-client");
        let output = session.push_line("data: {\"type\":\"content_block_delta\"}");
        assert_eq!(output, vec!["data: {\"type\":\"content_block_delta\"}\n\n"]);
    }

    #[test]
    fn test_eof_finishes_open_stream() {
        let mut session = StreamSession::new(Conversion::AnthropicToGemini, "claude-client");
        session.push_line("data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"x\"}]}}]}");

        let output = session.finish();
        assert!(output[0].starts_with("event: content_block_stop\n"));
        assert!(output[1].contains("\"stop_reason\":\"end_turn\""));
        assert!(output[2].starts_with("event: message_stop\n"));
        assert!(session.finish().is_empty());
    }
}
