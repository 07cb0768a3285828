//! Completion-signal tables between the three formats
//!
//! Every value maps somewhere; whatever a table does not name lands on the
//! target's plain "stop".

use crate::apis::{FinishReason, GeminiFinishReason, MessagesStopReason};

impl From<MessagesStopReason> for FinishReason {
    fn from(reason: MessagesStopReason) -> Self {
        match reason {
            MessagesStopReason::EndTurn => FinishReason::Stop,
            MessagesStopReason::MaxTokens => FinishReason::Length,
            MessagesStopReason::StopSequence => FinishReason::Stop,
            MessagesStopReason::ToolUse => FinishReason::ToolCalls,
            MessagesStopReason::PauseTurn => FinishReason::Stop,
            MessagesStopReason::Refusal => FinishReason::ContentFilter,
            MessagesStopReason::Other => FinishReason::Stop,
        }
    }
}

impl From<FinishReason> for MessagesStopReason {
    fn from(reason: FinishReason) -> Self {
        match reason {
            FinishReason::Stop => MessagesStopReason::EndTurn,
            FinishReason::Length => MessagesStopReason::MaxTokens,
            FinishReason::ContentFilter => MessagesStopReason::StopSequence,
            FinishReason::ToolCalls | FinishReason::FunctionCall => MessagesStopReason::ToolUse,
            FinishReason::Other => MessagesStopReason::EndTurn,
        }
    }
}

impl From<GeminiFinishReason> for FinishReason {
    fn from(reason: GeminiFinishReason) -> Self {
        match reason {
            GeminiFinishReason::Stop => FinishReason::Stop,
            GeminiFinishReason::MaxTokens => FinishReason::Length,
            GeminiFinishReason::Safety
            | GeminiFinishReason::Recitation
            | GeminiFinishReason::Blocklist
            | GeminiFinishReason::ProhibitedContent
            | GeminiFinishReason::Spii => FinishReason::ContentFilter,
            GeminiFinishReason::MalformedFunctionCall | GeminiFinishReason::Other => {
                FinishReason::Stop
            }
        }
    }
}

impl From<GeminiFinishReason> for MessagesStopReason {
    fn from(reason: GeminiFinishReason) -> Self {
        match reason {
            GeminiFinishReason::Stop => MessagesStopReason::EndTurn,
            GeminiFinishReason::MaxTokens => MessagesStopReason::MaxTokens,
            GeminiFinishReason::Safety
            | GeminiFinishReason::Recitation
            | GeminiFinishReason::Blocklist
            | GeminiFinishReason::ProhibitedContent
            | GeminiFinishReason::Spii => MessagesStopReason::StopSequence,
            GeminiFinishReason::MalformedFunctionCall | GeminiFinishReason::Other => {
                MessagesStopReason::EndTurn
            }
        }
    }
}

impl From<FinishReason> for GeminiFinishReason {
    fn from(reason: FinishReason) -> Self {
        match reason {
            FinishReason::Stop => GeminiFinishReason::Stop,
            FinishReason::Length => GeminiFinishReason::MaxTokens,
            FinishReason::ContentFilter => GeminiFinishReason::Safety,
            FinishReason::ToolCalls | FinishReason::FunctionCall | FinishReason::Other => {
                GeminiFinishReason::Stop
            }
        }
    }
}

impl From<MessagesStopReason> for GeminiFinishReason {
    fn from(reason: MessagesStopReason) -> Self {
        match reason {
            MessagesStopReason::MaxTokens => GeminiFinishReason::MaxTokens,
            MessagesStopReason::Refusal => GeminiFinishReason::Safety,
            MessagesStopReason::EndTurn
            | MessagesStopReason::StopSequence
            | MessagesStopReason::ToolUse
            | MessagesStopReason::PauseTurn
            | MessagesStopReason::Other => GeminiFinishReason::Stop,
        }
    }
}
