//! Response transformations, one module per target format
//!
//! Responses are converted into the shape the client asked for and always
//! report the client's model name, whatever the upstream called itself.

use crate::apis::{MessagesUsage, Usage, UsageMetadata};

pub mod anthropic;
pub mod gemini;
pub mod openai;

// ============================================================================
// USAGE CONVERSIONS
// ============================================================================

impl From<MessagesUsage> for Usage {
    fn from(usage: MessagesUsage) -> Self {
        Usage::new(usage.input_tokens, usage.output_tokens)
    }
}

impl From<Usage> for MessagesUsage {
    fn from(usage: Usage) -> Self {
        MessagesUsage::new(usage.prompt_tokens, usage.completion_tokens)
    }
}

impl From<UsageMetadata> for Usage {
    fn from(usage: UsageMetadata) -> Self {
        let mut converted = Usage::new(usage.prompt_token_count, usage.candidates_token_count);
        // thinking tokens count toward Gemini's total but not its candidates
        converted.total_tokens = converted.total_tokens.max(usage.total_token_count);
        converted
    }
}

impl From<UsageMetadata> for MessagesUsage {
    fn from(usage: UsageMetadata) -> Self {
        MessagesUsage::new(usage.prompt_token_count, usage.candidates_token_count)
    }
}

impl From<Usage> for UsageMetadata {
    fn from(usage: Usage) -> Self {
        UsageMetadata {
            prompt_token_count: usage.prompt_tokens,
            candidates_token_count: usage.completion_tokens,
            total_token_count: usage.total_tokens,
        }
    }
}

impl From<MessagesUsage> for UsageMetadata {
    fn from(usage: MessagesUsage) -> Self {
        UsageMetadata::new(usage.input_tokens, usage.output_tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_usage_conversions() {
        let openai: Usage = MessagesUsage::new(10, 5).into();
        assert_eq!(openai, Usage::new(10, 5));
        assert_eq!(openai.total_tokens, 15);

        let anthropic: MessagesUsage = Usage::new(7, 3).into();
        assert_eq!(anthropic, MessagesUsage::new(7, 3));

        let gemini: UsageMetadata = MessagesUsage::new(4, 6).into();
        assert_eq!(gemini.total_token_count, 10);
    }

    #[test]
    fn test_gemini_total_includes_thinking_tokens() {
        let usage: Usage = UsageMetadata {
            prompt_token_count: 10,
            candidates_token_count: 5,
            total_token_count: 40,
        }
        .into();
        assert_eq!(usage.prompt_tokens, 10);
        assert_eq!(usage.completion_tokens, 5);
        assert_eq!(usage.total_tokens, 40);
    }
}
