//! Conversion knobs resolved from the environment or gateway configuration
//!
//! | Variable | Effect |
//! |---|---|
//! | `ANTHROPIC_MAX_TOKENS` | token limit for Anthropic targets when the request has none |
//! | `OPENAI_REASONING_MAX_TOKENS` | `max_completion_tokens` for reasoning requests to OpenAI |
//! | `ANTHROPIC_TO_OPENAI_LOW_REASONING_THRESHOLD` | budgets at or below map to `low` |
//! | `ANTHROPIC_TO_OPENAI_HIGH_REASONING_THRESHOLD` | budgets at or below map to `medium`, above to `high` |

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::ConfigurationError;

pub const ANTHROPIC_MAX_TOKENS: &str = "ANTHROPIC_MAX_TOKENS";
pub const OPENAI_REASONING_MAX_TOKENS: &str = "OPENAI_REASONING_MAX_TOKENS";
pub const LOW_REASONING_THRESHOLD: &str = "ANTHROPIC_TO_OPENAI_LOW_REASONING_THRESHOLD";
pub const HIGH_REASONING_THRESHOLD: &str = "ANTHROPIC_TO_OPENAI_HIGH_REASONING_THRESHOLD";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionSettings {
    pub anthropic_max_tokens: Option<u32>,
    pub openai_reasoning_max_tokens: Option<u32>,
    pub low_reasoning_threshold: Option<i64>,
    pub high_reasoning_threshold: Option<i64>,
}

impl ConversionSettings {
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Token-limit defaults degrade to unset on bad input, thresholds do not:
    /// a wrong tier would silently change billing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(ConversionSettings {
            anthropic_max_tokens: lenient_u32(&lookup, ANTHROPIC_MAX_TOKENS),
            openai_reasoning_max_tokens: lenient_u32(&lookup, OPENAI_REASONING_MAX_TOKENS),
            low_reasoning_threshold: strict_i64(&lookup, LOW_REASONING_THRESHOLD)?,
            high_reasoning_threshold: strict_i64(&lookup, HIGH_REASONING_THRESHOLD)?,
        })
    }

    /// Values set here win, unset values fall back to `fallback`
    pub fn or(self, fallback: ConversionSettings) -> ConversionSettings {
        ConversionSettings {
            anthropic_max_tokens: self.anthropic_max_tokens.or(fallback.anthropic_max_tokens),
            openai_reasoning_max_tokens: self
                .openai_reasoning_max_tokens
                .or(fallback.openai_reasoning_max_tokens),
            low_reasoning_threshold: self
                .low_reasoning_threshold
                .or(fallback.low_reasoning_threshold),
            high_reasoning_threshold: self
                .high_reasoning_threshold
                .or(fallback.high_reasoning_threshold),
        }
    }
}

fn lenient_u32<F>(lookup: &F, name: &'static str) -> Option<u32>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(name)?;
    match raw.trim().parse::<u32>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Invalid {} value '{}', ignoring it", name, raw);
            None
        }
    }
}

fn strict_i64<F>(lookup: &F, name: &'static str) -> Result<Option<i64>, ConfigurationError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| ConfigurationError::InvalidSetting { name, value: raw }),
    }
}

// ============================================================================
// MODEL TOKEN LIMITS
// ============================================================================

/// Output-token ceilings per Claude family, most specific patterns first
const CLAUDE_MAX_TOKENS: &[(&[&str], u32)] = &[
    (&["claude-opus-4", "claude-4-opus"], 32000),
    (
        &[
            "claude-sonnet-4",
            "claude-4-sonnet",
            "claude-sonnet-3.7",
            "claude-3-7-sonnet",
        ],
        64000,
    ),
    (
        &[
            "claude-sonnet-3.5",
            "claude-3-5-sonnet",
            "claude-haiku-3.5",
            "claude-3-5-haiku",
            "claude-neptune",
        ],
        8192,
    ),
    (&["claude-opus-3", "claude-haiku-3", "claude-3"], 4096),
];

/// Looks the model up in the family table, `None` for unknown models
pub fn claude_max_tokens(model: &str) -> Option<u32> {
    let model = model.to_lowercase();
    CLAUDE_MAX_TOKENS
        .iter()
        .find(|(patterns, _)| patterns.iter().any(|pattern| model.contains(pattern)))
        .map(|(_, limit)| *limit)
}
