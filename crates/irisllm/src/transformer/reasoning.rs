//! Reasoning budget translation
//!
//! Anthropic and Gemini express reasoning as a token budget, OpenAI as an
//! effort tier. Budgets become tiers through two configured thresholds; tiers
//! become budgets through a fixed table.

use crate::apis::ReasoningEffort;
use crate::clients::settings::{HIGH_REASONING_THRESHOLD, LOW_REASONING_THRESHOLD};
use crate::clients::{ConfigurationError, ConversionSettings};

/// Gemini's "let the model decide" budget
pub const DYNAMIC_BUDGET: i64 = -1;

/// Anthropic rejects thinking budgets below this
pub const MIN_THINKING_BUDGET: u32 = 1024;

#[derive(Debug, Clone, Copy)]
pub struct ReasoningMapper<'a> {
    settings: &'a ConversionSettings,
}

impl<'a> ReasoningMapper<'a> {
    pub fn new(settings: &'a ConversionSettings) -> Self {
        ReasoningMapper { settings }
    }

    /// Tier for a budget. No budget, or the dynamic sentinel, means `high`.
    pub fn effort_for_budget(
        &self,
        budget: Option<i64>,
    ) -> Result<ReasoningEffort, ConfigurationError> {
        let budget = match budget {
            None | Some(DYNAMIC_BUDGET) => return Ok(ReasoningEffort::High),
            Some(budget) => budget,
        };

        let low = self
            .settings
            .low_reasoning_threshold
            .ok_or(ConfigurationError::MissingSetting {
                name: LOW_REASONING_THRESHOLD,
            })?;
        let high = self
            .settings
            .high_reasoning_threshold
            .ok_or(ConfigurationError::MissingSetting {
                name: HIGH_REASONING_THRESHOLD,
            })?;

        Ok(if budget <= low {
            ReasoningEffort::Low
        } else if budget <= high {
            ReasoningEffort::Medium
        } else {
            ReasoningEffort::High
        })
    }
}

/// Budget used when a tier has to become a token count
pub fn budget_for_effort(effort: ReasoningEffort) -> u32 {
    match effort {
        ReasoningEffort::Low => 1024,
        ReasoningEffort::Medium => 8192,
        ReasoningEffort::High => 24576,
    }
}

/// Fits a thinking budget under Anthropic's `max_tokens`, `None` when no
/// valid budget fits
pub fn clamp_thinking_budget(budget: u32, max_tokens: u32) -> Option<u32> {
    let ceiling = max_tokens.checked_sub(1)?;
    let budget = budget.min(ceiling);
    (budget >= MIN_THINKING_BUDGET).then_some(budget)
}
