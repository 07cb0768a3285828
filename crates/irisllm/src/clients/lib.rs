//! Error types shared by every conversion path

use thiserror::Error;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Problems with provider names or environment settings. Never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),
    #[error("{name} environment variable is required for intelligent reasoning_effort determination")]
    MissingSetting { name: &'static str },
    #[error("Invalid value '{value}' for {name}: expected an integer")]
    InvalidSetting { name: &'static str, value: String },
}

/// A request or response that cannot be expressed in the target format
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Unsupported content type: {0}")]
    UnsupportedContent(String),
    #[error("Missing required field: {0}")]
    MissingField(String),
    #[error("Unsupported conversion: {0}")]
    UnsupportedConversion(String),
    #[error("Unknown Claude model '{0}'. Please specify max_tokens in the request or set ANTHROPIC_MAX_TOKENS environment variable.")]
    UnknownModel(String),
    #[error("For OpenAI reasoning models, max_completion_tokens is required. Please specify max_tokens in the request or set OPENAI_REASONING_MAX_TOKENS environment variable.")]
    ReasoningTokensRequired,
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl TransformError {
    /// HTTP status class the caller should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            TransformError::Configuration(_) => 500,
            _ => 400,
        }
    }
}

pub type ConversionResult<T> = Result<T, TransformError>;
