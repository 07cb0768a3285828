//! irisllm: translates LLM API requests, responses and streams between the
//! OpenAI Chat Completions, Anthropic Messages and Gemini generateContent formats.

use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod apis;
pub mod clients;
pub mod factory;
pub mod streaming;
pub mod transformer;

pub use clients::{ConfigurationError, ConversionResult, ConversionSettings, TransformError};
pub use factory::{Conversion, ConverterFactory, FormatCapabilities};

/// The three wire formats the engine speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiFormat {
    OpenAI,
    Anthropic,
    Gemini,
}

impl ApiFormat {
    pub fn all() -> [ApiFormat; 3] {
        [ApiFormat::OpenAI, ApiFormat::Anthropic, ApiFormat::Gemini]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ApiFormat::OpenAI => "openai",
            ApiFormat::Anthropic => "anthropic",
            ApiFormat::Gemini => "gemini",
        }
    }
}

impl FromStr for ApiFormat {
    type Err = ConfigurationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "openai" => Ok(ApiFormat::OpenAI),
            "anthropic" | "claude" => Ok(ApiFormat::Anthropic),
            "gemini" | "google" => Ok(ApiFormat::Gemini),
            _ => Err(ConfigurationError::UnsupportedProvider(value.to_string())),
        }
    }
}

impl Display for ApiFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiFormat::OpenAI => write!(f, "OpenAI"),
            ApiFormat::Anthropic => write!(f, "Anthropic"),
            ApiFormat::Gemini => write!(f, "Gemini"),
        }
    }
}
