pub mod anthropic;
pub mod gemini;
pub mod openai;

// Re-export all types for convenience
pub use anthropic::*;
pub use gemini::*;
pub use openai::*;

/// Common trait that all API definitions must implement
///
/// Each wire format exposes its endpoints and coarse capabilities through this
/// trait so detection and capability lookups stay generic over the format.
///
/// # Example
///
/// ```rust
/// use irisllm::apis::{AnthropicApi, ApiDefinition, GeminiApi, OpenAIApi};
///
/// fn describe<T: ApiDefinition>(api: &T) -> String {
///     format!("{} streaming={}", api.endpoint(), api.supports_streaming())
/// }
///
/// assert_eq!(describe(&OpenAIApi::ChatCompletions), "/v1/chat/completions streaming=true");
/// assert_eq!(describe(&AnthropicApi::Messages), "/v1/messages streaming=true");
/// assert!(GeminiApi::from_endpoint("/v1beta/models/gemini-pro:generateContent").is_some());
/// ```
pub trait ApiDefinition {
    /// Request path, for Gemini with a placeholder model
    fn endpoint(&self) -> &'static str;

    fn from_endpoint(endpoint: &str) -> Option<Self>
    where
        Self: Sized;

    fn supports_streaming(&self) -> bool;

    /// Function declarations or tool definitions are accepted
    fn supports_tools(&self) -> bool;

    /// Inline image content is accepted
    fn supports_vision(&self) -> bool;

    fn all_variants() -> Vec<Self>
    where
        Self: Sized;
}
