use common::configuration::ChannelError;
use irisllm::{ConfigurationError, TransformError};
use thiserror::Error;

pub mod convert;
pub mod stream;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Failed to parse body: {0}")]
    InvalidBody(#[from] serde_json::Error),
    #[error("Failed to parse configuration: {0}")]
    InvalidConfig(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Transform(#[from] TransformError),
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl GatewayError {
    /// HTTP status class a transport would answer with
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::InvalidBody(_) => 400,
            GatewayError::Transform(err) => err.status_code(),
            GatewayError::Channel(ChannelError::UnknownChannel(_)) => 404,
            GatewayError::InvalidConfig(_)
            | GatewayError::Io(_)
            | GatewayError::Channel(_)
            | GatewayError::Configuration(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let unknown: GatewayError = ChannelError::UnknownChannel("x".to_string()).into();
        assert_eq!(unknown.status_code(), 404);

        let missing: GatewayError = TransformError::MissingField("model".to_string()).into();
        assert_eq!(missing.status_code(), 400);
        assert_eq!(missing.to_string(), "Missing required field: model");

        let provider: GatewayError =
            ConfigurationError::UnsupportedProvider("mistral".to_string()).into();
        assert_eq!(provider.status_code(), 500);

        let body: GatewayError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert_eq!(body.status_code(), 400);
    }
}
