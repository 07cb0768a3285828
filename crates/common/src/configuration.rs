use std::collections::HashMap;

use irisllm::{ApiFormat, ConfigurationError, ConversionSettings};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use thiserror::Error;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
    pub conversion: Option<ConversionSettings>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelConfig {
    pub name: String,
    pub provider: String,
    pub base_url: String,
    pub api_key: Option<String>,
    #[serde(default)]
    pub model_mapping: HashMap<String, String>,
}

impl ChannelConfig {
    /// Backend model for a requested one; unmapped names pass through
    pub fn map_model(&self, requested: &str) -> String {
        self.model_mapping
            .get(requested)
            .cloned()
            .unwrap_or_else(|| requested.to_string())
    }
}

impl Configuration {
    pub fn from_yaml(contents: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(contents)
    }

    /// Settings from the config file win over `env`
    pub fn conversion_settings(&self, env: ConversionSettings) -> ConversionSettings {
        match &self.conversion {
            Some(settings) => settings.clone().or(env),
            None => env,
        }
    }
}

// ============================================================================
// CHANNEL REGISTRY
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChannelError {
    #[error("Unknown channel: {0}")]
    UnknownChannel(String),
    #[error("Channel '{channel}': {source}")]
    InvalidChannel {
        channel: String,
        source: ConfigurationError,
    },
}

/// Everything the engine needs to address a backend for one request
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedChannel {
    pub name: String,
    pub provider: ApiFormat,
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
}

/// Read-only lookup from a routing key to a backend
pub trait ChannelRegistry {
    fn resolve(&self, channel: &str, requested_model: &str) -> Result<ResolvedChannel, ChannelError>;
}

/// Registry over the channels of a loaded configuration
#[derive(Debug, Clone)]
pub struct StaticChannelRegistry {
    channels: HashMap<String, (ApiFormat, ChannelConfig)>,
}

impl StaticChannelRegistry {
    /// Fails on the first channel whose provider is not a supported format
    pub fn new(configuration: &Configuration) -> Result<Self, ChannelError> {
        let mut channels = HashMap::new();
        for channel in &configuration.channels {
            let provider: ApiFormat =
                channel
                    .provider
                    .parse()
                    .map_err(|source| ChannelError::InvalidChannel {
                        channel: channel.name.clone(),
                        source,
                    })?;
            if channels
                .insert(channel.name.clone(), (provider, channel.clone()))
                .is_some()
            {
                warn!("channel '{}' is defined twice, keeping the last one", channel.name);
            }
        }
        debug!("loaded {} channels", channels.len());
        Ok(StaticChannelRegistry { channels })
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

impl ChannelRegistry for StaticChannelRegistry {
    fn resolve(&self, channel: &str, requested_model: &str) -> Result<ResolvedChannel, ChannelError> {
        let (provider, config) = self
            .channels
            .get(channel)
            .ok_or_else(|| ChannelError::UnknownChannel(channel.to_string()))?;

        let model = config.map_model(requested_model);
        if model != requested_model {
            debug!("channel {} maps model {} to {}", channel, requested_model, model);
        }

        Ok(ResolvedChannel {
            name: config.name.clone(),
            provider: *provider,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            model,
        })
    }
}
