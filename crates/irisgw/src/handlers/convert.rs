use common::configuration::ChannelRegistry;
use common::utils::shorten_string;
use irisllm::clients::detect_request;
use irisllm::{ApiFormat, ConverterFactory};
use serde_json::Value;
use tracing::{debug, info};

use super::GatewayError;

/// Detects the inbound format, routes it through `channel` and converts it
/// into the body that channel's backend expects
pub fn convert_request(
    factory: &ConverterFactory,
    registry: &impl ChannelRegistry,
    path: &str,
    channel: &str,
    body: &str,
) -> Result<Value, GatewayError> {
    debug!("request body: {}", shorten_string(body));
    let body: Value = serde_json::from_str(body)?;
    let request = detect_request(path, body)?;

    let resolved = registry.resolve(channel, &request.model)?;
    let request = if resolved.model == request.model {
        request
    } else {
        request.with_model(resolved.model.clone())
    };

    info!(
        "converting {} request for {} to {} channel {} ({})",
        request.format, request.model, resolved.provider, resolved.name, resolved.base_url
    );
    Ok(factory.convert_request(&request, resolved.provider)?)
}

/// Converts an upstream reply in `upstream` format into the `client` format
pub fn convert_response(
    factory: &ConverterFactory,
    upstream: ApiFormat,
    client: ApiFormat,
    model: &str,
    body: &str,
) -> Result<Value, GatewayError> {
    debug!("{} response body: {}", upstream, shorten_string(body));
    let body: Value = serde_json::from_str(body)?;
    Ok(factory.convert_response(client, upstream, body, model)?)
}
