use std::path::PathBuf;
use std::process::ExitCode;
use std::{env, io::ErrorKind};

use clap::{Parser, Subcommand};
use common::configuration::{Configuration, StaticChannelRegistry};
use dotenv::dotenv;
use irisgw::handlers::convert::{convert_request, convert_response};
use irisgw::handlers::stream::relay_stream;
use irisgw::handlers::GatewayError;
use irisgw::utils::tracing::init_tracer;
use irisllm::{ApiFormat, ConversionSettings, ConverterFactory};
use tokio::io::{AsyncReadExt, BufReader};
use tracing::{debug, error, info, warn};

const CONFIG_PATH: &str = "./irisgw.yaml";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert a client request for the backend behind a channel
    ConvertRequest {
        /// API path the request was sent to, e.g. /v1/messages
        #[arg(long)]
        path: String,

        /// Channel name from the configuration file
        #[arg(long)]
        channel: String,

        /// Request body; stdin when omitted
        file: Option<PathBuf>,
    },
    /// Convert an upstream reply back to the client format
    ConvertResponse {
        /// Format of the upstream reply (openai, anthropic or gemini)
        #[arg(long)]
        from: ApiFormat,

        /// Format the client expects
        #[arg(long)]
        to: ApiFormat,

        /// Model name reported to the client
        #[arg(long)]
        model: String,

        /// Response body; stdin when omitted
        file: Option<PathBuf>,
    },
    /// Relay an upstream SSE stream in the client format
    ConvertStream {
        /// Format of the upstream stream
        #[arg(long)]
        from: ApiFormat,

        /// Format the client expects
        #[arg(long)]
        to: ApiFormat,

        /// Model name reported to the client
        #[arg(long)]
        model: String,

        /// SSE transcript; stdin when omitted
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    init_tracer();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            eprintln!("error {}: {}", err.status_code(), err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), GatewayError> {
    let configuration = load_configuration()?;
    let settings = configuration.conversion_settings(ConversionSettings::from_env()?);
    debug!("conversion settings: {:?}", settings);
    let factory = ConverterFactory::new(settings);

    match cli.command {
        Command::ConvertRequest {
            path,
            channel,
            file,
        } => {
            let registry = StaticChannelRegistry::new(&configuration)?;
            let body = read_input(file.as_ref()).await?;
            let converted = convert_request(&factory, &registry, &path, &channel, &body)?;
            println!("{}", serde_json::to_string_pretty(&converted)?);
        }
        Command::ConvertResponse {
            from,
            to,
            model,
            file,
        } => {
            let body = read_input(file.as_ref()).await?;
            let converted = convert_response(&factory, from, to, &model, &body)?;
            println!("{}", serde_json::to_string_pretty(&converted)?);
        }
        Command::ConvertStream {
            from,
            to,
            model,
            file,
        } => {
            let session = factory.stream_session(to, from, &model);
            let stdout = tokio::io::stdout();
            match file {
                Some(path) => {
                    let upstream = tokio::fs::File::open(path).await?;
                    relay_stream(session, BufReader::new(upstream), stdout).await?;
                }
                None => {
                    relay_stream(session, BufReader::new(tokio::io::stdin()), stdout).await?;
                }
            }
        }
    }
    Ok(())
}

/// A missing file at the default location means no channels, not an error
fn load_configuration() -> Result<Configuration, GatewayError> {
    let explicit = env::var("IRISGW_CONFIG_PATH").ok();
    let config_path = explicit.clone().unwrap_or_else(|| CONFIG_PATH.to_string());
    info!("Loading configuration from {}", config_path);

    let contents = match std::fs::read_to_string(&config_path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound && explicit.is_none() => {
            warn!("{} not found, running without channels", config_path);
            return Ok(Configuration::default());
        }
        Err(err) => return Err(err.into()),
    };
    Ok(Configuration::from_yaml(&contents)?)
}

async fn read_input(file: Option<&PathBuf>) -> Result<String, GatewayError> {
    match file {
        Some(path) => Ok(tokio::fs::read_to_string(path).await?),
        None => {
            let mut body = String::new();
            tokio::io::stdin().read_to_string(&mut body).await?;
            Ok(body)
        }
    }
}
