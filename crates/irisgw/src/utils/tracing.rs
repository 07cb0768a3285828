use std::sync::OnceLock;

use tracing_subscriber::EnvFilter;

static INIT_LOGGER: OnceLock<()> = OnceLock::new();

/// Logs go to stderr; stdout carries converted bodies only
pub fn init_tracer() {
    INIT_LOGGER.get_or_init(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_writer(std::io::stderr)
            .init();
    });
}
