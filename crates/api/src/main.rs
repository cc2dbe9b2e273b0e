//! Lifelist API service entry point.

use anyhow::Result;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    info!("Lifelist API starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = lifelist_api::server::ApiRuntimeConfig::from_env()?;
    lifelist_api::server::run(config).await
}

/// Initialize tracing subscriber for logging
fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("lifelist_api=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_line_number(true))
        .init();
}
