//! Process entry point: logging, configuration, and the HTTP gateway.

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = authgate::config::Config::from_env()?;
    authgate::gateway::run_gateway(config).await
}
