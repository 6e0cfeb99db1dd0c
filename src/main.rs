//! slm CLI entrypoint

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use slm::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Settings errors surface again when a command loads the config
    let debug = slm::config::config()
        .map(|cfg| cfg.settings.debug)
        .unwrap_or(false);
    let default_level = if debug { "debug" } else { "info" };

    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Parse and execute CLI
    let cli = Cli::parse();
    cli.execute().await
}
