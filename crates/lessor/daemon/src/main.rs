//! lessord - provider-side marketplace daemon
//!
//! The daemon:
//! - prices bids for open orders
//! - deploys awarded leases and reconciles them against their manifests
//! - watches the provider's escrow balance
//! - serves aggregate status over HTTP

use clap::Parser;
use lessor_daemon::{DaemonConfig, DaemonError, DaemonResult, Server};
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Lessor daemon CLI
#[derive(Parser)]
#[command(name = "lessord")]
#[command(about = "Lessor - provider-side resource marketplace daemon", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "LESSOR_CONFIG")]
    config: Option<String>,

    /// Listen address, overrides server.listen_addr
    #[arg(short, long, env = "LESSOR_LISTEN_ADDR")]
    listen: Option<String>,

    /// Log level, overrides logging.level
    #[arg(long, env = "LESSOR_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "LESSOR_LOG_JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> DaemonResult<()> {
    let cli = Cli::parse();

    let mut config = DaemonConfig::load(cli.config.as_deref())?;
    if let Some(listen) = &cli.listen {
        config.server.listen_addr = listen
            .parse::<SocketAddr>()
            .map_err(|e| DaemonError::Config(format!("invalid listen address {listen}: {e}")))?;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.logging.json |= cli.json;

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!(
        listen_addr = %config.server.listen_addr,
        config_file = ?cli.config,
        "Starting lessord"
    );

    let server = Server::new(config)?;
    server.run().await
}
