//! Tollgate — device-authorization-grant proxy.
//!
//! Main entry point: loads the environment, builds the store and the
//! outbound client, and serves until interrupted.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use tollgate_config::ProxyConfig;
use tollgate_oauth::HttpUpstream;
use tollgate_server::{AppState, Server};
use tollgate_store::MemoryStore;

/// How often the in-memory store sweeps expired records.
const REAPER_INTERVAL: Duration = Duration::from_secs(60);

/// Device-authorization-grant proxy for upstream OAuth servers.
#[derive(Parser)]
#[command(name = "tollgate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Address to bind the HTTP server to
    #[arg(long, env = "BIND_ADDRESS", default_value = "0.0.0.0:8080")]
    bind: SocketAddr,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A .env next to the binary is the usual deployment surface; absence is fine.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter = if cli.verbose {
        "tollgate=debug,tollgate_server=debug,tollgate_oauth=debug,tollgate_store=debug,info"
    } else {
        "tollgate=info,tollgate_server=info,tollgate_oauth=info,warn"
    };
    tracing_subscriber::fmt()
        .with_target(true)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    let config = ProxyConfig::from_env().context("loading configuration")?;
    tracing::info!(
        base_url = %config.base_url,
        flow = ?config.flow,
        pkce = config.pkce,
        "Configuration loaded"
    );

    let store = MemoryStore::new();
    let _reaper = store.spawn_reaper(REAPER_INTERVAL);

    let upstream = Arc::new(
        HttpUpstream::new(config.request_timeout).context("building upstream HTTP client")?,
    );

    let state = AppState::new(config, Arc::new(store), upstream);
    Server::new(state)
        .run(cli.bind)
        .await
        .context("running server")?;

    Ok(())
}
