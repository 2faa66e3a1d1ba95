//! intervention-server - Causal intervention backend
//!
//! Decides when a running simulation should be perturbed and serves the
//! resulting commands to polling clients over HTTP.

use clap::Parser;
use intervention_core::InterventionKind;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;
mod error;
mod routes;
mod state;

#[derive(Parser, Debug)]
#[command(name = "intervention-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long, env = "INTERVENTION_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "INTERVENTION_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "INTERVENTION_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "intervention_server=info,intervention_core=info".into()),
        )
        .init();

    info!("intervention-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = config::Config::load(args.config.as_deref())?.with_overrides(args.host, args.port);
    match &config.config_path {
        Some(path) => info!("Config loaded from {:?}", path),
        None => info!("No config file, using defaults"),
    }

    let state = state::AppState::new(config);
    let addr = state.config.bind_addr();
    let cooldown_ms = state.config.lifecycle.cooldown_ms;
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Causal intervention server listening on http://{}", addr);
    info!("Intervention cooldown: {}ms", cooldown_ms);
    info!(
        "Available intervention kinds: {}",
        InterventionKind::ALL
            .iter()
            .map(|kind| kind.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    info!("Force one with: GET /force_intervention/hand?duration=8000");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down...");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
