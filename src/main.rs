use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use axum::Router;
use clap::Parser;
use http::Method;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use s2s_relay::{AppState, ServerConfig, routes};

/// S2S Relay - real-time speech-to-speech relay gateway
#[derive(Parser, Debug)]
#[command(name = "s2s-relay")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the configured bind host
    #[arg(long)]
    host: Option<String>,

    /// Override the configured bind port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Crypto provider for outbound TLS (inference channel, resolver).
    // Must be installed before any TLS connection is attempted
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::from_env()?,
    };
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    config.validate()?;

    let address = config.address();
    let state = Arc::new(AppState::new(config)?);

    // Browser clients connect straight to the relay
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers(Any);

    let app: Router = routes::create_router(state).layer(cors);

    let listener = TcpListener::bind(&address).await?;
    info!("s2s-relay listening on {address}");
    axum::serve(listener, app).await?;

    Ok(())
}
