//! EHBP credential proxy.
//!
//! Sits between a browser or app holding no API key and an inference
//! enclave chosen per request. Adds the server credential, answers CORS
//! preflights, and relays the encrypted body and its handshake headers
//! without looking inside.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌───────────────────────────────────────────────┐
//!                         │                  EHBP PROXY                    │
//!                         │                                                │
//!     Client Request      │  ┌────────┐   ┌──────────┐   ┌─────────────┐  │
//!     ────────────────────┼─▶│  cors  │──▶│ resolver │──▶│ credential  │  │
//!                         │  │preflight│  │ upstream │   │  injector   │  │
//!                         │  └────────┘   └──────────┘   └──────┬──────┘  │
//!                         │                                     ▼         │
//!                         │                              ┌─────────────┐  │
//!                         │                              │   header    │  │
//!                         │                              │   curator   │  │
//!                         │                              └──────┬──────┘  │
//!                         │                                     ▼         │
//!     Client Response     │  ┌────────┐   ┌──────────┐   ┌─────────────┐  │
//!     ◀───────────────────┼──│streamer│◀──│ response │◀──│  forwarder  │◀─┼──── Upstream
//!                         │  │flush/bulk│ │ curator  │   │ single POST │  │     Enclave
//!                         │  └────────┘   └──────────┘   └─────────────┘  │
//!                         └───────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use ehbp_proxy::config::loader::{load_config, load_credential};
use ehbp_proxy::config::validation::validate_config;
use ehbp_proxy::config::{ConfigError, ProxyConfig};
use ehbp_proxy::http::HttpServer;
use ehbp_proxy::lifecycle::{signals, Shutdown};
use ehbp_proxy::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "ehbp-proxy")]
#[command(about = "Credential-injecting reverse proxy for EHBP-encrypted requests", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen address.
    #[arg(short, long)]
    bind: Option<String>,

    /// Override the log level.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init_logging(&config.observability.log_level);
    tracing::info!("ehbp-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        paths = ?config.upstream.paths,
        target_header = %config.upstream.target_header,
        delivery = ?config.streaming.delivery,
        "Configuration loaded"
    );

    let credential = load_credential(&config.credential)?;

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let shutdown = Shutdown::new();
    let server = HttpServer::new(&config, credential, shutdown.clone())?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    tokio::spawn(signals::shutdown_on_signal(shutdown));
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
