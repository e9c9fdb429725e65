use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use ws_router::config::{load_config, AuthMode, EndpointConfig, RouterConfig};
use ws_router::http::ServerError;
use ws_router::lifecycle::{signals, startup, Shutdown};
use ws_router::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "ws-router", version, about = "WebSocket connection and message router")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// Configuration used without a file: one open endpoint on every path.
fn default_config() -> RouterConfig {
    RouterConfig {
        endpoints: vec![EndpointConfig {
            name: "default".to_string(),
            path: "^/".to_string(),
            auth: AuthMode::None,
        }],
        ..RouterConfig::default()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => default_config(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "ws-router starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        endpoints = config.endpoints.len(),
        auth_timeout_ms = config.auth.timeout_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr).map_err(ServerError::from)?;
    }

    // The trees must stay alive while serving; connections hold weak handles.
    let (server, _trees) = startup::build_server(&config, startup::default_dispatcher())?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    signals::spawn_signal_listener(shutdown.clone());

    server.run(listener, receiver).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
