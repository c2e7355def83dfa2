use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::anyhow;
use axum::middleware;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use assistant_gateway::{
    ServerConfig, middleware::connection_limit_middleware, routes, state::AppState,
};

/// Assistant Gateway - Real-time voice assistant server
#[derive(Parser, Debug)]
#[command(name = "assistant-gateway")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    // Load configuration from file or environment
    let config = if let Some(config_path) = cli.config {
        println!("Loading configuration from {}", config_path.display());
        ServerConfig::from_file(&config_path).map_err(|e| anyhow!(e.to_string()))?
    } else {
        ServerConfig::from_env().map_err(|e| anyhow!(e.to_string()))?
    };

    let address = config.address();
    info!(
        stt = %config.stt_url,
        tts = %config.tts_url,
        ttt = %config.ttt_url,
        "Backend endpoints configured"
    );
    println!("Starting server on {address}");

    // Backend channels are created per session, so nothing connects yet
    let app_state = AppState::new(config);

    // WebSocket routes enforce the global and per-IP connection limits
    let assistant_routes = routes::assistant::create_assistant_router().layer(
        middleware::from_fn_with_state(app_state.clone(), connection_limit_middleware),
    );

    let app = routes::api::create_api_router()
        .merge(assistant_routes)
        .with_state(app_state);

    let socket_addr: SocketAddr = address
        .parse()
        .map_err(|e| anyhow!("Invalid server address '{}': {}", address, e))?;

    println!("Server listening on http://{}", socket_addr);

    let listener = TcpListener::bind(&socket_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
