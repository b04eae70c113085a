//! kiosk-server: configuration and command daemon for kiosk displays
//!
//! Displays poll this server; administrators push commands to it:
//! - Serves each kiosk's configuration by device token
//! - Keeps a short per-kiosk command log with strictly increasing timestamps
//! - Answers `since`-cursor polls with every newer command
//! - Accepts new commands from bearer-authenticated admins

mod handlers;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    routing::get,
    Router,
};
use clap::Parser;
use tokio::sync::RwLock;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use kiosk_core::{Config, Token};

use crate::handlers::SharedState;
use crate::state::AppState;

#[derive(Parser)]
#[command(name = "kiosk-server", about = "Kiosk configuration and command server", long_about = None)]
struct Args {
    /// Config file (defaults to the platform config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the listen port
    #[arg(long)]
    port: Option<u16>,

    /// Fill in missing admin and kiosk tokens, write the config back and exit
    #[arg(long)]
    init_config: bool,
}

/// Build the HTTP router
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/api/kiosk/{token}", get(handlers::config_handler))
        .route(
            "/api/kiosk/{token}/commands",
            get(handlers::poll_handler).post(handlers::issue_handler),
        )
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "kiosk_server=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    // Load configuration
    let loaded = match args.config {
        Some(ref path) => Config::load_from(path),
        None => Config::load(),
    };
    let mut config = loaded.unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}, using defaults", e);
        Config::default()
    });
    if let Some(port) = args.port {
        config.server.port = port;
    }

    if args.init_config {
        if config.server.admin_token.as_deref().is_none_or(str::is_empty) {
            config.server.admin_token = Some(Token::generate().as_str().to_string());
        }
        for kiosk in config.server.kiosks.iter_mut().filter(|k| k.token.is_empty()) {
            kiosk.token = Token::generate();
        }
        match args.config {
            Some(ref path) => config.save_to(path)?,
            None => config.save()?,
        }
        tracing::info!("Wrote config with {} kiosk(s)", config.server.kiosks.len());
        return Ok(());
    }

    let admin_token = match config.server.admin_token.take() {
        Some(token) if !token.is_empty() => token,
        _ => {
            let token = Token::generate();
            tracing::info!("Generated admin token (will change on restart): {}", token.as_str());
            token.as_str().to_string()
        }
    };

    if config.server.kiosks.is_empty() {
        tracing::warn!("No kiosks configured; every display will get 404");
    }

    // Create shared application state
    let state = Arc::new(RwLock::new(AppState::new(
        config.server.kiosks,
        admin_token,
        config.server.max_commands_per_kiosk,
    )));

    let app = router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from((
        config.server.listen_addr.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));
    tracing::info!("kiosk-server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
