//! kiosk-tui: terminal kiosk display
//!
//! Shows a kiosk's pages and follows the remote-control commands issued
//! to it on the server:
//! - Route navigation, screensaver and fullscreen chrome
//! - Periodic command polling, suspended while offline
//! - Reload that survives as a full teardown and bootstrap

mod app;
mod input;
mod ui;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use kiosk_core::{
    config::ClientConfig, Config, ConnectionHealth, FlagStore, HealthMonitor, KioskApi, KioskClient,
    Token,
};

use crate::app::{App, AppResult};
use crate::input::handle_key;

type Tui = Terminal<CrosstermBackend<io::Stdout>>;

#[derive(Parser)]
#[command(name = "kiosk-tui", about = "Terminal kiosk display", long_about = None)]
struct Args {
    /// Device token identifying this kiosk
    #[arg(long)]
    token: Option<String>,

    /// Kiosk server base URL
    #[arg(long)]
    server: Option<String>,

    /// Config file (defaults to the platform config dir)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Log to file; stdout belongs to the terminal UI
    let log_file = dirs::cache_dir()
        .map(|d| d.join("kiosk").join("tui.log"))
        .unwrap_or_else(|| PathBuf::from("/tmp/kiosk-tui.log"));

    if let Some(parent) = log_file.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file_appender = tracing_appender::rolling::never(
        log_file.parent().unwrap_or(std::path::Path::new("/tmp")),
        log_file.file_name().unwrap_or(std::ffi::OsStr::new("kiosk-tui.log")),
    );

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "kiosk_tui=debug,kiosk_core=debug".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(file_appender))
        .init();

    let args = Args::parse();

    let loaded = match args.config {
        Some(ref path) => Config::load_from(path),
        None => Config::load(),
    };
    let mut client = loaded
        .unwrap_or_else(|e| {
            tracing::warn!("Failed to load config: {}, using defaults", e);
            Config::default()
        })
        .client;
    if let Some(server) = args.server {
        client.server_url = server;
    }
    let token = args
        .token
        .or_else(|| client.token.clone())
        .map(Token::new)
        .filter(|t| !t.is_empty());

    let state_dir = client.state_dir()?;
    std::fs::create_dir_all(&state_dir)?;
    let flags = FlagStore::open(&state_dir);

    let api: Arc<dyn KioskApi> = Arc::new(KioskClient::new(&client.server_url));
    tracing::info!("Kiosk display starting against {}", client.server_url);

    let root = CancellationToken::new();
    let (monitor, health) = HealthMonitor::new();
    tokio::spawn(monitor.run(
        Arc::clone(&api),
        client.health_interval(),
        client.offline_after_failures,
        root.clone(),
    ));

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_sessions(&mut terminal, &client, token, api, flags, health, &root).await;

    // Restore terminal
    root.cancel();
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        return Err(e);
    }

    Ok(())
}

/// Bootstrap a session, run it, and start over whenever it asks for a reload
async fn run_sessions(
    terminal: &mut Tui,
    client: &ClientConfig,
    token: Option<Token>,
    api: Arc<dyn KioskApi>,
    flags: FlagStore,
    health: watch::Receiver<ConnectionHealth>,
    root: &CancellationToken,
) -> anyhow::Result<()> {
    loop {
        let mut app = App::new(
            client.clone(),
            token.clone(),
            Arc::clone(&api),
            flags.clone(),
            health.clone(),
            root.child_token(),
        );

        terminal.draw(|f| ui::draw(f, &app))?;
        app.bootstrap().await;

        match run_app(terminal, &mut app).await? {
            AppResult::Reload => continue,
            AppResult::Quit | AppResult::Continue => return Ok(()),
        }
    }
}

/// Main application loop
async fn run_app(terminal: &mut Tui, app: &mut App) -> anyhow::Result<AppResult> {
    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        // Poll for events with timeout (lets the poller and health tasks run)
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && handle_key(app, key) == AppResult::Quit {
                    return Ok(AppResult::Quit);
                }
            }
        }

        match app.tick() {
            AppResult::Continue => tokio::task::yield_now().await,
            other => return Ok(other),
        }
    }
}
