//! Application state and logic

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use kiosk_core::{
    config::ClientConfig,
    fullscreen::FullscreenManager,
    ChannelHost, CommandPoller, ConnectionHealth, Dispatcher, DisplayState, FlagStore, HostEvent,
    KioskApi, Session, SessionState, Token,
};

/// Application result for main loop
#[derive(Debug, PartialEq, Eq)]
pub enum AppResult {
    Continue,
    Quit,
    /// Tear the session down and bootstrap again
    Reload,
}

/// One kiosk session, from bootstrap until quit or reload
pub struct App {
    config: ClientConfig,
    api: Arc<dyn KioskApi>,
    flags: FlagStore,

    /// Bootstrap state machine
    pub session: Session,

    /// Present once the session is ready
    pub display: Option<DisplayState>,

    pub fullscreen: FullscreenManager,

    /// Latest connection health, for the badge
    pub connection: ConnectionHealth,
    health: watch::Receiver<ConnectionHealth>,

    /// Whether the device takes viewer input
    pub accepts_input: bool,

    events: Option<mpsc::UnboundedReceiver<HostEvent>>,
    cancel: CancellationToken,
}

impl App {
    pub fn new(
        config: ClientConfig,
        token: Option<Token>,
        api: Arc<dyn KioskApi>,
        flags: FlagStore,
        health: watch::Receiver<ConnectionHealth>,
        cancel: CancellationToken,
    ) -> Self {
        let session = Session::new(token, flags.clone());
        let connection = health.borrow().clone();

        Self {
            config,
            api,
            flags,
            session,
            display: None,
            fullscreen: FullscreenManager::new(true),
            connection,
            health,
            accepts_input: true,
            events: None,
            cancel,
        }
    }

    /// Load the kiosk config and, when ready, start the poller and fullscreen lifecycle
    pub async fn bootstrap(&mut self) {
        let state = self.session.load(self.api.as_ref()).await.clone();
        let SessionState::Ready(kiosk) = state else {
            return;
        };
        let Some(token) = self.session.token().cloned() else {
            return;
        };

        let (host, events) = ChannelHost::new();
        let dispatcher = Dispatcher::new(host, self.flags.clone());
        let poller = CommandPoller::new(Arc::clone(&self.api), token, self.health.clone());
        tokio::spawn(poller.run(dispatcher, self.config.poll_interval(), self.cancel.clone()));

        self.accepts_input = kiosk.display_type.accepts_input();
        self.fullscreen = FullscreenManager::new(self.accepts_input);
        self.fullscreen
            .schedule(kiosk.start_fullscreen, Instant::now(), self.config.fullscreen_delay());

        self.display = Some(DisplayState::new(&kiosk));
        self.events = Some(events);
    }

    /// Fold pending remote effects and timers into the display
    pub fn tick(&mut self) -> AppResult {
        self.connection = self.health.borrow().clone();

        let Some(display) = self.display.as_mut() else {
            return AppResult::Continue;
        };
        display.connection = self.connection.clone();

        if let Some(events) = self.events.as_mut() {
            while let Ok(event) = events.try_recv() {
                display.apply(event);
            }
        }

        self.fullscreen.poll(Instant::now(), display);

        if display.reload_requested {
            tracing::info!("Reloading kiosk");
            return AppResult::Reload;
        }
        AppResult::Continue
    }

    /// Text for the loading or terminal screens
    pub fn session_message(&self) -> Option<&'static str> {
        match self.session.state() {
            SessionState::InvalidUrl => Some("Invalid kiosk URL: no device token"),
            SessionState::NotFound => Some("Kiosk not found"),
            state => state.loading_message(),
        }
    }
}

impl Drop for App {
    fn drop(&mut self) {
        // Stops the poller; nothing is dispatched into a torn-down session
        self.cancel.cancel();
    }
}
