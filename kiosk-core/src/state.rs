//! Display state for kiosk clients
//!
//! Elm-style: the poller's dispatcher emits [`HostEvent`]s over a channel and
//! the UI loop folds them into [`DisplayState`], so display state has a single
//! writer no matter which task produced the command.

use std::collections::{HashSet, VecDeque};

use tokio::sync::mpsc;

use crate::dispatcher::KioskHost;
use crate::fullscreen::{self, FullscreenError, FullscreenPlatform};
use crate::health::ConnectionHealth;
use crate::protocol::{CommandType, KioskCommand, KioskConfig};
use crate::router::{FixedView, RouteEntry, RouteTable};

/// Multiview commands kept for the multiview feature to consume
const MAX_MULTIVIEW_QUEUE: usize = 64;

/// Recent command identities remembered for de-duplication
const MAX_SEEN_MULTIVIEW: usize = 256;

/// Remote-driven change for the UI loop to apply
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    Overlay(String),
    Reload,
    ReloadPhotos,
    Navigate(String),
    Fullscreen(bool),
    Screensaver(bool),
    Multiview(KioskCommand),
}

/// [`KioskHost`] that forwards every effect to the UI loop
#[derive(Debug, Clone)]
pub struct ChannelHost {
    tx: mpsc::UnboundedSender<HostEvent>,
}

impl ChannelHost {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<HostEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: HostEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("Display loop gone, dropping host event");
        }
    }
}

impl KioskHost for ChannelHost {
    fn show_overlay(&mut self, message: &str) {
        self.send(HostEvent::Overlay(message.to_string()));
    }

    fn reload(&mut self) {
        self.send(HostEvent::Reload);
    }

    fn reload_photos(&mut self) {
        self.send(HostEvent::ReloadPhotos);
    }

    fn navigate(&mut self, path: &str) {
        self.send(HostEvent::Navigate(path.to_string()));
    }

    fn set_fullscreen(&mut self, enabled: bool) {
        self.send(HostEvent::Fullscreen(enabled));
    }

    fn set_screensaver(&mut self, active: bool) {
        self.send(HostEvent::Screensaver(active));
    }

    fn forward_multiview(&mut self, command: KioskCommand) {
        self.send(HostEvent::Multiview(command));
    }
}

/// Queue of multiview commands, de-duplicated by command identity.
///
/// Redelivery only ever repeats recent commands, so identities are kept for
/// a bounded window rather than for the whole session.
#[derive(Debug, Default)]
pub struct MultiviewQueue {
    pending: VecDeque<KioskCommand>,
    seen: HashSet<(CommandType, i64)>,
    seen_order: VecDeque<(CommandType, i64)>,
}

impl MultiviewQueue {
    /// Enqueue unless this exact command was already delivered
    pub fn push(&mut self, command: KioskCommand) -> bool {
        let identity = (command.command_type, command.timestamp);
        if !self.seen.insert(identity) {
            tracing::debug!("Duplicate multiview command {}", command.timestamp);
            return false;
        }
        self.seen_order.push_back(identity);
        if self.seen_order.len() > MAX_SEEN_MULTIVIEW {
            if let Some(oldest) = self.seen_order.pop_front() {
                self.seen.remove(&oldest);
            }
        }

        self.pending.push_back(command);
        if self.pending.len() > MAX_MULTIVIEW_QUEUE {
            self.pending.pop_front();
        }
        true
    }

    /// Most recently queued command
    pub fn latest(&self) -> Option<&KioskCommand> {
        self.pending.back()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// What the kiosk display currently shows
#[derive(Debug)]
pub struct DisplayState {
    pub table: RouteTable,
    pub current_path: String,

    pub screensaver: bool,
    /// Full-screen loading overlay message
    pub overlay: Option<String>,
    /// Navigation chrome hidden
    pub fullscreen: bool,

    /// Bumped on every photo refetch request
    pub photo_generation: u64,
    pub multiview: MultiviewQueue,

    pub connection: ConnectionHealth,

    /// A reload was requested; the owner tears the session down
    pub reload_requested: bool,
}

impl DisplayState {
    pub fn new(config: &KioskConfig) -> Self {
        let table = RouteTable::from_config(config);
        let screensaver = table.fixed == Some(FixedView::Screensaver);

        Self {
            current_path: table.home.clone(),
            table,
            screensaver,
            overlay: None,
            fullscreen: false,
            photo_generation: 0,
            multiview: MultiviewQueue::default(),
            connection: ConnectionHealth::default(),
            reload_requested: false,
        }
    }

    pub fn current_route(&self) -> Option<&RouteEntry> {
        self.table.get(&self.current_path)
    }

    pub fn navigate(&mut self, path: &str) {
        let resolved = self.table.resolve(path).to_string();
        if resolved != self.current_path {
            tracing::info!("Navigating to {}", resolved);
            self.current_path = resolved;
        }
    }

    pub fn step_route(&mut self, forward: bool) {
        if let Some(next) = self.table.step(&self.current_path, forward) {
            self.current_path = next.path.clone();
        }
    }

    pub fn screensaver_dismissible(&self) -> bool {
        self.table.fixed != Some(FixedView::Screensaver)
    }

    pub fn set_screensaver(&mut self, active: bool) {
        if !active && !self.screensaver_dismissible() {
            return;
        }
        self.screensaver = active;
    }

    pub fn apply(&mut self, event: HostEvent) {
        match event {
            HostEvent::Overlay(message) => self.overlay = Some(message),
            HostEvent::Reload => self.reload_requested = true,
            HostEvent::ReloadPhotos => self.photo_generation += 1,
            HostEvent::Navigate(path) => self.navigate(&path),
            HostEvent::Fullscreen(enabled) => {
                if let Err(e) = fullscreen::set_fullscreen(self, enabled) {
                    tracing::warn!("Fullscreen command failed: {}", e);
                }
            }
            HostEvent::Screensaver(active) => self.set_screensaver(active),
            HostEvent::Multiview(command) => {
                self.multiview.push(command);
            }
        }
    }
}

/// A terminal display is "fullscreen" when the chrome is hidden
impl FullscreenPlatform for DisplayState {
    fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    fn request(&mut self) -> Result<(), FullscreenError> {
        self.fullscreen = true;
        Ok(())
    }

    fn exit(&mut self) -> Result<(), FullscreenError> {
        self.fullscreen = false;
        Ok(())
    }
}
