//! Command dispatch
//!
//! Every remote command maps to exactly one [`Effect`]. The mapping is pure;
//! applying it goes through a [`KioskHost`], which is the display's surface
//! for remote-driven state. Effects are safe to apply more than once since
//! polling redelivers.

use crate::protocol::{CommandType, KioskCommand};
use crate::storage::{Flag, FlagStore};

/// Message shown on the overlay injected by a `refresh` command
pub const REFRESHING_MESSAGE: &str = "Refreshing kiosk...";

/// Display operations the dispatcher drives
pub trait KioskHost: Send {
    /// Show the full-screen loading overlay with `message`
    fn show_overlay(&mut self, message: &str);

    /// Tear the display down and bootstrap again
    fn reload(&mut self);

    /// Ask the photo collaborator to refetch
    fn reload_photos(&mut self);

    /// Client-side navigation; the host redirects unknown paths home
    fn navigate(&mut self, path: &str);

    /// Enter (`true`) or exit (`false`) fullscreen
    fn set_fullscreen(&mut self, enabled: bool);

    fn set_screensaver(&mut self, active: bool);

    /// Hand a multiview command to its queue unmodified
    fn forward_multiview(&mut self, command: KioskCommand);
}

/// Side effect of one command
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Reload,
    ReloadPhotos,
    Navigate(String),
    Fullscreen(bool),
    Screensaver(bool),
    Multiview(KioskCommand),
    /// Unknown type or malformed payload
    Discard(&'static str),
}

impl Effect {
    pub fn from_command(command: &KioskCommand) -> Self {
        match command.command_type {
            CommandType::Refresh => Effect::Reload,
            CommandType::ReloadPhotos => Effect::ReloadPhotos,
            CommandType::Navigate => match command.path() {
                Some(path) => Effect::Navigate(path.to_string()),
                None => Effect::Discard("navigate without a path"),
            },
            CommandType::Fullscreen => match command.enabled() {
                Some(enabled) => Effect::Fullscreen(enabled),
                None => Effect::Discard("fullscreen without a boolean `enabled`"),
            },
            CommandType::Screensaver => match command.enabled() {
                Some(enabled) => Effect::Screensaver(enabled),
                None => Effect::Discard("screensaver without a boolean `enabled`"),
            },
            CommandType::MultiviewAdd
            | CommandType::MultiviewRemove
            | CommandType::MultiviewClear
            | CommandType::MultiviewSet => Effect::Multiview(command.clone()),
            CommandType::Unknown => Effect::Discard("unknown command type"),
        }
    }
}

/// Single authorised mutator of remote-driven display state
pub struct Dispatcher<H> {
    host: H,
    flags: FlagStore,
    reload_pending: bool,
}

impl<H: KioskHost> Dispatcher<H> {
    pub fn new(host: H, flags: FlagStore) -> Self {
        Self {
            host,
            flags,
            reload_pending: false,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn dispatch(&mut self, command: &KioskCommand) {
        let effect = Effect::from_command(command);
        tracing::debug!("Command {:?}@{} -> {:?}", command.command_type, command.timestamp, effect);
        self.apply(effect);
    }

    pub fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::Reload => self.refresh(),
            Effect::ReloadPhotos => self.host.reload_photos(),
            Effect::Navigate(path) => self.host.navigate(&path),
            Effect::Fullscreen(enabled) => self.host.set_fullscreen(enabled),
            Effect::Screensaver(active) => self.host.set_screensaver(active),
            Effect::Multiview(command) => self.host.forward_multiview(command),
            Effect::Discard(reason) => tracing::warn!("Discarding command: {}", reason),
        }
    }

    fn refresh(&mut self) {
        for flag in [Flag::Refreshing, Flag::ReloadOverlay] {
            if let Err(e) = self.flags.set(flag, true) {
                tracing::error!("Failed to persist {:?}: {}", flag, e);
            }
        }
        self.host.show_overlay(REFRESHING_MESSAGE);

        if self.reload_pending {
            tracing::debug!("Reload already pending");
            return;
        }
        self.reload_pending = true;
        self.host.reload();
    }
}
