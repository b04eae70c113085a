//! Fullscreen lifecycle
//!
//! Platforms commonly reject fullscreen requests that do not come from a
//! user gesture. The manager makes a single automatic attempt shortly after
//! the session is ready and falls back to a click-to-enter prompt.

use std::time::{Duration, Instant};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FullscreenError {
    #[error("Fullscreen request rejected: {0}")]
    Rejected(String),
}

/// Platform fullscreen primitive. Requests matching the current state are no-ops
pub trait FullscreenPlatform {
    fn is_fullscreen(&self) -> bool;
    fn request(&mut self) -> Result<(), FullscreenError>;
    fn exit(&mut self) -> Result<(), FullscreenError>;
}

/// Enter or leave fullscreen, skipping the call when already in the wanted state
pub fn set_fullscreen<P: FullscreenPlatform + ?Sized>(
    platform: &mut P,
    enabled: bool,
) -> Result<(), FullscreenError> {
    if platform.is_fullscreen() == enabled {
        return Ok(());
    }
    if enabled {
        platform.request()
    } else {
        platform.exit()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoEntryState {
    NotAttempted,
    /// Waiting for the settle delay to pass
    Attempting { at: Instant },
    Entered,
    PromptShown,
    /// Prompt clicked and the retry failed, or the device cannot show a prompt
    Dismissed,
}

#[derive(Debug)]
pub struct FullscreenManager {
    state: AutoEntryState,
    attempted: bool,
    accepts_input: bool,
}

impl FullscreenManager {
    pub fn new(accepts_input: bool) -> Self {
        Self {
            state: AutoEntryState::NotAttempted,
            attempted: false,
            accepts_input,
        }
    }

    pub fn state(&self) -> AutoEntryState {
        self.state
    }

    pub fn prompt_visible(&self) -> bool {
        self.state == AutoEntryState::PromptShown
    }

    /// Called on session readiness (and harmlessly on every re-render after)
    pub fn schedule(&mut self, start_fullscreen: bool, now: Instant, delay: Duration) {
        if !start_fullscreen || self.attempted {
            return;
        }
        self.attempted = true;
        self.state = AutoEntryState::Attempting { at: now + delay };
    }

    /// Make the automatic attempt once its delay has elapsed
    pub fn poll<P: FullscreenPlatform + ?Sized>(&mut self, now: Instant, platform: &mut P) {
        let AutoEntryState::Attempting { at } = self.state else {
            return;
        };
        if now < at {
            return;
        }

        self.state = match set_fullscreen(platform, true) {
            Ok(()) => {
                tracing::info!("Entered fullscreen");
                AutoEntryState::Entered
            }
            Err(e) if self.accepts_input => {
                tracing::info!("Automatic fullscreen failed ({}), showing prompt", e);
                AutoEntryState::PromptShown
            }
            Err(e) => {
                tracing::warn!("Automatic fullscreen failed ({}) on a display without input", e);
                AutoEntryState::Dismissed
            }
        };
    }

    /// User clicked the prompt. One more attempt; the prompt goes away either way
    pub fn click_prompt<P: FullscreenPlatform + ?Sized>(&mut self, platform: &mut P) {
        if self.state != AutoEntryState::PromptShown {
            return;
        }

        self.state = match set_fullscreen(platform, true) {
            Ok(()) => AutoEntryState::Entered,
            Err(e) => {
                tracing::warn!("Fullscreen from prompt failed: {}", e);
                AutoEntryState::Dismissed
            }
        };
    }
}
