//! Keyboard input handling

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use kiosk_core::fullscreen;

use crate::app::{App, AppResult};

/// Handle a key event
pub fn handle_key(app: &mut App, key: KeyEvent) -> AppResult {
    let quit = matches!(key.code, KeyCode::Char('q')) && key.modifiers.is_empty()
        || key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL);
    if quit {
        return AppResult::Quit;
    }

    // Display-only devices ignore viewer input
    if !app.accepts_input {
        return AppResult::Continue;
    }

    let Some(display) = app.display.as_mut() else {
        return AppResult::Continue;
    };

    if app.fullscreen.prompt_visible() {
        if key.code == KeyCode::Enter {
            app.fullscreen.click_prompt(display);
        }
        return AppResult::Continue;
    }

    if display.screensaver {
        if matches!(key.code, KeyCode::Char(' ') | KeyCode::Esc | KeyCode::Enter) {
            display.set_screensaver(false);
        }
        return AppResult::Continue;
    }

    match key.code {
        KeyCode::Tab | KeyCode::Right | KeyCode::Char('l') => display.step_route(true),
        KeyCode::BackTab | KeyCode::Left | KeyCode::Char('h') => display.step_route(false),
        KeyCode::Char('f') => {
            let enabled = !display.fullscreen;
            if let Err(e) = fullscreen::set_fullscreen(display, enabled) {
                tracing::warn!("Fullscreen toggle failed: {}", e);
            }
        }
        _ => {}
    }

    AppResult::Continue
}
