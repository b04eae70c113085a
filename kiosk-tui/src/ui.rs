//! Terminal UI rendering with ratatui

use ratatui::{
    layout::{Alignment, Constraint, Direction, Flex, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Tabs},
    Frame,
};

use kiosk_core::{
    health::ConnectionStatus,
    router::{FixedView, View},
    ConnectionHealth, DisplayState,
};

use crate::app::App;

/// Main draw function
pub fn draw(f: &mut Frame, app: &App) {
    let Some(ref display) = app.display else {
        draw_session_screen(f, app);
        return;
    };

    if display.screensaver {
        draw_screensaver(f, display, f.area());
    } else if display.fullscreen {
        draw_view(f, display, f.area());
    } else {
        let nav_height = if display.table.show_navigation { 1 } else { 0 };
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),          // Title bar
                Constraint::Length(nav_height), // Route tabs
                Constraint::Min(1),             // Current view
                Constraint::Length(1),          // Key hints
            ])
            .split(f.area());

        draw_title_bar(f, app, display, chunks[0]);
        if display.table.show_navigation {
            draw_tabs(f, display, chunks[1]);
        }
        draw_view(f, display, chunks[2]);
        draw_hints(f, app, chunks[3]);
    }

    // The connection badge stays visible in every mode
    draw_connection_badge(f, &app.connection);

    if let Some(ref message) = display.overlay {
        draw_centered_message(f, message, Color::White);
    } else if app.fullscreen.prompt_visible() {
        draw_centered_message(f, "Press Enter to go fullscreen", Color::Yellow);
    }
}

/// Loading, invalid URL and not-found screens
fn draw_session_screen(f: &mut Frame, app: &App) {
    let message = app.session_message().unwrap_or_default();
    let color = if app.session.state().is_terminal() { Color::Red } else { Color::White };
    if app.session.state().reload_overlay() {
        // Same backdrop the overlay had before the reload
        f.render_widget(Block::default().style(Style::default().bg(Color::DarkGray)), f.area());
    }
    draw_centered_message(f, message, color);
    draw_connection_badge(f, &app.connection);
}

fn draw_title_bar(f: &mut Frame, app: &App, display: &DisplayState, area: Rect) {
    let title = app
        .session
        .state()
        .config()
        .map(|k| if k.name.is_empty() { "Kiosk".to_string() } else { k.name.clone() })
        .unwrap_or_default();
    let page = display
        .current_route()
        .map(|r| r.view.title())
        .unwrap_or_default();

    let title_bar = Paragraph::new(Line::from(vec![
        Span::styled(format!(" {} ", title), Style::default().fg(Color::White).add_modifier(Modifier::BOLD)),
        Span::styled(format!("› {}", page), Style::default().fg(Color::Gray)),
    ]))
    .style(Style::default().bg(Color::DarkGray));

    f.render_widget(title_bar, area);
}

fn draw_tabs(f: &mut Frame, display: &DisplayState, area: Rect) {
    let titles: Vec<&str> = display.table.routes.iter().map(|r| r.view.title()).collect();
    let selected = display
        .table
        .routes
        .iter()
        .position(|r| r.path == display.current_path)
        .unwrap_or(0);

    let tabs = Tabs::new(titles)
        .select(selected)
        .highlight_style(Style::default().fg(Color::Black).bg(Color::Cyan));
    f.render_widget(tabs, area);
}

/// Page placeholder; page contents belong to the data collaborators
fn draw_view(f: &mut Frame, display: &DisplayState, area: Rect) {
    let view = match display.table.fixed {
        Some(FixedView::Page(view)) => Some(view),
        Some(FixedView::Screensaver) => None,
        None => display.current_route().map(|r| r.view),
    };
    let Some(view) = view else {
        draw_screensaver(f, display, area);
        return;
    };

    let mut lines = vec![Line::from(Span::styled(
        view.title(),
        Style::default().add_modifier(Modifier::BOLD),
    ))];
    match view {
        View::Photos => lines.push(Line::from(format!("photo refresh #{}", display.photo_generation))),
        View::Multiview => {
            if display.multiview.is_empty() {
                lines.push(Line::from("no multiview commands"));
            }
            if let Some(latest) = display.multiview.latest() {
                lines.push(Line::from(format!(
                    "{} queued, latest {:?}",
                    display.multiview.len(),
                    latest.command_type
                )));
            }
        }
        _ => {}
    }

    let block = Block::default().borders(Borders::ALL);
    f.render_widget(Paragraph::new(lines).alignment(Alignment::Center).block(block), area);
}

fn draw_screensaver(f: &mut Frame, display: &DisplayState, area: Rect) {
    let now = chrono::Local::now();
    let mut lines = vec![
        Line::from(Span::styled(
            now.format("%H:%M").to_string(),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(now.format("%A, %B %-d").to_string(), Style::default().fg(Color::Gray))),
    ];
    if display.screensaver_dismissible() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled("Space to dismiss", Style::default().fg(Color::DarkGray))));
    }

    let [center] = Layout::vertical([Constraint::Length(lines.len() as u16)])
        .flex(Flex::Center)
        .areas(area);
    f.render_widget(Clear, area);
    f.render_widget(Paragraph::new(lines).alignment(Alignment::Center), center);
}

fn draw_hints(f: &mut Frame, app: &App, area: Rect) {
    let hints = if !app.accepts_input {
        "q:quit"
    } else if app.display.as_ref().is_some_and(|d| d.table.show_navigation) {
        "Tab/→ next │ ←/S-Tab prev │ f:fullscreen │ q:quit"
    } else {
        "f:fullscreen │ q:quit"
    };
    f.render_widget(Paragraph::new(hints).style(Style::default().fg(Color::DarkGray)), area);
}

/// Passive offline/reconnecting indicator in the top-right corner
fn draw_connection_badge(f: &mut Frame, health: &ConnectionHealth) {
    let (label, color) = match health.status {
        ConnectionStatus::Online => return,
        ConnectionStatus::Offline => ("Offline", Color::Red),
        ConnectionStatus::Reconnecting => ("Reconnecting", Color::Yellow),
    };

    let text = match health.last_online_at {
        Some(at) => format!(" {} · last online {} ", label, at.with_timezone(&chrono::Local).format("%H:%M")),
        None => format!(" {} ", label),
    };

    let area = f.area();
    let width = (text.chars().count() as u16).min(area.width);
    let badge = Rect::new(area.x + area.width - width, area.y, width, area.height.min(1));
    f.render_widget(Clear, badge);
    f.render_widget(
        Paragraph::new(text).style(Style::default().fg(Color::Black).bg(color)),
        badge,
    );
}

fn draw_centered_message(f: &mut Frame, message: &str, color: Color) {
    let area = f.area();
    let [row] = Layout::vertical([Constraint::Length(3)]).flex(Flex::Center).areas(area);
    let width = (message.chars().count() as u16 + 4).min(area.width);
    let [cell] = Layout::horizontal([Constraint::Length(width)]).flex(Flex::Center).areas(row);

    f.render_widget(Clear, cell);
    f.render_widget(
        Paragraph::new(message)
            .alignment(Alignment::Center)
            .style(Style::default().fg(color).add_modifier(Modifier::BOLD))
            .block(Block::default().borders(Borders::ALL)),
        cell,
    );
}
