//! Display mode routing
//!
//! Derives the navigable surface of a kiosk from its [`KioskConfig`]:
//! which routes exist, where the display lands, and whether navigation
//! chrome is shown at all.

use serde::{Deserialize, Serialize};

use crate::protocol::{DisplayMode, KioskConfig, RouteKey};

/// Landing route when nothing else is enabled
pub const DEFAULT_HOME: &str = "calendar";

/// Page rendered for a route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    Calendar,
    Tasks,
    Dashboard,
    Photos,
    HomeAssistant,
    Spotify,
    Iptv,
    Multiview,
    Settings,
}

impl View {
    pub fn title(&self) -> &'static str {
        match self {
            View::Calendar => "Calendar",
            View::Tasks => "Tasks",
            View::Dashboard => "Dashboard",
            View::Photos => "Photos",
            View::HomeAssistant => "Home Assistant",
            View::Spotify => "Spotify",
            View::Iptv => "IPTV",
            View::Multiview => "Multiview",
            View::Settings => "Settings",
        }
    }
}

/// Declared routes, in navigation order
pub const ROUTES: &[(&str, View)] = &[
    ("calendar", View::Calendar),
    ("tasks", View::Tasks),
    ("dashboard", View::Dashboard),
    ("photos", View::Photos),
    ("homeassistant", View::HomeAssistant),
    ("spotify", View::Spotify),
    ("iptv", View::Iptv),
    ("multiview", View::Multiview),
    ("settings", View::Settings),
];

/// One navigable route handed to the display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    pub key: RouteKey,
    pub path: String,
    pub view: View,
}

/// The single page shown by restricted display modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixedView {
    /// Permanent screensaver that cannot be dismissed
    Screensaver,
    /// One page with a dismissible screensaver on top
    Page(View),
}

/// Router output for one kiosk configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTable {
    pub routes: Vec<RouteEntry>,
    pub home: String,
    pub show_navigation: bool,
    pub fixed: Option<FixedView>,
}

impl RouteTable {
    pub fn from_config(config: &KioskConfig) -> Self {
        let fixed = match config.display_mode {
            DisplayMode::Full => None,
            DisplayMode::ScreensaverOnly => Some(FixedView::Screensaver),
            DisplayMode::CalendarOnly => Some(FixedView::Page(View::Calendar)),
            DisplayMode::DashboardOnly => Some(FixedView::Page(View::Dashboard)),
        };

        if let Some(fixed) = fixed {
            let home = match fixed {
                FixedView::Page(view) => route_key(view).unwrap_or(DEFAULT_HOME).to_string(),
                FixedView::Screensaver => "screensaver".to_string(),
            };
            return Self {
                routes: Vec::new(),
                home,
                show_navigation: false,
                fixed: Some(fixed),
            };
        }

        let routes: Vec<RouteEntry> = ROUTES
            .iter()
            .filter(|(key, _)| config.feature_enabled(key))
            .map(|(key, view)| RouteEntry {
                key: key.to_string(),
                path: key.to_string(),
                view: *view,
            })
            .collect();

        let home = resolve_home(&config.home_page, &routes);

        Self {
            routes,
            home,
            show_navigation: true,
            fixed: None,
        }
    }

    pub fn get(&self, path: &str) -> Option<&RouteEntry> {
        let path = normalize(path);
        self.routes.iter().find(|r| r.path == path)
    }

    /// Path to actually show for a navigation request; unknown or disabled paths go home
    pub fn resolve<'a>(&'a self, path: &str) -> &'a str {
        match self.get(path) {
            Some(route) => &route.path,
            None => {
                tracing::debug!("Redirecting unknown or disabled path {:?} to {}", path, self.home);
                &self.home
            }
        }
    }

    /// Route after (or before, with `forward == false`) `current`, wrapping around
    pub fn step(&self, current: &str, forward: bool) -> Option<&RouteEntry> {
        if self.routes.is_empty() {
            return None;
        }
        let len = self.routes.len();
        let idx = self
            .routes
            .iter()
            .position(|r| r.path == normalize(current))
            .unwrap_or(0);
        let next = if forward { (idx + 1) % len } else { (idx + len - 1) % len };
        self.routes.get(next)
    }
}

fn route_key(view: View) -> Option<&'static str> {
    ROUTES.iter().find(|(_, v)| *v == view).map(|(k, _)| *k)
}

fn resolve_home(configured: &str, routes: &[RouteEntry]) -> String {
    let configured = normalize(configured);
    if routes.iter().any(|r| r.key == configured) {
        return configured.to_string();
    }
    routes
        .first()
        .map(|r| r.path.clone())
        .unwrap_or_else(|| DEFAULT_HOME.to_string())
}

fn normalize(path: &str) -> &str {
    path.trim().trim_matches('/')
}
