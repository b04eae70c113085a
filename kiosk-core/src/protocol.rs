//! Wire types for kiosk communication
//!
//! All messages are JSON-serialized with camelCase field names. The protocol covers:
//! - Kiosk configuration (fetched once per session by token)
//! - Remote commands (polled with a timestamp cursor)
//! - Command issuance (admin side)

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque device token identifying one kiosk
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Generate a random 32-character hex token
    pub fn generate() -> Self {
        use rand::Rng;
        let bytes: [u8; 16] = rand::thread_rng().r#gen();
        Self(bytes.iter().map(|b| format!("{:02x}", b)).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Tokens end up in logs; only show a prefix
        let prefix: String = self.0.chars().take(8).collect();
        write!(f, "{}…", prefix)
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Key of a navigable route, e.g. "calendar"
pub type RouteKey = String;

/// How much of the navigation surface a kiosk exposes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DisplayMode {
    #[default]
    Full,
    ScreensaverOnly,
    CalendarOnly,
    DashboardOnly,
}

/// Physical interaction model of the device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DisplayType {
    #[default]
    Touch,
    Tv,
    DisplayOnly,
}

impl DisplayType {
    /// Whether the device can receive a click/tap/keypress from a viewer
    pub fn accepts_input(&self) -> bool {
        !matches!(self, DisplayType::DisplayOnly)
    }
}

/// Declarative description of one device's allowed surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KioskConfig {
    #[serde(default)]
    pub token: Token,

    /// Human label, used in logs and the server registry
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub display_mode: DisplayMode,

    #[serde(default)]
    pub display_type: DisplayType,

    #[serde(default = "default_home_page")]
    pub home_page: RouteKey,

    /// Opt-out flags: a route missing from the map is enabled
    #[serde(default)]
    pub enabled_features: HashMap<RouteKey, bool>,

    #[serde(default)]
    pub start_fullscreen: bool,
}

fn default_home_page() -> RouteKey {
    crate::router::DEFAULT_HOME.to_string()
}

impl KioskConfig {
    pub fn new(token: Token) -> Self {
        Self {
            token,
            name: String::new(),
            display_mode: DisplayMode::default(),
            display_type: DisplayType::default(),
            home_page: default_home_page(),
            enabled_features: HashMap::new(),
            start_fullscreen: false,
        }
    }

    /// Whether the feature behind a route key is enabled (default-enabled)
    pub fn feature_enabled(&self, key: &str) -> bool {
        self.enabled_features.get(key).copied().unwrap_or(true)
    }
}

/// Kind of remote command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CommandType {
    Refresh,
    ReloadPhotos,
    Navigate,
    Fullscreen,
    Screensaver,
    MultiviewAdd,
    MultiviewRemove,
    MultiviewClear,
    MultiviewSet,
    /// Any type this client does not understand
    #[serde(other)]
    Unknown,
}

impl CommandType {
    pub fn is_multiview(&self) -> bool {
        matches!(
            self,
            CommandType::MultiviewAdd
                | CommandType::MultiviewRemove
                | CommandType::MultiviewClear
                | CommandType::MultiviewSet
        )
    }
}

/// A single remotely-issued instruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KioskCommand {
    #[serde(rename = "type")]
    pub command_type: CommandType,

    /// Shape depends on `command_type`; interpreted by the dispatcher
    #[serde(default)]
    pub payload: serde_json::Value,

    /// Server-assigned, milliseconds; ordering and de-duplication key
    pub timestamp: i64,
}

impl KioskCommand {
    pub fn new(command_type: CommandType, payload: serde_json::Value, timestamp: i64) -> Self {
        Self {
            command_type,
            payload,
            timestamp,
        }
    }

    /// `payload.path` when it is a non-empty string
    pub fn path(&self) -> Option<&str> {
        self.payload
            .get("path")
            .and_then(|v| v.as_str())
            .filter(|p| !p.is_empty())
    }

    /// `payload.enabled` when it is a boolean
    pub fn enabled(&self) -> Option<bool> {
        self.payload.get("enabled").and_then(|v| v.as_bool())
    }
}

/// Body of a poll response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PollResponse {
    #[serde(default)]
    pub commands: Vec<KioskCommand>,
}

/// Body of an admin command issuance request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueCommandRequest {
    #[serde(rename = "type")]
    pub command_type: CommandType,

    #[serde(default)]
    pub payload: serde_json::Value,
}
