//! kiosk-core: Shared library for remotely controlled kiosk displays
//!
//! This crate provides:
//! - Protocol types for kiosk configuration and remote commands
//! - Command poller with at-least-once delivery and a monotonic cursor
//! - Command dispatcher mapping commands to idempotent display effects
//! - Display mode router and fullscreen lifecycle
//! - Session bootstrap, connection health, durable client flags

pub mod client;
pub mod config;
pub mod dispatcher;
pub mod fullscreen;
pub mod health;
pub mod poller;
pub mod protocol;
pub mod router;
pub mod session;
pub mod state;
pub mod storage;

pub use client::{ApiError, KioskApi, KioskClient};
pub use config::Config;
pub use dispatcher::{Dispatcher, Effect, KioskHost};
pub use health::{ConnectionHealth, ConnectionStatus, HealthMonitor};
pub use poller::{CommandPoller, PollCursor};
pub use protocol::{CommandType, KioskCommand, KioskConfig, Token};
pub use router::RouteTable;
pub use session::{Session, SessionState};
pub use state::{ChannelHost, DisplayState, HostEvent};
pub use storage::{Flag, FlagStore};

/// Default HTTP port for kiosk-server
pub const DEFAULT_PORT: u16 = 9281;
