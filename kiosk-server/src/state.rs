//! Shared server state

use std::collections::{HashMap, VecDeque};

use subtle::ConstantTimeEq;

use kiosk_core::protocol::{IssueCommandRequest, KioskCommand, KioskConfig, Token};

/// One registered kiosk and its recent commands
pub struct KioskEntry {
    pub config: KioskConfig,
    /// Ascending by timestamp
    pub commands: VecDeque<KioskCommand>,
    pub last_timestamp: i64,
}

/// Shared application state
pub struct AppState {
    /// Registered kiosks by device token
    pub kiosks: HashMap<Token, KioskEntry>,

    /// Bearer token for command issuance
    admin_token: String,

    /// Commands kept per kiosk
    pub max_commands: usize,
}

impl AppState {
    pub fn new(kiosks: Vec<KioskConfig>, admin_token: String, max_commands: usize) -> Self {
        let mut registry = HashMap::with_capacity(kiosks.len());
        for mut config in kiosks {
            if config.token.is_empty() {
                config.token = Token::generate();
                tracing::info!(
                    "Generated token for kiosk {:?}: {}",
                    config.name,
                    config.token.as_str()
                );
            }
            if let Some(existing) = registry.get(&config.token).map(|e: &KioskEntry| &e.config) {
                tracing::warn!(
                    "Kiosk {:?} reuses the token of {:?}; ignoring the later entry",
                    config.name,
                    existing.name
                );
                continue;
            }
            let entry = KioskEntry {
                config,
                commands: VecDeque::new(),
                last_timestamp: 0,
            };
            registry.insert(entry.config.token.clone(), entry);
        }

        Self {
            kiosks: registry,
            admin_token,
            max_commands: max_commands.max(1),
        }
    }

    pub fn config(&self, token: &Token) -> Option<&KioskConfig> {
        self.kiosks.get(token).map(|k| &k.config)
    }

    /// Commands newer than `since`, oldest first; `None` for unknown kiosks
    pub fn commands_since(&self, token: &Token, since: i64) -> Option<Vec<KioskCommand>> {
        let entry = self.kiosks.get(token)?;
        Some(
            entry
                .commands
                .iter()
                .filter(|c| c.timestamp > since)
                .cloned()
                .collect(),
        )
    }

    /// Record a new command. Timestamps are strictly increasing per kiosk even
    /// when the wall clock stalls or steps back.
    pub fn issue(&mut self, token: &Token, req: IssueCommandRequest, now_ms: i64) -> Option<KioskCommand> {
        let max_commands = self.max_commands;
        let entry = self.kiosks.get_mut(token)?;

        let timestamp = now_ms.max(entry.last_timestamp + 1);
        entry.last_timestamp = timestamp;

        let command = KioskCommand::new(req.command_type, req.payload, timestamp);
        entry.commands.push_back(command.clone());
        while entry.commands.len() > max_commands {
            entry.commands.pop_front();
        }

        Some(command)
    }

    /// Constant-time check of a presented admin token
    pub fn check_admin(&self, presented: &str) -> bool {
        !self.admin_token.is_empty() && bool::from(presented.as_bytes().ct_eq(self.admin_token.as_bytes()))
    }
}
