//! Session bootstrap
//!
//! Gates the whole display on a device token and a loaded configuration.

use crate::client::KioskApi;
use crate::dispatcher::REFRESHING_MESSAGE;
use crate::protocol::{KioskConfig, Token};
use crate::storage::{Flag, FlagStore};

pub const LOADING_MESSAGE: &str = "Loading kiosk...";

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// No token in the kiosk URL; terminal
    InvalidUrl,
    /// `overlay` keeps the full-screen reload overlay up across a remote refresh
    Loading { refreshing: bool, overlay: bool },
    /// Config fetch failed or the kiosk does not exist; terminal
    NotFound,
    Ready(Box<KioskConfig>),
}

impl SessionState {
    /// Loading text, distinguishing a remote refresh from a cold start
    pub fn loading_message(&self) -> Option<&'static str> {
        match self {
            SessionState::Loading { refreshing: true, .. } => Some(REFRESHING_MESSAGE),
            SessionState::Loading { refreshing: false, .. } => Some(LOADING_MESSAGE),
            _ => None,
        }
    }

    pub fn reload_overlay(&self) -> bool {
        matches!(self, SessionState::Loading { overlay: true, .. })
    }

    pub fn config(&self) -> Option<&KioskConfig> {
        match self {
            SessionState::Ready(config) => Some(config),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::InvalidUrl | SessionState::NotFound)
    }
}

pub struct Session {
    token: Option<Token>,
    flags: FlagStore,
    state: SessionState,
}

impl Session {
    pub fn new(token: Option<Token>, flags: FlagStore) -> Self {
        let token = token.filter(|t| !t.is_empty());
        let state = match token {
            None => SessionState::InvalidUrl,
            Some(_) => SessionState::Loading {
                refreshing: flags.get(Flag::Refreshing),
                overlay: flags.get(Flag::ReloadOverlay),
            },
        };

        Self { token, flags, state }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn token(&self) -> Option<&Token> {
        self.token.as_ref()
    }

    /// Fetch the configuration and settle into a ready or terminal state
    pub async fn load(&mut self, api: &dyn KioskApi) -> &SessionState {
        let Some(ref token) = self.token else {
            return &self.state;
        };

        self.state = match api.fetch_config(token).await {
            Ok(Some(mut config)) => {
                if config.token.is_empty() {
                    config.token = token.clone();
                }
                tracing::info!("Kiosk {} ready ({:?})", token, config.display_mode);
                self.finish_refresh();
                SessionState::Ready(Box::new(config))
            }
            Ok(None) => {
                tracing::warn!("Kiosk {} not found", token);
                SessionState::NotFound
            }
            Err(e) => {
                tracing::warn!("Failed to load kiosk {}: {}", token, e);
                SessionState::NotFound
            }
        };

        &self.state
    }

    /// Drop the markers left by a `refresh` command now that the reload completed
    fn finish_refresh(&self) {
        for flag in [Flag::Refreshing, Flag::ReloadOverlay] {
            if let Err(e) = self.flags.clear(flag) {
                tracing::error!("Failed to clear {:?}: {}", flag, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::client::ApiError;
    use crate::dispatcher::tests::RecordingHost;
    use crate::dispatcher::Dispatcher;
    use crate::protocol::{CommandType, KioskCommand};

    enum Reply {
        Found,
        Missing,
        Down,
    }

    struct ConfigApi(Reply);

    #[async_trait]
    impl KioskApi for ConfigApi {
        async fn fetch_config(&self, token: &Token) -> Result<Option<KioskConfig>, ApiError> {
            match self.0 {
                Reply::Found => Ok(Some(KioskConfig::new(token.clone()))),
                Reply::Missing => Ok(None),
                Reply::Down => Err(ApiError::ServerError("HTTP 503".into())),
            }
        }

        async fn poll_commands(&self, _token: &Token, _since: i64) -> Result<Vec<KioskCommand>, ApiError> {
            Ok(Vec::new())
        }

        async fn health(&self) -> Result<(), ApiError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_missing_token_is_invalid_url() {
        let mut session = Session::new(None, FlagStore::in_memory());
        assert_eq!(session.state(), &SessionState::InvalidUrl);

        session.load(&ConfigApi(Reply::Found)).await;
        assert_eq!(session.state(), &SessionState::InvalidUrl);

        let session = Session::new(Some(Token::new("")), FlagStore::in_memory());
        assert!(session.state().is_terminal());
    }

    #[tokio::test]
    async fn test_load_ready() {
        let mut session = Session::new(Some(Token::new("t")), FlagStore::in_memory());
        assert_eq!(session.state().loading_message(), Some(LOADING_MESSAGE));
        assert!(!session.state().reload_overlay());

        let state = session.load(&ConfigApi(Reply::Found)).await;
        assert_eq!(state.config().unwrap().token, Token::new("t"));
    }

    #[tokio::test]
    async fn test_not_found_and_unreachable() {
        let mut session = Session::new(Some(Token::new("t")), FlagStore::in_memory());
        session.load(&ConfigApi(Reply::Missing)).await;
        assert_eq!(session.state(), &SessionState::NotFound);

        let mut session = Session::new(Some(Token::new("t")), FlagStore::in_memory());
        session.load(&ConfigApi(Reply::Down)).await;
        assert_eq!(session.state(), &SessionState::NotFound);
    }

    #[tokio::test]
    async fn test_refresh_survives_reload() {
        let dir = tempfile::tempdir().unwrap();

        // Before the reload: a refresh command arrives
        let mut dispatcher = Dispatcher::new(RecordingHost::default(), FlagStore::open(dir.path()));
        dispatcher.dispatch(&KioskCommand::new(CommandType::Refresh, json!({}), 1));
        assert_eq!(dispatcher.host().reloads, 1);

        // After the reload: a fresh process reopens the store
        let flags = FlagStore::open(dir.path());
        let mut session = Session::new(Some(Token::new("t")), flags.clone());
        assert_eq!(session.state().loading_message(), Some(REFRESHING_MESSAGE));
        assert!(session.state().reload_overlay());

        session.load(&ConfigApi(Reply::Found)).await;
        assert!(session.state().config().is_some());
        assert!(!flags.get(Flag::Refreshing));
        assert!(!flags.get(Flag::ReloadOverlay));

        let next = Session::new(Some(Token::new("t")), FlagStore::open(dir.path()));
        assert_eq!(next.state().loading_message(), Some(LOADING_MESSAGE));
        assert!(!next.state().reload_overlay());
    }
}
