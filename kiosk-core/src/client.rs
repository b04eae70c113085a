//! Kiosk server REST client
//!
//! The display talks to three endpoints:
//! - `GET /api/kiosk/{token}` for its configuration
//! - `GET /api/kiosk/{token}/commands?since=N` for new commands
//! - `GET /health` for reachability probes
//!
//! Everything above the HTTP layer goes through the [`KioskApi`] trait so the
//! poller and bootstrap can be exercised without a server.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;

use crate::protocol::{KioskConfig, KioskCommand, PollResponse, Token};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Kiosk not found")]
    NotFound,

    #[error("Server error: {0}")]
    ServerError(String),
}

/// Server operations the kiosk core depends on
#[async_trait]
pub trait KioskApi: Send + Sync {
    /// Fetch the kiosk configuration; `Ok(None)` when the token is unknown
    async fn fetch_config(&self, token: &Token) -> Result<Option<KioskConfig>, ApiError>;

    /// Fetch every command with `timestamp > since`
    async fn poll_commands(&self, token: &Token, since: i64) -> Result<Vec<KioskCommand>, ApiError>;

    /// Reachability probe
    async fn health(&self) -> Result<(), ApiError>;
}

/// Upper bound for any single request to the kiosk server
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP implementation of [`KioskApi`]
#[derive(Debug, Clone)]
pub struct KioskClient {
    client: Client,
    base_url: String,
}

impl KioskClient {
    /// Create new kiosk client
    pub fn new(base_url: &str) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client ({}), requests have no timeout", e);
                Client::new()
            });

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn kiosk_url(&self, token: &Token) -> String {
        format!("{}/api/kiosk/{}", self.base_url, token.as_str())
    }

    fn check_status(resp: &reqwest::Response) -> Result<(), ApiError> {
        match resp.status() {
            s if s.is_success() => Ok(()),
            reqwest::StatusCode::NOT_FOUND => Err(ApiError::NotFound),
            s => Err(ApiError::ServerError(format!("HTTP {}", s.as_u16()))),
        }
    }
}

#[async_trait]
impl KioskApi for KioskClient {
    async fn fetch_config(&self, token: &Token) -> Result<Option<KioskConfig>, ApiError> {
        let resp = self.client.get(self.kiosk_url(token)).send().await?;

        match Self::check_status(&resp) {
            Ok(()) => Ok(Some(resp.json().await?)),
            Err(ApiError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn poll_commands(&self, token: &Token, since: i64) -> Result<Vec<KioskCommand>, ApiError> {
        let resp = self
            .client
            .get(format!("{}/commands", self.kiosk_url(token)))
            .query(&[("since", since)])
            .send()
            .await?;

        Self::check_status(&resp)?;

        let body: PollResponse = resp.json().await?;
        Ok(body.commands)
    }

    async fn health(&self) -> Result<(), ApiError> {
        let resp = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;

        Self::check_status(&resp)
    }
}
