//! Connection health monitoring
//!
//! Probes the server on an interval and publishes the classification through
//! a `watch` channel. The poller and the UI only ever read it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::client::KioskApi;

/// Reachability of the kiosk server
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    Online,
    Offline,
    #[default]
    Reconnecting,
}

impl ConnectionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionStatus::Online => "online",
            ConnectionStatus::Offline => "offline",
            ConnectionStatus::Reconnecting => "reconnecting",
        }
    }
}

/// Snapshot published by the monitor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionHealth {
    pub status: ConnectionStatus,
    pub last_online_at: Option<DateTime<Utc>>,
}

impl ConnectionHealth {
    pub fn online(now: DateTime<Utc>) -> Self {
        Self {
            status: ConnectionStatus::Online,
            last_online_at: Some(now),
        }
    }

    pub fn is_offline(&self) -> bool {
        self.status == ConnectionStatus::Offline
    }

    /// Next health after a probe, given consecutive failures so far (including this one)
    pub fn record(&self, ok: bool, failures: u32, offline_after: u32, now: DateTime<Utc>) -> Self {
        if ok {
            return Self::online(now);
        }

        let status = if failures >= offline_after.max(1) {
            ConnectionStatus::Offline
        } else {
            ConnectionStatus::Reconnecting
        };

        Self {
            status,
            last_online_at: self.last_online_at,
        }
    }
}

/// Background probe publishing [`ConnectionHealth`]
pub struct HealthMonitor {
    tx: watch::Sender<ConnectionHealth>,
}

impl HealthMonitor {
    pub fn new() -> (Self, watch::Receiver<ConnectionHealth>) {
        let (tx, rx) = watch::channel(ConnectionHealth::default());
        (Self { tx }, rx)
    }

    /// Probe until cancelled
    pub async fn run(
        self,
        api: Arc<dyn KioskApi>,
        every: Duration,
        offline_after: u32,
        cancel: CancellationToken,
    ) {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut failures = 0u32;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            // A probe that never answers counts as a failure once the interval is spent
            let probe = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = timeout(every, api.health()) => result,
            };

            let ok = match probe {
                Ok(Ok(())) => {
                    failures = 0;
                    true
                }
                Ok(Err(e)) => {
                    failures = failures.saturating_add(1);
                    tracing::debug!("Health probe failed ({} in a row): {}", failures, e);
                    false
                }
                Err(_) => {
                    failures = failures.saturating_add(1);
                    tracing::debug!("Health probe timed out after {:?} ({} in a row)", every, failures);
                    false
                }
            };

            let previous = self.tx.borrow().clone();
            let next = previous.record(ok, failures, offline_after, Utc::now());
            if next.status != previous.status {
                tracing::info!("Connection {} -> {}", previous.status.label(), next.status.label());
            }
            self.tx.send_replace(next);
        }

        tracing::debug!("Health monitor stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::client::ApiError;
    use crate::protocol::{KioskCommand, KioskConfig, Token};

    /// Health endpoint that hangs forever, or answers once `up` is set
    #[derive(Default)]
    struct ProbeApi {
        up: AtomicBool,
    }

    #[async_trait]
    impl KioskApi for ProbeApi {
        async fn fetch_config(&self, _token: &Token) -> Result<Option<KioskConfig>, ApiError> {
            Ok(None)
        }

        async fn poll_commands(&self, _token: &Token, _since: i64) -> Result<Vec<KioskCommand>, ApiError> {
            Ok(Vec::new())
        }

        async fn health(&self) -> Result<(), ApiError> {
            if self.up.load(Ordering::SeqCst) {
                return Ok(());
            }
            std::future::pending().await
        }
    }

    #[test]
    fn test_success_marks_online() {
        let now = Utc::now();
        let health = ConnectionHealth::default().record(true, 0, 3, now);
        assert_eq!(health.status, ConnectionStatus::Online);
        assert_eq!(health.last_online_at, Some(now));
    }

    #[test]
    fn test_failures_degrade_to_offline() {
        let then = Utc::now();
        let online = ConnectionHealth::online(then);
        let later = then + chrono::Duration::seconds(10);

        let first = online.record(false, 1, 3, later);
        assert_eq!(first.status, ConnectionStatus::Reconnecting);
        assert_eq!(first.last_online_at, Some(then));

        let second = first.record(false, 2, 3, later);
        assert_eq!(second.status, ConnectionStatus::Reconnecting);

        let third = second.record(false, 3, 3, later);
        assert!(third.is_offline());
        assert_eq!(third.last_online_at, Some(then));

        let back = third.record(true, 0, 3, later);
        assert_eq!(back.status, ConnectionStatus::Online);
        assert_eq!(back.last_online_at, Some(later));
    }

    #[test]
    fn test_initial_state() {
        let (_monitor, rx) = HealthMonitor::new();
        let health = rx.borrow();
        assert_eq!(health.status, ConnectionStatus::Reconnecting);
        assert!(health.last_online_at.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_probes_go_offline() {
        let api = Arc::new(ProbeApi::default());
        let (monitor, rx) = HealthMonitor::new();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(monitor.run(api.clone(), Duration::from_secs(5), 3, cancel.clone()));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(rx.borrow().is_offline());
        assert!(rx.borrow().last_online_at.is_none());

        api.up.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(rx.borrow().status, ConnectionStatus::Online);

        cancel.cancel();
        assert!(tokio::time::timeout(Duration::from_secs(1), handle).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_hung_probe() {
        let api = Arc::new(ProbeApi::default());
        let (monitor, _rx) = HealthMonitor::new();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(monitor.run(api, Duration::from_secs(300), 3, cancel.clone()));

        // First probe is in flight and will not time out for minutes
        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();
        assert!(tokio::time::timeout(Duration::from_secs(1), handle).await.is_ok());
    }
}
