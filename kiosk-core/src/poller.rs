//! Command polling
//!
//! Periodically asks the server for commands newer than the cursor and hands
//! every returned command to the dispatcher. Delivery is at-least-once: the
//! cursor only moves after a successful response, and never backwards.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::client::KioskApi;
use crate::dispatcher::{Dispatcher, KioskHost};
use crate::health::ConnectionHealth;
use crate::protocol::{KioskCommand, Token};

/// Highest command timestamp already processed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PollCursor(i64);

impl PollCursor {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Cursor starting at the current wall clock, in milliseconds
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp_millis())
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    /// Move forward to `timestamp` if it is newer; returns whether it moved
    pub fn advance(&mut self, timestamp: i64) -> bool {
        if timestamp > self.0 {
            self.0 = timestamp;
            true
        } else {
            false
        }
    }
}

/// Result of one poll cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No token, or the connection is offline
    Suspended,
    Polled { dispatched: usize },
    Failed,
    /// Torn down while the request was in flight
    Cancelled,
}

/// Advance the cursor over a batch and dispatch every command in order.
///
/// Commands are dispatched even when an earlier command in the same batch
/// already moved the cursor past them.
pub fn apply_batch<F>(cursor: &mut PollCursor, commands: &[KioskCommand], mut dispatch: F)
where
    F: FnMut(&KioskCommand),
{
    for command in commands {
        cursor.advance(command.timestamp);
        dispatch(command);
    }
}

pub struct CommandPoller {
    api: Arc<dyn KioskApi>,
    token: Token,
    cursor: PollCursor,
    health: watch::Receiver<ConnectionHealth>,
}

impl CommandPoller {
    pub fn new(api: Arc<dyn KioskApi>, token: Token, health: watch::Receiver<ConnectionHealth>) -> Self {
        Self {
            api,
            token,
            cursor: PollCursor::now(),
            health,
        }
    }

    pub fn with_cursor(mut self, cursor: PollCursor) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn cursor(&self) -> PollCursor {
        self.cursor
    }

    /// Run one poll cycle
    pub async fn tick<H: KioskHost>(
        &mut self,
        dispatcher: &mut Dispatcher<H>,
        cancel: &CancellationToken,
    ) -> TickOutcome {
        if self.token.is_empty() || self.health.borrow().is_offline() {
            return TickOutcome::Suspended;
        }

        let since = self.cursor.value();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return TickOutcome::Cancelled,
            result = self.api.poll_commands(&self.token, since) => result,
        };

        match result {
            Ok(commands) => {
                if commands.is_empty() {
                    return TickOutcome::Polled { dispatched: 0 };
                }
                tracing::info!("Received {} command(s) since {}", commands.len(), since);
                apply_batch(&mut self.cursor, &commands, |command| dispatcher.dispatch(command));
                TickOutcome::Polled {
                    dispatched: commands.len(),
                }
            }
            Err(e) => {
                tracing::warn!("Command poll failed: {}", e);
                TickOutcome::Failed
            }
        }
    }

    /// Poll every `every` until cancelled. The first poll happens one interval
    /// after start, and a slow request delays the next tick instead of overlapping it.
    pub async fn run<H: KioskHost>(
        mut self,
        mut dispatcher: Dispatcher<H>,
        every: Duration,
        cancel: CancellationToken,
    ) -> Dispatcher<H> {
        if self.token.is_empty() {
            tracing::warn!("No kiosk token, command polling disabled");
            return dispatcher;
        }

        tracing::info!("Polling commands for kiosk {} every {:?}", self.token, every);
        let mut ticker = interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.tick(&mut dispatcher, &cancel).await {
                TickOutcome::Cancelled => break,
                TickOutcome::Suspended => tracing::debug!("Offline, skipping poll"),
                _ => {}
            }
        }

        tracing::debug!("Command poller stopped at cursor {}", self.cursor.value());
        dispatcher
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::client::ApiError;
    use crate::dispatcher::tests::RecordingHost;
    use crate::health::ConnectionStatus;
    use crate::protocol::{CommandType, KioskConfig};
    use crate::storage::FlagStore;

    /// API replaying scripted poll responses; records every `since` it was asked for
    #[derive(Default)]
    struct ScriptedApi {
        responses: Mutex<VecDeque<Result<Vec<KioskCommand>, ApiError>>>,
        requests: Mutex<Vec<i64>>,
        delay: Option<Duration>,
    }

    impl ScriptedApi {
        fn with(responses: Vec<Result<Vec<KioskCommand>, ApiError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                ..Default::default()
            }
        }

        fn requests(&self) -> Vec<i64> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl KioskApi for ScriptedApi {
        async fn fetch_config(&self, _token: &Token) -> Result<Option<KioskConfig>, ApiError> {
            Ok(None)
        }

        async fn poll_commands(&self, _token: &Token, since: i64) -> Result<Vec<KioskCommand>, ApiError> {
            self.requests.lock().unwrap().push(since);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }

        async fn health(&self) -> Result<(), ApiError> {
            Ok(())
        }
    }

    fn nav(path: &str, timestamp: i64) -> KioskCommand {
        KioskCommand::new(CommandType::Navigate, json!({ "path": path }), timestamp)
    }

    fn online() -> (watch::Sender<ConnectionHealth>, watch::Receiver<ConnectionHealth>) {
        watch::channel(ConnectionHealth::online(chrono::Utc::now()))
    }

    fn dispatcher() -> Dispatcher<RecordingHost> {
        Dispatcher::new(RecordingHost::default(), FlagStore::in_memory())
    }

    #[test]
    fn test_cursor_is_max_of_batch() {
        let mut cursor = PollCursor::new(100);
        let batch = [nav("a", 150), nav("b", 120), nav("c", 90)];
        let mut seen = Vec::new();

        apply_batch(&mut cursor, &batch, |c| seen.push(c.timestamp));

        assert_eq!(cursor.value(), 150);
        assert_eq!(seen, vec![150, 120, 90]);
    }

    #[test]
    fn test_cursor_never_decreases() {
        let mut cursor = PollCursor::new(500);
        apply_batch(&mut cursor, &[nav("a", 10), nav("b", 499)], |_| {});
        assert_eq!(cursor.value(), 500);
        assert!(!cursor.advance(500));
        assert!(cursor.advance(501));
    }

    #[tokio::test]
    async fn test_tick_dispatches_every_command_once() {
        let api = Arc::new(ScriptedApi::with(vec![Ok(vec![
            nav("photos", 30),
            nav("tasks", 10),
            nav("calendar", 20),
        ])]));
        let (_tx, rx) = online();
        let mut poller = CommandPoller::new(api.clone(), Token::new("t"), rx).with_cursor(PollCursor::new(5));
        let mut d = dispatcher();

        let outcome = poller.tick(&mut d, &CancellationToken::new()).await;

        assert_eq!(outcome, TickOutcome::Polled { dispatched: 3 });
        assert_eq!(
            d.host().calls,
            vec!["navigate:photos", "navigate:tasks", "navigate:calendar"]
        );
        assert_eq!(poller.cursor().value(), 30);
        assert_eq!(api.requests(), vec![5]);
    }

    #[tokio::test]
    async fn test_next_poll_uses_advanced_cursor() {
        let api = Arc::new(ScriptedApi::with(vec![Ok(vec![nav("a", 40)]), Ok(vec![])]));
        let (_tx, rx) = online();
        let mut poller = CommandPoller::new(api.clone(), Token::new("t"), rx).with_cursor(PollCursor::new(1));
        let mut d = dispatcher();
        let cancel = CancellationToken::new();

        poller.tick(&mut d, &cancel).await;
        let outcome = poller.tick(&mut d, &cancel).await;

        assert_eq!(outcome, TickOutcome::Polled { dispatched: 0 });
        assert_eq!(api.requests(), vec![1, 40]);
    }

    #[tokio::test]
    async fn test_failure_keeps_cursor_and_retries() {
        let api = Arc::new(ScriptedApi::with(vec![
            Err(ApiError::ServerError("HTTP 502".into())),
            Ok(vec![nav("tasks", 70)]),
        ]));
        let (_tx, rx) = online();
        let mut poller = CommandPoller::new(api.clone(), Token::new("t"), rx).with_cursor(PollCursor::new(50));
        let mut d = dispatcher();
        let cancel = CancellationToken::new();

        assert_eq!(poller.tick(&mut d, &cancel).await, TickOutcome::Failed);
        assert_eq!(poller.cursor().value(), 50);

        assert_eq!(poller.tick(&mut d, &cancel).await, TickOutcome::Polled { dispatched: 1 });
        assert_eq!(api.requests(), vec![50, 50]);
        assert_eq!(poller.cursor().value(), 70);
    }

    #[tokio::test]
    async fn test_offline_suspends_polling() {
        let api = Arc::new(ScriptedApi::with(vec![Ok(vec![nav("tasks", 70)])]));
        let (tx, rx) = online();
        let mut poller = CommandPoller::new(api.clone(), Token::new("t"), rx).with_cursor(PollCursor::new(50));
        let mut d = dispatcher();
        let cancel = CancellationToken::new();

        tx.send_modify(|h| h.status = ConnectionStatus::Offline);
        assert_eq!(poller.tick(&mut d, &cancel).await, TickOutcome::Suspended);
        assert_eq!(poller.tick(&mut d, &cancel).await, TickOutcome::Suspended);
        assert!(api.requests().is_empty());
        assert_eq!(poller.cursor().value(), 50);

        // Reconnecting still polls; only offline suspends
        tx.send_modify(|h| h.status = ConnectionStatus::Reconnecting);
        assert_eq!(poller.tick(&mut d, &cancel).await, TickOutcome::Polled { dispatched: 1 });
        assert_eq!(poller.cursor().value(), 70);
    }

    #[tokio::test]
    async fn test_empty_token_never_polls() {
        let api = Arc::new(ScriptedApi::default());
        let (_tx, rx) = online();
        let mut poller = CommandPoller::new(api.clone(), Token::new(""), rx);
        let mut d = dispatcher();

        assert_eq!(poller.tick(&mut d, &CancellationToken::new()).await, TickOutcome::Suspended);
        assert!(api.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_in_flight_batch() {
        let api = Arc::new(ScriptedApi {
            delay: Some(Duration::from_secs(5)),
            ..ScriptedApi::with(vec![Ok(vec![nav("tasks", 70)])])
        });
        let (_tx, rx) = online();
        let mut poller = CommandPoller::new(api.clone(), Token::new("t"), rx).with_cursor(PollCursor::new(1));
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let mut d = dispatcher();
        assert_eq!(poller.tick(&mut d, &cancel).await, TickOutcome::Cancelled);
        assert!(d.host().calls.is_empty());
        assert_eq!(poller.cursor().value(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_polls_on_interval_until_cancelled() {
        let api = Arc::new(ScriptedApi::with(vec![
            Ok(vec![nav("photos", 10)]),
            Ok(vec![nav("tasks", 20)]),
        ]));
        let (_tx, rx) = online();
        let poller = CommandPoller::new(api.clone(), Token::new("t"), rx).with_cursor(PollCursor::new(0));
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(poller.run(dispatcher(), Duration::from_secs(10), cancel.clone()));

        tokio::time::sleep(Duration::from_secs(25)).await;
        cancel.cancel();
        let d = handle.await.unwrap();

        assert_eq!(api.requests(), vec![0, 10]);
        assert_eq!(d.host().calls, vec!["navigate:photos", "navigate:tasks"]);
    }
}
