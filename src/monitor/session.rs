//! Per-tab monitoring session.

use std::fmt;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, trace};

use crate::config::MonitorConfig;
use crate::identifiers::TabId;
use crate::protocol::SessionSummary;

// ============================================================================
// MonitorState
// ============================================================================

/// Lifecycle state of a session.
///
/// ```text
/// Idle ──► AwaitingReference ──► Polling
///   │              │                │
///   └──────────────┴────────────────┴──► Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MonitorState {
    /// Created, not started.
    #[default]
    Idle,
    /// Waiting for the reference image to be captured and verified.
    AwaitingReference,
    /// Reload / compare loop running.
    Polling,
    /// Halted; retained until the process exits.
    Stopped,
}

impl MonitorState {
    /// Returns `true` for states that own a running task.
    #[inline]
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::AwaitingReference | Self::Polling)
    }
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::AwaitingReference => "awaiting-reference",
            Self::Polling => "polling",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

// ============================================================================
// PendingTimer
// ============================================================================

/// The one scheduled action a session owns: its driver task.
///
/// Cancelling is idempotent.
#[derive(Debug)]
pub struct PendingTimer {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl PendingTimer {
    /// Wraps a spawned driver task and its cancellation token.
    #[must_use]
    pub fn new(token: CancellationToken, handle: JoinHandle<()>) -> Self {
        Self { token, handle }
    }

    /// Returns `true` once cancellation was requested.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Returns `true` if the task has completed.
    #[inline]
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Cancels the task and waits until it has been dropped.
    ///
    /// Must not be called from the task itself.
    pub async fn cancel(self) {
        self.token.cancel();
        self.handle.abort();

        if let Err(e) = self.handle.await
            && e.is_panic()
        {
            error!(error = %e, "Session task panicked");
        }
    }

    /// Signals cancellation without waiting; the task winds down at its next
    /// suspension point.
    pub fn disarm(self) {
        trace!("Disarming session timer");
        self.token.cancel();
    }

    /// Detaches the task without cancelling it. Used by a driver task that
    /// stops its own session and is about to return.
    pub fn release(self) {
        trace!("Releasing session timer");
        drop(self.handle);
    }
}

// ============================================================================
// MonitorSession
// ============================================================================

/// One tab's monitoring lifecycle and counters.
#[derive(Debug)]
pub struct MonitorSession {
    tab_id: TabId,
    state: MonitorState,
    refresh_count: u64,
    config: MonitorConfig,
    generation: u64,
    timer: Option<PendingTimer>,
}

impl MonitorSession {
    /// Creates an idle session.
    #[must_use]
    pub fn new(tab_id: TabId, config: MonitorConfig, generation: u64) -> Self {
        Self {
            tab_id,
            state: MonitorState::Idle,
            refresh_count: 0,
            config,
            generation,
            timer: None,
        }
    }

    /// Sets the initial state.
    #[inline]
    #[must_use]
    pub fn with_state(mut self, state: MonitorState) -> Self {
        self.state = state;
        self
    }

    /// Monitored tab.
    #[inline]
    #[must_use]
    pub fn tab_id(&self) -> TabId {
        self.tab_id
    }

    /// Current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> MonitorState {
        self.state
    }

    /// Completed poll iterations since the last (re)start.
    #[inline]
    #[must_use]
    pub fn refresh_count(&self) -> u64 {
        self.refresh_count
    }

    /// Active configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Start generation; continuations from older generations are stale.
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns `true` if a driver task is attached.
    #[inline]
    #[must_use]
    pub fn has_timer(&self) -> bool {
        self.timer.is_some()
    }

    /// Returns `true` if a continuation of `generation` may proceed.
    #[inline]
    #[must_use]
    pub fn accepts(&self, generation: u64) -> bool {
        self.generation == generation && self.state.is_running()
    }

    /// Copies the observable fields.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            tab_id: self.tab_id,
            state: self.state,
            refresh_count: self.refresh_count,
            config: self.config,
            generation: self.generation,
        }
    }

    pub(crate) fn set_state(&mut self, state: MonitorState) {
        trace!(tab_id = %self.tab_id, from = %self.state, to = %state, "Session transition");
        self.state = state;
    }

    pub(crate) fn set_config(&mut self, config: MonitorConfig) {
        self.config = config;
    }

    /// Only counts while polling.
    pub(crate) fn increment_refresh(&mut self) -> Option<u64> {
        if self.state != MonitorState::Polling {
            return None;
        }
        self.refresh_count += 1;
        Some(self.refresh_count)
    }

    pub(crate) fn attach_timer(&mut self, timer: PendingTimer) -> Option<PendingTimer> {
        self.timer.replace(timer)
    }

    /// Marks the session stopped, clears the counter, and hands back the
    /// pending timer.
    pub(crate) fn stop(&mut self) -> Option<PendingTimer> {
        self.set_state(MonitorState::Stopped);
        self.refresh_count = 0;
        self.timer.take()
    }
}

// ============================================================================
// SessionSnapshot
// ============================================================================

/// Copy of a session's observable fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSnapshot {
    /// Monitored tab.
    pub tab_id: TabId,
    /// State at snapshot time.
    pub state: MonitorState,
    /// Completed poll iterations.
    pub refresh_count: u64,
    /// Active configuration.
    pub config: MonitorConfig,
    /// Start generation.
    pub generation: u64,
}

impl SessionSnapshot {
    /// Panel-facing summary.
    #[inline]
    #[must_use]
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            tab_id: self.tab_id,
            refresh_count: self.refresh_count,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    fn session() -> MonitorSession {
        MonitorSession::new(
            TabId::new(1).expect("valid tab id"),
            MonitorConfig::default(),
            1,
        )
    }

    #[test]
    fn test_refresh_counts_only_while_polling() {
        let mut session = session().with_state(MonitorState::AwaitingReference);
        assert_eq!(session.increment_refresh(), None);

        session.set_state(MonitorState::Polling);
        assert_eq!(session.increment_refresh(), Some(1));
        assert_eq!(session.increment_refresh(), Some(2));

        session.stop();
        assert_eq!(session.refresh_count(), 0);
        assert_eq!(session.increment_refresh(), None);
    }

    #[test]
    fn test_accepts_generation() {
        let mut session = session().with_state(MonitorState::Polling);
        assert!(session.accepts(1));
        assert!(!session.accepts(2));

        session.stop();
        assert!(!session.accepts(1));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(MonitorState::AwaitingReference.to_string(), "awaiting-reference");
        assert!(MonitorState::Polling.is_running());
        assert!(!MonitorState::Idle.is_running());
        assert!(!MonitorState::Stopped.is_running());
    }

    #[tokio::test]
    async fn test_timer_cancel_is_idempotent() {
        let token = CancellationToken::new();
        let handle = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        let timer = PendingTimer::new(token.clone(), handle);

        assert!(!timer.is_cancelled());
        token.cancel();
        timer.cancel().await;
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_stop_hands_back_timer() {
        let mut session = session().with_state(MonitorState::Polling);
        let token = CancellationToken::new();
        let handle = tokio::spawn(async {});
        assert!(session.attach_timer(PendingTimer::new(token, handle)).is_none());
        assert!(session.has_timer());

        let timer = session.stop().expect("timer");
        assert!(!session.has_timer());
        timer.cancel().await;
    }
}
