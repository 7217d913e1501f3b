//! Process-wide table of monitoring sessions.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::config::MonitorConfig;
use crate::identifiers::TabId;
use crate::protocol::SessionSummary;

use super::session::{MonitorSession, MonitorState, PendingTimer, SessionSnapshot};

// ============================================================================
// SessionRegistry
// ============================================================================

/// Sessions keyed by tab.
///
/// Empty on startup and never torn down. Stopped sessions stay in the table
/// until the process exits. Every read and write goes through this type.
///
/// Continuations of a session's driver task identify themselves by
/// generation; a continuation whose generation is no longer current, or
/// whose session is no longer running, is refused.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: RwLock<FxHashMap<TabId, MonitorSession>>,
    generation: AtomicU64,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(FxHashMap::default()),
            generation: AtomicU64::new(0),
        }
    }

    /// Returns the number of sessions, stopped ones included.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Returns `true` if no session was ever created.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Allocates a fresh start generation.
    pub fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::Relaxed) + 1
    }
}

// ============================================================================
// SessionRegistry - Contract
// ============================================================================

impl SessionRegistry {
    /// Snapshot of a tab's session.
    #[must_use]
    pub fn get(&self, tab_id: TabId) -> Option<SessionSnapshot> {
        self.sessions.read().get(&tab_id).map(MonitorSession::snapshot)
    }

    /// Inserts or replaces a session; returns the displaced session's timer.
    pub fn upsert(&self, session: MonitorSession) -> Option<PendingTimer> {
        let tab_id = session.tab_id();
        let mut sessions = self.sessions.write();
        let previous = sessions.insert(tab_id, session);
        previous.and_then(|mut s| s.stop())
    }

    /// Polling sessions, ordered by tab id.
    #[must_use]
    pub fn list_active(&self) -> Vec<SessionSummary> {
        let mut active: Vec<SessionSummary> = self
            .sessions
            .read()
            .values()
            .filter(|s| s.state() == MonitorState::Polling)
            .map(|s| s.snapshot().summary())
            .collect();
        active.sort_by_key(|s| s.tab_id);
        active
    }

    /// Marks a session stopped and hands back its pending timer.
    ///
    /// The session stays in the table. Unknown tabs are a no-op.
    pub fn remove_or_stop(&self, tab_id: TabId) -> Option<PendingTimer> {
        let mut sessions = self.sessions.write();
        let session = sessions.get_mut(&tab_id)?;
        debug!(tab_id = %tab_id, state = %session.state(), "Stopping session");
        session.stop()
    }
}

// ============================================================================
// SessionRegistry - Lifecycle Helpers
// ============================================================================

impl SessionRegistry {
    /// Creates a running session for `tab_id` unless one is already running.
    ///
    /// Returns the new generation, or `None` if the tab is already
    /// monitored.
    pub fn try_begin(
        &self,
        tab_id: TabId,
        config: MonitorConfig,
        state: MonitorState,
    ) -> Option<u64> {
        let mut sessions = self.sessions.write();
        if sessions.get(&tab_id).is_some_and(|s| s.state().is_running()) {
            return None;
        }

        let generation = self.next_generation();
        let session = MonitorSession::new(tab_id, config, generation).with_state(state);
        if let Some(timer) = sessions.insert(tab_id, session).and_then(|mut s| s.stop()) {
            timer.disarm();
        }
        Some(generation)
    }

    /// Attaches the driver task to a current session.
    ///
    /// # Errors
    ///
    /// Hands the timer back if the session stopped or restarted meanwhile.
    pub fn attach_timer(
        &self,
        tab_id: TabId,
        generation: u64,
        timer: PendingTimer,
    ) -> Result<(), PendingTimer> {
        let mut sessions = self.sessions.write();
        match sessions.get_mut(&tab_id) {
            Some(session) if session.accepts(generation) => {
                if let Some(old) = session.attach_timer(timer) {
                    old.disarm();
                }
                Ok(())
            }
            _ => Err(timer),
        }
    }

    /// Returns `true` if a continuation of `generation` may proceed.
    #[must_use]
    pub fn is_current(&self, tab_id: TabId, generation: u64) -> bool {
        self.sessions
            .read()
            .get(&tab_id)
            .is_some_and(|s| s.accepts(generation))
    }

    /// Snapshot of the session if `generation` is still current.
    #[must_use]
    pub fn current(&self, tab_id: TabId, generation: u64) -> Option<SessionSnapshot> {
        self.sessions
            .read()
            .get(&tab_id)
            .filter(|s| s.accepts(generation))
            .map(MonitorSession::snapshot)
    }

    /// Moves a current session to `state`.
    pub fn transition(&self, tab_id: TabId, generation: u64, state: MonitorState) -> bool {
        let mut sessions = self.sessions.write();
        match sessions.get_mut(&tab_id) {
            Some(session) if session.accepts(generation) => {
                session.set_state(state);
                true
            }
            _ => false,
        }
    }

    /// Counts one poll iteration of a current, polling session.
    pub fn increment_refresh(&self, tab_id: TabId, generation: u64) -> Option<u64> {
        let mut sessions = self.sessions.write();
        sessions
            .get_mut(&tab_id)
            .filter(|s| s.accepts(generation))
            .and_then(MonitorSession::increment_refresh)
    }

    /// Stops a session from inside its own driver task.
    ///
    /// The timer is released, not cancelled, so the caller can finish its
    /// stop side effects. Returns `false` if the continuation was already
    /// stale.
    pub fn stop_current(&self, tab_id: TabId, generation: u64) -> bool {
        let mut sessions = self.sessions.write();
        match sessions.get_mut(&tab_id) {
            Some(session) if session.accepts(generation) => {
                if let Some(timer) = session.stop() {
                    timer.release();
                }
                true
            }
            _ => false,
        }
    }

    /// Replaces a running session's configuration.
    pub fn update_config(&self, tab_id: TabId, config: MonitorConfig) -> bool {
        let mut sessions = self.sessions.write();
        match sessions.get_mut(&tab_id) {
            Some(session) if session.state().is_running() => {
                session.set_config(config);
                true
            }
            _ => false,
        }
    }

    /// Stops every session and returns their timers.
    pub fn stop_all(&self) -> Vec<PendingTimer> {
        self.sessions
            .write()
            .values_mut()
            .filter_map(MonitorSession::stop)
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio_util::sync::CancellationToken;

    fn tab(id: u32) -> TabId {
        TabId::new(id).expect("valid tab id")
    }

    #[test]
    fn test_try_begin_is_idempotent_while_running() {
        let registry = SessionRegistry::new();
        let config = MonitorConfig::default();

        let first = registry
            .try_begin(tab(1), config, MonitorState::Polling)
            .expect("first start");
        registry.increment_refresh(tab(1), first);

        assert_eq!(registry.try_begin(tab(1), config, MonitorState::Polling), None);
        assert_eq!(registry.get(tab(1)).map(|s| s.refresh_count), Some(1));
    }

    #[test]
    fn test_restart_after_stop_resets_count() {
        let registry = SessionRegistry::new();
        let config = MonitorConfig::default();

        let first = registry
            .try_begin(tab(1), config, MonitorState::Polling)
            .expect("start");
        registry.increment_refresh(tab(1), first);
        assert!(registry.remove_or_stop(tab(1)).is_none());

        let second = registry
            .try_begin(tab(1), config, MonitorState::Polling)
            .expect("restart");
        assert_ne!(first, second);
        assert_eq!(registry.get(tab(1)).map(|s| s.refresh_count), Some(0));
        assert!(!registry.is_current(tab(1), first));
        assert!(registry.is_current(tab(1), second));
    }

    #[test]
    fn test_list_active_only_polling() {
        let registry = SessionRegistry::new();
        let config = MonitorConfig::default();

        let polling = registry
            .try_begin(tab(3), config, MonitorState::Polling)
            .expect("start");
        registry.increment_refresh(tab(3), polling);
        registry.try_begin(tab(1), config, MonitorState::Polling);
        registry.try_begin(tab(2), config, MonitorState::AwaitingReference);
        registry.try_begin(tab(4), config, MonitorState::Polling);
        registry.remove_or_stop(tab(4));

        let active = registry.list_active();
        assert_eq!(
            active,
            vec![
                SessionSummary {
                    tab_id: tab(1),
                    refresh_count: 0
                },
                SessionSummary {
                    tab_id: tab(3),
                    refresh_count: 1
                },
            ]
        );
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_stale_continuations_refused() {
        let registry = SessionRegistry::new();
        let generation = registry
            .try_begin(tab(1), MonitorConfig::default(), MonitorState::AwaitingReference)
            .expect("start");

        assert_eq!(registry.increment_refresh(tab(1), generation), None);
        assert!(registry.transition(tab(1), generation, MonitorState::Polling));
        assert_eq!(registry.increment_refresh(tab(1), generation), Some(1));

        assert!(registry.stop_current(tab(1), generation));
        assert!(!registry.stop_current(tab(1), generation));
        assert!(!registry.transition(tab(1), generation, MonitorState::Polling));
        assert_eq!(registry.increment_refresh(tab(1), generation), None);
    }

    #[tokio::test]
    async fn test_upsert_displaces_previous_timer() {
        let registry = SessionRegistry::new();
        let config = MonitorConfig::default();
        let generation = registry.next_generation();
        let session = MonitorSession::new(tab(1), config, generation)
            .with_state(MonitorState::Polling);
        assert!(registry.upsert(session).is_none());

        let token = CancellationToken::new();
        let timer = PendingTimer::new(token.clone(), tokio::spawn(async {}));
        registry
            .attach_timer(tab(1), generation, timer)
            .expect("attach");

        let replacement = MonitorSession::new(tab(1), config, registry.next_generation());
        let displaced = registry.upsert(replacement).expect("displaced timer");
        displaced.cancel().await;

        assert!(token.is_cancelled());
        assert_eq!(registry.get(tab(1)).map(|s| s.state), Some(MonitorState::Idle));
    }

    #[test]
    fn test_remove_or_stop_unknown_tab() {
        let registry = SessionRegistry::new();
        assert!(registry.remove_or_stop(tab(9)).is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_attach_timer_to_stopped_session_fails() {
        let registry = SessionRegistry::new();
        let generation = registry
            .try_begin(tab(1), MonitorConfig::default(), MonitorState::Polling)
            .expect("start");
        registry.remove_or_stop(tab(1));

        let timer = PendingTimer::new(CancellationToken::new(), tokio::spawn(async {}));
        let rejected = registry
            .attach_timer(tab(1), generation, timer)
            .expect_err("stale");
        rejected.cancel().await;
    }

    #[tokio::test]
    async fn test_remove_or_stop_returns_timer() {
        let registry = SessionRegistry::new();
        let generation = registry
            .try_begin(tab(1), MonitorConfig::default(), MonitorState::Polling)
            .expect("start");
        let token = CancellationToken::new();
        let timer = PendingTimer::new(token.clone(), tokio::spawn(async {}));
        registry
            .attach_timer(tab(1), generation, timer)
            .expect("attach");

        let timer = registry.remove_or_stop(tab(1)).expect("timer");
        timer.cancel().await;
        assert!(token.is_cancelled());
        assert_eq!(
            registry.get(tab(1)).map(|s| s.state),
            Some(MonitorState::Stopped)
        );
        assert!(registry.list_active().is_empty());
    }
}
