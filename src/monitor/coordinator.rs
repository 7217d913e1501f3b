//! The long-lived coordinator.
//!
//! Owns the [`SessionRegistry`], answers panel and page messages, and drives
//! one task per monitored tab (see `driver`).

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{MonitorConfig, MonitorTimings};
use crate::error::Result;
use crate::identifiers::TabId;
use crate::protocol::{Message, MessageSender, Notification, SessionSummary, StopTabReply};
use crate::relay::EventRelay;
use crate::storage::StateStore;

use super::notices;
use super::registry::SessionRegistry;
use super::session::MonitorState;

// ============================================================================
// CoordinatorEvent
// ============================================================================

/// Input to [`Coordinator::serve`].
#[derive(Debug)]
pub enum CoordinatorEvent {
    /// An extension message; the reply is sent on `reply` if present.
    Message {
        /// The message.
        message: Message,
        /// Who sent it.
        sender: MessageSender,
        /// Reply channel for request-style messages.
        reply: Option<oneshot::Sender<Option<Value>>>,
    },

    /// The browser started the extension.
    Startup,
}

impl CoordinatorEvent {
    /// Creates a message event with a reply channel.
    #[must_use]
    pub fn request(
        message: Message,
        sender: MessageSender,
    ) -> (Self, oneshot::Receiver<Option<Value>>) {
        let (tx, rx) = oneshot::channel();
        let event = Self::Message {
            message,
            sender,
            reply: Some(tx),
        };
        (event, rx)
    }

    /// Creates a fire-and-forget message event.
    #[must_use]
    pub fn notify(message: Message, sender: MessageSender) -> Self {
        Self::Message {
            message,
            sender,
            reply: None,
        }
    }
}

// ============================================================================
// Coordinator
// ============================================================================

/// Coordinates every monitoring session of the extension.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Coordinator {
    pub(super) inner: Arc<CoordinatorInner>,
}

pub(super) struct CoordinatorInner {
    pub(super) relay: EventRelay,
    pub(super) state: StateStore,
    pub(super) registry: SessionRegistry,
    pub(super) timings: MonitorTimings,
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("sessions", &self.inner.registry.len())
            .field("timings", &self.inner.timings)
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    /// Creates a coordinator with an empty registry.
    #[must_use]
    pub fn new(relay: EventRelay, state: StateStore, timings: MonitorTimings) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                relay,
                state,
                registry: SessionRegistry::new(),
                timings,
            }),
        }
    }

    /// Session table.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &SessionRegistry {
        &self.inner.registry
    }

    /// Event relay.
    #[inline]
    #[must_use]
    pub fn relay(&self) -> &EventRelay {
        &self.inner.relay
    }

    /// Persisted state.
    #[inline]
    #[must_use]
    pub fn state_store(&self) -> &StateStore {
        &self.inner.state
    }

    /// Loop delays.
    #[inline]
    #[must_use]
    pub fn timings(&self) -> &MonitorTimings {
        &self.inner.timings
    }
}

// ============================================================================
// Coordinator - Session Lifecycle
// ============================================================================

impl Coordinator {
    /// Starts monitoring `tab_id`.
    ///
    /// A no-op if the tab is already monitored. Otherwise the counter starts
    /// at zero, the threshold is pushed to the page, and the session begins
    /// in `AwaitingReference` or, when a reference image exists, `Polling`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) for an invalid
    /// configuration.
    pub async fn start_monitoring(&self, tab_id: TabId, config: MonitorConfig) -> Result<()> {
        config.validate()?;

        let inner = &self.inner;
        if inner
            .registry
            .get(tab_id)
            .is_some_and(|s| s.state.is_running())
        {
            info!(tab_id = %tab_id, "Monitoring already active");
            return Ok(());
        }

        info!(
            tab_id = %tab_id,
            delay_ms = config.delay_after_load.as_millis() as u64,
            threshold = config.similarity_threshold,
            "Starting monitoring"
        );

        let update = Message::UpdateThreshold {
            threshold: config.similarity_threshold,
        };
        if let Err(e) = inner.relay.to_page(tab_id, update).await {
            warn!(tab_id = %tab_id, error = %e, "Could not push threshold to page");
        }

        let initial = if self.reference_present().await {
            MonitorState::Polling
        } else {
            MonitorState::AwaitingReference
        };

        let Some(generation) = inner.registry.try_begin(tab_id, config, initial) else {
            info!(tab_id = %tab_id, "Monitoring already active");
            return Ok(());
        };

        debug!(tab_id = %tab_id, generation, state = %initial, "Session created");
        self.spawn_session(tab_id, generation);
        Ok(())
    }

    /// Stops monitoring `tab_id`.
    ///
    /// When this returns, the session's task has been dropped and no further
    /// poll side effects occur. Stopping an unknown or stopped tab only
    /// repeats the stop notifications.
    ///
    /// Must not be awaited from the session's own task.
    pub async fn stop_for_tab(&self, tab_id: TabId) {
        info!(tab_id = %tab_id, "Stopping monitoring");

        if let Some(timer) = self.inner.registry.remove_or_stop(tab_id) {
            timer.cancel().await;
        }

        self.after_stop(tab_id).await;
    }

    /// Replaces a running session's configuration and pushes the new
    /// threshold to its page.
    ///
    /// Returns `false` if the tab is not monitored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) for an invalid
    /// configuration.
    pub async fn update_config(&self, tab_id: TabId, config: MonitorConfig) -> Result<bool> {
        config.validate()?;

        if !self.inner.registry.update_config(tab_id, config) {
            debug!(tab_id = %tab_id, "No running session to update");
            return Ok(false);
        }

        info!(tab_id = %tab_id, threshold = config.similarity_threshold, "Configuration updated");

        let update = Message::UpdateThreshold {
            threshold: config.similarity_threshold,
        };
        if let Err(e) = self.inner.relay.to_page(tab_id, update).await {
            warn!(tab_id = %tab_id, error = %e, "Could not push threshold to page");
        }
        Ok(true)
    }

    /// Polling sessions with their counters.
    #[must_use]
    pub fn active_sessions(&self) -> Vec<SessionSummary> {
        self.inner.registry.list_active()
    }

    /// Stop side effects shared by every stop path.
    pub(super) async fn after_stop(&self, tab_id: TabId) {
        let inner = &self.inner;

        if inner.relay.is_active_tab(tab_id).await
            && let Err(e) = inner.state.record_stopped().await
        {
            warn!(tab_id = %tab_id, error = %e, "Could not persist stopped state");
        }

        inner.relay.to_panel(Message::SessionsUpdated).await;
    }

    /// Reads the reference slot; read failures count as missing.
    pub(super) async fn reference_present(&self) -> bool {
        match self.inner.state.has_reference_image().await {
            Ok(present) => present,
            Err(e) => {
                warn!(error = %e, "Could not read reference image");
                false
            }
        }
    }
}

// ============================================================================
// Coordinator - Panel Requests
// ============================================================================

impl Coordinator {
    /// Starts monitoring the tab persisted by the panel, with the persisted
    /// settings.
    pub async fn start_from_panel(&self) {
        let inner = &self.inner;

        let Some(tab_id) = self.persisted_tab().await else {
            error!("No tab id persisted, cannot start monitoring");
            inner.relay.notify(Notification::error(notices::NO_TAB_ID)).await;
            return;
        };

        if let Err(e) = inner.relay.get_tab(tab_id).await {
            error!(tab_id = %tab_id, error = %e, "Tab not available");
            inner
                .relay
                .notify(Notification::error(notices::TAB_NOT_AVAILABLE))
                .await;
            return;
        }

        let config = match inner.state.monitor_config().await {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "Could not read settings, using defaults");
                MonitorConfig::default()
            }
        };

        if let Err(e) = self.start_monitoring(tab_id, config).await {
            error!(tab_id = %tab_id, error = %e, "Could not start monitoring");
            inner.relay.alert(&e.to_string()).await;
        }
    }

    /// Stops monitoring the tab persisted by the panel.
    pub async fn stop_from_panel(&self) {
        match self.persisted_tab().await {
            Some(tab_id) => self.stop_for_tab(tab_id).await,
            None => debug!("No tab id persisted, nothing to stop"),
        }
    }

    /// Resumes monitoring after a browser restart if it was active.
    pub async fn on_startup(&self) {
        match self.inner.state.is_monitoring().await {
            Ok(true) => {
                info!("Resuming monitoring after startup");
                self.start_from_panel().await;
            }
            Ok(false) => debug!("Monitoring was not active at shutdown"),
            Err(e) => warn!(error = %e, "Could not read monitoring flag"),
        }
    }

    /// Tab a page report is about: the reporting tab when known, else the
    /// persisted tab.
    async fn report_tab(&self, sender_tab: Option<TabId>) -> Option<TabId> {
        match sender_tab {
            Some(tab_id) => Some(tab_id),
            None => self.persisted_tab().await,
        }
    }

    async fn persisted_tab(&self) -> Option<TabId> {
        match self.inner.state.tab_id().await {
            Ok(tab_id) => tab_id,
            Err(e) => {
                warn!(error = %e, "Could not read persisted tab id");
                None
            }
        }
    }
}

// ============================================================================
// Coordinator - Page Reports
// ============================================================================

impl Coordinator {
    /// Handles a page's change report: stops the session, then tells the
    /// panel, rings the page, and raises an OS notification.
    ///
    /// The reporting tab is used when known, else the persisted tab.
    pub async fn handle_change_detected(&self, sender_tab: Option<TabId>) {
        let Some(tab_id) = self.report_tab(sender_tab).await else {
            warn!("Change reported without a tab");
            return;
        };

        info!(tab_id = %tab_id, "Change detected");
        self.stop_for_tab(tab_id).await;

        let relay = &self.inner.relay;
        relay.to_panel(Message::ChangeDetected).await;

        if let Err(e) = relay.to_page(tab_id, Message::PlayNotificationSound).await {
            warn!(tab_id = %tab_id, error = %e, "Could not play notification sound");
        }

        relay
            .notify(Notification::new(notices::change_detected(tab_id)))
            .await;
    }

    /// Handles a completed selection: captures the reference in the
    /// background and forwards the event to the panel.
    ///
    /// The capture targets the selecting tab when known, else the persisted
    /// tab.
    async fn handle_selection_complete(&self, sender_tab: Option<TabId>) {
        match self.report_tab(sender_tab).await {
            Some(tab_id) => {
                let coordinator = self.clone();
                tokio::spawn(async move { coordinator.capture_initial_area(tab_id).await });
            }
            None => {
                error!("No tab id for the initial capture");
                self.inner
                    .relay
                    .notify(Notification::error(notices::NO_TAB_ID))
                    .await;
            }
        }

        self.inner.relay.to_panel(Message::SelectionComplete).await;
    }

    async fn forward_selection_start(&self) {
        let relay = &self.inner.relay;
        match relay.active_tab_id().await {
            Some(tab_id) => {
                if let Err(e) = relay.to_page(tab_id, Message::StartSelection).await {
                    warn!(tab_id = %tab_id, error = %e, "Could not start selection");
                }
            }
            None => debug!("No active tab for selection"),
        }
    }
}

// ============================================================================
// Coordinator - Dispatch
// ============================================================================

impl Coordinator {
    /// Handles one extension message and returns its reply, if any.
    pub async fn handle_message(&self, message: Message, sender: MessageSender) -> Option<Value> {
        debug!(action = message.action(), sender = ?sender.tab_id, "Message received");

        match message {
            Message::StartSelection => {
                self.forward_selection_start().await;
                None
            }

            Message::SelectionComplete => {
                self.handle_selection_complete(sender.tab_id).await;
                None
            }

            Message::ChangeDetected => {
                self.handle_change_detected(sender.tab_id).await;
                None
            }

            Message::ScreenshotError => {
                let relay = &self.inner.relay;
                relay.to_panel(Message::ScreenshotError).await;
                relay.alert(notices::ORIGINAL_CAPTURE_FAILED).await;
                None
            }

            Message::StartMonitoring => {
                self.start_from_panel().await;
                None
            }

            Message::StopMonitoring => {
                self.stop_from_panel().await;
                None
            }

            Message::StopMonitoringForTab { tab_id } => {
                let reply = match tab_id {
                    Some(tab_id) => {
                        self.stop_for_tab(tab_id).await;
                        StopTabReply::stopped(tab_id)
                    }
                    None => StopTabReply::missing_tab(),
                };
                reply_value(&reply)
            }

            Message::GetActiveSessions => reply_value(&self.active_sessions()),

            Message::ShowError { error } if sender.tab_id.is_some() => {
                self.inner.relay.to_panel(Message::ShowError { error }).await;
                None
            }

            other => {
                debug!(action = other.action(), "Message not handled by coordinator");
                None
            }
        }
    }

    /// Processes events until `events` closes or `shutdown` fires, then stops
    /// every session.
    pub async fn serve(
        self,
        mut events: mpsc::UnboundedReceiver<CoordinatorEvent>,
        shutdown: CancellationToken,
    ) {
        info!("Coordinator started");

        loop {
            tokio::select! {
                biased;

                () = shutdown.cancelled() => {
                    debug!("Shutdown requested");
                    break;
                }

                event = events.recv() => match event {
                    Some(event) => self.dispatch(event).await,
                    None => {
                        debug!("Event channel closed");
                        break;
                    }
                },
            }
        }

        self.shutdown().await;
    }

    /// Stops every session and waits for their tasks.
    pub async fn shutdown(&self) {
        let timers = self.inner.registry.stop_all();
        let count = timers.len();

        for timer in timers {
            timer.cancel().await;
        }

        info!(cancelled = count, "Coordinator stopped");
    }

    async fn dispatch(&self, event: CoordinatorEvent) {
        match event {
            CoordinatorEvent::Startup => self.on_startup().await,

            CoordinatorEvent::Message {
                message,
                sender,
                reply,
            } => {
                let result = self.handle_message(message, sender).await;
                if let Some(reply) = reply
                    && reply.send(result).is_err()
                {
                    debug!("Reply receiver dropped");
                }
            }
        }
    }
}

fn reply_value<T: Serialize>(value: &T) -> Option<Value> {
    match serde_json::to_value(value) {
        Ok(value) => Some(value),
        Err(e) => {
            error!(error = %e, "Could not serialize reply");
            None
        }
    }
}
