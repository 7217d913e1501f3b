//! Per-session driver task.
//!
//! Each running session owns exactly one task, spawned here and held by the
//! registry as the session's [`PendingTimer`]. The task runs the session's
//! steps strictly in sequence; every continuation first checks that its
//! generation is still current, so a stopped or restarted session never
//! reschedules.
//!
//! # Poll Iteration
//!
//! 1. Tab gone: stop and notify.
//! 2. Reference missing: capture again inline, warn, continue.
//! 3. Count the iteration; publish the count if the tab is active.
//! 4. Reload; on failure back off.
//! 5. Wait `delay_after_load`, ask the page to compare; back off on
//!    failure, else wait the inter-poll delay.

use std::time::Duration;

use serde_json::Value;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::identifiers::TabId;
use crate::protocol::{CheckScreenshotReply, CompareReply, Message, Notification};

use super::coordinator::Coordinator;
use super::notices;
use super::session::{MonitorState, PendingTimer};

// ============================================================================
// Coordinator - Driver Task
// ============================================================================

impl Coordinator {
    /// Spawns the driver task for a freshly begun session.
    pub(super) fn spawn_session(&self, tab_id: TabId, generation: u64) {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let coordinator = self.clone();

        let handle = tokio::spawn(async move {
            tokio::select! {
                biased;

                () = task_token.cancelled() => {
                    debug!(tab_id = %tab_id, generation, "Session task cancelled");
                }

                () = coordinator.drive(tab_id, generation) => {}
            }
        });

        let timer = PendingTimer::new(token, handle);
        if let Err(timer) = self.inner.registry.attach_timer(tab_id, generation, timer) {
            debug!(tab_id = %tab_id, generation, "Session ended before its task was attached");
            timer.disarm();
        }
    }

    async fn drive(&self, tab_id: TabId, generation: u64) {
        let registry = &self.inner.registry;

        let awaiting = registry
            .current(tab_id, generation)
            .is_some_and(|s| s.state == MonitorState::AwaitingReference);

        if awaiting && !self.await_reference(tab_id, generation).await {
            return;
        }

        while let Some(delay) = self.poll_once(tab_id, generation).await {
            if !registry.is_current(tab_id, generation) {
                break;
            }
            trace!(tab_id = %tab_id, delay_ms = delay.as_millis() as u64, "Next poll scheduled");
            sleep(delay).await;
        }

        debug!(tab_id = %tab_id, generation, "Session task finished");
    }

    /// Stops the session from inside its own task.
    async fn halt(&self, tab_id: TabId, generation: u64) {
        if self.inner.registry.stop_current(tab_id, generation) {
            self.after_stop(tab_id).await;
        }
    }
}

// ============================================================================
// Coordinator - AwaitingReference
// ============================================================================

impl Coordinator {
    /// Captures and verifies the reference image. Returns `true` once the
    /// session moved to `Polling`.
    async fn await_reference(&self, tab_id: TabId, generation: u64) -> bool {
        let inner = &self.inner;
        info!(tab_id = %tab_id, "No reference image, capturing");

        tokio::join!(
            self.capture_initial_area(tab_id),
            sleep(inner.timings.reference_verify_delay),
        );

        if !inner.registry.is_current(tab_id, generation) {
            return false;
        }

        if self.reference_present().await {
            info!(tab_id = %tab_id, "Reference verified, polling");
            return inner
                .registry
                .transition(tab_id, generation, MonitorState::Polling);
        }

        warn!(tab_id = %tab_id, "Reference still missing, asking the page");

        let reply = inner
            .relay
            .request_page::<CheckScreenshotReply>(tab_id, Message::CheckScreenshot)
            .await;

        match reply {
            Ok(reply) if reply.has_screenshot => {
                info!(tab_id = %tab_id, "Page holds a reference, polling");
                inner
                    .registry
                    .transition(tab_id, generation, MonitorState::Polling)
            }

            Ok(_) => {
                error!(tab_id = %tab_id, "Cannot start monitoring without a reference");
                inner.relay.alert(notices::REFERENCE_NOT_CAPTURED).await;
                inner.relay.to_panel(Message::ScreenshotError).await;
                self.halt(tab_id, generation).await;
                false
            }

            Err(e) => {
                error!(tab_id = %tab_id, error = %e, "Could not reach the page");
                inner.relay.alert(notices::PAGE_UNREACHABLE).await;
                self.halt(tab_id, generation).await;
                false
            }
        }
    }

    /// Asks the page to capture the reference, then verifies it was stored,
    /// retrying the request once.
    pub(super) async fn capture_initial_area(&self, tab_id: TabId) {
        let inner = &self.inner;

        if let Err(e) = inner.relay.get_tab(tab_id).await {
            error!(tab_id = %tab_id, error = %e, "Tab not available for capture");
            inner.relay.alert(notices::TAB_NOT_AVAILABLE).await;
            return;
        }

        info!(tab_id = %tab_id, "Requesting reference capture");
        if let Err(e) = inner.relay.to_page(tab_id, Message::CaptureArea).await {
            error!(tab_id = %tab_id, error = %e, "Capture request failed");
        }

        sleep(inner.timings.capture_verify_delay).await;

        if self.reference_present().await {
            debug!(tab_id = %tab_id, "Reference stored");
            return;
        }

        warn!(tab_id = %tab_id, "Reference not stored, retrying capture");
        if let Err(e) = inner.relay.to_page(tab_id, Message::CaptureArea).await {
            error!(tab_id = %tab_id, error = %e, "Capture retry failed");
            inner.relay.alert(notices::CAPTURE_RETRY_FAILED).await;
        }
    }
}

// ============================================================================
// Coordinator - Polling
// ============================================================================

impl Coordinator {
    /// Runs one poll iteration. Returns the delay before the next one, or
    /// `None` when the session ended.
    async fn poll_once(&self, tab_id: TabId, generation: u64) -> Option<Duration> {
        let inner = &self.inner;
        let timings = inner.timings;

        match inner.relay.get_tab(tab_id).await {
            Ok(_) => {}
            Err(e) if e.is_tab_unavailable() => {
                warn!(tab_id = %tab_id, "Tab closed, stopping monitoring");
                self.halt(tab_id, generation).await;
                inner
                    .relay
                    .notify(Notification::interrupted(notices::tab_lost(tab_id)))
                    .await;
                return None;
            }
            Err(e) => {
                warn!(tab_id = %tab_id, error = %e, "Tab lookup failed");
                return Some(timings.retry_backoff);
            }
        }

        if !self.reference_present().await {
            self.recapture_reference(tab_id).await;
        }

        let count = inner.registry.increment_refresh(tab_id, generation)?;
        info!(tab_id = %tab_id, count, "Poll iteration");

        if inner.relay.is_active_tab(tab_id).await {
            inner.relay.to_panel(Message::UpdateCount { count }).await;
            if let Err(e) = inner.state.set_refresh_count(count).await {
                warn!(tab_id = %tab_id, error = %e, "Could not persist refresh count");
            }
        }

        if let Err(e) = inner.relay.reload(tab_id).await {
            error!(tab_id = %tab_id, error = %e, "Reload failed");
            return Some(timings.retry_backoff);
        }

        let delay = inner.registry.current(tab_id, generation)?.config.delay_after_load;
        sleep(delay).await;

        if !inner.registry.is_current(tab_id, generation) {
            return None;
        }

        match inner.relay.to_page(tab_id, Message::CompareArea).await {
            Ok(reply) => {
                log_comparison(tab_id, reply);
                Some(timings.inter_poll_delay)
            }
            Err(e) => {
                error!(tab_id = %tab_id, error = %e, "Comparison request failed");
                if e.is_receiving_end_missing() {
                    inner
                        .relay
                        .notify(Notification::error(notices::COMMUNICATION_PROBLEM))
                        .await;
                }
                Some(timings.retry_backoff)
            }
        }
    }

    /// Single inline re-capture when the reference vanished mid-session.
    async fn recapture_reference(&self, tab_id: TabId) {
        let relay = &self.inner.relay;

        warn!(tab_id = %tab_id, "Reference missing before poll, capturing again");
        relay
            .notify(Notification::warning(notices::REFERENCE_MISSING))
            .await;

        if let Err(e) = relay.to_page(tab_id, Message::CaptureArea).await {
            warn!(tab_id = %tab_id, error = %e, "Re-capture request failed");
        }

        if !self.reference_present().await {
            error!(tab_id = %tab_id, "Reference still missing, continuing");
            relay.alert(notices::REFERENCE_NOT_CAPTURED).await;
        }
    }
}

fn log_comparison(tab_id: TabId, reply: Value) {
    match serde_json::from_value::<CompareReply>(reply) {
        Ok(CompareReply {
            similarity: Some(similarity),
            ..
        }) => debug!(tab_id = %tab_id, similarity, "Comparison finished"),
        Ok(_) => debug!(tab_id = %tab_id, "Comparison finished without a score"),
        Err(e) => trace!(tab_id = %tab_id, error = %e, "Unrecognized comparison reply"),
    }
}
