//! Delivery policies over a [`BrowserHost`].

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::identifiers::TabId;
use crate::protocol::{Message, Notification, TabInfo};

use super::BrowserHost;

// ============================================================================
// EventRelay
// ============================================================================

/// Applies the relay policies to a [`BrowserHost`].
#[derive(Clone)]
pub struct EventRelay {
    host: Arc<dyn BrowserHost>,
}

impl fmt::Debug for EventRelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRelay")
            .field("context_valid", &self.host.context_valid())
            .finish()
    }
}

impl EventRelay {
    /// Wraps a host.
    #[must_use]
    pub fn new(host: Arc<dyn BrowserHost>) -> Self {
        Self { host }
    }

    /// Returns the wrapped host.
    #[inline]
    #[must_use]
    pub fn host(&self) -> &Arc<dyn BrowserHost> {
        &self.host
    }

    /// Returns `true` while the host context is alive.
    #[inline]
    #[must_use]
    pub fn is_context_valid(&self) -> bool {
        self.host.context_valid()
    }

    fn ensure_context(&self) -> Result<()> {
        if self.host.context_valid() {
            Ok(())
        } else {
            Err(Error::ContextInvalidated)
        }
    }
}

// ============================================================================
// EventRelay - Tabs
// ============================================================================

impl EventRelay {
    /// Looks up a tab.
    ///
    /// # Errors
    ///
    /// - [`Error::ContextInvalidated`] if the host context is gone
    /// - [`Error::TabUnavailable`] if the tab no longer exists
    pub async fn get_tab(&self, tab_id: TabId) -> Result<TabInfo> {
        self.ensure_context()?;
        self.host.get_tab(tab_id).await
    }

    /// Active tab id; lookup failures read as "no active tab".
    pub async fn active_tab_id(&self) -> Option<TabId> {
        if self.ensure_context().is_err() {
            return None;
        }

        match self.host.active_tab().await {
            Ok(tab) => tab.map(|t| t.id),
            Err(e) => {
                warn!(error = %e, "Active tab query failed");
                None
            }
        }
    }

    /// Returns `true` if `tab_id` is the active tab.
    pub async fn is_active_tab(&self, tab_id: TabId) -> bool {
        self.active_tab_id().await == Some(tab_id)
    }

    /// Starts reloading a tab.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ContextInvalidated`] or the host's failure.
    pub async fn reload(&self, tab_id: TabId) -> Result<()> {
        self.ensure_context()?;
        self.host.reload_tab(tab_id).await
    }
}

// ============================================================================
// EventRelay - Messaging
// ============================================================================

impl EventRelay {
    /// Sends a message to a page agent.
    ///
    /// # Errors
    ///
    /// - [`Error::ContextInvalidated`] if the host context is gone
    /// - [`Error::Messaging`] if no page agent is listening
    pub async fn to_page(&self, tab_id: TabId, message: Message) -> Result<Value> {
        self.ensure_context()?;

        let action = message.action();
        self.host
            .send_to_tab(tab_id, message)
            .await
            .inspect_err(|e| debug!(tab_id = %tab_id, action, error = %e, "Page message failed"))
    }

    /// Sends a message to a page agent and decodes the reply.
    ///
    /// # Errors
    ///
    /// As [`to_page`](Self::to_page), plus [`Error::Json`] for a reply of
    /// the wrong shape.
    pub async fn request_page<T: DeserializeOwned>(
        &self,
        tab_id: TabId,
        message: Message,
    ) -> Result<T> {
        let reply = self.to_page(tab_id, message).await?;
        Ok(serde_json::from_value(reply)?)
    }

    /// Sends a message to the panel. Never fails.
    pub async fn to_panel(&self, message: Message) {
        if !self.host.context_valid() {
            debug!(action = message.action(), "Context invalidated, panel message dropped");
            return;
        }

        let action = message.action();
        if let Err(e) = self.host.send_to_panel(message).await {
            debug!(action, error = %e, "Panel not reachable");
        }
    }

    /// Shows an OS notification. Never fails.
    pub async fn notify(&self, notification: Notification) {
        if !self.host.context_valid() {
            debug!(title = %notification.title, "Context invalidated, notification dropped");
            return;
        }

        if let Err(e) = self.host.notify(notification).await {
            warn!(error = %e, "Notification failed");
        }
    }

    /// Surfaces an error through both the panel and an OS notification.
    pub async fn alert(&self, text: &str) {
        self.to_panel(Message::show_error(text)).await;
        self.notify(Notification::error(text)).await;
    }
}

// ============================================================================
// Tests
// ============================================================================
