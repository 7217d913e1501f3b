//! Browser capabilities the coordinator depends on.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::identifiers::TabId;
use crate::protocol::{Message, Notification, TabInfo};

/// The browser as seen from the coordinator.
///
/// Implemented over the WebSocket link by
/// [`WsBrowserHost`](crate::transport::WsBrowserHost) and by in-process
/// fakes in tests.
#[async_trait]
pub trait BrowserHost: Send + Sync {
    /// Looks up a tab.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TabUnavailable`](crate::Error::TabUnavailable) if the
    /// tab no longer exists.
    async fn get_tab(&self, tab_id: TabId) -> Result<TabInfo>;

    /// Active tab of the current window, if any.
    async fn active_tab(&self) -> Result<Option<TabInfo>>;

    /// Starts reloading a tab.
    async fn reload_tab(&self, tab_id: TabId) -> Result<()>;

    /// Sends a message to a tab's page agent and returns its reply.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Messaging`](crate::Error::Messaging) when no page
    /// agent is listening.
    async fn send_to_tab(&self, tab_id: TabId, message: Message) -> Result<Value>;

    /// Sends a message to the control panel.
    async fn send_to_panel(&self, message: Message) -> Result<()>;

    /// Shows an OS notification.
    async fn notify(&self, notification: Notification) -> Result<()>;

    /// Returns `false` once the extension context has been torn down.
    fn context_valid(&self) -> bool {
        true
    }
}
