//! What a page agent needs from the page it lives in.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::trace;
use url::Url;

use crate::capture::ScrollOffset;
use crate::error::{Error, Result};
use crate::identifiers::TabId;
use crate::monitor::CoordinatorEvent;
use crate::protocol::{Message, MessageSender};

// ============================================================================
// PageEnvironment
// ============================================================================

/// The hosting page.
#[async_trait]
pub trait PageEnvironment: Send + Sync {
    /// Address of the page.
    fn url(&self) -> Option<Url>;

    /// Current document scroll position.
    fn scroll_offset(&self) -> ScrollOffset;

    /// Returns `true` if the document declares a Content-Security-Policy.
    fn has_csp_meta(&self) -> bool {
        false
    }

    /// Returns `false` once the extension was unloaded under the page.
    fn context_valid(&self) -> bool {
        true
    }

    /// Shows the selection overlay.
    async fn begin_selection(&self) -> Result<()> {
        Ok(())
    }

    /// Plays the change chime.
    async fn play_chime(&self) -> Result<()>;

    /// Plays a short beep.
    async fn play_beep(&self) -> Result<()>;
}

// ============================================================================
// RuntimePort
// ============================================================================

/// Outbound channel from a page agent to the coordinator.
#[async_trait]
pub trait RuntimePort: Send + Sync {
    /// Sends a fire-and-forget message.
    async fn send(&self, message: Message) -> Result<()>;
}

/// [`RuntimePort`] feeding a coordinator event channel directly.
#[derive(Debug, Clone)]
pub struct EventPort {
    sender: MessageSender,
    events: mpsc::UnboundedSender<CoordinatorEvent>,
}

impl EventPort {
    /// Creates a port that tags every message with `tab_id`.
    #[must_use]
    pub fn new(tab_id: TabId, events: mpsc::UnboundedSender<CoordinatorEvent>) -> Self {
        Self {
            sender: MessageSender::page(tab_id),
            events,
        }
    }
}

#[async_trait]
impl RuntimePort for EventPort {
    async fn send(&self, message: Message) -> Result<()> {
        trace!(action = message.action(), "Page -> coordinator");
        self.events
            .send(CoordinatorEvent::notify(message, self.sender))
            .map_err(|_| Error::messaging("coordinator event channel closed"))
    }
}
