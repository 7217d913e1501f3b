//! Extension messages exchanged between coordinator, pages, and panel.
//!
//! Every message is a JSON object whose `action` field names the variant:
//!
//! ```json
//! { "action": "updateThreshold", "threshold": 90 }
//! ```
//!
//! | Action | Direction |
//! |--------|-----------|
//! | `startSelection` | panel → coordinator → page |
//! | `selectionComplete` | page → coordinator → panel |
//! | `captureArea`, `compareArea`, `checkScreenshot` | coordinator → page |
//! | `updateThreshold`, `playNotificationSound` | coordinator → page |
//! | `changeDetected` | page → coordinator → panel |
//! | `screenshotError` | page → coordinator → panel |
//! | `startMonitoring`, `stopMonitoring`, `stopMonitoringForTab`, `getActiveSessions` | panel → coordinator |
//! | `updateCount`, `sessionsUpdated` | coordinator → panel |
//! | `showError` | coordinator/page → panel |

use serde::{Deserialize, Serialize};

use crate::identifiers::TabId;

// ============================================================================
// Message
// ============================================================================

/// An extension message, discriminated by `action`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Message {
    /// Begin interactive region selection.
    StartSelection,

    /// Region chosen; reference capture pending.
    SelectionComplete,

    /// Capture the reference image.
    CaptureArea,

    /// Run one comparison cycle.
    CompareArea,

    /// Ask whether a reference image exists.
    CheckScreenshot,

    /// Push a new similarity threshold.
    UpdateThreshold {
        /// Threshold in percent.
        threshold: f64,
    },

    /// Similarity fell below threshold.
    ChangeDetected,

    /// Reference capture failed irrecoverably.
    ScreenshotError,

    /// Play the audible alert.
    PlayNotificationSound,

    /// Start monitoring the panel's tab.
    StartMonitoring,

    /// Stop monitoring the panel's tab.
    StopMonitoring,

    /// Stop one session.
    StopMonitoringForTab {
        /// Session to stop.
        #[serde(rename = "tabId", default, skip_serializing_if = "Option::is_none")]
        tab_id: Option<TabId>,
    },

    /// List active sessions.
    GetActiveSessions,

    /// Live counter update.
    UpdateCount {
        /// Current refresh count.
        count: u64,
    },

    /// The active-session list changed.
    SessionsUpdated,

    /// User-visible error text.
    ShowError {
        /// Message to display.
        error: String,
    },
}

impl Message {
    /// Returns the `action` name.
    #[must_use]
    pub fn action(&self) -> &'static str {
        match self {
            Self::StartSelection => "startSelection",
            Self::SelectionComplete => "selectionComplete",
            Self::CaptureArea => "captureArea",
            Self::CompareArea => "compareArea",
            Self::CheckScreenshot => "checkScreenshot",
            Self::UpdateThreshold { .. } => "updateThreshold",
            Self::ChangeDetected => "changeDetected",
            Self::ScreenshotError => "screenshotError",
            Self::PlayNotificationSound => "playNotificationSound",
            Self::StartMonitoring => "startMonitoring",
            Self::StopMonitoring => "stopMonitoring",
            Self::StopMonitoringForTab { .. } => "stopMonitoringForTab",
            Self::GetActiveSessions => "getActiveSessions",
            Self::UpdateCount { .. } => "updateCount",
            Self::SessionsUpdated => "sessionsUpdated",
            Self::ShowError { .. } => "showError",
        }
    }

    /// Creates a `showError` message.
    #[inline]
    #[must_use]
    pub fn show_error(error: impl Into<String>) -> Self {
        Self::ShowError {
            error: error.into(),
        }
    }
}

// ============================================================================
// MessageSender
// ============================================================================

/// Origin of an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MessageSender {
    /// Tab of the sending page; `None` for the panel.
    #[serde(rename = "tabId", default, skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<TabId>,
}

impl MessageSender {
    /// A message from the panel.
    #[inline]
    #[must_use]
    pub const fn panel() -> Self {
        Self { tab_id: None }
    }

    /// A message from a page.
    #[inline]
    #[must_use]
    pub const fn page(tab_id: TabId) -> Self {
        Self {
            tab_id: Some(tab_id),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
