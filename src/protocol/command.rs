//! Host commands organized by browser API namespace.
//!
//! Commands follow the `namespace.methodName` format.
//!
//! # Command Namespaces
//!
//! | Namespace | Commands |
//! |-----------|----------|
//! | `tabs` | Lookup, active tab, reload, page messaging |
//! | `runtime` | Panel messaging |
//! | `notifications` | OS notifications |
//! | `storage` | Persistent key-value state |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::identifiers::TabId;

use super::Message;

// ============================================================================
// Command Wrapper
// ============================================================================

/// All host commands organized by namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Command {
    /// Tabs namespace commands.
    Tabs(TabsCommand),
    /// Runtime namespace commands.
    Runtime(RuntimeCommand),
    /// Notifications namespace commands.
    Notifications(NotificationsCommand),
    /// Storage namespace commands.
    Storage(StorageCommand),
}

impl Command {
    /// Returns the `method` name.
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::Tabs(TabsCommand::Get { .. }) => "tabs.get",
            Self::Tabs(TabsCommand::QueryActive) => "tabs.queryActive",
            Self::Tabs(TabsCommand::Reload { .. }) => "tabs.reload",
            Self::Tabs(TabsCommand::SendMessage { .. }) => "tabs.sendMessage",
            Self::Runtime(RuntimeCommand::SendMessage { .. }) => "runtime.sendMessage",
            Self::Notifications(NotificationsCommand::Create(_)) => "notifications.create",
            Self::Storage(StorageCommand::Get { .. }) => "storage.get",
            Self::Storage(StorageCommand::Set { .. }) => "storage.set",
            Self::Storage(StorageCommand::Remove { .. }) => "storage.remove",
        }
    }
}

// ============================================================================
// Tabs Commands
// ============================================================================

/// Tabs namespace commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum TabsCommand {
    /// Look up a tab. Fails if the tab no longer exists.
    #[serde(rename = "tabs.get")]
    Get {
        /// Tab to look up.
        #[serde(rename = "tabId")]
        tab_id: TabId,
    },

    /// Active tab of the current window.
    #[serde(rename = "tabs.queryActive")]
    QueryActive,

    /// Reload a tab.
    #[serde(rename = "tabs.reload")]
    Reload {
        /// Tab to reload.
        #[serde(rename = "tabId")]
        tab_id: TabId,
    },

    /// Deliver a message to a tab's page agent.
    #[serde(rename = "tabs.sendMessage")]
    SendMessage {
        /// Receiving tab.
        #[serde(rename = "tabId")]
        tab_id: TabId,
        /// Message payload.
        message: Message,
    },
}

// ============================================================================
// Runtime Commands
// ============================================================================

/// Runtime namespace commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum RuntimeCommand {
    /// Broadcast a message to extension views (the panel).
    #[serde(rename = "runtime.sendMessage")]
    SendMessage {
        /// Message payload.
        message: Message,
    },
}

// ============================================================================
// Notifications Commands
// ============================================================================

/// Notifications namespace commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum NotificationsCommand {
    /// Show an OS notification.
    #[serde(rename = "notifications.create")]
    Create(Notification),
}

// ============================================================================
// Storage Commands
// ============================================================================

/// Storage namespace commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum StorageCommand {
    /// Read one key.
    #[serde(rename = "storage.get")]
    Get {
        /// Key to read.
        key: String,
    },

    /// Write several keys.
    #[serde(rename = "storage.set")]
    Set {
        /// Key-value pairs.
        items: Map<String, Value>,
    },

    /// Delete one key.
    #[serde(rename = "storage.remove")]
    Remove {
        /// Key to delete.
        key: String,
    },
}

// ============================================================================
// TabInfo
// ============================================================================

/// Tab metadata returned by `tabs.get` and `tabs.queryActive`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabInfo {
    /// Tab ID.
    pub id: TabId,
    /// Current URL.
    #[serde(default)]
    pub url: String,
    /// Page title.
    #[serde(default)]
    pub title: String,
}

impl TabInfo {
    /// Creates tab metadata.
    #[inline]
    #[must_use]
    pub fn new(id: TabId, url: impl Into<String>) -> Self {
        Self {
            id,
            url: url.into(),
            title: String::new(),
        }
    }

    /// Sets the title.
    #[inline]
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

// ============================================================================
// Notification
// ============================================================================

/// A basic OS notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Title line.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Icon path inside the extension.
    #[serde(rename = "iconUrl", skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

impl Notification {
    /// Default title.
    pub const TITLE: &'static str = "Page Change Monitor";

    /// Default icon.
    pub const ICON: &'static str = "icons/icon48.png";

    /// Creates a notification with the monitor title and icon.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            title: Self::TITLE.to_string(),
            message: message.into(),
            icon_url: Some(Self::ICON.to_string()),
        }
    }

    /// A monitoring error.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(message).with_title("Monitoring Error")
    }

    /// A non-fatal monitoring warning.
    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(message).with_title("Monitoring Warning")
    }

    /// Monitoring ended without a detected change.
    #[must_use]
    pub fn interrupted(message: impl Into<String>) -> Self {
        Self::new(message).with_title("Monitoring Stopped")
    }

    /// Overrides the title.
    #[inline]
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_tabs_reload_shape() {
        let tab_id = TabId::new(9).expect("valid tab id");
        let json = serde_json::to_value(TabsCommand::Reload { tab_id }).expect("serialize");
        assert_eq!(json, json!({"method": "tabs.reload", "params": {"tabId": 9}}));
    }

    #[test]
    fn test_query_active_has_no_params() {
        let json = serde_json::to_value(TabsCommand::QueryActive).expect("serialize");
        assert_eq!(json, json!({"method": "tabs.queryActive"}));
    }

    #[test]
    fn test_send_message_embeds_action() {
        let cmd = TabsCommand::SendMessage {
            tab_id: TabId::new(2).expect("valid tab id"),
            message: Message::CompareArea,
        };
        let json = serde_json::to_value(cmd).expect("serialize");
        assert_eq!(json["params"]["message"]["action"], "compareArea");
    }

    #[test]
    fn test_notification_create_shape() {
        let cmd = NotificationsCommand::Create(Notification::new("Changes detected"));
        let json = serde_json::to_value(cmd).expect("serialize");
        assert_eq!(json["method"], "notifications.create");
        assert_eq!(json["params"]["title"], Notification::TITLE);
        assert_eq!(json["params"]["message"], "Changes detected");
        assert_eq!(json["params"]["iconUrl"], Notification::ICON);
    }

    #[test]
    fn test_notification_titles() {
        assert_eq!(Notification::error("x").title, "Monitoring Error");
        assert_eq!(Notification::warning("x").title, "Monitoring Warning");
        assert_eq!(Notification::interrupted("x").title, "Monitoring Stopped");
        assert_eq!(Notification::new("x").title, Notification::TITLE);
    }

    #[test]
    fn test_method_matches_serialized_tag() {
        let commands = [
            Command::Tabs(TabsCommand::QueryActive),
            Command::Runtime(RuntimeCommand::SendMessage {
                message: Message::SessionsUpdated,
            }),
            Command::Storage(StorageCommand::Remove {
                key: "originalScreenshot".into(),
            }),
            Command::Storage(StorageCommand::Set { items: Map::new() }),
        ];

        for command in commands {
            let json = serde_json::to_value(&command).expect("serialize");
            assert_eq!(json["method"], command.method());
        }
    }

    #[test]
    fn test_tab_info_parse_minimal() {
        let info: TabInfo = serde_json::from_value(json!({"id": 3})).expect("parse");
        assert_eq!(info.id.as_u32(), 3);
        assert!(info.url.is_empty());
    }
}
