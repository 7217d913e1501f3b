//! Message types.
//!
//! Two layers share this module:
//!
//! - **Extension messages** ([`Message`]): the `action`-tagged JSON objects
//!   exchanged between the coordinator, page agents, and the control panel.
//! - **Host frames**: the WebSocket protocol between the coordinator process
//!   and the browser host bridge.
//!
//! # Host Frames
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Request` | Coordinator → Host | Command request |
//! | `Response` | Host → Coordinator | Command response |
//! | `Event` | Host → Coordinator | Browser notification |
//! | `EventReply` | Coordinator → Host | Answer to a runtime message |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `message` | Extension messages |
//! | `reply` | Replies to request-style messages |
//! | `command` | Host commands by namespace |
//! | `event` | Event and EventReply types |
//! | `request` | Request and Response types |

// ============================================================================
// Submodules
// ============================================================================

/// Host command definitions organized by namespace.
pub mod command;

/// Event message types.
pub mod event;

/// Extension messages.
pub mod message;

/// Reply payloads.
pub mod reply;

/// Request and Response message types.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::{
    Command, Notification, NotificationsCommand, RuntimeCommand, StorageCommand, TabInfo,
    TabsCommand,
};
pub use event::{Event, EventReply, ParsedEvent};
pub use message::{Message, MessageSender};
pub use reply::{CaptureReply, CheckScreenshotReply, CompareReply, SessionSummary, StopTabReply};
pub use request::{Request, Response, ResponseType};
