//! Event message types.
//!
//! Events are notifications sent from the host bridge to the coordinator
//! when browser activity occurs.
//!
//! # Event Types
//!
//! | Method | Meaning |
//! |--------|---------|
//! | `runtime.message` | An extension message from a page or the panel; answered by [`EventReply`] |
//! | `runtime.startup` | The browser (re)started the extension |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::identifiers::RequestId;

use super::{Message, MessageSender};

// ============================================================================
// Event
// ============================================================================

/// An event notification from host to coordinator.
///
/// # Format
///
/// ```json
/// {
///   "id": "event-uuid",
///   "type": "event",
///   "method": "namespace.eventName",
///   "params": { ... }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    /// Unique identifier for EventReply correlation.
    pub id: RequestId,

    /// Event type marker (always "event").
    #[serde(rename = "type")]
    pub event_type: String,

    /// Event name in `namespace.eventName` format.
    pub method: String,

    /// Event-specific data.
    #[serde(default)]
    pub params: Value,
}

impl Event {
    /// Returns the namespace from the method.
    #[inline]
    #[must_use]
    pub fn namespace(&self) -> &str {
        self.method.split('.').next().unwrap_or_default()
    }

    /// Returns the event name from the method.
    #[inline]
    #[must_use]
    pub fn event_name(&self) -> &str {
        self.method.split('.').nth(1).unwrap_or_default()
    }

    /// Parses the event into a typed variant.
    #[must_use]
    pub fn parse(&self) -> ParsedEvent {
        match self.method.as_str() {
            "runtime.message" => self.parse_runtime_message(),
            "runtime.startup" => ParsedEvent::RuntimeStartup,
            _ => ParsedEvent::Unknown {
                method: self.method.clone(),
                params: self.params.clone(),
            },
        }
    }

    fn parse_runtime_message(&self) -> ParsedEvent {
        let message = self
            .params
            .get("message")
            .cloned()
            .map(serde_json::from_value::<Message>);

        let sender = self
            .params
            .get("sender")
            .cloned()
            .and_then(|v| serde_json::from_value::<MessageSender>(v).ok())
            .unwrap_or_default();

        match message {
            Some(Ok(message)) => ParsedEvent::RuntimeMessage { message, sender },
            Some(Err(e)) => {
                warn!(error = %e, "Unrecognized runtime message");
                ParsedEvent::Unknown {
                    method: self.method.clone(),
                    params: self.params.clone(),
                }
            }
            None => ParsedEvent::Unknown {
                method: self.method.clone(),
                params: self.params.clone(),
            },
        }
    }
}

// ============================================================================
// EventReply
// ============================================================================

/// A reply from coordinator to host for an event that expects an answer.
///
/// # Format
///
/// ```json
/// {
///   "id": "event-uuid",
///   "replyTo": "runtime.message",
///   "result": { "hasScreenshot": true }
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct EventReply {
    /// Matches the event's ID.
    pub id: RequestId,

    /// Event method being replied to.
    #[serde(rename = "replyTo")]
    pub reply_to: String,

    /// Reply payload; `null` when the message has no reply.
    pub result: Value,
}

impl EventReply {
    /// Creates a new event reply.
    #[inline]
    #[must_use]
    pub fn new(id: RequestId, reply_to: impl Into<String>, result: Value) -> Self {
        Self {
            id,
            reply_to: reply_to.into(),
            result,
        }
    }

    /// Creates a reply to an event.
    #[inline]
    #[must_use]
    pub fn to_event(event: &Event, result: Option<Value>) -> Self {
        Self::new(event.id, event.method.clone(), result.unwrap_or(Value::Null))
    }
}

// ============================================================================
// ParsedEvent
// ============================================================================

/// Parsed event types for type-safe handling.
#[derive(Debug, Clone)]
pub enum ParsedEvent {
    /// Extension message from a page or the panel.
    RuntimeMessage {
        /// The message.
        message: Message,
        /// Who sent it.
        sender: MessageSender,
    },

    /// Browser startup.
    RuntimeStartup,

    /// Unknown event type.
    Unknown {
        /// Event method.
        method: String,
        /// Event params.
        params: Value,
    },
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::identifiers::TabId;

    fn event(method: &str, params: Value) -> Event {
        serde_json::from_value(json!({
            "id": "550e8400-e29b-41d4-a716-446655440000",
            "type": "event",
            "method": method,
            "params": params,
        }))
        .expect("parse event")
    }

    #[test]
    fn test_event_method_parts() {
        let event = event("runtime.startup", json!({}));
        assert_eq!(event.namespace(), "runtime");
        assert_eq!(event.event_name(), "startup");
        assert!(matches!(event.parse(), ParsedEvent::RuntimeStartup));
    }

    #[test]
    fn test_parse_page_message() {
        let event = event(
            "runtime.message",
            json!({"message": {"action": "changeDetected"}, "sender": {"tabId": 12}}),
        );

        match event.parse() {
            ParsedEvent::RuntimeMessage { message, sender } => {
                assert_eq!(message, Message::ChangeDetected);
                assert_eq!(sender.tab_id, TabId::new(12));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_parse_panel_message() {
        let event = event(
            "runtime.message",
            json!({"message": {"action": "getActiveSessions"}}),
        );

        match event.parse() {
            ParsedEvent::RuntimeMessage { message, sender } => {
                assert_eq!(message, Message::GetActiveSessions);
                assert_eq!(sender, MessageSender::panel());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_unrecognized_message_is_unknown() {
        let event = event("runtime.message", json!({"message": {"action": "nope"}}));
        assert!(matches!(event.parse(), ParsedEvent::Unknown { .. }));
    }

    #[test]
    fn test_event_reply_shape() {
        let event = event("runtime.message", json!({}));
        let reply = EventReply::to_event(&event, Some(json!({"hasScreenshot": false})));
        let json = serde_json::to_value(&reply).expect("serialize");

        assert_eq!(json["replyTo"], "runtime.message");
        assert_eq!(json["result"]["hasScreenshot"], false);

        let reply = EventReply::to_event(&event, None);
        assert!(reply.result.is_null());
    }
}
