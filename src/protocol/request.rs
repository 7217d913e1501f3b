//! Request and Response message types.
//!
//! Defines the frames exchanged between the coordinator process and the
//! browser host bridge.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::{RequestId, TabId};

use super::Command;

// ============================================================================
// Request
// ============================================================================

/// A command request from coordinator to host.
///
/// # Format
///
/// ```json
/// {
///   "id": "uuid",
///   "method": "namespace.methodName",
///   "params": { ... }
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    /// Unique identifier for request/response correlation.
    pub id: RequestId,

    /// Command with method and params.
    #[serde(flatten)]
    pub command: Command,
}

impl Request {
    /// Creates a new request with auto-generated ID.
    #[inline]
    #[must_use]
    pub fn new(command: Command) -> Self {
        Self {
            id: RequestId::generate(),
            command,
        }
    }

    /// Creates a new request with specific ID.
    #[inline]
    #[must_use]
    pub fn with_id(id: RequestId, command: Command) -> Self {
        Self { id, command }
    }
}

// ============================================================================
// Response
// ============================================================================

/// A response from host to coordinator.
///
/// # Format
///
/// Success:
/// ```json
/// { "id": "uuid", "type": "success", "result": { ... } }
/// ```
///
/// Error:
/// ```json
/// { "id": "uuid", "type": "error", "error": "code", "message": "text" }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    /// Matches the request `id`.
    pub id: RequestId,

    /// Response type.
    #[serde(rename = "type")]
    pub response_type: ResponseType,

    /// Result data (if success).
    #[serde(default)]
    pub result: Option<Value>,

    /// Error code (if error).
    #[serde(default)]
    pub error: Option<String>,

    /// Error message (if error).
    #[serde(default)]
    pub message: Option<String>,
}

impl Response {
    /// Returns `true` if this is a success response.
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.response_type == ResponseType::Success
    }

    /// Extracts the result value.
    ///
    /// Host-side messaging failures keep their text so callers can tell a
    /// missing receiver apart from other failures.
    ///
    /// # Errors
    ///
    /// - [`Error::Messaging`] for a `messaging` error code
    /// - [`Error::Protocol`] for any other error response
    pub fn into_result(self) -> Result<Value> {
        match self.response_type {
            ResponseType::Success => Ok(self.result.unwrap_or(Value::Null)),
            ResponseType::Error => {
                let code = self.error.unwrap_or_else(|| "unknown error".to_string());
                let message = self.message.unwrap_or_else(|| code.clone());
                Err(match code.as_str() {
                    "messaging" => Error::messaging(message),
                    _ => Error::protocol(message),
                })
            }
        }
    }

    /// Like [`into_result`](Self::into_result), for commands addressed to
    /// one tab.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TabUnavailable`] for a `no such tab` error code.
    pub fn into_tab_result(self, tab_id: TabId) -> Result<Value> {
        if self.error.as_deref() == Some("no such tab") {
            return Err(Error::tab_unavailable(tab_id));
        }
        self.into_result()
    }

    /// Gets a u64 value from the result.
    ///
    /// Returns 0 if key not found or not a number.
    #[inline]
    #[must_use]
    pub fn get_u64(&self, key: &str) -> u64 {
        self.result
            .as_ref()
            .and_then(|v| v.get(key))
            .and_then(Value::as_u64)
            .unwrap_or_default()
    }
}

// ============================================================================
// ResponseType
// ============================================================================

/// Response type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Successful response.
    Success,
    /// Error response.
    Error,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::protocol::TabsCommand;

    #[test]
    fn test_request_serialization() {
        let command = Command::Tabs(TabsCommand::Reload {
            tab_id: TabId::new(1).expect("valid tab id"),
        });

        let request = Request::new(command);
        let json = serde_json::to_value(&request).expect("serialize");

        assert_eq!(json["method"], "tabs.reload");
        assert_eq!(json["params"]["tabId"], 1);
        assert!(json["id"].is_string());
    }

    #[test]
    fn test_request_with_id() {
        let id = RequestId::generate();
        let request = Request::with_id(id, Command::Tabs(TabsCommand::QueryActive));
        assert_eq!(request.id, id);
    }

    #[test]
    fn test_success_response() {
        let json_str = r#"{
            "id": "550e8400-e29b-41d4-a716-446655440000",
            "type": "success",
            "result": {"tabId": 7}
        }"#;

        let response: Response = serde_json::from_str(json_str).expect("parse");
        assert!(response.is_success());
        assert_eq!(response.get_u64("tabId"), 7);
        assert_eq!(response.get_u64("missing"), 0);
    }

    #[test]
    fn test_messaging_error_keeps_text() {
        let json_str = r#"{
            "id": "550e8400-e29b-41d4-a716-446655440000",
            "type": "error",
            "error": "messaging",
            "message": "Could not establish connection. Receiving end does not exist."
        }"#;

        let response: Response = serde_json::from_str(json_str).expect("parse");
        let err = response.into_result().expect_err("should fail");
        assert!(err.is_receiving_end_missing());
    }

    #[test]
    fn test_no_such_tab_error() {
        let json_str = r#"{
            "id": "550e8400-e29b-41d4-a716-446655440000",
            "type": "error",
            "error": "no such tab",
            "message": "Invalid tab ID: 4"
        }"#;

        let response: Response = serde_json::from_str(json_str).expect("parse");
        let tab_id = TabId::new(4).expect("valid tab id");
        let err = response.into_tab_result(tab_id).expect_err("should fail");
        assert!(err.is_tab_unavailable());
    }

    #[test]
    fn test_other_error_is_protocol() {
        let json_str = r#"{
            "id": "550e8400-e29b-41d4-a716-446655440000",
            "type": "error",
            "error": "timeout"
        }"#;

        let response: Response = serde_json::from_str(json_str).expect("parse");
        let err = response.into_result().expect_err("should fail");
        assert!(matches!(err, Error::Protocol { .. }));
    }
}
