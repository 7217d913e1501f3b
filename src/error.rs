//! Error types for the page change monitor.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use page_change_monitor::{Result, Error};
//!
//! async fn example(coordinator: &Coordinator, tab_id: TabId) -> Result<()> {
//!     coordinator.start_monitoring(tab_id, MonitorConfig::default()).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Monitoring | [`Error::TabUnavailable`], [`Error::CaptureFailure`], [`Error::ReferenceMissing`] |
//! | Messaging | [`Error::Messaging`], [`Error::ContextInvalidated`] |
//! | Input | [`Error::InvalidRegion`], [`Error::Config`], [`Error::Protocol`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::ConnectionClosed`], [`Error::RequestTimeout`] |
//! | External | [`Error::Image`], [`Error::Io`], [`Error::Json`], [`Error::WebSocket`], [`Error::ChannelClosed`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use image::ImageError;
use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::{RequestId, TabId};

// ============================================================================
// Constants
// ============================================================================

/// Failure signatures reported by the browser when the page side of a
/// message channel is gone (page reloading, content script not injected,
/// extension reloaded).
const RECEIVING_END_SIGNATURES: &[&str] = &[
    "Receiving end does not exist",
    "Extension context invalidated",
];

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Monitoring Errors
    // ========================================================================
    /// Target tab was closed or navigated out of reach.
    ///
    /// Fatal to the session owning the tab.
    #[error("Tab not available: {tab_id}")]
    TabUnavailable {
        /// The missing tab.
        tab_id: TabId,
    },

    /// Region rasterization failed.
    ///
    /// Recovered by substituting a placeholder image.
    #[error("Capture failed: {message}")]
    CaptureFailure {
        /// Description of the capture failure.
        message: String,
    },

    /// No reference image is stored.
    #[error("Reference image missing")]
    ReferenceMissing,

    // ========================================================================
    // Messaging Errors
    // ========================================================================
    /// Cross-context message could not be delivered or answered.
    #[error("Messaging failed: {message}")]
    Messaging {
        /// Browser-reported failure text.
        message: String,
    },

    /// The host environment was torn down.
    ///
    /// Every cross-context operation becomes a no-op once this is observed.
    #[error("Extension context invalidated")]
    ContextInvalidated,

    // ========================================================================
    // Input Errors
    // ========================================================================
    /// Selected region rejected.
    #[error("Invalid region: {reason}")]
    InvalidRegion {
        /// Human-readable rejection reason.
        reason: String,
    },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Protocol violation or unexpected payload.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// WebSocket connection failed.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Connection timeout waiting for the browser shim.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// WebSocket connection closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Host request timeout.
    #[error("Request {request_id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The request ID that timed out.
        request_id: RequestId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// Image decode or encode error.
    #[error("Image error: {0}")]
    Image(#[from] ImageError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// Channel receive error.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a tab unavailable error.
    #[inline]
    pub fn tab_unavailable(tab_id: TabId) -> Self {
        Self::TabUnavailable { tab_id }
    }

    /// Creates a capture failure error.
    #[inline]
    pub fn capture(message: impl Into<String>) -> Self {
        Self::CaptureFailure {
            message: message.into(),
        }
    }

    /// Creates a messaging error.
    #[inline]
    pub fn messaging(message: impl Into<String>) -> Self {
        Self::Messaging {
            message: message.into(),
        }
    }

    /// Creates an invalid region error.
    #[inline]
    pub fn invalid_region(reason: impl Into<String>) -> Self {
        Self::InvalidRegion {
            reason: reason.into(),
        }
    }

    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(request_id: RequestId, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            request_id,
            timeout_ms,
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if the page side of a channel is gone.
    ///
    /// Matches the browser's "receiving end does not exist" and
    /// "context invalidated" failure signatures.
    #[must_use]
    pub fn is_receiving_end_missing(&self) -> bool {
        match self {
            Self::ContextInvalidated | Self::ConnectionClosed => true,
            Self::Messaging { message } => RECEIVING_END_SIGNATURES
                .iter()
                .any(|signature| message.contains(signature)),
            _ => false,
        }
    }

    /// Returns `true` if the error means the tab no longer exists.
    #[inline]
    #[must_use]
    pub fn is_tab_unavailable(&self) -> bool {
        matches!(self, Self::TabUnavailable { .. })
    }

    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. } | Self::RequestTimeout { .. }
        )
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors are retried on the next poll cycle.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::CaptureFailure { .. }
                | Self::ReferenceMissing
                | Self::Messaging { .. }
                | Self::ConnectionTimeout { .. }
                | Self::RequestTimeout { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    #[test]
    fn test_error_display() {
        let err = Error::messaging("port closed");
        assert_eq!(err.to_string(), "Messaging failed: port closed");
    }

    #[test]
    fn test_tab_unavailable_display() {
        let tab_id = TabId::new(9).expect("valid tab id");
        let err = Error::tab_unavailable(tab_id);
        assert_eq!(err.to_string(), "Tab not available: 9");
        assert!(err.is_tab_unavailable());
    }

    #[test]
    fn test_receiving_end_signature() {
        let missing = Error::messaging(
            "Could not establish connection. Receiving end does not exist.",
        );
        let invalidated = Error::messaging("Extension context invalidated.");
        let other = Error::messaging("The message port closed before a response was received.");

        assert!(missing.is_receiving_end_missing());
        assert!(invalidated.is_receiving_end_missing());
        assert!(Error::ContextInvalidated.is_receiving_end_missing());
        assert!(!other.is_receiving_end_missing());
        assert!(!Error::ReferenceMissing.is_receiving_end_missing());
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::messaging("x").is_recoverable());
        assert!(Error::ReferenceMissing.is_recoverable());
        assert!(!Error::ContextInvalidated.is_recoverable());
        assert!(!Error::config("bad").is_recoverable());
    }

    #[test]
    fn test_is_timeout() {
        let timeout_err = Error::connection_timeout(5000);
        assert!(timeout_err.is_timeout());
        assert!(!Error::ConnectionClosed.is_timeout());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
