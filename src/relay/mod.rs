//! Event Relay between the coordinator, page agents, and the control panel.
//!
//! The coordinator reaches the browser only through [`BrowserHost`]. The
//! [`EventRelay`] wraps a host and applies the delivery policies every
//! caller relies on:
//!
//! | Target | Failure handling |
//! |--------|------------------|
//! | Panel | Logged at debug and dropped; the panel may be closed |
//! | Page | Returned to the caller; a missing receiver is a transient failure |
//! | OS notification | Logged at warn and dropped |
//!
//! Before every cross-context call the relay checks
//! [`BrowserHost::context_valid`]. Once the host context is gone, panel and
//! notification sends become no-ops and page calls fail with
//! [`Error::ContextInvalidated`](crate::Error::ContextInvalidated).
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `host` | The [`BrowserHost`] seam |
//! | `event_relay` | Delivery policies |

// ============================================================================
// Submodules
// ============================================================================

mod event_relay;
mod host;

// ============================================================================
// Re-exports
// ============================================================================

pub use event_relay::EventRelay;
pub use host::BrowserHost;
