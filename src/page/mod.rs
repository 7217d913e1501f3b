//! Page agent: the per-page half of monitoring.
//!
//! One [`PageAgent`] runs inside each page. It owns region capture and
//! comparison, keeps its own copy of the similarity threshold, and talks to
//! the coordinator through a [`RuntimePort`].
//!
//! # Messages
//!
//! | Inbound | Reply | Outbound on failure or result |
//! |---------|-------|-------------------------------|
//! | `captureArea` | `{started}` | `screenshotError` |
//! | `compareArea` | `{completed, similarity}` | `changeDetected` |
//! | `checkScreenshot` | `{hasScreenshot}` | |
//! | `updateThreshold` | | |
//! | `playNotificationSound` | | |
//! | `startSelection` | | `selectionComplete` |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `environment` | [`PageEnvironment`], [`RuntimePort`], [`EventPort`] |
//! | `agent` | [`PageAgent`] |

// ============================================================================
// Submodules
// ============================================================================

mod agent;
mod environment;

// ============================================================================
// Re-exports
// ============================================================================

pub use agent::{PageAgent, RESTRICTED_SITE_WARNING};
pub use environment::{EventPort, PageEnvironment, RuntimePort};
