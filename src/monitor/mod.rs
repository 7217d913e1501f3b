//! Change-detection monitoring.
//!
//! The [`Coordinator`] owns one [`MonitorSession`] per monitored tab inside
//! a process-wide [`SessionRegistry`]. Each running session is driven by a
//! single task that reloads the page, asks the page agent to compare the
//! selected region with the reference image, and reschedules itself.
//!
//! # States
//!
//! | State | Meaning |
//! |-------|---------|
//! | `Idle` | Created, not started |
//! | `AwaitingReference` | Capturing and verifying the reference image |
//! | `Polling` | Reload / compare loop |
//! | `Stopped` | Halted by the user, a lost tab, or a detected change |
//!
//! # Failure Policy
//!
//! Nothing inside the loop propagates. A lost tab stops the session; reload
//! and messaging failures back off and retry without limit; a missing
//! reference is captured again. User-visible failures go to both the panel
//! and an OS notification.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `session` | [`MonitorState`], [`MonitorSession`], [`PendingTimer`] |
//! | `registry` | [`SessionRegistry`] |
//! | `coordinator` | [`Coordinator`] lifecycle and message dispatch |
//! | `driver` | Per-session task |

// ============================================================================
// Submodules
// ============================================================================

mod coordinator;
mod driver;
mod notices;
mod registry;
mod session;


// ============================================================================
// Re-exports
// ============================================================================

pub use coordinator::{Coordinator, CoordinatorEvent};
pub use registry::SessionRegistry;
pub use session::{MonitorSession, MonitorState, PendingTimer, SessionSnapshot};
