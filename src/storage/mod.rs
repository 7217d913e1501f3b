//! Persistent key-value state shared by the coordinator and pages.
//!
//! The browser exposes a process-wide, asynchronous key-value store. This
//! module abstracts it behind [`Storage`] and layers typed accessors on top
//! in [`StateStore`].
//!
//! # Keys
//!
//! | Key | Type | Written by |
//! |-----|------|------------|
//! | `isMonitoring` | bool | panel, coordinator |
//! | `tabId` | int | panel |
//! | `tabUrl` | string | panel |
//! | `delayAfterLoad` | seconds | panel |
//! | `similarityThreshold` | percent | panel |
//! | `refreshCount` | int | coordinator |
//! | `selectedArea` | region | page |
//! | `originalScreenshot` | data URL | page |
//!
//! `originalScreenshot` is a single slot for the whole extension: two
//! sessions running at once overwrite each other's reference (last writer
//! wins).

// ============================================================================
// Submodules
// ============================================================================

mod memory;
mod state;

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::Result;

// ============================================================================
// Re-exports
// ============================================================================

pub use memory::MemoryStorage;
pub use state::StateStore;

// ============================================================================
// Keys
// ============================================================================

/// Storage key names.
pub mod keys {
    /// Whether monitoring is active for the panel's tab.
    pub const IS_MONITORING: &str = "isMonitoring";
    /// Tab chosen in the panel.
    pub const TAB_ID: &str = "tabId";
    /// URL of the chosen tab.
    pub const TAB_URL: &str = "tabUrl";
    /// Wait after load, in seconds.
    pub const DELAY_AFTER_LOAD: &str = "delayAfterLoad";
    /// Similarity threshold, in percent.
    pub const SIMILARITY_THRESHOLD: &str = "similarityThreshold";
    /// Poll counter of the active tab's session.
    pub const REFRESH_COUNT: &str = "refreshCount";
    /// Selected region.
    pub const SELECTED_AREA: &str = "selectedArea";
    /// Reference image data URL.
    pub const ORIGINAL_SCREENSHOT: &str = "originalScreenshot";
}

// ============================================================================
// Storage
// ============================================================================

/// Asynchronous JSON key-value store.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Reads a value.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Writes several values at once.
    async fn set(&self, items: Map<String, Value>) -> Result<()>;

    /// Deletes a key. Missing keys are ignored.
    async fn remove(&self, key: &str) -> Result<()>;
}
