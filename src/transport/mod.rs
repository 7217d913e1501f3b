//! WebSocket link to the browser-side shim.
//!
//! The coordinator runs as a native process. A thin extension shim connects
//! to it over WebSocket, executes browser API calls on its behalf, and
//! forwards extension messages back as events.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐                              ┌─────────────────┐
//! │  Coordinator     │                              │  Extension      │
//! │                  │         WebSocket            │  shim           │
//! │  PendingServer   │◄────────────────────────────►│  (background)   │
//! │  → Connection    │      127.0.0.1:PORT          │                 │
//! │  → WsBrowserHost │                              │                 │
//! └──────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. [`PendingServer::bind`] picks a port
//! 2. The shim connects to [`PendingServer::ws_url`] and sends READY
//! 3. [`WsBrowserHost::attach`] routes shim events into the coordinator
//! 4. [`HostStorage`] backs the coordinator's state with extension storage
//! 5. [`WsBrowserHost::close`] tears the link down
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | WebSocket event loop and request correlation |
//! | `server` | Binding and accepting the shim |
//! | `host` | [`WsBrowserHost`] and [`HostStorage`] |

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket connection and event loop.
pub mod connection;

/// WebSocket server the shim connects to.
pub mod server;

mod host;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Connection, EventHandler, ReadyData, ReplySender};
pub use host::{HostStorage, WsBrowserHost};
pub use server::PendingServer;
