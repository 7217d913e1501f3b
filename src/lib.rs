//! Page Change Monitor - visual change detection for a region of a web page.
//!
//! The user selects a rectangle on a page. The monitor stores a reference
//! image of it, then repeatedly reloads the page, captures the same
//! rectangle, and compares it with the reference. When the similarity drops
//! below a threshold, monitoring stops and the user is alerted.
//!
//! # Architecture
//!
//! Three cooperating parties exchange [`Message`]s:
//!
//! - **Coordinator (Rust)**: one [`Coordinator`] owning a session per tab
//! - **Page agents**: one [`PageAgent`] per monitored page, doing capture and comparison
//! - **Control panel**: sends start/stop requests, receives status updates
//!
//! The coordinator reaches the browser through the [`BrowserHost`] seam,
//! implemented over WebSocket by [`WsBrowserHost`] and by in-process fakes.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::net::{IpAddr, Ipv4Addr};
//! use std::sync::Arc;
//!
//! use page_change_monitor::{
//!     Coordinator, EventRelay, HostStorage, MonitorTimings, PendingServer, Result, StateStore,
//!     WsBrowserHost,
//! };
//! use tokio::sync::mpsc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let server = PendingServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).await?;
//!     println!("shim url: {}", server.ws_url());
//!
//!     let (connection, _ready) = server.accept().await?;
//!     let (events_tx, events_rx) = mpsc::unbounded_channel();
//!
//!     let host = WsBrowserHost::attach(connection.clone(), events_tx);
//!     let state = StateStore::new(Arc::new(HostStorage::new(connection)));
//!     let coordinator = Coordinator::new(
//!         EventRelay::new(Arc::new(host)),
//!         state,
//!         MonitorTimings::default(),
//!     );
//!
//!     coordinator.serve(events_rx, CancellationToken::new()).await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`capture`] | Selected region, rasterizer seam, [`ImageCapturer`] |
//! | [`compare`] | Pixel similarity |
//! | [`config`] | [`MonitorConfig`], [`MonitorTimings`] |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | [`TabId`], [`RequestId`] |
//! | [`monitor`] | Sessions, registry, [`Coordinator`] |
//! | [`page`] | [`PageAgent`] |
//! | [`protocol`] | Extension messages and shim wire types |
//! | [`relay`] | [`BrowserHost`] and [`EventRelay`] |
//! | [`storage`] | Persistent state |
//! | [`transport`] | WebSocket link to the shim |

// ============================================================================
// Modules
// ============================================================================

/// Region capture.
pub mod capture;

/// Similarity Comparator.
pub mod compare;

/// Monitoring settings and timing constants.
pub mod config;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Sessions and the coordinator.
pub mod monitor;

/// Page-side agent.
pub mod page;

/// Extension messages and shim protocol types.
pub mod protocol;

/// Delivery policies over the browser.
pub mod relay;

/// Persistent key-value state.
pub mod storage;

/// WebSocket transport.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Capture types
pub use capture::{
    CapturedImage, ImageCapturer, Rasterizer, ScrollOffset, SelectedRegion, SelectionGesture,
};

// Configuration
pub use config::{MonitorConfig, MonitorTimings};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{RequestId, TabId};

// Monitoring
pub use monitor::{Coordinator, CoordinatorEvent, MonitorState, SessionRegistry};

// Page agent
pub use page::{PageAgent, PageEnvironment, RuntimePort};

// Messages
pub use protocol::{Message, MessageSender, Notification};

// Relay
pub use relay::{BrowserHost, EventRelay};

// Storage
pub use storage::{MemoryStorage, StateStore, Storage};

// Transport
pub use transport::{Connection, HostStorage, PendingServer, WsBrowserHost};
