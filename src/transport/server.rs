//! WebSocket server the browser-side shim connects to.
//!
//! # Connection Flow
//!
//! 1. Bind to `127.0.0.1:0` (or a fixed port) with [`PendingServer::bind`]
//! 2. The extension shim is configured with [`PendingServer::ws_url`]
//! 3. The shim connects and sends READY with the active tab
//! 4. [`PendingServer::accept`] returns the live [`Connection`]

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::error::{Error, Result};

use super::Connection;
use super::connection::ReadyData;

// ============================================================================
// Constants
// ============================================================================

/// How long to wait for the shim to connect.
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// PendingServer
// ============================================================================

/// A bound server waiting for the shim.
///
/// # Example
///
/// ```ignore
/// let server = PendingServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).await?;
/// println!("configure the extension with {}", server.ws_url());
///
/// let (connection, ready) = server.accept().await?;
/// ```
#[derive(Debug)]
pub struct PendingServer {
    listener: TcpListener,
    addr: SocketAddr,
    connect_timeout: Duration,
}

impl PendingServer {
    /// Binds to `ip:port`. Port 0 picks a free port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if binding fails.
    pub async fn bind(ip: IpAddr, port: u16) -> Result<Self> {
        let listener = TcpListener::bind(SocketAddr::new(ip, port)).await?;
        let addr = listener.local_addr()?;

        debug!(%addr, "WebSocket server bound");

        Ok(Self {
            listener,
            addr,
            connect_timeout: CONNECTION_TIMEOUT,
        })
    }

    /// Sets how long [`accept`](Self::accept) waits for the shim.
    #[must_use]
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Bound port.
    #[inline]
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Bound socket address.
    #[inline]
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// URL the shim should connect to.
    #[inline]
    #[must_use]
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Accepts the shim's connection and completes the READY handshake.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionTimeout`] if nobody connects in time
    /// - [`Error::Connection`] if the WebSocket upgrade fails
    /// - [`Error::ConnectionTimeout`] if READY does not arrive
    pub async fn accept(self) -> Result<(Connection, ReadyData)> {
        let (stream, peer) = timeout(self.connect_timeout, self.listener.accept())
            .await
            .map_err(|_| Error::connection_timeout(self.connect_timeout.as_millis() as u64))??;

        debug!(%peer, "TCP connection accepted");

        let ws_stream = tokio_tungstenite::accept_async(stream)
            .await
            .map_err(|e| Error::connection(format!("WebSocket upgrade failed: {e}")))?;

        info!(port = self.port(), "Shim connected");

        let connection = Connection::new(ws_stream);
        let ready = connection.wait_ready().await?;

        Ok((connection, ready))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::Ipv4Addr;

    #[tokio::test]
    async fn test_server_bind_random_port() {
        let server = PendingServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
            .await
            .expect("bind should succeed");

        assert!(server.port() > 0);
        assert_eq!(server.ws_url(), format!("ws://127.0.0.1:{}", server.port()));
        assert_eq!(server.local_addr().ip(), IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[tokio::test]
    async fn test_accept_times_out_without_shim() {
        let server = PendingServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
            .await
            .expect("bind should succeed")
            .with_connect_timeout(Duration::from_millis(50));

        let err = server.accept().await.expect_err("nobody connects");
        assert!(matches!(err, Error::ConnectionTimeout { .. }));
    }
}
