//! WebSocket connection and event loop.
//!
//! The connection spawns one tokio task that owns the socket and handles:
//!
//! - Responses from the shim, correlated to requests by UUID
//! - Events from the shim, passed to the [`EventHandler`]
//! - Outgoing requests and event replies
//!
//! Event replies may be sent immediately by the handler or later through a
//! [`ReplySender`], which is how request-style extension messages are
//! answered once the coordinator has handled them.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::{from_str, to_string};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::{RequestId, TabId};
use crate::protocol::{Command, Event, EventReply, Request, Response};

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for command execution.
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum pending requests before rejecting new ones.
const MAX_PENDING_REQUESTS: usize = 100;

/// Timeout for the READY handshake.
const READY_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Types
// ============================================================================

/// Map of request IDs to response channels.
type CorrelationMap = FxHashMap<RequestId, oneshot::Sender<Result<Response>>>;

/// Event handler callback.
///
/// Called on the event loop for each event. Return `Some(EventReply)` to
/// answer immediately; use a [`ReplySender`] to answer later.
pub type EventHandler = Box<dyn Fn(Event) -> Option<EventReply> + Send + Sync>;

// ============================================================================
// ReadyData
// ============================================================================

/// Data received in the READY handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadyData {
    /// Active tab when the shim connected.
    pub active_tab: Option<TabId>,
}

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the event loop.
enum ConnectionCommand {
    /// Send a request and wait for its response.
    Send {
        request: Request,
        response_tx: oneshot::Sender<Result<Response>>,
    },
    /// Answer an event.
    Reply(EventReply),
    /// Remove a timed-out correlation entry.
    RemoveCorrelation(RequestId),
    /// Shut down the connection.
    Shutdown,
}

// ============================================================================
// ReplySender
// ============================================================================

/// Sends deferred [`EventReply`]s over a [`Connection`].
#[derive(Clone)]
pub struct ReplySender {
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
}

impl ReplySender {
    /// Queues a reply.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the event loop has stopped.
    pub fn send(&self, reply: EventReply) -> Result<()> {
        self.command_tx
            .send(ConnectionCommand::Reply(reply))
            .map_err(|_| Error::ConnectionClosed)
    }
}

// ============================================================================
// Connection
// ============================================================================

/// WebSocket connection to the browser-side shim.
///
/// Cheap to clone; all clones share one event loop. The loop runs until
/// [`shutdown`](Self::shutdown) is called or the socket closes.
#[derive(Clone)]
pub struct Connection {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    /// Correlation map (shared with event loop).
    correlation: Arc<Mutex<CorrelationMap>>,
    /// Event handler (shared with event loop).
    event_handler: Arc<Mutex<Option<EventHandler>>>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("pending", &self.pending_count())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Creates a connection from a WebSocket stream and spawns its event
    /// loop.
    pub(crate) fn new(ws_stream: WebSocketStream<TcpStream>) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let correlation = Arc::new(Mutex::new(CorrelationMap::default()));
        let event_handler: Arc<Mutex<Option<EventHandler>>> = Arc::new(Mutex::new(None));

        tokio::spawn(Self::run_event_loop(
            ws_stream,
            command_rx,
            Arc::clone(&correlation),
            Arc::clone(&event_handler),
        ));

        Self {
            command_tx,
            correlation,
            event_handler,
        }
    }

    /// Waits for the READY handshake.
    ///
    /// The shim sends READY with the nil UUID right after connecting.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionTimeout`] if READY is not received in time
    /// - [`Error::ChannelClosed`] if the connection closes before READY
    pub async fn wait_ready(&self) -> Result<ReadyData> {
        let (tx, rx) = oneshot::channel();
        self.correlation.lock().insert(RequestId::ready(), tx);

        let response = timeout(READY_TIMEOUT, rx)
            .await
            .map_err(|_| Error::connection_timeout(READY_TIMEOUT.as_millis() as u64))???;

        let active_tab = TabId::from_u64(response.get_u64("activeTabId"));
        debug!(active_tab = ?active_tab, "READY handshake completed");

        Ok(ReadyData { active_tab })
    }

    /// Sets the event handler.
    pub fn set_event_handler(&self, handler: EventHandler) {
        *self.event_handler.lock() = Some(handler);
    }

    /// Clears the event handler.
    pub fn clear_event_handler(&self) {
        *self.event_handler.lock() = None;
    }

    /// Returns a handle for answering events later.
    #[must_use]
    pub fn reply_sender(&self) -> ReplySender {
        ReplySender {
            command_tx: self.command_tx.clone(),
        }
    }

    /// Sends a command with the default timeout.
    ///
    /// # Errors
    ///
    /// See [`send_with_timeout`](Self::send_with_timeout).
    pub async fn execute(&self, command: Command) -> Result<Response> {
        self.send(Request::new(command)).await
    }

    /// Sends a request and waits for the response with the default timeout.
    ///
    /// # Errors
    ///
    /// See [`send_with_timeout`](Self::send_with_timeout).
    pub async fn send(&self, request: Request) -> Result<Response> {
        self.send_with_timeout(request, DEFAULT_COMMAND_TIMEOUT)
            .await
    }

    /// Sends a request and waits for the response.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the connection is closed
    /// - [`Error::RequestTimeout`] if no response arrives within `request_timeout`
    /// - [`Error::Protocol`] if too many requests are pending
    pub async fn send_with_timeout(
        &self,
        request: Request,
        request_timeout: Duration,
    ) -> Result<Response> {
        let request_id = request.id;

        {
            let pending = self.correlation.lock().len();
            if pending >= MAX_PENDING_REQUESTS {
                warn!(pending, max = MAX_PENDING_REQUESTS, "Too many pending requests");
                return Err(Error::protocol(format!(
                    "Too many pending requests: {pending}/{MAX_PENDING_REQUESTS}"
                )));
            }
        }

        let (response_tx, response_rx) = oneshot::channel();

        self.command_tx
            .send(ConnectionCommand::Send {
                request,
                response_tx,
            })
            .map_err(|_| Error::ConnectionClosed)?;

        match timeout(request_timeout, response_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                let _ = self
                    .command_tx
                    .send(ConnectionCommand::RemoveCorrelation(request_id));

                Err(Error::request_timeout(
                    request_id,
                    request_timeout.as_millis() as u64,
                ))
            }
        }
    }

    /// Returns the number of pending requests.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.correlation.lock().len()
    }

    /// Returns `true` once the event loop has stopped.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }

    /// Closes the socket and stops the event loop.
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(ConnectionCommand::Shutdown);
    }
}

// ============================================================================
// Connection - Event Loop
// ============================================================================

type WsSink = futures_util::stream::SplitSink<WebSocketStream<TcpStream>, WsMessage>;

impl Connection {
    async fn run_event_loop(
        ws_stream: WebSocketStream<TcpStream>,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        correlation: Arc<Mutex<CorrelationMap>>,
        event_handler: Arc<Mutex<Option<EventHandler>>>,
    ) {
        let (mut ws_write, mut ws_read) = ws_stream.split();

        loop {
            tokio::select! {
                message = ws_read.next() => {
                    match message {
                        Some(Ok(WsMessage::Text(text))) => {
                            let reply = Self::handle_incoming_message(
                                &text,
                                &correlation,
                                &event_handler,
                            );

                            if let Some(reply) = reply {
                                Self::write_reply(&mut ws_write, &reply).await;
                            }
                        }

                        Some(Ok(WsMessage::Close(_))) => {
                            debug!("WebSocket closed by remote");
                            break;
                        }

                        Some(Err(e)) => {
                            error!(error = %e, "WebSocket error");
                            break;
                        }

                        None => {
                            debug!("WebSocket stream ended");
                            break;
                        }

                        // Binary, Ping, Pong
                        _ => {}
                    }
                }

                command = command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Send { request, response_tx }) => {
                            Self::handle_send_command(
                                request,
                                response_tx,
                                &mut ws_write,
                                &correlation,
                            ).await;
                        }

                        Some(ConnectionCommand::Reply(reply)) => {
                            Self::write_reply(&mut ws_write, &reply).await;
                        }

                        Some(ConnectionCommand::RemoveCorrelation(request_id)) => {
                            correlation.lock().remove(&request_id);
                            debug!(?request_id, "Removed timed-out correlation");
                        }

                        Some(ConnectionCommand::Shutdown) => {
                            debug!("Shutdown command received");
                            let _ = ws_write.close().await;
                            break;
                        }

                        None => {
                            debug!("Command channel closed");
                            break;
                        }
                    }
                }
            }
        }

        Self::fail_pending_requests(&correlation);
        event_handler.lock().take();

        debug!("Event loop terminated");
    }

    /// Routes one text frame: responses to their waiter, events to the handler.
    fn handle_incoming_message(
        text: &str,
        correlation: &Arc<Mutex<CorrelationMap>>,
        event_handler: &Arc<Mutex<Option<EventHandler>>>,
    ) -> Option<EventReply> {
        if let Ok(response) = from_str::<Response>(text) {
            let tx = correlation.lock().remove(&response.id);

            match tx {
                Some(tx) => {
                    let _ = tx.send(Ok(response));
                }
                None => warn!(id = %response.id, "Response for unknown request"),
            }

            return None;
        }

        if let Ok(event) = from_str::<Event>(text) {
            trace!(method = %event.method, "Event received");
            let handler = event_handler.lock();
            return handler.as_ref().and_then(|handler| handler(event));
        }

        warn!(text = %text, "Failed to parse incoming message");
        None
    }

    async fn handle_send_command(
        request: Request,
        response_tx: oneshot::Sender<Result<Response>>,
        ws_write: &mut WsSink,
        correlation: &Arc<Mutex<CorrelationMap>>,
    ) {
        let request_id = request.id;

        let json = match to_string(&request) {
            Ok(json) => json,
            Err(e) => {
                let _ = response_tx.send(Err(Error::Json(e)));
                return;
            }
        };

        correlation.lock().insert(request_id, response_tx);

        if let Err(e) = ws_write.send(WsMessage::Text(json.into())).await {
            if let Some(tx) = correlation.lock().remove(&request_id) {
                let _ = tx.send(Err(Error::connection(e.to_string())));
            }
            return;
        }

        trace!(?request_id, method = request.command.method(), "Request sent");
    }

    async fn write_reply(ws_write: &mut WsSink, reply: &EventReply) {
        let json = match to_string(reply) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Failed to serialize event reply");
                return;
            }
        };

        if let Err(e) = ws_write.send(WsMessage::Text(json.into())).await {
            warn!(error = %e, "Failed to send event reply");
        }
    }

    /// Fails all pending requests with [`Error::ConnectionClosed`].
    fn fail_pending_requests(correlation: &Arc<Mutex<CorrelationMap>>) {
        let pending: Vec<_> = correlation.lock().drain().collect();
        let count = pending.len();

        for (_, tx) in pending {
            let _ = tx.send(Err(Error::ConnectionClosed));
        }

        if count > 0 {
            debug!(count, "Failed pending requests on shutdown");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
