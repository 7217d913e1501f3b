//! [`BrowserHost`] and [`Storage`] over a shim [`Connection`].

use std::fmt;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::identifiers::TabId;
use crate::monitor::CoordinatorEvent;
use crate::protocol::{
    Command, EventReply, Message, Notification, NotificationsCommand, ParsedEvent, RuntimeCommand,
    StorageCommand, TabInfo, TabsCommand,
};
use crate::relay::BrowserHost;
use crate::storage::Storage;

use super::Connection;

// ============================================================================
// WsBrowserHost
// ============================================================================

/// The browser, reached through the shim.
#[derive(Clone)]
pub struct WsBrowserHost {
    connection: Connection,
}

impl fmt::Debug for WsBrowserHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsBrowserHost")
            .field("closed", &self.connection.is_closed())
            .field("pending", &self.connection.pending_count())
            .finish()
    }
}

impl WsBrowserHost {
    /// Wraps a connection without routing its events anywhere.
    #[must_use]
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    /// Wraps a connection and forwards its events to a coordinator.
    ///
    /// `runtime.message` events become [`CoordinatorEvent::Message`]s whose
    /// reply is sent back as an [`EventReply`]; `runtime.startup` becomes
    /// [`CoordinatorEvent::Startup`].
    #[must_use]
    pub fn attach(connection: Connection, events: mpsc::UnboundedSender<CoordinatorEvent>) -> Self {
        let replies = connection.reply_sender();

        connection.set_event_handler(Box::new(move |event| match event.parse() {
            ParsedEvent::RuntimeMessage { message, sender } => {
                let (request, reply_rx) = CoordinatorEvent::request(message, sender);
                if events.send(request).is_err() {
                    warn!("Coordinator gone, dropping message");
                    return Some(EventReply::to_event(&event, None));
                }

                let replies = replies.clone();
                tokio::spawn(async move {
                    let result = reply_rx.await.ok().flatten();
                    if let Err(e) = replies.send(EventReply::to_event(&event, result)) {
                        debug!(error = %e, "Could not deliver message reply");
                    }
                });
                None
            }

            ParsedEvent::RuntimeStartup => {
                if events.send(CoordinatorEvent::Startup).is_err() {
                    warn!("Coordinator gone, dropping startup");
                }
                Some(EventReply::to_event(&event, None))
            }

            ParsedEvent::Unknown { method, .. } => {
                trace!(method = %method, "Unhandled event");
                Some(EventReply::to_event(&event, None))
            }
        }));

        Self { connection }
    }

    /// Returns the underlying connection.
    #[inline]
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Stops event routing and closes the connection.
    pub fn close(&self) {
        self.connection.clear_event_handler();
        self.connection.shutdown();
    }

    async fn tab_command(&self, tab_id: TabId, command: TabsCommand) -> Result<Value> {
        self.connection
            .execute(Command::Tabs(command))
            .await?
            .into_tab_result(tab_id)
    }
}

#[async_trait]
impl BrowserHost for WsBrowserHost {
    async fn get_tab(&self, tab_id: TabId) -> Result<TabInfo> {
        let value = self.tab_command(tab_id, TabsCommand::Get { tab_id }).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn active_tab(&self) -> Result<Option<TabInfo>> {
        let value = self
            .connection
            .execute(Command::Tabs(TabsCommand::QueryActive))
            .await?
            .into_result()?;
        Ok(serde_json::from_value(value)?)
    }

    async fn reload_tab(&self, tab_id: TabId) -> Result<()> {
        self.tab_command(tab_id, TabsCommand::Reload { tab_id })
            .await
            .map(drop)
    }

    async fn send_to_tab(&self, tab_id: TabId, message: Message) -> Result<Value> {
        self.tab_command(tab_id, TabsCommand::SendMessage { tab_id, message })
            .await
    }

    async fn send_to_panel(&self, message: Message) -> Result<()> {
        self.connection
            .execute(Command::Runtime(RuntimeCommand::SendMessage { message }))
            .await?
            .into_result()
            .map(drop)
    }

    async fn notify(&self, notification: Notification) -> Result<()> {
        self.connection
            .execute(Command::Notifications(NotificationsCommand::Create(
                notification,
            )))
            .await?
            .into_result()
            .map(drop)
    }

    fn context_valid(&self) -> bool {
        !self.connection.is_closed()
    }
}

// ============================================================================
// HostStorage
// ============================================================================

/// The extension's persistent storage, reached through the shim.
#[derive(Clone)]
pub struct HostStorage {
    connection: Connection,
}

impl fmt::Debug for HostStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostStorage").finish_non_exhaustive()
    }
}

impl HostStorage {
    /// Wraps a connection.
    #[must_use]
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    async fn run(&self, command: StorageCommand) -> Result<Value> {
        self.connection
            .execute(Command::Storage(command))
            .await?
            .into_result()
    }
}

#[async_trait]
impl Storage for HostStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let value = self
            .run(StorageCommand::Get {
                key: key.to_string(),
            })
            .await?;
        Ok((!value.is_null()).then_some(value))
    }

    async fn set(&self, items: Map<String, Value>) -> Result<()> {
        self.run(StorageCommand::Set { items }).await.map(drop)
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.run(StorageCommand::Remove {
            key: key.to_string(),
        })
        .await
        .map(drop)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::Arc;
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use serde_json::json;
    use tokio_tungstenite::connect_async;
    use tokio_tungstenite::tungstenite::Message as WsMessage;

    use crate::identifiers::RequestId;
    use crate::storage::StateStore;
    use crate::transport::{PendingServer, ReadyData};

    /// Scripted stand-in for the extension shim.
    struct Shim {
        outbound: mpsc::UnboundedSender<Value>,
        inbound: mpsc::UnboundedReceiver<Value>,
    }

    fn respond(request: &Value) -> Value {
        let id = request["id"].clone();
        let params = &request["params"];

        match request["method"].as_str().unwrap_or_default() {
            "tabs.get" if params["tabId"] == 3 => json!({
                "id": id,
                "type": "success",
                "result": {"id": 3, "url": "https://example.com/", "title": "Example"},
            }),
            "tabs.get" | "tabs.reload" => json!({
                "id": id,
                "type": "error",
                "error": "no such tab",
                "message": "No tab with that id",
            }),
            "tabs.sendMessage" => json!({
                "id": id,
                "type": "error",
                "error": "messaging",
                "message": "Could not establish connection. Receiving end does not exist.",
            }),
            "storage.get" if params["key"] == "tabId" => json!({
                "id": id,
                "type": "success",
                "result": 3,
            }),
            _ => json!({"id": id, "type": "success", "result": null}),
        }
    }

    async fn connect() -> (
        WsBrowserHost,
        Shim,
        mpsc::UnboundedReceiver<CoordinatorEvent>,
        ReadyData,
    ) {
        let server = PendingServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
            .await
            .expect("bind");
        let url = server.ws_url();

        let (outbound, mut to_send) = mpsc::unbounded_channel::<Value>();
        let (received, inbound) = mpsc::unbounded_channel::<Value>();

        tokio::spawn(async move {
            let (ws, _) = connect_async(url.as_str()).await.expect("connect");
            let (mut write, mut read) = ws.split();

            let ready = json!({
                "id": RequestId::ready(),
                "type": "success",
                "result": {"activeTabId": 3},
            });
            write
                .send(WsMessage::Text(ready.to_string().into()))
                .await
                .expect("send ready");

            loop {
                tokio::select! {
                    frame = read.next() => {
                        let Some(Ok(WsMessage::Text(text))) = frame else {
                            break;
                        };
                        let value: Value = serde_json::from_str(&text).expect("json frame");
                        if value.get("method").is_some() {
                            let reply = respond(&value);
                            write
                                .send(WsMessage::Text(reply.to_string().into()))
                                .await
                                .expect("send response");
                        }
                        let _ = received.send(value);
                    }

                    Some(value) = to_send.recv() => {
                        write
                            .send(WsMessage::Text(value.to_string().into()))
                            .await
                            .expect("send event");
                    }
                }
            }
        });

        let (connection, ready) = server.accept().await.expect("accept");
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let host = WsBrowserHost::attach(connection, events_tx);

        (host, Shim { outbound, inbound }, events_rx, ready)
    }

    fn tab(id: u32) -> TabId {
        TabId::new(id).expect("non-zero tab id")
    }

    #[tokio::test]
    async fn test_ready_and_tab_lookup() {
        let (host, _shim, _events, ready) = connect().await;
        assert_eq!(ready.active_tab, Some(tab(3)));

        let info = host.get_tab(tab(3)).await.expect("tab 3");
        assert_eq!(info.url, "https://example.com/");
        assert_eq!(info.title, "Example");

        let err = host.get_tab(tab(9)).await.expect_err("tab 9 gone");
        assert!(err.is_tab_unavailable());

        let err = host.reload_tab(tab(9)).await.expect_err("tab 9 gone");
        assert!(err.is_tab_unavailable());
    }

    #[tokio::test]
    async fn test_missing_page_agent_is_receiving_end_failure() {
        let (host, _shim, _events, _) = connect().await;

        let err = host
            .send_to_tab(tab(3), Message::CompareArea)
            .await
            .expect_err("no agent");
        assert!(err.is_receiving_end_missing());
    }

    #[tokio::test]
    async fn test_notification_command_shape() {
        let (host, mut shim, _events, _) = connect().await;

        host.notify(Notification::error("boom")).await.expect("notify");

        let sent = shim.inbound.recv().await.expect("request seen");
        assert_eq!(sent["method"], "notifications.create");
        assert_eq!(sent["params"]["title"], "Monitoring Error");
        assert_eq!(sent["params"]["message"], "boom");
    }

    #[tokio::test]
    async fn test_host_storage() {
        let (host, mut shim, _events, _) = connect().await;
        let state = StateStore::new(Arc::new(HostStorage::new(host.connection().clone())));

        assert_eq!(state.tab_id().await.expect("read"), Some(tab(3)));
        assert_eq!(state.refresh_count().await.expect("read"), 0);

        state.set_refresh_count(4).await.expect("write");

        let mut last = Value::Null;
        while last["method"] != "storage.set" {
            last = shim.inbound.recv().await.expect("request seen");
        }
        assert_eq!(last["params"]["items"], json!({"refreshCount": 4}));
    }

    #[tokio::test]
    async fn test_runtime_message_round_trip() {
        let (_host, mut shim, mut events, _) = connect().await;

        let id = RequestId::generate();
        shim.outbound
            .send(json!({
                "id": id,
                "type": "event",
                "method": "runtime.message",
                "params": {
                    "message": {"action": "checkScreenshot"},
                    "sender": {"tabId": 3},
                },
            }))
            .expect("shim running");

        let Some(CoordinatorEvent::Message {
            message,
            sender,
            reply: Some(reply),
        }) = events.recv().await
        else {
            panic!("expected a request-style message");
        };
        assert_eq!(message, Message::CheckScreenshot);
        assert_eq!(sender.tab_id, Some(tab(3)));

        reply
            .send(Some(json!({"hasScreenshot": true})))
            .expect("reply receiver alive");

        let mut answer = Value::Null;
        while answer["replyTo"] != "runtime.message" {
            answer = shim.inbound.recv().await.expect("reply seen");
        }
        assert_eq!(answer["id"], json!(id));
        assert_eq!(answer["result"], json!({"hasScreenshot": true}));
    }

    #[tokio::test]
    async fn test_startup_event_forwarded() {
        let (_host, shim, mut events, _) = connect().await;

        shim.outbound
            .send(json!({
                "id": RequestId::generate(),
                "type": "event",
                "method": "runtime.startup",
            }))
            .expect("shim running");

        assert!(matches!(events.recv().await, Some(CoordinatorEvent::Startup)));
    }

    #[tokio::test]
    async fn test_connection_debug_output() {
        let (host, _shim, _events, _) = connect().await;

        let rendered = format!("{:?}", host.connection());
        assert!(rendered.starts_with("Connection"));
        assert!(rendered.contains("closed: false"));
    }

    #[tokio::test]
    async fn test_close_invalidates_context() {
        let (host, _shim, _events, _) = connect().await;
        assert!(host.context_valid());

        host.close();

        for _ in 0..100 {
            if !host.context_valid() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!host.context_valid());

        let err = host.get_tab(tab(3)).await.expect_err("closed");
        assert!(matches!(err, crate::error::Error::ConnectionClosed));
    }
}
