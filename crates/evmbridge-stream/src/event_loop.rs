//! The per-namespace websocket event loop.
//!
//! One loop per namespace-scoped connection, strictly sequential:
//! receive → classify → dispatch → reply, with at most one
//! unacknowledged frame outstanding. The gateway will not advance
//! delivery past an un-acked frame, so this loop's discipline is what
//! preserves on-chain event order end to end.

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use evmbridge_core::callbacks::CallbackRegistry;
use evmbridge_core::error::ConnectorError;
use std::sync::Arc;

use crate::dispatch::BatchDispatcher;
use crate::frame::{classify_frame, InboundFrame};
use crate::receipts::parse_receipt;

/// The narrow seam between the loop and its transport, so the loop's
/// protocol behavior is testable over in-memory channels.
#[async_trait]
pub trait WsChannel: Send {
    /// Next inbound payload; `None` on connection loss or close.
    async fn receive(&mut self) -> Option<Vec<u8>>;
    async fn send_text(&mut self, text: String) -> Result<(), ConnectorError>;
    async fn close(&mut self);
}

/// Real websocket connection over tokio-tungstenite.
pub struct WsConnection {
    sink: SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>,
    stream: SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>,
}

impl WsConnection {
    pub async fn connect(url: &str) -> Result<Self, ConnectorError> {
        let (ws, _) = connect_async(url)
            .await
            .map_err(|e| ConnectorError::WebSocket {
                reason: format!("connect {url}: {e}"),
            })?;
        info!(url, "websocket connected");
        let (sink, stream) = ws.split();
        Ok(Self { sink, stream })
    }
}

#[async_trait]
impl WsChannel for WsConnection {
    async fn receive(&mut self) -> Option<Vec<u8>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(text.into_bytes()),
                Ok(Message::Binary(data)) => return Some(data),
                Ok(Message::Ping(data)) => {
                    let _ = self.sink.send(Message::Pong(data)).await;
                }
                Ok(Message::Close(_)) => return None,
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "websocket receive error");
                    return None;
                }
            }
        }
    }

    async fn send_text(&mut self, text: String) -> Result<(), ConnectorError> {
        self.sink
            .send(Message::Text(text))
            .await
            .map_err(|e| ConnectorError::WebSocket {
                reason: format!("send: {e}"),
            })
    }

    async fn close(&mut self) {
        let _ = self.sink.send(Message::Close(None)).await;
    }
}

/// One namespace's event loop.
pub struct EventLoop<C: WsChannel> {
    namespace: String,
    /// The `topic/namespace` stream name echoed in every reply.
    topic: String,
    conn: C,
    dispatcher: Arc<BatchDispatcher>,
    callbacks: Arc<CallbackRegistry>,
    cancel: CancellationToken,
}

impl<C: WsChannel> EventLoop<C> {
    pub fn new(
        namespace: impl Into<String>,
        topic: impl Into<String>,
        conn: C,
        dispatcher: Arc<BatchDispatcher>,
        callbacks: Arc<CallbackRegistry>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            topic: topic.into(),
            conn,
            dispatcher,
            callbacks,
            cancel,
        }
    }

    /// Run until cancellation or connection loss. Signals `closed`
    /// after the socket is shut so shutdown can wait for loop
    /// termination.
    pub async fn run(mut self, closed: oneshot::Sender<()>) {
        info!(namespace = %self.namespace, "event loop started");

        // Opt in to delivery and to per-batch replies. Every batch
        // delivered after this pair gets exactly one reply.
        let listen = json!({"type": "listen", "topic": self.topic}).to_string();
        let listen_replies = json!({"type": "listenreplies"}).to_string();
        if self.conn.send_text(listen).await.is_err()
            || self.conn.send_text(listen_replies).await.is_err()
        {
            warn!(namespace = %self.namespace, "failed to start listening");
            self.shutdown(closed).await;
            return;
        }

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!(namespace = %self.namespace, "event loop cancelled");
                    break;
                }
                payload = self.conn.receive() => {
                    match payload {
                        None => {
                            debug!(namespace = %self.namespace, "connection closed");
                            break;
                        }
                        Some(data) => {
                            if !self.handle_payload(&data).await {
                                break;
                            }
                        }
                    }
                }
            }
        }

        self.shutdown(closed).await;
    }

    async fn shutdown(mut self, closed: oneshot::Sender<()>) {
        self.conn.close().await;
        info!(namespace = %self.namespace, "event loop stopped");
        let _ = closed.send(());
    }

    /// Process one payload. Returns `false` when the loop must exit
    /// (reply channel lost).
    async fn handle_payload(&mut self, data: &[u8]) -> bool {
        match classify_frame(data) {
            InboundFrame::Unrecognized => {
                debug!(namespace = %self.namespace, "discarding unrecognized frame");
                true
            }
            InboundFrame::Receipt(receipt) => {
                match parse_receipt(&receipt) {
                    Some(update) => self.callbacks.dispatch_operation_update(update),
                    None => debug!(namespace = %self.namespace, "unroutable receipt, swallowing"),
                }
                true
            }
            InboundFrame::EventBatch {
                batch_number,
                events,
            } => {
                let reply = match self.dispatcher.dispatch_events(events).await {
                    Ok(()) => {
                        let mut ack = json!({"type": "ack", "topic": self.topic});
                        if let Some(n) = batch_number {
                            ack["batchNumber"] = json!(n);
                        }
                        ack
                    }
                    Err(e) => {
                        warn!(namespace = %self.namespace, error = %e, "dispatch failed, rejecting batch");
                        let mut nack = json!({
                            "type": "error",
                            "topic": self.topic,
                            "message": e.to_string(),
                        });
                        if let Some(n) = batch_number {
                            nack["batchNumber"] = json!(n);
                        }
                        nack
                    }
                };
                if self.conn.send_text(reply.to_string()).await.is_err() {
                    warn!(namespace = %self.namespace, "reply send failed, treating as connection loss");
                    return false;
                }
                true
            }
        }
    }
}
