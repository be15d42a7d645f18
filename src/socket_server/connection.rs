//! WebSocket connection handler
//!
//! One task per client. Inbound commands are queued on their component in
//! the order they are read, then awaited on their own tasks that reply
//! through a per-connection outbox. A slow command never stalls the read
//! loop, and a client that disconnects mid-command never cancels it.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::{accept_async, tungstenite::Message, WebSocketStream};

use crate::processor::{Command, CommandProcessor};
use crate::socket_server::protocol::{ClientMessage, ServerMessage};

/// Handle a single WebSocket connection
pub async fn handle_connection(stream: TcpStream, processor: CommandProcessor) {
    let addr = stream.peer_addr().ok();

    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            tracing::error!("[HUB] WebSocket handshake failed: {}", e);
            return;
        }
    };

    let mut conn = ConnectionState::new(ws_stream, processor);
    tracing::info!("[HUB] Client {} connected from {:?}", conn.client_id, addr);
    if let Err(e) = conn.run().await {
        tracing::debug!("[HUB] Client {} ended with: {}", conn.client_id, e);
    }
    tracing::info!("[HUB] Client {} disconnected", conn.client_id);
}

/// State for a single connection
struct ConnectionState {
    ws: WebSocketStream<TcpStream>,
    processor: CommandProcessor,
    client_id: String,
    events: broadcast::Receiver<String>,
    outbox_tx: mpsc::UnboundedSender<ServerMessage>,
    outbox_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl ConnectionState {
    fn new(ws: WebSocketStream<TcpStream>, processor: CommandProcessor) -> Self {
        let uuid = uuid::Uuid::new_v4().simple().to_string();
        let client_id = format!("cli_{}", &uuid[..8]);
        let events = processor.state().subscribe();
        let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();
        Self {
            ws,
            processor,
            client_id,
            events,
            outbox_tx,
            outbox_rx,
        }
    }

    async fn run(&mut self) -> anyhow::Result<()> {
        let snapshot = self.processor.state().components_message();
        self.send(&snapshot).await?;

        loop {
            // Broadcasts drain before replies: a command's `components`
            // snapshot is queued before its ack, and clients see that order
            tokio::select! {
                biased;

                msg = self.ws.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => self.handle_message(&text),
                        Some(Ok(Message::Close(_))) => {
                            tracing::debug!("[HUB] Client {} requested close", self.client_id);
                            break;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            self.ws.send(Message::Pong(data)).await?;
                        }
                        Some(Err(e)) => {
                            tracing::warn!("[HUB] WebSocket error from {}: {}", self.client_id, e);
                            break;
                        }
                        None => break,
                        _ => {}
                    }
                }

                event = self.events.recv() => {
                    match event {
                        Ok(json) => self.ws.send(Message::Text(json)).await?,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(
                                "[HUB] Client {} lagged, skipped {} broadcasts",
                                self.client_id,
                                skipped
                            );
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }

                Some(reply) = self.outbox_rx.recv() => {
                    self.send(&reply).await?;
                }
            }
        }

        Ok(())
    }

    /// Parse one inbound message and dispatch it; malformed input is dropped
    fn handle_message(&self, text: &str) {
        let msg: ClientMessage = match serde_json::from_str(text) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!("[HUB] Dropping malformed message from {}: {}", self.client_id, e);
                return;
            }
        };

        let command = Command::from(msg);
        tracing::debug!("[HUB] {} -> {:?}", self.client_id, command);

        let target = command.target();
        let pending = self.processor.submit(command);
        let outbox = self.outbox_tx.clone();
        tokio::spawn(async move {
            let reply = match pending.await {
                Ok(Ok(ack)) => ServerMessage::Ack(ack),
                Ok(Err(e)) => ServerMessage::error(&e),
                Err(_) => {
                    tracing::error!("[HUB] Command on {} dropped without a reply", target);
                    return;
                }
            };
            // The requester may have gone away; the command still completed
            let _ = outbox.send(reply);
        });
    }

    async fn send(&mut self, msg: &ServerMessage) -> anyhow::Result<()> {
        let json = serde_json::to_string(msg)?;
        self.ws.send(Message::Text(json)).await?;
        Ok(())
    }
}
