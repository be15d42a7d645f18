//! WebSocket client helpers

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use uiver::socket_server::Hub;
use uiver::EngineState;

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long a test waits for an expected message
pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Bind a hub for `state` and serve it in the background
pub async fn start_hub(state: Arc<EngineState>) -> SocketAddr {
    let hub = Hub::bind(state).await.expect("Failed to bind hub");
    let addr = hub.local_addr();
    tokio::spawn(hub.run());
    addr
}

/// Connect and consume the initial `components` snapshot
pub async fn connect(addr: SocketAddr) -> (Client, Value) {
    let (mut ws, _) = connect_async(format!("ws://{}", addr))
        .await
        .expect("Failed to connect");
    let snapshot = next_json(&mut ws).await;
    assert_eq!(snapshot["type"], "components", "first message: {}", snapshot);
    (ws, snapshot)
}

pub async fn send_json(ws: &mut Client, value: Value) {
    ws.send(Message::Text(value.to_string()))
        .await
        .expect("Failed to send");
}

/// Next text frame as JSON; panics after `RECV_TIMEOUT`
pub async fn next_json(ws: &mut Client) -> Value {
    try_next_json(ws, RECV_TIMEOUT)
        .await
        .expect("Timed out waiting for a message")
}

/// Next text frame as JSON, or `None` if nothing arrives within `wait`
pub async fn try_next_json(ws: &mut Client, wait: Duration) -> Option<Value> {
    let deadline = tokio::time::Instant::now() + wait;
    loop {
        let msg = tokio::time::timeout_at(deadline, ws.next()).await.ok()??;
        match msg.expect("WebSocket error") {
            Message::Text(text) => {
                return Some(serde_json::from_str(&text).expect("Server sent invalid JSON"))
            }
            Message::Close(_) => return None,
            _ => continue,
        }
    }
}

/// Read messages until one of type `ty` arrives; returns it and the ones skipped
pub async fn next_of_type(ws: &mut Client, ty: &str) -> (Value, Vec<Value>) {
    let mut skipped = Vec::new();
    loop {
        let msg = next_json(ws).await;
        if msg["type"] == ty {
            return (msg, skipped);
        }
        skipped.push(msg);
    }
}

/// Versions listed for `name` in a `components` message
pub fn versions_of(components: &Value, name: &str) -> Option<Vec<String>> {
    components["payload"]["components"]
        .as_array()?
        .iter()
        .find(|c| c["name"] == name)
        .map(|c| {
            c["versions"]
                .as_array()
                .map(|vs| vs.iter().filter_map(|v| v.as_str().map(String::from)).collect())
                .unwrap_or_default()
        })
}
