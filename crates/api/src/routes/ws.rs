//! WebSocket endpoint for live order events.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use common::UserId;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use hub::{Connection, EventHub, HubError, Transport};
use store::Store;
use tokio::sync::Mutex;

use crate::caller::Caller;
use crate::routes::orders::AppState;

/// Write half of an upgraded WebSocket.
pub struct WsTransport {
    sink: Mutex<SplitSink<WebSocket, Message>>,
}

impl WsTransport {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self {
            sink: Mutex::new(sink),
        }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&self, frame: &str) -> Result<(), HubError> {
        self.sink
            .lock()
            .await
            .send(Message::Text(frame.into()))
            .await
            .map_err(|e| HubError::Transport(e.to_string()))
    }

    async fn close(&self) {
        // The peer may already be gone.
        let _ = self.sink.lock().await.close().await;
    }
}

/// GET /ws: upgrade and register the connection for the caller.
pub async fn upgrade<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    ws: WebSocketUpgrade,
) -> Response {
    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, caller.0, hub))
}

async fn handle_socket(socket: WebSocket, user_id: UserId, hub: EventHub) {
    let (sink, mut stream) = socket.split();
    let connection = Connection::new(WsTransport::new(sink));
    let connection_id = connection.id();

    hub.register(connection.clone(), user_id).await;
    metrics::counter!("ws_sessions_total").increment(1);
    tracing::info!(user_id = %user_id, connection_id = %connection_id, "WebSocket connected");

    // Inbound messages are ignored; the read half only tells us when the
    // client goes away.
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(connection_id = %connection_id, error = %e, "WebSocket read error");
                break;
            }
        }
    }

    hub.unregister(connection_id).await;
    connection.close().await;
    tracing::info!(user_id = %user_id, connection_id = %connection_id, "WebSocket disconnected");
}
