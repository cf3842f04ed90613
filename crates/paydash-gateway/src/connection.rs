use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tracing::{info, trace, warn};

use crate::dispatcher::Dispatcher;

/// Heartbeat interval: server sends a Ping every 15 seconds so proxies and
/// half-dead clients surface as send errors instead of silent stalls.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Drive one dashboard WebSocket connection: register it with the
/// dispatcher, forward every ledger event as a JSON text frame, and drop
/// the registration the moment the socket goes away.
pub async fn handle_connection(socket: WebSocket, dispatcher: Dispatcher) {
    let (conn_id, mut events) = dispatcher.subscribe();
    info!("dashboard client {conn_id} connected");

    let (mut sender, mut receiver) = socket.split();
    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    // The first tick completes immediately; consume it.
    heartbeat.tick().await;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                let text = match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("failed to serialize {} event: {e}", event.name());
                        continue;
                    }
                };
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            _ = heartbeat.tick() => {
                if sender.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    // Dashboard clients only listen; Pongs and stray
                    // frames are ignored.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        trace!("client {conn_id} socket error: {e}");
                        break;
                    }
                }
            }
        }
    }

    dispatcher.unsubscribe(conn_id);
    info!("dashboard client {conn_id} disconnected");
}
