//! WebSocket transport.
//!
//! One axum route, `GET /ws`. Each accepted socket gets a fresh connection
//! id, a bounded outbound channel registered with the relay actor, and a
//! writer task that serializes server events onto the socket. The reader
//! half runs in the upgrade task itself: it decodes client events and feeds
//! them into the relay mailbox until the socket closes, then deregisters.
//!
//! Malformed frames are logged and skipped; they never tear down the
//! connection.

use crate::relay::{RelayHandle, OUTBOUND_CHANNEL_BUFFER};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use common::types::ConnectionId;
use futures::{SinkExt, StreamExt};
use signal_protocol::{ClientEvent, ServerEvent};
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, instrument, warn};

/// Router serving the WebSocket endpoint.
pub fn ws_router(relay: RelayHandle) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(relay)
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(relay): State<RelayHandle>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, relay))
}

/// Drive one WebSocket connection until it closes.
#[instrument(skip_all, fields(connection_id))]
async fn handle_socket(socket: WebSocket, relay: RelayHandle) {
    let connection_id = ConnectionId::random();
    tracing::Span::current().record("connection_id", connection_id.as_str());

    let (outbound_tx, outbound_rx) = mpsc::channel::<ServerEvent>(OUTBOUND_CHANNEL_BUFFER);
    if let Err(e) = relay.register(connection_id.clone(), outbound_tx).await {
        warn!(target: "relay.ws", error = %e, "Relay rejected connection, closing socket");
        return;
    }

    info!(target: "relay.ws", "Connection established");

    let (sink, stream) = socket.split();
    let writer = tokio::spawn(write_events(sink, outbound_rx));

    read_events(stream, &relay, &connection_id).await;

    if let Err(e) = relay.deregister(connection_id.clone()).await {
        // Relay already stopped; nothing left to clean up.
        debug!(target: "relay.ws", error = %e, "Deregister after relay shutdown");
    }
    writer.abort();

    info!(target: "relay.ws", "Connection closed");
}

/// Serialize server events onto the socket until the relay drops the channel.
async fn write_events(
    mut sink: futures::stream::SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::Receiver<ServerEvent>,
) {
    while let Some(event) = outbound_rx.recv().await {
        let text = match serde_json::to_string(&event) {
            Ok(text) => text,
            Err(e) => {
                warn!(target: "relay.ws", error = %e, "Failed to serialize server event");
                continue;
            }
        };
        if sink.send(Message::Text(text)).await.is_err() {
            // Peer hung up; the read half will notice and deregister.
            break;
        }
    }
}

/// Decode client events off the socket and feed them to the relay.
async fn read_events(
    mut stream: futures::stream::SplitStream<WebSocket>,
    relay: &RelayHandle,
    connection_id: &ConnectionId,
) {
    while let Some(message) = stream.next().await {
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                debug!(target: "relay.ws", error = %e, "Socket read error");
                break;
            }
        };

        match message {
            Message::Text(text) => {
                let event: ClientEvent = match serde_json::from_str(&text) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(target: "relay.ws", error = %e, "Dropping malformed client event");
                        continue;
                    }
                };
                if relay.event(connection_id.clone(), event).await.is_err() {
                    // Relay is shutting down.
                    break;
                }
            }
            Message::Close(_) => break,
            // Pings are answered by axum; binary frames are not part of the
            // protocol.
            Message::Binary(_) => {
                warn!(target: "relay.ws", "Dropping unexpected binary frame");
            }
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }
}
