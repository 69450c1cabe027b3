// WebSocket handler for battle royale announcement streaming.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use serde_json::json;

use super::AppState;
use crate::metrics;

/// WebSocket upgrade handler for battle royale announcements.
pub async fn ws_battleroyale(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn handle_ws(mut socket: WebSocket, state: AppState) {
    metrics::CONNECTED_WEBSOCKETS.inc();
    let mut rx = state.arena.subscribe();

    // Send the current lobby so late joiners know what is going on.
    let status = json!({ "type": "status", "lobby": state.arena.status().await });
    if socket
        .send(Message::Text(status.to_string().into()))
        .await
        .is_err()
    {
        metrics::CONNECTED_WEBSOCKETS.dec();
        return;
    }

    // Forward all broadcast messages to the WebSocket client.
    // When the client disconnects or the broadcast channel closes, we stop.
    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(msg) => {
                        if socket.send(Message::Text(msg.into())).await.is_err() {
                            break;
                        }
                        metrics::WEBSOCKET_MESSAGES_SENT_TOTAL.inc();
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        break;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("WebSocket client lagged, skipped {n} messages");
                    }
                }
            }
            // Client messages are ignored; only a close ends the stream
            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    metrics::CONNECTED_WEBSOCKETS.dec();
}
