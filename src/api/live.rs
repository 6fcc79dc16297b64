//! WebSocket endpoint for real-time dashboard updates

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;

use crate::api::AppState;

/// Handles WebSocket upgrade requests on `/ws`
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handles an established WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // First queued message is the analytics snapshot.
    let mut subscription = state.monitor.subscribe();
    let subscriber = subscription.id();
    tracing::info!(subscriber, "WebSocket connection established");

    let mut send_task = tokio::spawn(async move {
        while let Some(message) = subscription.recv().await {
            match serde_json::to_string(&message) {
                Ok(json) => {
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(kind = message.kind(), "Failed to serialize live message: {}", e);
                }
            }
        }
        if subscription.dropped() > 0 {
            tracing::debug!(
                subscriber,
                dropped = subscription.dropped(),
                "Subscriber fell behind during session"
            );
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Close(_) => break,
                Message::Text(text) => {
                    tracing::debug!(subscriber, message = %text, "Received WebSocket message");
                }
                _ => {}
            }
        }
    });

    // Whichever side finishes first tears down the other; dropping the
    // subscription unregisters it.
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    tracing::info!(subscriber, "WebSocket connection closed");
}
