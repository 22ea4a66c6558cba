//! WebSocket connection handler

use std::sync::Arc;
use axum::{
    extract::{ws::{Message, WebSocket, WebSocketUpgrade}, State},
    response::Response,
};
use serde_json::json;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::state::HubState;
use crate::types::{ClientMessage, RealtimeMessage};

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<HubState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn send_json(socket: &mut WebSocket, message: &RealtimeMessage) -> bool {
    match serde_json::to_string(message) {
        Ok(json) => socket.send(Message::Text(json)).await.is_ok(),
        Err(err) => {
            warn!(error = %err, "failed to serialize realtime message");
            true
        }
    }
}

/// Handle an individual WebSocket connection
async fn handle_socket(mut socket: WebSocket, state: Arc<HubState>) {
    // Subscribe before greeting so nothing published after the greeting is lost
    let mut rx = state.subscribe();

    if !send_json(&mut socket, &RealtimeMessage::connection()).await {
        return; // Client disconnected immediately
    }
    debug!(clients = state.connected_clients(), "realtime client connected");

    loop {
        tokio::select! {
            // Broadcast events to client
            result = rx.recv() => {
                match result {
                    Ok(msg) => {
                        if !send_json(&mut socket, &msg).await {
                            break; // Client disconnected
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // Client is too slow; tell it to refetch everything
                        warn!(missed = n, "realtime client lagged behind");
                        let lagged = RealtimeMessage::new(
                            "error",
                            Some(json!({
                                "code": "lagged",
                                "message": format!("Missed {} events, please refresh", n)
                            })),
                        );
                        if !send_json(&mut socket, &lagged).await {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break; // Hub shutting down
                    }
                }
            }

            // Handle client messages
            result = socket.recv() => {
                match result {
                    Some(Ok(msg)) => {
                        if !handle_client_message(msg, &mut socket).await {
                            break; // Client requested close or error
                        }
                    }
                    Some(Err(_)) => break, // WebSocket error
                    None => break, // Client disconnected
                }
            }
        }
    }

    debug!("realtime client disconnected");
}

/// Handle a message from the client
/// Returns false if the connection should be closed
async fn handle_client_message(msg: Message, socket: &mut WebSocket) -> bool {
    match msg {
        Message::Text(text) => {
            match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::Ping) => send_json(socket, &RealtimeMessage::pong()).await,
                Err(err) => {
                    debug!(error = %err, "ignoring unrecognized client frame");
                    true
                }
            }
        }
        Message::Binary(_) => true, // Ignore binary messages
        Message::Ping(data) => socket.send(Message::Pong(data)).await.is_ok(),
        Message::Pong(_) => true, // Ignore pong responses
        Message::Close(_) => false, // Client requested close
    }
}
