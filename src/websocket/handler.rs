//! WebSocket Handler
//!
//! Handles WebSocket upgrade requests and manages the connection lifecycle.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::hub::ConnectionHub;
use super::messages::{ClientMessage, ServerMessage};
use crate::api::AppState;

/// WebSocket upgrade handler
///
/// Entry point for live journey viewers.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    let hub = Arc::clone(&state.ws_hub);
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

fn encode(message: &ServerMessage) -> Option<Message> {
    match serde_json::to_string(message) {
        Ok(text) => Some(Message::Text(text)),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize message");
            None
        }
    }
}

/// Handle an established WebSocket connection
async fn handle_socket(socket: WebSocket, hub: Arc<ConnectionHub>) {
    let (mut sender, mut receiver) = socket.split();

    // Create channel for sending messages to this connection
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let connection_id = match hub.register(tx).await {
        Ok(id) => id,
        Err(e) => {
            tracing::error!(error = %e, "Failed to register WebSocket connection");
            if let Some(message) = encode(&ServerMessage::error(e.to_string())) {
                let _ = sender.send(message).await;
            }
            return;
        }
    };

    let connected = encode(&ServerMessage::Connected {
        connection_id: connection_id.clone(),
    });
    let sent = match connected {
        Some(message) => sender.send(message).await.is_ok(),
        None => false,
    };
    if !sent {
        tracing::error!(connection_id = %connection_id, "Failed to send connected message");
        hub.unregister(&connection_id).await;
        return;
    }

    let conn_id_for_send = connection_id.clone();

    // Task to forward messages from channel to WebSocket
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let Some(message) = encode(&msg) else {
                continue;
            };
            if sender.send(message).await.is_err() {
                tracing::debug!(
                    connection_id = %conn_id_for_send,
                    "WebSocket send failed, closing connection"
                );
                break;
            }
        }
    });

    let hub_for_recv = Arc::clone(&hub);
    let conn_id_for_recv = connection_id.clone();

    // Task to receive messages from WebSocket and handle them
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(msg) => {
                    if !handle_ws_message(&hub_for_recv, &conn_id_for_recv, msg).await {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(
                        connection_id = %conn_id_for_recv,
                        error = %e,
                        "WebSocket receive error"
                    );
                    break;
                }
            }
        }
    });

    // Wait for either task to complete
    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }

    hub.unregister(&connection_id).await;
}

/// Handle a received WebSocket message
///
/// Returns false if the connection should be closed.
async fn handle_ws_message(hub: &ConnectionHub, connection_id: &str, message: Message) -> bool {
    match message {
        Message::Text(text) => {
            match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => {
                    handle_client_message(hub, connection_id, client_msg).await;
                }
                Err(e) => {
                    tracing::debug!(
                        connection_id = %connection_id,
                        error = %e,
                        text = %text,
                        "Invalid client message"
                    );
                    // Keep the connection open
                    let error_msg = ServerMessage::error(format!("Invalid message format: {}", e));
                    let _ = hub.send_to(connection_id, error_msg).await;
                }
            }
            true
        }
        Message::Binary(_) => {
            let error_msg = ServerMessage::error("Binary messages not supported");
            let _ = hub.send_to(connection_id, error_msg).await;
            true
        }
        // axum answers pings itself
        Message::Ping(_) | Message::Pong(_) => true,
        Message::Close(_) => {
            tracing::debug!(connection_id = %connection_id, "Client requested close");
            false
        }
    }
}

/// Handle a parsed client message
async fn handle_client_message(hub: &ConnectionHub, connection_id: &str, message: ClientMessage) {
    match message {
        // The hub confirms subscriptions itself so the ack precedes the first snapshot
        ClientMessage::Subscribe { journeys } => {
            if let Err(e) = hub.subscribe(connection_id, journeys).await {
                tracing::error!(
                    connection_id = %connection_id,
                    error = %e,
                    "Subscribe error"
                );
                let _ = hub
                    .send_to(connection_id, ServerMessage::error(e.to_string()))
                    .await;
            }
        }
        ClientMessage::Unsubscribe { journeys } => {
            match hub.unsubscribe(connection_id, journeys).await {
                Ok(unsubscribed) => {
                    let response = ServerMessage::Unsubscribed {
                        journeys: unsubscribed,
                    };
                    let _ = hub.send_to(connection_id, response).await;
                }
                Err(e) => {
                    tracing::error!(
                        connection_id = %connection_id,
                        error = %e,
                        "Unsubscribe error"
                    );
                    let _ = hub
                        .send_to(connection_id, ServerMessage::error(e.to_string()))
                        .await;
                }
            }
        }
        ClientMessage::Ping => {
            let _ = hub.send_to(connection_id, ServerMessage::Pong).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::points::MemoryPointStore;
    use crate::websocket::HubConfig;

    async fn connected_hub() -> (
        ConnectionHub,
        String,
        mpsc::UnboundedReceiver<ServerMessage>,
    ) {
        let hub = ConnectionHub::new(Arc::new(MemoryPointStore::new()), HubConfig::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let id = hub.register(tx).await.unwrap();
        (hub, id, rx)
    }

    #[tokio::test]
    async fn test_ping_gets_pong() {
        let (hub, id, mut rx) = connected_hub().await;

        let keep_open =
            handle_ws_message(&hub, &id, Message::Text(r#"{"type":"ping"}"#.to_string())).await;

        assert!(keep_open);
        assert!(matches!(rx.recv().await, Some(ServerMessage::Pong)));
    }

    #[tokio::test]
    async fn test_garbage_keeps_connection_open() {
        let (hub, id, mut rx) = connected_hub().await;

        assert!(handle_ws_message(&hub, &id, Message::Text("{nope".to_string())).await);
        match rx.recv().await {
            Some(ServerMessage::Error { message }) => {
                assert!(message.starts_with("Invalid message format"))
            }
            other => panic!("Expected Error, got {:?}", other),
        }

        assert!(handle_ws_message(&hub, &id, Message::Binary(vec![1, 2])).await);
        assert!(matches!(rx.recv().await, Some(ServerMessage::Error { .. })));
    }

    #[tokio::test]
    async fn test_close_ends_connection() {
        let (hub, id, _rx) = connected_hub().await;
        assert!(!handle_ws_message(&hub, &id, Message::Close(None)).await);
    }

    #[tokio::test]
    async fn test_unsubscribe_is_acknowledged() {
        let (hub, id, mut rx) = connected_hub().await;

        handle_client_message(
            &hub,
            &id,
            ClientMessage::Unsubscribe {
                journeys: vec!["camino".to_string()],
            },
        )
        .await;

        match rx.recv().await {
            Some(ServerMessage::Unsubscribed { journeys }) => assert!(journeys.is_empty()),
            other => panic!("Expected Unsubscribed, got {:?}", other),
        }
    }
}
