//! WebSocket Connection Hub
//!
//! Manages all WebSocket connections and their journey subscriptions. Each
//! (connection, journey) pair owns a task forwarding the store's live query
//! as `snapshot` messages; the task is aborted on unsubscribe or disconnect.

use futures_util::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tokio::task::AbortHandle;
use uuid::Uuid;

use super::messages::ServerMessage;
use crate::points::{JourneyId, PointStore};

/// Unique identifier for a WebSocket connection
pub type ConnectionId = String;

/// Manages all WebSocket connections and subscriptions
pub struct ConnectionHub {
    /// Active connections: ConnectionId → ConnectionHandle
    connections: RwLock<HashMap<ConnectionId, ConnectionHandle>>,
    store: Arc<dyn PointStore>,
    config: HubConfig,
}

/// Configuration for the connection hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Maximum number of concurrent connections
    pub max_connections: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_connections: 1000,
        }
    }
}

/// Handle for sending messages to a specific connection
pub struct ConnectionHandle {
    /// Channel sender for this connection
    pub sender: mpsc::UnboundedSender<ServerMessage>,
    /// Forwarding task per subscribed journey
    subscriptions: HashMap<JourneyId, AbortHandle>,
}

impl ConnectionHub {
    /// Create a new connection hub pushing snapshots from `store`
    pub fn new(store: Arc<dyn PointStore>, config: HubConfig) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            store,
            config,
        }
    }

    /// Register a new WebSocket connection
    ///
    /// Returns the connection ID on success, or an error if the connection
    /// limit has been reached.
    pub async fn register(
        &self,
        sender: mpsc::UnboundedSender<ServerMessage>,
    ) -> Result<ConnectionId, HubError> {
        let mut connections = self.connections.write().await;
        if connections.len() >= self.config.max_connections {
            return Err(HubError::TooManyConnections(self.config.max_connections));
        }

        let id = Uuid::new_v4().to_string();
        connections.insert(
            id.clone(),
            ConnectionHandle {
                sender,
                subscriptions: HashMap::new(),
            },
        );

        tracing::info!(connection_id = %id, "WebSocket connected");
        Ok(id)
    }

    /// Unregister a connection and stop its forwarding tasks
    pub async fn unregister(&self, id: &str) {
        if let Some(handle) = self.connections.write().await.remove(id) {
            for task in handle.subscriptions.into_values() {
                task.abort();
            }
        }

        tracing::info!(connection_id = %id, "WebSocket disconnected");
    }

    /// Subscribe a connection to journeys
    ///
    /// Confirms with a `subscribed` message, after which each newly
    /// subscribed journey receives its current snapshot. Invalid ids and
    /// journeys the store cannot watch are skipped.
    pub async fn subscribe(
        &self,
        id: &str,
        journeys: Vec<String>,
    ) -> Result<Vec<String>, HubError> {
        let sender = {
            let connections = self.connections.read().await;
            connections
                .get(id)
                .ok_or(HubError::ConnectionNotFound)?
                .sender
                .clone()
        };

        let mut subscribed = Vec::new();
        let mut opened = Vec::new();

        for name in journeys {
            let journey = JourneyId::new(name.clone());
            if !journey.is_valid() {
                tracing::warn!(journey = %name, "Invalid journey ignored");
                continue;
            }

            if subscribed.contains(&name) {
                continue;
            }
            if self.is_subscribed(id, &journey).await {
                subscribed.push(name);
                continue;
            }

            match self.store.watch(&journey).await {
                Ok(query) => {
                    opened.push((journey, query));
                    subscribed.push(name);
                }
                Err(e) => {
                    tracing::warn!(journey = %journey, error = %e, "Could not watch journey");
                    let _ = sender.send(ServerMessage::error(format!(
                        "Could not subscribe to {}: {}",
                        journey, e
                    )));
                }
            }
        }

        let mut connections = self.connections.write().await;
        // Gone if the client disconnected while the queries were opening
        let handle = connections
            .get_mut(id)
            .ok_or(HubError::ConnectionNotFound)?;

        handle
            .sender
            .send(ServerMessage::Subscribed {
                journeys: subscribed.clone(),
            })
            .map_err(|_| HubError::SendFailed)?;

        for (journey, query) in opened {
            let task = tokio::spawn(forward(journey.clone(), query, sender.clone())).abort_handle();
            if let Some(previous) = handle.subscriptions.insert(journey, task) {
                previous.abort();
            }
        }

        tracing::debug!(
            connection_id = %id,
            journeys = ?subscribed,
            "Subscribed to journeys"
        );

        Ok(subscribed)
    }

    /// Unsubscribe a connection from journeys
    pub async fn unsubscribe(
        &self,
        id: &str,
        journeys: Vec<String>,
    ) -> Result<Vec<String>, HubError> {
        let mut connections = self.connections.write().await;
        let handle = connections
            .get_mut(id)
            .ok_or(HubError::ConnectionNotFound)?;

        let mut unsubscribed = Vec::new();

        for name in journeys {
            if let Some(task) = handle.subscriptions.remove(&JourneyId::new(name.clone())) {
                task.abort();
                unsubscribed.push(name);
            }
        }

        tracing::debug!(
            connection_id = %id,
            journeys = ?unsubscribed,
            "Unsubscribed from journeys"
        );

        Ok(unsubscribed)
    }

    /// Send a message directly to a specific connection
    pub async fn send_to(&self, id: &str, message: ServerMessage) -> Result<(), HubError> {
        let connections = self.connections.read().await;
        let handle = connections.get(id).ok_or(HubError::ConnectionNotFound)?;

        handle
            .sender
            .send(message)
            .map_err(|_| HubError::SendFailed)
    }

    /// Get the current connection count
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Number of connections watching a journey
    pub async fn subscription_count(&self, journey: &JourneyId) -> usize {
        self.connections
            .read()
            .await
            .values()
            .filter(|handle| handle.subscriptions.contains_key(journey))
            .count()
    }

    async fn is_subscribed(&self, id: &str, journey: &JourneyId) -> bool {
        self.connections
            .read()
            .await
            .get(id)
            .is_some_and(|handle| handle.subscriptions.contains_key(journey))
    }
}

/// Relay a live query to one connection until either side goes away
async fn forward(
    journey: JourneyId,
    mut query: crate::points::LiveQuery,
    sender: mpsc::UnboundedSender<ServerMessage>,
) {
    while let Some(item) = query.next().await {
        let message = match item {
            Ok(points) => ServerMessage::Snapshot {
                journey: journey.to_string(),
                points,
            },
            Err(e) => {
                tracing::warn!(journey = %journey, error = %e, "Live query failed");
                ServerMessage::error(e.to_string())
            }
        };

        if sender.send(message).is_err() {
            break;
        }
    }

    tracing::trace!(journey = %journey, "Snapshot forwarding stopped");
}

/// Errors that can occur in the connection hub
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Too many connections (limit: {0})")]
    TooManyConnections(usize),

    #[error("Connection not found")]
    ConnectionNotFound,

    #[error("Failed to send message")]
    SendFailed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::points::{Coordinates, MemoryPointStore, NewPoint};
    use chrono::Utc;
    use std::time::Duration;
    use tokio::time::timeout;

    fn hub(max_connections: usize) -> (ConnectionHub, Arc<MemoryPointStore>) {
        let store = Arc::new(MemoryPointStore::new());
        let hub = ConnectionHub::new(store.clone(), HubConfig { max_connections });
        (hub, store)
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<ServerMessage>) -> ServerMessage {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("message in time")
            .expect("channel open")
    }

    #[test]
    fn test_default_config() {
        assert_eq!(HubConfig::default().max_connections, 1000);
    }

    #[tokio::test]
    async fn test_register_unregister() {
        let (hub, _) = hub(10);
        let (tx, _rx) = mpsc::unbounded_channel();

        let id = hub.register(tx).await.unwrap();
        assert!(!id.is_empty());
        assert_eq!(hub.connection_count().await, 1);

        hub.unregister(&id).await;
        assert_eq!(hub.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_connection_limit() {
        let (hub, _) = hub(2);

        let (tx1, _) = mpsc::unbounded_channel();
        let (tx2, _) = mpsc::unbounded_channel();
        let (tx3, _) = mpsc::unbounded_channel();

        hub.register(tx1).await.unwrap();
        hub.register(tx2).await.unwrap();
        let result = hub.register(tx3).await;

        assert!(matches!(result, Err(HubError::TooManyConnections(2))));
    }

    #[tokio::test]
    async fn test_subscribe_sends_snapshots() {
        let (hub, store) = hub(10);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = hub.register(tx).await.unwrap();

        let subscribed = hub
            .subscribe(&id, vec!["camino".to_string(), "not valid".to_string()])
            .await
            .unwrap();
        assert_eq!(subscribed, vec!["camino"]);
        assert_eq!(hub.subscription_count(&JourneyId::new("camino")).await, 1);

        match next(&mut rx).await {
            ServerMessage::Subscribed { journeys } => assert_eq!(journeys, vec!["camino"]),
            other => panic!("Expected Subscribed, got {:?}", other),
        }

        match next(&mut rx).await {
            ServerMessage::Snapshot { journey, points } => {
                assert_eq!(journey, "camino");
                assert!(points.is_empty());
            }
            other => panic!("Expected Snapshot, got {:?}", other),
        }

        store
            .insert(
                &JourneyId::new("camino"),
                NewPoint::new(Coordinates::new(42.88, -8.54), Utc::now()).title("Santiago"),
            )
            .await
            .unwrap();

        match next(&mut rx).await {
            ServerMessage::Snapshot { points, .. } => {
                assert_eq!(points.len(), 1);
                assert_eq!(points[0].title, "Santiago");
            }
            other => panic!("Expected Snapshot, got {:?}", other),
        }

        hub.unregister(&id).await;
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_snapshots() {
        let (hub, store) = hub(10);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = hub.register(tx).await.unwrap();

        hub.subscribe(&id, vec!["camino".to_string()]).await.unwrap();
        next(&mut rx).await;
        next(&mut rx).await;

        let unsubscribed = hub
            .unsubscribe(&id, vec!["camino".to_string(), "other".to_string()])
            .await
            .unwrap();
        assert_eq!(unsubscribed, vec!["camino"]);
        assert_eq!(hub.subscription_count(&JourneyId::new("camino")).await, 0);

        store
            .insert(
                &JourneyId::new("camino"),
                NewPoint::new(Coordinates::new(42.88, -8.54), Utc::now()),
            )
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_duplicate_subscribe_keeps_one_feed() {
        let (hub, _) = hub(10);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = hub.register(tx).await.unwrap();

        hub.subscribe(&id, vec!["camino".to_string()]).await.unwrap();
        let again = hub
            .subscribe(&id, vec!["camino".to_string(), "camino".to_string()])
            .await
            .unwrap();
        assert_eq!(again, vec!["camino"]);

        // subscribed, snapshot, subscribed
        assert!(matches!(next(&mut rx).await, ServerMessage::Subscribed { .. }));
        assert!(matches!(next(&mut rx).await, ServerMessage::Snapshot { .. }));
        assert!(matches!(next(&mut rx).await, ServerMessage::Subscribed { .. }));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unknown_connection() {
        let (hub, _) = hub(10);
        assert!(matches!(
            hub.subscribe("nope", vec!["camino".to_string()]).await,
            Err(HubError::ConnectionNotFound)
        ));
        assert!(matches!(
            hub.send_to("nope", ServerMessage::Pong).await,
            Err(HubError::ConnectionNotFound)
        ));
    }
}
