//! WebSocket Message Types
//!
//! Defines all message types exchanged between journey viewers and the
//! Camino server.

use serde::{Deserialize, Serialize};

use crate::points::Point;

/// Messages sent from client to server
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Start receiving snapshots of these journeys
    Subscribe {
        journeys: Vec<String>,
    },
    /// Stop receiving snapshots of these journeys
    Unsubscribe {
        journeys: Vec<String>,
    },
    /// Ping for keepalive
    Ping,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Connection established
    Connected {
        /// Unique connection identifier
        connection_id: String,
    },
    /// Subscription confirmed
    Subscribed {
        journeys: Vec<String>,
    },
    /// Unsubscription confirmed
    Unsubscribed {
        journeys: Vec<String>,
    },
    /// Full ordered point list of a journey, sent on subscribe and on every change
    Snapshot {
        journey: String,
        points: Vec<Point>,
    },
    /// Pong response to ping
    Pong,
    /// Error message
    Error {
        /// Error description
        message: String,
    },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}
