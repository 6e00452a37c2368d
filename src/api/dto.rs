//! Data Transfer Objects
//!
//! Request and response types for the API endpoints that are not domain
//! types themselves. Point creation and updates take [`NewPoint`] and
//! [`PointPatch`] bodies as they are.
//!
//! [`NewPoint`]: crate::points::NewPoint
//! [`PointPatch`]: crate::points::PointPatch

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::Session;
use crate::points::{Point, PointId};

// ============================================
// POINT DTOs
// ============================================

/// Ordered points of a journey
#[derive(Debug, Serialize, Deserialize)]
pub struct PointsResponse {
    pub journey: String,
    pub points: Vec<Point>,
}

/// Id of a freshly created point
#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub id: PointId,
}

// ============================================
// AUTH DTOs
// ============================================

/// Admin sign-in request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Issued session, returned on login
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub token: String,
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            token: session.token,
            email: session.email,
            expires_at: session.expires_at,
        }
    }
}

/// Who is signed in; the token is never echoed back
#[derive(Debug, Serialize, Deserialize)]
pub struct WhoAmIResponse {
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

// ============================================
// METADATA DTOs
// ============================================

#[derive(Debug, Deserialize)]
pub struct MetadataQuery {
    pub url: Option<String>,
}

/// Body of a failed metadata request
#[derive(Debug, Serialize)]
pub struct MetadataErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

// ============================================
// HEALTH DTOs
// ============================================

/// Full health status
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall status: healthy, unhealthy
    pub status: String,
    /// Store backend name
    pub store: String,
    /// Store status
    pub store_status: String,
    /// Open WebSocket connections
    pub websocket_connections: usize,
    /// Server uptime in seconds
    pub uptime_seconds: u64,
    /// Application version
    pub version: String,
}
