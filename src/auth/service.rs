//! Admin sessions
//!
//! Admin accounts come from configuration as email plus SHA-256 password
//! digest. A successful login issues an opaque bearer token that expires
//! after the configured TTL.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::error::{AuthError, AuthResult};
use crate::clock::{Clock, SystemClock};
use crate::config::{AdminAccount, AuthConfig};

/// An issued admin session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

/// Hex SHA-256 digest of a password, the form stored in config.
///
/// Unsalted: it keeps plain passwords out of config files and nothing more.
/// Treat the config file as a secret.
pub fn hash_password(password: &str) -> String {
    Sha256::digest(password.as_bytes())
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Compare two digests without exiting at the first differing byte
fn digests_match(stored: &str, candidate: &str) -> bool {
    let (a, b) = (stored.as_bytes(), candidate.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Issues and checks admin sessions
pub struct AuthService {
    admins: HashMap<String, String>,
    sessions: RwLock<HashMap<String, Session>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl AuthService {
    pub fn new(config: &AuthConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &AuthConfig, clock: Arc<dyn Clock>) -> Self {
        let admins = config
            .admins
            .iter()
            .map(|AdminAccount { email, password_sha256 }| {
                (email.trim().to_lowercase(), password_sha256.trim().to_lowercase())
            })
            .collect();

        Self {
            admins,
            sessions: RwLock::new(HashMap::new()),
            ttl: Duration::hours(config.session_ttl_hours as i64),
            clock,
        }
    }

    pub fn admin_count(&self) -> usize {
        self.admins.len()
    }

    /// Sessions currently held, expired ones included until pruned
    pub fn session_count(&self) -> usize {
        self.sessions.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Check credentials and open a session
    pub fn login(&self, email: &str, password: &str) -> AuthResult<Session> {
        let email = email.trim().to_lowercase();
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let candidate = hash_password(password);
        match self.admins.get(&email) {
            Some(digest) if digests_match(digest, &candidate) => {}
            _ => {
                tracing::warn!(email = %email, "Rejected admin login");
                return Err(AuthError::InvalidCredentials);
            }
        }

        let now = self.clock.now();
        let session = Session {
            token: uuid::Uuid::new_v4().simple().to_string(),
            email,
            expires_at: now + self.ttl,
        };

        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let before = sessions.len();
        sessions.retain(|_, s| s.expires_at > now);
        if sessions.len() < before {
            tracing::debug!(pruned = before - sessions.len(), "Dropped expired sessions");
        }
        sessions.insert(session.token.clone(), session.clone());
        tracing::info!(email = %session.email, "Admin signed in");
        Ok(session)
    }

    /// End a session. Returns whether it existed.
    pub fn logout(&self, token: &str) -> bool {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let removed = sessions.remove(token);
        if let Some(session) = &removed {
            tracing::info!(email = %session.email, "Admin signed out");
        }
        removed.is_some()
    }

    /// Look up a live session
    pub fn verify(&self, token: &str) -> AuthResult<Session> {
        let session = {
            let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
            sessions.get(token).cloned()
        }
        .ok_or(AuthError::Unauthenticated)?;

        if session.expires_at <= self.clock.now() {
            self.sessions
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .remove(token);
            return Err(AuthError::SessionExpired);
        }

        Ok(session)
    }
}
