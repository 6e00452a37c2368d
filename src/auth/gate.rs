//! Client-side view of who is signed in

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// The signed-in admin as the client sees it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedIn {
    pub email: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Observable sign-in state. Gates point mutations.
#[derive(Debug)]
pub struct SessionGate {
    current: watch::Sender<Option<SignedIn>>,
}

impl SessionGate {
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self { current }
    }

    pub fn sign_in(&self, user: SignedIn) {
        tracing::debug!(email = %user.email, "Session started");
        self.current.send_replace(Some(user));
    }

    pub fn sign_out(&self) {
        if self.current.send_replace(None).is_some() {
            tracing::debug!("Session ended");
        }
    }

    pub fn current(&self) -> Option<SignedIn> {
        self.current.borrow().clone()
    }

    /// Signed in with a session that has not expired yet
    pub fn is_signed_in_at(&self, now: DateTime<Utc>) -> bool {
        self.current
            .borrow()
            .as_ref()
            .is_some_and(|user| user.expires_at > now)
    }

    pub fn is_signed_in(&self) -> bool {
        self.is_signed_in_at(Utc::now())
    }

    pub fn token(&self) -> Option<String> {
        self.current.borrow().as_ref().map(|user| user.token.clone())
    }

    /// Receiver that wakes on sign-in and sign-out
    pub fn watch(&self) -> watch::Receiver<Option<SignedIn>> {
        self.current.subscribe()
    }
}

impl Default for SessionGate {
    fn default() -> Self {
        Self::new()
    }
}
