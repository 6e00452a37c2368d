//! Admin authentication
//!
//! [`AuthService`] runs on the API server and issues bearer tokens.
//! [`SessionGate`] is the client-side observable of the signed-in admin.

pub mod error;
pub mod gate;
pub mod service;

pub use error::{AuthError, AuthResult};
pub use gate::{SessionGate, SignedIn};
pub use service::{hash_password, AuthService, Session};
