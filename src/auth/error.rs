//! Authentication errors

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    #[error("Please fill in all fields")]
    MissingCredentials,

    #[error("Invalid email or password")]
    InvalidCredentials,

    /// No session token, or one we never issued
    #[error("Not signed in")]
    Unauthenticated,

    #[error("Session expired")]
    SessionExpired,
}

pub type AuthResult<T> = Result<T, AuthError>;
