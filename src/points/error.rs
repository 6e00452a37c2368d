//! Point store error types

use thiserror::Error;

/// Errors raised by a point store
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// No point with this id in the journey
    #[error("Point not found: {journey}/{id}")]
    NotFound { journey: String, id: String },

    /// Record failed validation (e.g. coordinates out of range)
    #[error("Invalid point data: {0}")]
    InvalidData(String),

    /// Caller is not allowed to write
    #[error("Permission denied")]
    PermissionDenied,

    /// Underlying database failed
    #[error("Database error: {0}")]
    Database(String),

    /// Network failure talking to a remote store
    #[error("Transport error: {0}")]
    Transport(String),

    /// Remote store answered with an error status
    #[error("Store API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Stored data could not be decoded
    #[error("Malformed data: {0}")]
    Malformed(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            StoreError::Malformed(err.to_string())
        } else {
            StoreError::Transport(err.to_string())
        }
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::NotFound {
            journey: "camino".to_string(),
            id: "abc".to_string(),
        };
        assert_eq!(err.to_string(), "Point not found: camino/abc");
        assert_eq!(StoreError::PermissionDenied.to_string(), "Permission denied");
    }

    #[test]
    fn test_sqlite_error_conversion() {
        let err: StoreError = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(err, StoreError::Database(_)));
    }
}
