//! Sync service errors

use thiserror::Error;

use crate::points::StoreError;

/// Errors returned by [`PointSync`](super::PointSync) operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    /// Input rejected before reaching the store
    #[error("Validation error: {0}")]
    Validation(String),

    /// The store refused or failed the operation
    #[error("{0}")]
    Store(String),
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidData(message) => SyncError::Validation(message),
            other => SyncError::Store(other.to_string()),
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
