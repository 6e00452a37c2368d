//! Client-side point synchronization
//!
//! Subscribes to a journey's live query and exposes the ordered list, a
//! loading flag and the last error through a `tokio::sync::watch` channel.

pub mod error;
pub mod service;

pub use error::{SyncError, SyncResult};
pub use service::{PointDraft, PointSync, Subscription, SyncState, UpdateDraft};
