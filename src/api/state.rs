//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use std::sync::Arc;
use std::time::Instant;

use crate::api::error::ApiResult;
use crate::auth::AuthService;
use crate::config::Config;
use crate::metadata::MetadataFetcher;
use crate::points::PointStore;
use crate::websocket::{ConnectionHub, HubConfig};

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Journey points
    pub store: Arc<dyn PointStore>,
    /// Admin sessions
    pub auth: Arc<AuthService>,
    /// Link previews
    pub metadata: Arc<MetadataFetcher>,
    /// Full configuration
    pub config: Arc<Config>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
    /// WebSocket connection hub for live snapshots
    pub ws_hub: Arc<ConnectionHub>,
}

impl AppState {
    /// Wire the services described by `config` around a store
    pub fn new(store: Arc<dyn PointStore>, config: Config) -> ApiResult<Self> {
        let auth = Arc::new(AuthService::new(&config.auth));
        let metadata = Arc::new(MetadataFetcher::new(config.metadata.fetcher_config())?);
        Ok(Self::with_services(store, auth, metadata, config))
    }

    /// Build from already constructed services
    pub fn with_services(
        store: Arc<dyn PointStore>,
        auth: Arc<AuthService>,
        metadata: Arc<MetadataFetcher>,
        config: Config,
    ) -> Self {
        let hub_config = HubConfig {
            max_connections: config.api.max_connections,
        };

        if auth.admin_count() == 0 {
            tracing::warn!("No admin accounts configured; points are read-only");
        }

        Self {
            ws_hub: Arc::new(ConnectionHub::new(Arc::clone(&store), hub_config)),
            store,
            auth,
            metadata,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Get WebSocket connection count
    pub async fn ws_connection_count(&self) -> usize {
        self.ws_hub.connection_count().await
    }
}
