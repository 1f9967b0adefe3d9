use std::sync::Arc;

use crate::db::Store;
use crate::services::ConnectionRegistry;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub registry: Arc<ConnectionRegistry>,
    pub session_ttl_secs: u64,
}

impl AppState {
    pub fn new(store: Store, session_ttl_secs: u64) -> Self {
        Self {
            store,
            registry: Arc::new(ConnectionRegistry::new()),
            session_ttl_secs,
        }
    }
}
