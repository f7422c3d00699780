use std::sync::Arc;

use gridcache_cache::CacheStore;
use gridcache_sync::{RouteTable, SyncService};

pub struct AppState {
    pub sync: Arc<SyncService>,
    pub routes: Arc<RouteTable>,
    pub store: Arc<dyn CacheStore>,
}

impl AppState {
    pub fn new(sync: Arc<SyncService>, store: Arc<dyn CacheStore>) -> Self {
        Self {
            routes: sync.routes(),
            sync,
            store,
        }
    }
}
