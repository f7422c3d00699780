//! [`RefreshPipeline`]: one fetch → transform → store run per call.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use url::Url;

use gridcache_cache::{CacheStore, Namespace};

use crate::error::FetchError;
use crate::fetch::GridFetcher;
use crate::grid::transform_grid;

/// What a single refresh run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The namespace now holds `records` entries; `skipped` rows had no code.
    Stored { records: usize, skipped: usize },
    /// Another run for the same source was still in flight.
    AlreadyRunning,
    /// Fetching or decoding failed; the cache was not touched.
    FetchFailed(String),
    /// The batch write failed; the namespace keeps its previous contents.
    StoreFailed(String),
    /// Another source claimed the namespace while this run was fetching;
    /// the batch was discarded.
    Superseded,
}

/// Anything that can refresh a source by URL. Schedulers and the reconciler
/// only see this seam.
#[async_trait]
pub trait Refresher: Send + Sync {
    async fn refresh(&self, url: &str) -> RefreshOutcome;

    /// Make `url` the only source allowed to write its namespace.
    async fn claim(&self, _url: &str) {}

    /// Drop `url`'s claim on its namespace if it still holds it.
    async fn release(&self, _url: &str) {}
}

/// Cache namespace of a source: the path component of its resolved URL.
pub fn namespace_for(url: &Url) -> String {
    url.path().to_string()
}

/// Fetch-transform-store pipeline shared by every scheduled job.
pub struct RefreshPipeline {
    fetcher: Arc<dyn GridFetcher>,
    store: Arc<dyn CacheStore>,
    /// URLs with a run currently in progress.
    in_flight: Mutex<HashSet<String>>,
    /// Namespace → the URL allowed to write it. Unclaimed namespaces accept
    /// any writer.
    owners: RwLock<HashMap<String, String>>,
}

/// Removes a URL from the in-flight set when the run ends, however it ends.
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<String>>,
    url: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut set) = self.set.lock() {
            set.remove(&self.url);
        }
    }
}

impl RefreshPipeline {
    pub fn new(fetcher: Arc<dyn GridFetcher>, store: Arc<dyn CacheStore>) -> Self {
        Self {
            fetcher,
            store,
            in_flight: Mutex::new(HashSet::new()),
            owners: RwLock::new(HashMap::new()),
        }
    }

    /// See [`Refresher::claim`]. A run still fetching for the previous owner
    /// will not write afterwards.
    pub async fn claim(&self, url: &str) {
        let Ok(parsed) = Url::parse(url) else {
            return;
        };
        let namespace = namespace_for(&parsed);
        let mut owners = self.owners.write().await;
        if let Some(previous) = owners.insert(namespace.clone(), url.to_string()) {
            if previous != url {
                info!(namespace = %namespace, from = %previous, to = %url, "namespace handed over");
            }
        }
    }

    /// See [`Refresher::release`].
    pub async fn release(&self, url: &str) {
        let Ok(parsed) = Url::parse(url) else {
            return;
        };
        let namespace = namespace_for(&parsed);
        let mut owners = self.owners.write().await;
        if owners.get(&namespace).map(String::as_str) == Some(url) {
            owners.remove(&namespace);
            debug!(namespace = %namespace, url = %url, "namespace released");
        }
    }

    pub fn store(&self) -> Arc<dyn CacheStore> {
        Arc::clone(&self.store)
    }

    fn try_begin(&self, url: &str) -> Option<InFlightGuard<'_>> {
        let mut set = match self.in_flight.lock() {
            Ok(set) => set,
            Err(e) => {
                error!(url = %url, error = %e, "in-flight set lock poisoned");
                return None;
            }
        };
        if !set.insert(url.to_string()) {
            return None;
        }
        Some(InFlightGuard {
            set: &self.in_flight,
            url: url.to_string(),
        })
    }

    /// Refresh one source: fetch its full table and replace its namespace.
    ///
    /// Never returns an error; every failure is logged and reported in the
    /// outcome so the caller can treat this as fire-and-forget.
    pub async fn run(&self, url: &str) -> RefreshOutcome {
        let parsed = match Url::parse(url) {
            Ok(u) => u,
            Err(source) => {
                let e = FetchError::InvalidUrl {
                    url: url.to_string(),
                    source,
                };
                error!(url = %url, error = %e, "refresh skipped");
                return RefreshOutcome::FetchFailed(e.to_string());
            }
        };

        let Some(_guard) = self.try_begin(url) else {
            warn!(url = %url, "refresh already in flight for source, skipping");
            return RefreshOutcome::AlreadyRunning;
        };

        let start = Instant::now();
        info!(url = %url, "populating cache");

        let grid = match self.fetcher.fetch(&parsed).await {
            Ok(grid) => grid,
            Err(e) => {
                error!(url = %url, error = %e, "fetching facility data failed");
                return RefreshOutcome::FetchFailed(e.to_string());
            }
        };

        let transformed = transform_grid(&grid);
        let namespace = Namespace::new(Arc::clone(&self.store), namespace_for(&parsed));
        let skipped = transformed.skipped;

        // Held across the write so a claim cannot land between check and replace.
        let owners = self.owners.read().await;
        if let Some(owner) = owners.get(namespace.name()) {
            if owner != url {
                warn!(url = %url, namespace = %namespace.name(), owner = %owner, "namespace now owned by another source, discarding batch");
                return RefreshOutcome::Superseded;
            }
        }

        match namespace.replace(transformed.records).await {
            Ok(records) => {
                info!(
                    url = %url,
                    namespace = %namespace.name(),
                    records,
                    skipped,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "finished populating cache"
                );
                RefreshOutcome::Stored { records, skipped }
            }
            Err(e) => {
                error!(url = %url, namespace = %namespace.name(), error = %e, "storing facility data failed");
                RefreshOutcome::StoreFailed(e.to_string())
            }
        }
    }
}

#[async_trait]
impl Refresher for RefreshPipeline {
    async fn refresh(&self, url: &str) -> RefreshOutcome {
        self.run(url).await
    }

    async fn claim(&self, url: &str) {
        RefreshPipeline::claim(self, url).await
    }

    async fn release(&self, url: &str) {
        RefreshPipeline::release(self, url).await
    }
}
