//! [`SyncService`]: applies configuration lists to the job and route registries.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use gridcache_core::{resolve_sources, ConfigError, ResolvedSource, SourceConfig};
use gridcache_refresh::Refresher;
use gridcache_scheduler::{CronRule, JobRegistry, Timer};

use crate::error::SyncError;
use crate::routes::RouteTable;

/// URLs affected by one [`SyncService::apply`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// New sources: route mounted, job scheduled, refreshed once.
    pub added: Vec<String>,
    /// Sources kept from the previous list whose job was replaced.
    pub rescheduled: Vec<String>,
    /// Sources dropped: route unmounted, job stopped.
    pub removed: Vec<String>,
    /// Sources whose job could not be scheduled. They are left out of the
    /// active set entirely: no route, no job, not in the stored list.
    pub failed: Vec<String>,
}

impl ReconcileReport {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.rescheduled.is_empty()
            && self.removed.is_empty()
            && self.failed.is_empty()
    }
}

struct SyncState {
    jobs: JobRegistry,
    /// Last accepted list, as submitted, minus entries that failed to schedule.
    config: Vec<SourceConfig>,
    /// Resolved form of `config`, keyed by URL.
    active: HashMap<String, ResolvedSource>,
    closed: bool,
}

/// Owns the scheduled jobs, the route table and the last accepted list.
///
/// All mutations go through one async lock, so concurrent config updates are
/// applied one after another. The lookup handler reads the shared route table
/// without taking that lock.
pub struct SyncService {
    state: Mutex<SyncState>,
    routes: Arc<RouteTable>,
    refresher: Arc<dyn Refresher>,
}

impl SyncService {
    pub fn new(timer: Arc<dyn Timer>, refresher: Arc<dyn Refresher>) -> Self {
        Self {
            state: Mutex::new(SyncState {
                jobs: JobRegistry::new(timer, Arc::clone(&refresher)),
                config: Vec::new(),
                active: HashMap::new(),
                closed: false,
            }),
            routes: Arc::new(RouteTable::new()),
            refresher,
        }
    }

    pub fn routes(&self) -> Arc<RouteTable> {
        Arc::clone(&self.routes)
    }

    /// Validate `new` and reconcile jobs and routes against the stored list.
    ///
    /// An invalid list is rejected whole and nothing changes. A valid list is
    /// always applied; sources whose job could not be started are listed in
    /// [`ReconcileReport::failed`] and left out of the stored list.
    pub async fn apply(&self, new: Vec<SourceConfig>) -> Result<ReconcileReport, SyncError> {
        let validated = validate(&new)?;
        let urls: Vec<String> = validated.iter().map(|(s, _)| s.url.clone()).collect();

        let mut state = self.state.lock().await;
        if state.closed {
            return Err(SyncError::ShutDown);
        }

        let report = self.reconcile(&mut state, validated).await;
        state.config = new
            .into_iter()
            .zip(urls)
            .filter(|(_, url)| !report.failed.contains(url))
            .map(|(entry, _)| entry)
            .collect();

        info!(
            added = report.added.len(),
            rescheduled = report.rescheduled.len(),
            removed = report.removed.len(),
            failed = report.failed.len(),
            sources = state.active.len(),
            "configuration applied"
        );
        Ok(report)
    }

    /// Bring jobs and routes from the stored state to `new`.
    ///
    /// Kept sources get their job replaced and keep their route. New sources
    /// get their route mounted and their namespace claimed before their job is
    /// added, then one immediate refresh. Sources absent from `new` are
    /// unmounted, stopped and released last, so a path handed from a dropped
    /// source to a new one stays mounted throughout and a late fetch of the
    /// dropped source cannot overwrite the new one's data.
    async fn reconcile(
        &self,
        state: &mut SyncState,
        new: Vec<(ResolvedSource, CronRule)>,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let new_urls: HashSet<String> = new.iter().map(|(s, _)| s.url.clone()).collect();

        for (source, rule) in new {
            let url = source.url.clone();
            if let Some(previous) = state.active.get(&url).cloned() {
                state.jobs.remove(&url);
                if let Err(e) = state.jobs.add_rule(&url, rule) {
                    error!(url = %url, error = %e, "rescheduling failed, dropping source");
                    self.routes.remove(&previous.route_path, &url);
                    state.active.remove(&url);
                    self.refresher.release(&url).await;
                    report.failed.push(url);
                    continue;
                }
                if previous.route_path != source.route_path {
                    self.routes.remove(&previous.route_path, &url);
                    self.routes.add(&source.route_path, &url, &source.namespace);
                    info!(url = %url, from = %previous.route_path, to = %source.route_path, "route moved");
                }
                report.rescheduled.push(url.clone());
            } else {
                self.routes.add(&source.route_path, &url, &source.namespace);
                if let Err(e) = state.jobs.add_rule(&url, rule) {
                    error!(url = %url, error = %e, "scheduling failed, source not added");
                    self.routes.remove(&source.route_path, &url);
                    report.failed.push(url);
                    continue;
                }
                self.refresher.claim(&url).await;
                self.refresh_now(&url);
                report.added.push(url.clone());
            }
            state.active.insert(url, source);
        }

        let dropped: Vec<String> = state
            .active
            .keys()
            .filter(|url| !new_urls.contains(*url))
            .cloned()
            .collect();
        for url in dropped {
            if let Some(source) = state.active.remove(&url) {
                self.routes.remove(&source.route_path, &url);
            }
            state.jobs.remove(&url);
            self.refresher.release(&url).await;
            report.removed.push(url);
        }

        report.removed.sort();
        report
    }

    /// Run one refresh outside the schedule without waiting for it.
    fn refresh_now(&self, url: &str) {
        let refresher = Arc::clone(&self.refresher);
        let url = url.to_string();
        tokio::spawn(async move {
            let outcome = refresher.refresh(&url).await;
            debug!(url = %url, outcome = ?outcome, "initial refresh finished");
        });
    }

    /// The last accepted list.
    pub async fn current_config(&self) -> Vec<SourceConfig> {
        self.state.lock().await.config.clone()
    }

    /// Resolved sources of the last accepted list, sorted by URL.
    pub async fn sources(&self) -> Vec<ResolvedSource> {
        let state = self.state.lock().await;
        let mut sources: Vec<ResolvedSource> = state.active.values().cloned().collect();
        sources.sort_by(|a, b| a.url.cmp(&b.url));
        sources
    }

    /// URLs with a live job, sorted.
    pub async fn job_urls(&self) -> Vec<String> {
        self.state.lock().await.jobs.urls()
    }

    /// Stop every job. Later `apply` calls fail with [`SyncError::ShutDown`].
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        if state.closed {
            return;
        }
        state.closed = true;
        state.jobs.clear();
        info!("sync service stopped");
    }
}

/// Resolve every entry and parse its schedule before anything is touched.
fn validate(list: &[SourceConfig]) -> Result<Vec<(ResolvedSource, CronRule)>, ConfigError> {
    resolve_sources(list)?
        .into_iter()
        .map(|source| {
            match CronRule::parse(&source.cron_pattern, &source.cron_timezone) {
                Ok(rule) => Ok((source, rule)),
                Err(e) => {
                    warn!(url = %source.url, error = %e, "rejecting configuration");
                    Err(ConfigError::InvalidSchedule {
                        url: source.url.clone(),
                        reason: e.to_string(),
                    })
                }
            }
        })
        .collect()
}
