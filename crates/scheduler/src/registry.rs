//! [`JobRegistry`]: source URL → live scheduled job.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use gridcache_refresh::Refresher;

use crate::error::ScheduleError;
use crate::rule::CronRule;
use crate::timer::{JobCallback, JobHandle, Timer};

/// Snapshot of a registered job.
#[derive(Debug, Clone)]
pub struct JobInfo {
    pub id: Uuid,
    pub url: String,
    pub rule: CronRule,
}

struct ScheduledJob {
    rule: CronRule,
    handle: JobHandle,
}

/// Owns one recurring refresh job per source URL.
///
/// There is no in-place update. A changed schedule is applied by
/// [`remove`](JobRegistry::remove) followed by [`add`](JobRegistry::add).
pub struct JobRegistry {
    timer: Arc<dyn Timer>,
    refresher: Arc<dyn Refresher>,
    jobs: HashMap<String, ScheduledJob>,
}

impl JobRegistry {
    pub fn new(timer: Arc<dyn Timer>, refresher: Arc<dyn Refresher>) -> Self {
        Self {
            timer,
            refresher,
            jobs: HashMap::new(),
        }
    }

    /// Schedule `refresh(url)` on `pattern` in `timezone` and register it.
    ///
    /// The first firing is the rule's next tick; nothing runs now.
    pub fn add(&mut self, url: &str, pattern: &str, timezone: &str) -> Result<Uuid, ScheduleError> {
        let rule = CronRule::parse(pattern, timezone)?;
        self.add_rule(url, rule)
    }

    /// Like [`add`](JobRegistry::add) with an already parsed rule.
    ///
    /// On error the registry is unchanged.
    pub fn add_rule(&mut self, url: &str, rule: CronRule) -> Result<Uuid, ScheduleError> {
        if self.jobs.contains_key(url) {
            return Err(ScheduleError::DuplicateJob(url.to_string()));
        }
        let handle = self
            .timer
            .schedule(rule.clone(), refresh_callback(url, &self.refresher))?;
        let id = handle.id();
        info!(url = %url, job_id = %id, schedule = %rule, "job scheduled");
        self.jobs.insert(url.to_string(), ScheduledJob { rule, handle });
        Ok(id)
    }

    /// Stop and deregister the job for `url`. Returns whether one existed.
    pub fn remove(&mut self, url: &str) -> bool {
        match self.jobs.remove(url) {
            Some(job) => {
                info!(url = %url, job_id = %job.handle.id(), "job stopped");
                job.handle.cancel();
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, url: &str) -> bool {
        self.jobs.contains_key(url)
    }

    pub fn get(&self, url: &str) -> Option<JobInfo> {
        self.jobs.get(url).map(|job| JobInfo {
            id: job.handle.id(),
            url: url.to_string(),
            rule: job.rule.clone(),
        })
    }

    /// Registered URLs, sorted.
    pub fn urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = self.jobs.keys().cloned().collect();
        urls.sort();
        urls
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Stop every job.
    pub fn clear(&mut self) {
        let count = self.jobs.len();
        for (_, job) in self.jobs.drain() {
            job.handle.cancel();
        }
        if count > 0 {
            info!(count, "all jobs stopped");
        }
    }
}

impl Drop for JobRegistry {
    fn drop(&mut self) {
        self.clear();
    }
}

impl std::fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRegistry")
            .field("urls", &self.urls())
            .finish()
    }
}

/// Each firing spawns its own refresh task so cancelling the job never
/// interrupts a fetch that already started.
fn refresh_callback(url: &str, refresher: &Arc<dyn Refresher>) -> JobCallback {
    let url = url.to_string();
    let refresher = Arc::clone(refresher);
    Arc::new(move || {
        let url = url.clone();
        let refresher = Arc::clone(&refresher);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    let outcome = refresher.refresh(&url).await;
                    debug!(url = %url, outcome = ?outcome, "scheduled refresh finished");
                });
            }
            Err(e) => warn!(url = %url, error = %e, "no runtime to run scheduled refresh"),
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use gridcache_refresh::RefreshOutcome;

    use super::*;
    use crate::manual::ManualTimer;

    #[derive(Default)]
    struct RecordingRefresher {
        calls: Mutex<Vec<String>>,
    }

    impl RecordingRefresher {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Refresher for RecordingRefresher {
        async fn refresh(&self, url: &str) -> RefreshOutcome {
            self.calls.lock().unwrap().push(url.to_string());
            RefreshOutcome::Stored { records: 0, skipped: 0 }
        }
    }

    fn registry() -> (ManualTimer, Arc<RecordingRefresher>, JobRegistry) {
        let timer = ManualTimer::new();
        let refresher = Arc::new(RecordingRefresher::default());
        let registry = JobRegistry::new(Arc::new(timer.clone()), refresher.clone());
        (timer, refresher, registry)
    }

    async fn wait_for_calls(refresher: &RecordingRefresher, n: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while refresher.calls().len() < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("refresh calls arrive");
    }

    #[tokio::test]
    async fn firing_refreshes_the_bound_url() {
        let (timer, refresher, mut registry) = registry();
        registry.add("http://a/x", "0 * * * *", "").unwrap();

        tokio::task::yield_now().await;
        assert!(refresher.calls().is_empty(), "adding a job does not refresh");

        timer.fire_all();
        wait_for_calls(&refresher, 1).await;
        assert_eq!(refresher.calls(), vec!["http://a/x"]);
    }

    #[tokio::test]
    async fn duplicate_add_is_rejected() {
        let (timer, _, mut registry) = registry();
        registry.add("http://a/x", "0 * * * *", "").unwrap();
        let err = registry.add("http://a/x", "*/5 * * * *", "").unwrap_err();
        assert!(matches!(err, ScheduleError::DuplicateJob(url) if url == "http://a/x"));
        assert_eq!(timer.live_jobs().len(), 1);
    }

    #[tokio::test]
    async fn invalid_pattern_registers_nothing() {
        let (timer, _, mut registry) = registry();
        assert!(registry.add("http://a/x", "every hour", "").is_err());
        assert!(registry.is_empty());
        assert_eq!(timer.scheduled_count(), 0);
    }

    #[tokio::test]
    async fn remove_stops_future_firings() {
        let (timer, refresher, mut registry) = registry();
        registry.add("http://a/x", "0 * * * *", "").unwrap();
        registry.add("http://a/y", "0 * * * *", "").unwrap();

        assert!(registry.remove("http://a/x"));
        assert!(!registry.remove("http://a/x"), "second remove is a no-op");

        timer.fire_all();
        wait_for_calls(&refresher, 1).await;
        assert_eq!(refresher.calls(), vec!["http://a/y"]);
        assert_eq!(registry.urls(), vec!["http://a/y"]);
    }

    #[tokio::test]
    async fn reschedule_is_remove_then_add() {
        let (timer, _, mut registry) = registry();
        let first = registry.add("http://a/x", "0 * * * *", "").unwrap();
        registry.remove("http://a/x");
        let second = registry.add("http://a/x", "*/10 * * * *", "Europe/Oslo").unwrap();

        assert_ne!(first, second);
        let live = timer.live_jobs();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].0, second);
        let info = registry.get("http://a/x").unwrap();
        assert_eq!(info.rule.pattern(), "*/10 * * * *");
        assert_eq!(info.rule.timezone().name(), "Europe/Oslo");
    }

    struct NoRuntimeTimer;

    impl Timer for NoRuntimeTimer {
        fn schedule(&self, _rule: CronRule, _callback: JobCallback) -> Result<JobHandle, ScheduleError> {
            Err(ScheduleError::NoRuntime)
        }
    }

    #[test]
    fn timer_failure_registers_nothing() {
        let mut registry = JobRegistry::new(Arc::new(NoRuntimeTimer), Arc::new(RecordingRefresher::default()));
        let rule = CronRule::parse("0 * * * *", "").unwrap();
        assert!(matches!(registry.add_rule("http://a/x", rule), Err(ScheduleError::NoRuntime)));
        assert!(!registry.contains("http://a/x"));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn clear_stops_every_job() {
        let (timer, _, mut registry) = registry();
        registry.add("http://a/x", "0 * * * *", "").unwrap();
        registry.add("http://a/y", "0 * * * *", "").unwrap();
        registry.clear();
        assert!(registry.is_empty());
        assert!(timer.live_jobs().is_empty());
    }
}
