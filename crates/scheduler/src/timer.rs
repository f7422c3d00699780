//! Timer seam and the tokio-backed production timer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::task::AbortHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ScheduleError;
use crate::rule::CronRule;

/// Work run on every firing. Must return quickly; long work should be spawned.
pub type JobCallback = Arc<dyn Fn() + Send + Sync>;

/// Schedules callbacks on cron rules.
///
/// A scheduled job first fires at the rule's next tick after `schedule` is
/// called; scheduling never fires immediately. On error nothing was scheduled.
pub trait Timer: Send + Sync {
    fn schedule(&self, rule: CronRule, callback: JobCallback) -> Result<JobHandle, ScheduleError>;
}

/// Owner handle of one scheduled job. Cancelling (or dropping) the handle
/// stops all future firings. A callback already running is not interrupted.
pub struct JobHandle {
    id: Uuid,
    cancelled: Arc<AtomicBool>,
    task: Option<AbortHandle>,
}

impl JobHandle {
    /// Handle for a job driven by a tokio task.
    pub fn for_task(id: Uuid, cancelled: Arc<AtomicBool>, task: AbortHandle) -> Self {
        Self {
            id,
            cancelled,
            task: Some(task),
        }
    }

    /// Handle whose only effect is flipping `cancelled`.
    pub fn for_flag(id: Uuid, cancelled: Arc<AtomicBool>) -> Self {
        Self {
            id,
            cancelled,
            task: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Stop the job. No further firings happen after this returns.
    pub fn cancel(self) {
        drop(self);
    }

    fn stop(&mut self) {
        self.cancelled.store(true, Ordering::Release);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for JobHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("id", &self.id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// [`Timer`] that runs each job as a sleeping tokio task.
///
/// `schedule` fails with [`ScheduleError::NoRuntime`] outside a tokio runtime.
#[derive(Debug, Default, Clone)]
pub struct TokioTimer;

impl TokioTimer {
    pub fn new() -> Self {
        Self
    }
}

impl Timer for TokioTimer {
    fn schedule(&self, rule: CronRule, callback: JobCallback) -> Result<JobHandle, ScheduleError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| ScheduleError::NoRuntime)?;
        let id = Uuid::new_v4();
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);

        let task = runtime.spawn(async move {
            let mut last_tick = Utc::now();
            loop {
                // Never fire the same tick twice if the wall clock lags the sleep.
                let now = Utc::now().max(last_tick);
                let Some(next) = rule.next_after(now) else {
                    warn!(job_id = %id, rule = %rule, "cron rule has no upcoming fire time, stopping job");
                    break;
                };
                let wait = (next - Utc::now()).to_std().unwrap_or_default();
                tokio::time::sleep(wait).await;

                if flag.load(Ordering::Acquire) {
                    break;
                }
                debug!(job_id = %id, tick = %next, "job fired");
                last_tick = next;
                callback();
            }
        });

        Ok(JobHandle::for_task(id, cancelled, task.abort_handle()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use super::*;

    fn every_second() -> CronRule {
        CronRule::parse("* * * * * *", "UTC").unwrap()
    }

    fn counting_callback() -> (Arc<AtomicUsize>, JobCallback) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        (count, Arc::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }))
    }

    #[tokio::test]
    async fn does_not_fire_on_schedule() {
        let (count, callback) = counting_callback();
        let _handle = TokioTimer::new().schedule(CronRule::parse("0 0 1 1 *", "UTC").unwrap(), callback).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fires_on_each_tick() {
        let (count, callback) = counting_callback();
        let _handle = TokioTimer::new().schedule(every_second(), callback).unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while count.load(Ordering::SeqCst) < 2 {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("two firings within five seconds");
    }

    #[tokio::test]
    async fn cancelled_job_stops_firing() {
        let (count, callback) = counting_callback();
        let handle = TokioTimer::new().schedule(every_second(), callback).unwrap();
        assert!(!handle.is_cancelled());

        tokio::time::timeout(Duration::from_secs(5), async {
            while count.load(Ordering::SeqCst) < 1 {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("first firing");

        handle.cancel();
        let after_cancel = count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(2_200)).await;
        assert_eq!(count.load(Ordering::SeqCst), after_cancel);
    }

    #[test]
    fn scheduling_outside_a_runtime_fails() {
        let (_, callback) = counting_callback();
        let err = TokioTimer::new().schedule(every_second(), callback).unwrap_err();
        assert!(matches!(err, ScheduleError::NoRuntime));
    }
}
