//! A [`Timer`] that fires only when told to.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::error::ScheduleError;
use crate::rule::CronRule;
use crate::timer::{JobCallback, JobHandle, Timer};

struct ManualJob {
    id: Uuid,
    rule: CronRule,
    callback: JobCallback,
    cancelled: Arc<AtomicBool>,
}

/// Records every scheduled job and runs callbacks on [`ManualTimer::fire_all`].
///
/// Cancelled jobs stay recorded but never fire again.
#[derive(Default, Clone)]
pub struct ManualTimer {
    jobs: Arc<Mutex<Vec<ManualJob>>>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    fn live(&self) -> Vec<(Uuid, CronRule, JobCallback)> {
        let jobs = match self.jobs.lock() {
            Ok(jobs) => jobs,
            Err(poisoned) => poisoned.into_inner(),
        };
        jobs.iter()
            .filter(|job| !job.cancelled.load(Ordering::Acquire))
            .map(|job| (job.id, job.rule.clone(), Arc::clone(&job.callback)))
            .collect()
    }

    /// Fire every live job once. Returns how many fired.
    pub fn fire_all(&self) -> usize {
        let live = self.live();
        for (_, _, callback) in &live {
            callback();
        }
        live.len()
    }

    /// Fire the live job with `id`, if any.
    pub fn fire(&self, id: Uuid) -> bool {
        match self.live().into_iter().find(|(job_id, _, _)| *job_id == id) {
            Some((_, _, callback)) => {
                callback();
                true
            }
            None => false,
        }
    }

    /// Ids and rules of jobs that have not been cancelled.
    pub fn live_jobs(&self) -> Vec<(Uuid, CronRule)> {
        self.live()
            .into_iter()
            .map(|(id, rule, _)| (id, rule))
            .collect()
    }

    /// Total number of `schedule` calls ever made, cancelled ones included.
    pub fn scheduled_count(&self) -> usize {
        match self.jobs.lock() {
            Ok(jobs) => jobs.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

impl Timer for ManualTimer {
    fn schedule(&self, rule: CronRule, callback: JobCallback) -> Result<JobHandle, ScheduleError> {
        let id = Uuid::new_v4();
        let cancelled = Arc::new(AtomicBool::new(false));
        let job = ManualJob {
            id,
            rule,
            callback,
            cancelled: Arc::clone(&cancelled),
        };
        match self.jobs.lock() {
            Ok(mut jobs) => jobs.push(job),
            Err(poisoned) => poisoned.into_inner().push(job),
        }
        Ok(JobHandle::for_flag(id, cancelled))
    }
}

impl std::fmt::Debug for ManualTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualTimer")
            .field("live_jobs", &self.live_jobs().len())
            .finish()
    }
}
