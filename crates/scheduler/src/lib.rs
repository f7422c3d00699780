//! Cron-driven recurring jobs, one per configured source.
//!
//! - [`CronRule`]: normalized cron expression bound to an IANA timezone
//! - [`Timer`]: the timer seam (`schedule(rule, callback) -> Result<JobHandle>`)
//! - [`TokioTimer`]: production timer on the tokio runtime
//! - [`ManualTimer`]: timer that only fires when told to, for tests
//! - [`JobRegistry`]: source URL → live job, with add/remove

pub mod error;
pub mod manual;
pub mod registry;
pub mod rule;
pub mod timer;

pub use error::ScheduleError;
pub use manual::ManualTimer;
pub use registry::{JobInfo, JobRegistry};
pub use rule::{normalize_cron, CronRule};
pub use timer::{JobCallback, JobHandle, Timer, TokioTimer};
