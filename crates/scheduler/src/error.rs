/// Errors from building or registering scheduled jobs.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("invalid cron expression '{pattern}': {source}")]
    InvalidCron {
        pattern: String,
        #[source]
        source: cron::error::Error,
    },

    #[error("cron expression '{0}' never fires")]
    NeverFires(String),

    #[error("unknown timezone '{0}'")]
    UnknownTimezone(String),

    /// A job is already registered for this URL; callers must remove it first.
    #[error("job already registered for '{0}'")]
    DuplicateJob(String),

    #[error("no async runtime available to drive the job")]
    NoRuntime,
}
