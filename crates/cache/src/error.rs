/// Errors from cache store operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("record with empty key in batch for namespace '{0}'")]
    EmptyKey(String),

    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("backend error: {0}")]
    Backend(String),
}
