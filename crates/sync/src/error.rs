use thiserror::Error;

use gridcache_core::ConfigError;

/// Errors returned by [`SyncService::apply`](crate::SyncService::apply).
#[derive(Error, Debug)]
pub enum SyncError {
    /// The submitted list failed validation; nothing was changed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("sync service has been shut down")]
    ShutDown,
}
