//! Loads the sources file into the [`SyncService`] and optionally watches it.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use gridcache_core::load_sources_file;
use gridcache_sync::{ReconcileReport, SyncError, SyncService};

/// Quiet period before a burst of file events is applied as one reload.
const DEBOUNCE: Duration = Duration::from_millis(250);

/// Read `path` and apply it. A parse or validation error leaves the current
/// configuration in place.
pub async fn apply_file(path: &Path, sync: &SyncService) -> Result<ReconcileReport, SyncError> {
    let list = load_sources_file(path)?;
    info!(path = %path.display(), sources = list.len(), "applying sources file");
    sync.apply(list).await
}

/// Keeps the filesystem watcher and its reload task alive.
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl Drop for ConfigWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Watch `path` and re-apply it on every change.
///
/// The parent directory is watched so editors that replace the file on save
/// are still picked up.
pub fn watch(path: &Path, sync: Arc<SyncService>) -> notify::Result<ConfigWatcher> {
    let path = path.to_path_buf();
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let file_name = path.file_name().map(|n| n.to_os_string());

    let (tx, rx) = mpsc::unbounded_channel::<()>();
    let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
        match res {
            Ok(event) => {
                let touches_file = event
                    .paths
                    .iter()
                    .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                if touches_file && (event.kind.is_create() || event.kind.is_modify()) {
                    let _ = tx.send(());
                }
            }
            Err(e) => warn!(error = %e, "sources watcher error"),
        }
    })?;
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;
    info!(path = %path.display(), "watching sources file for changes");

    let task = tokio::spawn(reload_loop(path, sync, rx));
    Ok(ConfigWatcher {
        _watcher: watcher,
        task,
    })
}

async fn reload_loop(path: PathBuf, sync: Arc<SyncService>, mut rx: mpsc::UnboundedReceiver<()>) {
    while rx.recv().await.is_some() {
        // Coalesce the burst a single save produces.
        loop {
            match tokio::time::timeout(DEBOUNCE, rx.recv()).await {
                Ok(Some(())) => continue,
                Ok(None) => return,
                Err(_) => break,
            }
        }

        match apply_file(&path, &sync).await {
            Ok(report) => info!(
                path = %path.display(),
                added = report.added.len(),
                rescheduled = report.rescheduled.len(),
                removed = report.removed.len(),
                failed = report.failed.len(),
                "hot-reloaded sources file"
            ),
            Err(SyncError::ShutDown) => return,
            Err(e) => error!(
                path = %path.display(),
                error = %e,
                "failed to reload sources file, keeping previous configuration"
            ),
        }
    }
}
