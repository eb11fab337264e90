//! Change watching for compiled sources.
//!
//! ```text
//! notify thread ──std mpsc──> bridge thread ──tokio mpsc──> event task
//!                                                              │
//!                                     registered file? ────────┴─> Scheduler::on_change
//! ```

mod debounce;
mod scheduler;

pub use debounce::Debouncer;
pub use scheduler::{PassFuture, PassOutcome, PassRunner, Scheduler};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher, event::ModifyKind};
use parking_lot::Mutex;
use rustc_hash::FxHashSet;

use crate::utils::path::normalize_path;
use crate::{debug, log};

/// The set of watched source files of one compiler.
///
/// Dropping the set stops the watcher and its event task.
pub struct WatchSet {
    watcher: Mutex<RecommendedWatcher>,
    registered: Arc<Mutex<FxHashSet<PathBuf>>>,
}

impl WatchSet {
    /// Start a watcher feeding `scheduler`. Must be called inside a tokio runtime.
    pub fn new(scheduler: Scheduler) -> notify::Result<Self> {
        let (notify_tx, notify_rx) = std::sync::mpsc::channel();
        let watcher = notify::recommended_watcher(move |res| {
            let _ = notify_tx.send(res);
        })?;

        let (async_tx, mut async_rx) = tokio::sync::mpsc::channel::<notify::Event>(64);
        std::thread::spawn(move || {
            while let Ok(result) = notify_rx.recv() {
                match result {
                    Ok(event) => {
                        if async_tx.blocking_send(event).is_err() {
                            break;
                        }
                    }
                    Err(e) => log!("watch"; "notify error: {}", e),
                }
            }
        });

        let registered = Arc::new(Mutex::new(FxHashSet::default()));
        let task_registered = Arc::clone(&registered);
        tokio::spawn(async move {
            while let Some(event) = async_rx.recv().await {
                for path in changed_paths(&event) {
                    if task_registered.lock().contains(&path) {
                        scheduler.on_change(&path);
                    }
                }
            }
        });

        Ok(Self {
            watcher: Mutex::new(watcher),
            registered,
        })
    }

    /// Start watching `path`. Returns `false` if it was already watched or
    /// the watch could not be set up (logged).
    pub fn register(&self, path: &Path) -> bool {
        let path = normalize_path(path);
        if self.registered.lock().contains(&path) {
            return false;
        }
        if let Err(e) = self.watcher.lock().watch(&path, RecursiveMode::NonRecursive) {
            log!("watch"; "cannot watch {}: {}", path.display(), e);
            return false;
        }
        debug!("watch"; "watching {}", path.display());
        self.registered.lock().insert(path);
        true
    }

    pub fn is_registered(&self, path: &Path) -> bool {
        self.registered.lock().contains(&normalize_path(path))
    }

    /// Watched files, sorted.
    pub fn files(&self) -> Vec<PathBuf> {
        let mut files: Vec<_> = self.registered.lock().iter().cloned().collect();
        files.sort();
        files
    }
}

/// Paths whose content may have changed. Metadata-only events are ignored.
fn changed_paths(event: &notify::Event) -> Vec<PathBuf> {
    match event.kind {
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Create(_) | EventKind::Modify(_) => {
            event.paths.iter().map(|p| normalize_path(p)).collect()
        }
        _ => Vec::new(),
    }
}
