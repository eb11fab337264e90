//! Serialized recompile passes.
//!
//! ```text
//! on_change(a) ─┐                       ┌─ pass [a, b] ─┐
//! on_change(b) ─┼─> dirty set ─> queue ─┤               ├─> PassOutcome
//! on_change(a)  │  (debounced away)     └─ (empty: no-op)┘
//! ```
//!
//! At most one `advance` is scheduled at a time. It waits for the queue,
//! lets the burst settle, then claims the whole dirty set. A change that
//! lands after the claim schedules the next `advance`; one that finds the
//! set already claimed does nothing. Passes therefore never overlap and each
//! accepted change is compiled by exactly one pass.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use tokio::sync::broadcast;

use super::debounce::Debouncer;
use crate::error::Result;
use crate::logger::{status_error, status_success};
use crate::{debug, log};

/// Quiet time before a scheduled pass claims the dirty set.
const SETTLE: Duration = Duration::from_millis(25);

pub type PassFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

/// Runs one recompile pass over the given absolute paths.
pub type PassRunner = Arc<dyn Fn(Vec<PathBuf>) -> PassFuture + Send + Sync>;

/// Result of one watch-triggered pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassOutcome {
    /// Files the pass recompiled, sorted.
    pub files: Vec<PathBuf>,
    /// Error message when the pass failed.
    pub error: Option<String>,
}

impl PassOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Debounced, serialized change dispatch. Cheap to clone.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

struct Inner {
    debouncer: Mutex<Debouncer>,
    dirty: Mutex<FxHashSet<PathBuf>>,
    /// An `advance` is waiting to claim the dirty set.
    scheduled: AtomicBool,
    queue: tokio::sync::Mutex<()>,
    runner: PassRunner,
    events: broadcast::Sender<PassOutcome>,
    passes: AtomicUsize,
}

impl Scheduler {
    pub fn new(debounce: Duration, runner: PassRunner, events: broadcast::Sender<PassOutcome>) -> Self {
        Self {
            inner: Arc::new(Inner {
                debouncer: Mutex::new(Debouncer::new(debounce)),
                dirty: Mutex::new(FxHashSet::default()),
                scheduled: AtomicBool::new(false),
                queue: tokio::sync::Mutex::new(()),
                runner,
                events,
                passes: AtomicUsize::new(0),
            }),
        }
    }

    /// Record a change to `path` and schedule a pass.
    ///
    /// Must be called from within a tokio runtime. Returns `false` when the
    /// notification was debounced away.
    pub fn on_change(&self, path: &Path) -> bool {
        if !self.inner.debouncer.lock().accept(path, Instant::now()) {
            debug!("watch"; "debounced {}", path.display());
            return false;
        }

        self.inner.dirty.lock().insert(path.to_path_buf());
        if !self.inner.scheduled.swap(true, Ordering::SeqCst) {
            tokio::spawn(advance(Arc::clone(&self.inner)));
        }
        true
    }

    /// Number of passes started so far.
    pub fn passes(&self) -> usize {
        self.inner.passes.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PassOutcome> {
        self.inner.events.subscribe()
    }
}

async fn advance(inner: Arc<Inner>) {
    let _running = inner.queue.lock().await;
    tokio::time::sleep(SETTLE).await;

    // Cleared before the claim: a change inserted after it schedules anew.
    inner.scheduled.store(false, Ordering::SeqCst);
    let mut batch: Vec<PathBuf> = std::mem::take(&mut *inner.dirty.lock())
        .into_iter()
        .collect();
    if batch.is_empty() {
        return;
    }
    batch.sort();

    inner.passes.fetch_add(1, Ordering::SeqCst);
    log!("watch"; "recompiling {} changed file(s)", batch.len());

    let error = match (inner.runner)(batch.clone()).await {
        Ok(()) => {
            status_success(&format!("recompiled {} file(s)", batch.len()));
            None
        }
        Err(e) => {
            status_error("recompile failed", &e.to_string());
            Some(e.to_string())
        }
    };

    // No subscribers is fine.
    let _ = inner.events.send(PassOutcome {
        files: batch,
        error,
    });
}

#[cfg(test)]
mod tests;
