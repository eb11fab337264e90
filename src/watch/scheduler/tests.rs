//! Tests for the watch scheduler.

use super::*;
use std::sync::atomic::AtomicBool;
use tokio::time::timeout;

use crate::error::Error;

/// Runner that records batches and fails any batch containing `bad.soy`.
#[derive(Default)]
struct Recorder {
    batches: Mutex<Vec<Vec<PathBuf>>>,
    running: AtomicBool,
    overlapped: AtomicBool,
}

fn scheduler(debounce_ms: u64, work: Duration) -> (Scheduler, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let rec = Arc::clone(&recorder);
    let runner: PassRunner = Arc::new(move |batch: Vec<PathBuf>| {
        let rec = Arc::clone(&rec);
        Box::pin(async move {
            if rec.running.swap(true, Ordering::SeqCst) {
                rec.overlapped.store(true, Ordering::SeqCst);
            }
            tokio::time::sleep(work).await;
            let failed = batch.iter().any(|p| p.ends_with("bad.soy"));
            rec.batches.lock().push(batch);
            rec.running.store(false, Ordering::SeqCst);
            if failed {
                Err(Error::load("bad.soy", "syntax error"))
            } else {
                Ok(())
            }
        }) as PassFuture
    });
    let (tx, _) = broadcast::channel(16);
    (
        Scheduler::new(Duration::from_millis(debounce_ms), runner, tx),
        recorder,
    )
}

async fn next(rx: &mut broadcast::Receiver<PassOutcome>) -> PassOutcome {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("pass finished in time")
        .expect("channel open")
}

fn paths(names: &[&str]) -> Vec<PathBuf> {
    names.iter().map(|n| PathBuf::from(format!("/src/{n}"))).collect()
}

#[tokio::test]
async fn test_burst_becomes_one_pass() {
    let (scheduler, recorder) = scheduler(300, Duration::from_millis(20));
    let mut rx = scheduler.subscribe();

    for path in paths(&["c.soy", "a.soy", "b.soy"]) {
        assert!(scheduler.on_change(&path));
    }

    let outcome = next(&mut rx).await;
    assert!(outcome.is_success());
    assert_eq!(outcome.files, paths(&["a.soy", "b.soy", "c.soy"]));

    // The other two spawned advances find nothing left to do.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(scheduler.passes(), 1);
    assert_eq!(recorder.batches.lock().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_burst_on_worker_threads_becomes_one_pass() {
    let names = ["a.soy", "b.soy", "c.soy", "d.soy", "e.soy"];
    for _ in 0..20 {
        let (scheduler, recorder) = scheduler(300, Duration::ZERO);
        let mut rx = scheduler.subscribe();

        for path in paths(&names) {
            assert!(scheduler.on_change(&path));
        }

        assert_eq!(next(&mut rx).await.files, paths(&names));
        tokio::time::sleep(SETTLE * 2).await;
        assert_eq!(scheduler.passes(), 1);
        assert_eq!(recorder.batches.lock().len(), 1);
    }
}

#[tokio::test]
async fn test_pass_waits_for_settle() {
    let (scheduler, _recorder) = scheduler(300, Duration::ZERO);
    let mut rx = scheduler.subscribe();
    let start = std::time::Instant::now();
    scheduler.on_change(Path::new("/src/a.soy"));
    next(&mut rx).await;
    assert!(start.elapsed() >= SETTLE);
}

#[tokio::test]
async fn test_duplicate_notification_debounced() {
    let (scheduler, recorder) = scheduler(300, Duration::ZERO);
    let mut rx = scheduler.subscribe();
    let a = PathBuf::from("/src/a.soy");

    assert!(scheduler.on_change(&a));
    assert!(!scheduler.on_change(&a));

    next(&mut rx).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(scheduler.passes(), 1);
    assert_eq!(*recorder.batches.lock(), vec![vec![a]]);
}

#[tokio::test]
async fn test_spaced_notifications_are_separate_passes() {
    let (scheduler, recorder) = scheduler(20, Duration::ZERO);
    let mut rx = scheduler.subscribe();
    let a = PathBuf::from("/src/a.soy");

    assert!(scheduler.on_change(&a));
    next(&mut rx).await;
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert!(scheduler.on_change(&a));
    next(&mut rx).await;

    assert_eq!(scheduler.passes(), 2);
    assert_eq!(recorder.batches.lock().len(), 2);
}

#[tokio::test]
async fn test_change_during_pass_waits_for_it() {
    let (scheduler, recorder) = scheduler(300, Duration::from_millis(200));
    let mut rx = scheduler.subscribe();

    scheduler.on_change(Path::new("/src/a.soy"));
    // Let the first pass settle and claim `a`.
    tokio::time::sleep(SETTLE + Duration::from_millis(55)).await;
    scheduler.on_change(Path::new("/src/b.soy"));
    scheduler.on_change(Path::new("/src/c.soy"));

    assert_eq!(next(&mut rx).await.files, paths(&["a.soy"]));
    assert_eq!(next(&mut rx).await.files, paths(&["b.soy", "c.soy"]));
    assert!(!recorder.overlapped.load(Ordering::SeqCst));
    assert_eq!(scheduler.passes(), 2);
}

#[tokio::test]
async fn test_failed_pass_does_not_stop_scheduling() {
    let (scheduler, _recorder) = scheduler(300, Duration::ZERO);
    let mut rx = scheduler.subscribe();

    scheduler.on_change(Path::new("/src/bad.soy"));
    let failed = next(&mut rx).await;
    assert!(!failed.is_success());
    assert!(failed.error.unwrap().contains("syntax error"));

    scheduler.on_change(Path::new("/src/good.soy"));
    assert!(next(&mut rx).await.is_success());
}
