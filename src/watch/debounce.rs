use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;

/// Per-file change filter.
///
/// A notification is accepted when at least `threshold` has passed since the
/// last accepted notification for the same file. Rejected notifications do
/// not move the window.
#[derive(Debug)]
pub struct Debouncer {
    threshold: Duration,
    last_accepted: FxHashMap<PathBuf, Instant>,
}

impl Debouncer {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            last_accepted: FxHashMap::default(),
        }
    }

    pub fn accept(&mut self, path: &Path, now: Instant) -> bool {
        if let Some(last) = self.last_accepted.get(path)
            && now.saturating_duration_since(*last) < self.threshold
        {
            return false;
        }
        self.last_accepted.insert(path.to_path_buf(), now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn test_rapid_duplicates_rejected() {
        let mut debouncer = Debouncer::new(300 * MS);
        let t0 = Instant::now();
        let a = Path::new("/src/a.soy");

        assert!(debouncer.accept(a, t0));
        assert!(!debouncer.accept(a, t0 + 10 * MS));
        assert!(!debouncer.accept(a, t0 + 299 * MS));
        assert!(debouncer.accept(a, t0 + 300 * MS));
    }

    #[test]
    fn test_rejection_does_not_extend_window() {
        let mut debouncer = Debouncer::new(300 * MS);
        let t0 = Instant::now();
        let a = Path::new("/src/a.soy");

        assert!(debouncer.accept(a, t0));
        assert!(!debouncer.accept(a, t0 + 250 * MS));
        assert!(debouncer.accept(a, t0 + 350 * MS));
    }

    #[test]
    fn test_files_are_independent() {
        let mut debouncer = Debouncer::new(300 * MS);
        let t0 = Instant::now();
        assert!(debouncer.accept(Path::new("/src/a.soy"), t0));
        assert!(debouncer.accept(Path::new("/src/b.soy"), t0 + MS));
    }

    #[test]
    fn test_zero_threshold_accepts_everything() {
        let mut debouncer = Debouncer::new(Duration::ZERO);
        let t0 = Instant::now();
        let a = Path::new("/src/a.soy");
        assert!(debouncer.accept(a, t0));
        assert!(debouncer.accept(a, t0));
    }
}
