//! Tracks which paths have been read in a thread, to enforce the read-before-write
//! invariant on `edit`/`multiedit`/`apply_patch` update hunks.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use dashmap::DashMap;

/// Per-thread set of paths that have been read via `read_file` this session.
///
/// Keyed by thread id (`"default"` when no thread id is available). Shared via
/// `Arc` between `ReadFileTool` (which marks paths) and the editing tools (which
/// check them) so both can be constructed independently and registered into the
/// same `AggregateToolSource`.
#[derive(Default)]
pub struct ReadTracker {
    read_paths: DashMap<String, RwLock<HashSet<PathBuf>>>,
}

impl ReadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_read(&self, thread_id: Option<&str>, path: &Path) {
        let key = thread_id.unwrap_or("default").to_string();
        let entry = self.read_paths.entry(key).or_default();
        entry.write().unwrap().insert(path.to_path_buf());
    }

    pub fn was_read(&self, thread_id: Option<&str>, path: &Path) -> bool {
        let key = thread_id.unwrap_or("default");
        self.read_paths
            .get(key)
            .map(|set| set.read().unwrap().contains(path))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unread_path_is_not_marked() {
        let tracker = ReadTracker::new();
        assert!(!tracker.was_read(Some("t1"), Path::new("/a.rs")));
    }

    #[test]
    fn mark_read_then_was_read_is_true_for_same_thread() {
        let tracker = ReadTracker::new();
        tracker.mark_read(Some("t1"), Path::new("/a.rs"));
        assert!(tracker.was_read(Some("t1"), Path::new("/a.rs")));
    }

    #[test]
    fn read_mark_is_scoped_per_thread() {
        let tracker = ReadTracker::new();
        tracker.mark_read(Some("t1"), Path::new("/a.rs"));
        assert!(!tracker.was_read(Some("t2"), Path::new("/a.rs")));
    }
}
