//! Tracking of output files that are not finalized yet

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// A path that may hold a partially written file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedPath {
    pub path: PathBuf,
    /// Empty while the transfer is in flight
    pub error: String,
    /// Set once this run created the file, only then is it ours to delete
    pub created: bool,
}

/// Ordered map from in-flight output path to error detail
///
/// A path is present from the moment its worker is prepared until the file
/// is complete. Entries of failed songs stay to report the failure; those
/// whose file was created by this run are also marked for cleanup. Clones
/// share the same state.
#[derive(Debug, Clone, Default)]
pub struct FailureTracker {
    entries: Arc<Mutex<Vec<TrackedPath>>>,
}

impl FailureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<TrackedPath>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Mark `path` as in flight
    pub fn register(&self, path: &Path) {
        let mut entries = self.lock();
        match entries.iter_mut().find(|e| e.path == path) {
            Some(entry) => entry.error.clear(),
            None => entries.push(TrackedPath {
                path: path.to_path_buf(),
                error: String::new(),
                created: false,
            }),
        }
        debug!("Tracking {}", path.display());
    }

    /// The worker created the file at `path`; ignored if the path is not tracked
    pub fn mark_created(&self, path: &Path) {
        if let Some(entry) = self.lock().iter_mut().find(|e| e.path == path) {
            entry.created = true;
        }
    }

    /// Record why `path` failed; ignored if the path is not tracked
    pub fn record_failure(&self, path: &Path, error: impl Into<String>) {
        if let Some(entry) = self.lock().iter_mut().find(|e| e.path == path) {
            entry.error = error.into();
        }
    }

    /// The file at `path` is complete, stop tracking it
    pub fn complete(&self, path: &Path) {
        self.lock().retain(|e| e.path != path);
        debug!("Finished {}", path.display());
    }

    /// Copy of the current entries in registration order
    pub fn snapshot(&self) -> Vec<TrackedPath> {
        self.lock().clone()
    }
}

#[cfg(test)]
impl FailureTracker {
    pub fn contains(&self, path: &Path) -> bool {
        self.lock().iter().any(|e| e.path == path)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
