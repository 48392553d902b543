//! End-of-batch cleanup.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Name of the per-batch working directory.
pub const TMP_DIR: &str = "tmp";

/// Where raw downloads whose conversion failed are kept.
pub const UNCONVERTED_DIR: &str = "unconverted";

/// What a cleanup pass removed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CleanupStats {
    pub removed_tmp: bool,
    pub removed_empty: usize,
}

/// Delete `<batch_root>/tmp` and every zero-byte file under `batch_root`.
///
/// Individual removal failures are logged and skipped.
pub fn cleanup(batch_root: &Path) -> CleanupStats {
    let mut stats = CleanupStats::default();

    let tmp = batch_root.join(TMP_DIR);
    if tmp.is_dir() {
        match std::fs::remove_dir_all(&tmp) {
            Ok(()) => stats.removed_tmp = true,
            Err(e) => warn!("Could not remove {:?}: {}", tmp, e),
        }
    }

    for entry in WalkDir::new(batch_root).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let empty = entry.metadata().map(|m| m.len() == 0).unwrap_or(false);
        if !empty {
            continue;
        }
        match std::fs::remove_file(entry.path()) {
            Ok(()) => {
                debug!("Removed empty file {:?}", entry.path());
                stats.removed_empty += 1;
            }
            Err(e) => warn!("Could not remove {:?}: {}", entry.path(), e),
        }
    }

    stats
}

/// Runs [`cleanup`] when dropped, on every exit path of a batch.
#[derive(Debug)]
pub struct CleanupGuard {
    root: PathBuf,
}

impl CleanupGuard {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        let stats = cleanup(&self.root);
        debug!(
            "Cleanup of {:?}: tmp removed = {}, empty files removed = {}",
            self.root, stats.removed_tmp, stats.removed_empty
        );
    }
}
