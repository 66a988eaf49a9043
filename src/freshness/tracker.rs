//! Content-hash change tracking for generated dependency manifests.
//!
//! Dependency manifests are rewritten on every build, so their mtime says
//! nothing. A manifest counts as changed only when its content hash differs
//! from the last one observed.

use dashmap::DashMap;
use std::path::Path;

use super::hash::{ContentHash, compute_file_hash};
use crate::codec::ext::path_key;

/// Last observed content hash per file (thread-safe).
///
/// Each update is a single map insert, so concurrent checks of the same path
/// never lose a write.
#[derive(Debug, Default)]
pub struct ContentHashTracker {
    hashes: DashMap<String, ContentHash>,
}

impl ContentHashTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether `path` changed since it was last observed, recording
    /// its current hash.
    ///
    /// A missing or unreadable file is reported unchanged and leaves the
    /// store untouched. A path never observed before is reported changed.
    pub fn has_changed(&self, path: &Path) -> bool {
        let Some(hash) = compute_file_hash(path) else {
            return false;
        };
        let previous = self.hashes.insert(path_key(path), hash);
        previous != Some(hash)
    }

    /// Record the current hash of every existing path without reporting.
    ///
    /// Called at startup so the first build does not flag every manifest.
    pub fn seed_baseline<I, P>(&self, paths: I)
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        for path in paths {
            let path = path.as_ref();
            if let Some(hash) = compute_file_hash(path) {
                crate::debug!("hash"; "baseline {} = {}", path.display(), hash);
                self.hashes.insert(path_key(path), hash);
            }
        }
    }

    /// Last recorded hash for `path`.
    #[cfg(test)]
    pub fn get(&self, path: &Path) -> Option<ContentHash> {
        self.hashes.get(&path_key(path)).map(|r| *r)
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }
}
