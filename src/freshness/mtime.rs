//! Mtime snapshots of source directories.
//!
//! A [`Snapshot`] is the cheapest available "did the build touch this"
//! signal. It is only trusted for compiled sources; generated manifests go
//! through the content-hash tracker instead.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::UNIX_EPOCH;

use jwalk::WalkDir;
use serde::{Deserialize, Serialize};

use crate::codec::ext::{classify, path_key};

/// Path → last-modified time (milliseconds since the Unix epoch).
///
/// Snapshots are immutable once captured; the differ only ever reads a pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(BTreeMap<String, u64>);

impl Snapshot {
    /// Walk `roots` and record every compiled-unit and host-macro source.
    ///
    /// Missing roots and unreadable entries are skipped.
    pub fn capture<P: AsRef<Path>>(roots: &[P]) -> Self {
        let mut entries = BTreeMap::new();

        for root in roots {
            let root = root.as_ref();
            if !root.is_dir() {
                crate::debug!("watch"; "snapshot root missing: {}", root.display());
                continue;
            }

            let files = WalkDir::new(root)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file())
                .map(|e| e.path());

            for path in files {
                let key = path_key(&path);
                if !classify(&key).is_source() {
                    continue;
                }
                if let Some(mtime) = get_mtime_millis(&path) {
                    entries.insert(key, mtime);
                }
            }
        }

        Self(entries)
    }

    pub fn get(&self, path: &str) -> Option<u64> {
        self.0.get(path).copied()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl<S: Into<String>> FromIterator<(S, u64)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (S, u64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Get the modification time of a file in milliseconds since the Unix epoch.
///
/// Returns `None` if the file doesn't exist or mtime cannot be read.
pub fn get_mtime_millis(path: &Path) -> Option<u64> {
    let modified = path.metadata().and_then(|m| m.modified()).ok()?;
    let millis = modified.duration_since(UNIX_EPOCH).ok()?.as_millis();
    u64::try_from(millis).ok()
}
