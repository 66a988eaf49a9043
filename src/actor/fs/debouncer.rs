use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use jwalk::WalkDir;
use rustc_hash::FxHashMap;

use super::types::{ChangeKind, WatchLayout};
use crate::actor::messages::ChangeBatch;

/// Quiet period after the last event before a batch is released.
pub(super) const DEBOUNCE_MS: u64 = 300;
/// Minimum spacing between two batches, so one build's output burst is
/// not split across rebuilds.
pub(super) const REBUILD_COOLDOWN_MS: u64 = 800;

const IDLE: Duration = Duration::from_secs(86400);

/// Collects changes under the watch layout until they settle.
pub(super) struct Debouncer {
    layout: WatchLayout,
    pub(super) changes: FxHashMap<PathBuf, ChangeKind>,
    pub(super) last_event: Option<Instant>,
    pub(super) last_batch: Option<Instant>,
}

impl Debouncer {
    pub(super) fn new(layout: WatchLayout) -> Self {
        Self {
            layout,
            changes: FxHashMap::default(),
            last_event: None,
            last_batch: None,
        }
    }

    pub(super) fn add_event(&mut self, event: &notify::Event) {
        let Some(kind) = ChangeKind::from_event(&event.kind) else {
            return;
        };

        crate::debug!("watch"; "raw notify: {:?} {:?}", event.kind, event.paths);

        for path in &event.paths {
            self.record(path, kind);
        }
    }

    /// Report every file under a root that was attached late as created.
    ///
    /// Returns how many files were found.
    pub(super) fn record_tree(&mut self, root: &Path) -> usize {
        let files: Vec<PathBuf> = WalkDir::new(root)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| e.path())
            .collect();

        for file in &files {
            self.record(file, ChangeKind::Created);
        }
        files.len()
    }

    /// Fold one path change into the pending set.
    ///
    /// Temp files and paths outside the layout are dropped. Every kept
    /// change restarts the settle window, even when it folds into an
    /// existing entry.
    fn record(&mut self, path: &Path, kind: ChangeKind) {
        if is_temp_file(path) {
            return;
        }

        let path = normalize_event_path(path);
        if !self.layout.contains(&path) {
            return;
        }

        let merged = match self.changes.get(&path) {
            Some(&existing) => existing.then(kind),
            None => Some(kind),
        };

        match merged {
            Some(merged) => {
                crate::debug!("watch"; "{} {}", merged.label(), path.display());
                self.changes.insert(path, merged);
            }
            None => {
                crate::debug!("watch"; "discard created+removed: {}", path.display());
                self.changes.remove(&path);
            }
        }
        self.last_event = Some(Instant::now());
    }

    /// Classified batch of settled changes, once the window and the
    /// cooldown have both elapsed.
    pub(super) fn take_batch(&mut self) -> Option<ChangeBatch> {
        if !self.is_ready() {
            return None;
        }

        let changes = std::mem::take(&mut self.changes);
        self.last_event = None;

        let batch = self.layout.classify(changes);
        if batch.is_empty() {
            return None;
        }

        self.last_batch = Some(Instant::now());
        Some(batch)
    }

    /// When the pending changes may be released, if there are any.
    fn ready_at(&self) -> Option<Instant> {
        if self.changes.is_empty() {
            return None;
        }
        let last_event = self.last_event?;
        let settled = last_event + Duration::from_millis(DEBOUNCE_MS);

        Some(match self.last_batch {
            Some(last) => settled.max(last + Duration::from_millis(REBUILD_COOLDOWN_MS)),
            None => settled,
        })
    }

    pub(super) fn is_ready(&self) -> bool {
        self.ready_at().is_some_and(|at| Instant::now() >= at)
    }

    /// How long the actor may sleep before a batch could become ready.
    pub(super) fn sleep_duration(&self) -> Duration {
        self.ready_at().map_or(IDLE, |at| {
            at.saturating_duration_since(Instant::now())
                .max(Duration::from_millis(1))
        })
    }
}

/// Editor artifacts and dotfiles never trigger a rebuild.
pub(super) fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

/// Canonicalize through the parent so removed files still match the
/// canonical layout paths.
fn normalize_event_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => parent
            .canonicalize()
            .map_or_else(|_| path.to_path_buf(), |p| p.join(name)),
        _ => path.to_path_buf(),
    }
}
