use std::path::{Path, PathBuf};

use notify::EventKind;
use notify::event::ModifyKind;
use rustc_hash::FxHashMap;

use crate::actor::messages::ChangeBatch;

/// What happened to a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ChangeKind {
    Created,
    Modified,
    Removed,
}

impl ChangeKind {
    /// Map a notify event kind. Metadata-only changes are ignored: the
    /// compiler touching mtimes on outputs would otherwise loop.
    pub(super) fn from_event(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(Self::Created),
            EventKind::Remove(_) => Some(Self::Removed),
            EventKind::Modify(ModifyKind::Metadata(_)) => None,
            EventKind::Modify(_) => Some(Self::Modified),
            _ => None,
        }
    }

    /// Fold a later change for the same path into this one.
    ///
    /// `None` means the path ends up as if nothing happened (created, then
    /// removed again inside one window).
    pub(super) fn then(self, next: Self) -> Option<Self> {
        match (self, next) {
            (Self::Removed, Self::Created | Self::Modified) => Some(next),
            (Self::Modified, Self::Removed) => Some(Self::Removed),
            (Self::Created, Self::Removed) => None,
            (current, _) => Some(current),
        }
    }

    pub(super) fn label(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Removed => "removed",
        }
    }
}

/// Where the watcher looks, and how a changed path is classified.
#[derive(Debug, Clone)]
pub(super) struct WatchLayout {
    pub(super) source_paths: Vec<PathBuf>,
    pub(super) output_dir: PathBuf,
    pub(super) output_to: PathBuf,
}

impl WatchLayout {
    fn is_output(&self, path: &Path) -> bool {
        path == self.output_to || path.starts_with(&self.output_dir)
    }

    fn is_source(&self, path: &Path) -> bool {
        self.source_paths.iter().any(|root| path.starts_with(root))
    }

    /// Whether a change to `path` can matter to a build.
    ///
    /// The output watch root is the parent of `output_to`, which may hold
    /// unrelated files (index.html, other builds).
    pub(super) fn contains(&self, path: &Path) -> bool {
        self.is_output(path) || self.is_source(path)
    }

    /// Split settled changes into sources and outputs, sorted.
    ///
    /// Output wins when a source root contains the output directory.
    /// Paths outside both are dropped.
    pub(super) fn classify(&self, changes: FxHashMap<PathBuf, ChangeKind>) -> ChangeBatch {
        let mut batch = ChangeBatch::default();

        for (path, kind) in changes {
            crate::debug!("watch"; "{} {}", kind.label(), path.display());
            if self.is_output(&path) {
                batch.outputs.push(path);
            } else if self.is_source(&path) {
                batch.sources.push(path);
            }
        }

        batch.sources.sort();
        batch.outputs.sort();
        batch
    }
}
