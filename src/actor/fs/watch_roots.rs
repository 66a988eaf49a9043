use std::path::PathBuf;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};

/// One watched directory and whether the watcher currently holds it.
struct Root {
    path: PathBuf,
    attached: bool,
}

/// Keeps the source and output roots attached to the watcher.
///
/// The compiled output directory usually does not exist until the first
/// build, and `lein clean` deletes it again. Roots that are missing are
/// attached by [`WatchRoots::maintain`] once they appear; roots that vanish
/// are detached so they can be attached afresh.
pub(super) struct WatchRoots {
    roots: Vec<Root>,
}

impl WatchRoots {
    pub(super) fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            roots: paths
                .into_iter()
                .map(|path| Root {
                    path,
                    attached: false,
                })
                .collect(),
        }
    }

    /// Attach every root that exists now. Returns how many were attached.
    ///
    /// Files already present are covered by the initial snapshot, so
    /// nothing is reported for them.
    pub(super) fn attach_existing(
        &mut self,
        watcher: &mut RecommendedWatcher,
    ) -> notify::Result<usize> {
        for root in &mut self.roots {
            if !root.path.is_dir() {
                crate::debug!("watch"; "not yet present: {}", root.path.display());
                continue;
            }
            watcher.watch(&root.path, RecursiveMode::Recursive)?;
            root.attached = true;
        }

        Ok(self.attached_count())
    }

    /// Detach vanished roots and attach the ones that have appeared.
    ///
    /// Returns the roots attached by this call. Whatever they already hold
    /// was written while nobody was watching.
    pub(super) fn maintain(&mut self, watcher: &mut RecommendedWatcher) -> Vec<PathBuf> {
        let mut appeared = Vec::new();

        for root in &mut self.roots {
            let present = root.path.is_dir();
            match (root.attached, present) {
                (true, false) => {
                    // inotify drops the watch itself; others may not
                    let _ = watcher.unwatch(&root.path);
                    root.attached = false;
                    crate::debug!("watch"; "detached: {}", root.path.display());
                }
                (false, true) => match watcher.watch(&root.path, RecursiveMode::Recursive) {
                    Ok(()) => {
                        root.attached = true;
                        crate::debug!("watch"; "attached: {}", root.path.display());
                        appeared.push(root.path.clone());
                    }
                    Err(e) => crate::debug!("watch"; "attach {} failed: {}", root.path.display(), e),
                },
                _ => {}
            }
        }

        appeared
    }

    pub(super) fn attached_count(&self) -> usize {
        self.roots.iter().filter(|root| root.attached).count()
    }
}
