//! FileSystem Actor
//!
//! Watches source and output roots and sends settled changes to the
//! BuildActor.
//!
//! ```text
//! Watcher → Debouncer (settle window) → WatchLayout (classify) → BuildMsg
//! ```
//!
//! The watcher is created before the initial snapshot is taken, so edits
//! made during startup are buffered rather than lost. Roots that do not
//! exist yet (the output directory before the first build) are picked up
//! on a maintenance tick, and whatever they already hold is reported as
//! created.

use std::path::PathBuf;
use std::time::Duration;

use notify::RecommendedWatcher;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use super::messages::BuildMsg;
use crate::config::ReloadConfig;

// Settle-window timing and per-path folding.
mod debouncer;
// Change kinds and source/output classification.
mod types;
// Watch root attach/re-attach lifecycle.
mod watch_roots;

/// How often missing roots are checked for.
const MAINTAIN_INTERVAL: Duration = Duration::from_millis(500);


use debouncer::Debouncer;
use types::WatchLayout;
use watch_roots::WatchRoots;

/// FileSystem Actor - watches for file changes
pub struct FsActor {
    /// Channel to receive notify events (sync -> async bridge)
    notify_rx: std::sync::mpsc::Receiver<notify::Result<notify::Event>>,
    /// Watcher handle (must be kept alive)
    watcher: RecommendedWatcher,
    watch_roots: WatchRoots,
    build_tx: mpsc::Sender<BuildMsg>,
    debouncer: Debouncer,
}

impl FsActor {
    /// Start watching `roots` immediately.
    pub fn new(
        roots: Vec<PathBuf>,
        config: &ReloadConfig,
        build_tx: mpsc::Sender<BuildMsg>,
    ) -> notify::Result<Self> {
        let (notify_tx, notify_rx) = std::sync::mpsc::channel();

        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = notify_tx.send(res);
        })?;

        let mut watch_roots = WatchRoots::new(roots);
        let attached = watch_roots.attach_existing(&mut watcher)?;
        crate::debug!("watch"; "{} roots attached", attached);

        Ok(Self {
            notify_rx,
            watcher,
            watch_roots,
            build_tx,
            debouncer: Debouncer::new(WatchLayout {
                source_paths: config.build.source_paths.clone(),
                output_dir: config.build.output_dir.clone(),
                output_to: config.build.output_to.clone(),
            }),
        })
    }

    /// Run the actor event loop until the BuildActor goes away.
    pub async fn run(self) {
        let Self {
            notify_rx,
            mut watcher,
            mut watch_roots,
            build_tx,
            mut debouncer,
        } = self;

        let (async_tx, mut async_rx) = mpsc::channel::<notify::Event>(64);

        std::thread::spawn(move || {
            while let Ok(result) = notify_rx.recv() {
                match result {
                    Ok(event) => {
                        if async_tx.blocking_send(event).is_err() {
                            break;
                        }
                    }
                    Err(e) => crate::log!("watch"; "notify error: {}", e),
                }
            }
        });

        let mut maintain = tokio::time::interval(MAINTAIN_INTERVAL);
        maintain.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                Some(event) = async_rx.recv() => debouncer.add_event(&event),
                _ = maintain.tick() => {
                    for root in watch_roots.maintain(&mut watcher) {
                        let found = debouncer.record_tree(&root);
                        crate::debug!("watch"; "{} files already in {}", found, root.display());
                    }
                }
                _ = tokio::time::sleep(debouncer.sleep_duration()) => {
                    if process_changes(&mut debouncer, &build_tx).await.is_err() {
                        break;
                    }
                }
            }
        }
    }
}

/// Forward settled changes.
///
/// Returns `Err(())` if the BuildActor shut down.
async fn process_changes(
    debouncer: &mut Debouncer,
    build_tx: &mpsc::Sender<BuildMsg>,
) -> Result<(), ()> {
    let Some(batch) = debouncer.take_batch() else {
        return Ok(());
    };

    crate::debug!(
        "watch";
        "settled: {} source, {} output",
        batch.sources.len(),
        batch.outputs.len()
    );
    build_tx.send(BuildMsg::Changed(batch)).await.map_err(|_| ())
}
