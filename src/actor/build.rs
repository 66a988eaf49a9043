//! Build Actor
//!
//! Turns settled file changes into change-log entries:
//!
//! ```text
//! BuildMsg::Changed → [build command] → Snapshot::capture → diff → ChangeLog
//! ```
//!
//! With a `[build] command` the actor reacts to source edits and runs the
//! build itself. Without one, another process compiles, and a write to the
//! compiler output marks the build as finished.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::messages::{BuildMsg, ChangeBatch};
use crate::config::ReloadConfig;
use crate::freshness::Snapshot;
use crate::hooks;
use crate::reload::Orchestrator;

pub struct BuildActor {
    rx: mpsc::Receiver<BuildMsg>,
    config: Arc<ReloadConfig>,
    orchestrator: Arc<Orchestrator>,
    /// Source snapshot as of the last successful build
    snapshot: Snapshot,
}

impl BuildActor {
    pub fn new(
        rx: mpsc::Receiver<BuildMsg>,
        config: Arc<ReloadConfig>,
        orchestrator: Arc<Orchestrator>,
        snapshot: Snapshot,
    ) -> Self {
        Self {
            rx,
            config,
            orchestrator,
            snapshot,
        }
    }

    pub async fn run(mut self) {
        while let Some(msg) = self.rx.recv().await {
            match msg {
                BuildMsg::Changed(batch) => self.handle(batch).await,
                BuildMsg::Shutdown => break,
            }
        }
        crate::debug!("build"; "stopped");
    }

    async fn handle(&mut self, batch: ChangeBatch) {
        if !triggers_build(&self.config, &batch) {
            return;
        }

        let config = Arc::clone(&self.config);
        let orchestrator = Arc::clone(&self.orchestrator);
        let previous = std::mem::take(&mut self.snapshot);
        let fallback = previous.clone();

        self.snapshot =
            tokio::task::spawn_blocking(move || rebuild(&config, &orchestrator, previous))
                .await
                .unwrap_or_else(|e| {
                    crate::log!("build"; "build task failed: {}", e);
                    fallback
                });
    }
}

/// Whether `batch` means a build ran or should run.
pub(crate) fn triggers_build(config: &ReloadConfig, batch: &ChangeBatch) -> bool {
    if config.build.has_command() {
        !batch.sources.is_empty()
    } else {
        !batch.outputs.is_empty()
    }
}

/// Run the build (if configured) and report what changed since `previous`.
///
/// Returns the snapshot to diff against next time. A failed build keeps
/// `previous`, so its edits are reported once a later build succeeds.
pub(crate) fn rebuild(
    config: &ReloadConfig,
    orchestrator: &Orchestrator,
    previous: Snapshot,
) -> Snapshot {
    if !hooks::run_and_report(config, orchestrator) {
        return previous;
    }

    let current = Snapshot::capture(&config.build.source_paths);
    if !orchestrator.on_build_complete(&previous, &current) {
        crate::debug!("build"; "nothing to reload");
    }
    current
}
