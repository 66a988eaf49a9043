//! Asset Actor
//!
//! Polls the configured stylesheet directories and appends
//! `css-files-changed` when any stylesheet was written since the last pass.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::reload::{AssetWatcher, Orchestrator};

pub struct AssetActor {
    watcher: AssetWatcher,
    interval: Duration,
    orchestrator: Arc<Orchestrator>,
}

impl AssetActor {
    pub fn new(watcher: AssetWatcher, interval: Duration, orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            watcher,
            interval,
            orchestrator,
        }
    }

    /// Poll forever; the coordinator aborts the task on shutdown.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.poll_once();
        }
    }

    /// One polling pass. Returns whether an event was appended.
    fn poll_once(&mut self) -> bool {
        let changed = self.watcher.poll();
        if changed.is_empty() {
            return false;
        }
        self.orchestrator.on_assets_changed(&changed);
        true
    }
}
