//! Actor Coordinator - Wires up the Reload Actor System
//!
//! The Coordinator is a thin orchestrator that:
//! - Starts the WebSocket endpoint
//! - Seeds the freshness baselines
//! - Wires up actors and runs them until shutdown

mod runtime;
mod watch_paths;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use crossbeam::channel::Receiver;
use tokio::sync::mpsc;

use super::assets::AssetActor;
use super::build::BuildActor;
use super::fs::FsActor;
use super::messages::{BuildMsg, WsMsg};
use super::ws::WsActor;
use crate::config::ReloadConfig;
use crate::freshness::Snapshot;
use crate::hooks;
use crate::reload::server::start_ws_server;
use crate::reload::{AssetWatcher, ChangeLog, Orchestrator};
use runtime::Actors;

const CHANNEL_BUFFER: usize = 32;

/// Coordinator - wires up and runs the actor system.
pub struct Coordinator {
    config: Arc<ReloadConfig>,
    shutdown_rx: Option<Receiver<()>>,
}

impl Coordinator {
    pub fn with_config(config: Arc<ReloadConfig>) -> Self {
        Self {
            config,
            shutdown_rx: None,
        }
    }

    /// Set shutdown signal receiver.
    pub fn with_shutdown_signal(mut self, rx: Receiver<()>) -> Self {
        self.shutdown_rx = Some(rx);
        self
    }

    /// Run the actor system.
    pub async fn run(mut self) -> Result<()> {
        let config = Arc::clone(&self.config);
        let (build_tx, build_rx) = mpsc::channel::<BuildMsg>(CHANNEL_BUFFER);
        let (ws_tx, ws_rx) = mpsc::channel::<WsMsg>(CHANNEL_BUFFER);

        let orchestrator = Arc::new(Orchestrator::new(
            Arc::new(ChangeLog::new()),
            config.url_mapper(),
            config.build.dependency_files(),
            config.server.channel_options(),
        ));

        let server = &config.server;
        let port = start_ws_server(server.interface, server.port, &server.ws_path, ws_tx.clone())?;
        crate::log!(
            "serve";
            "listening on ws://{}{}",
            SocketAddr::new(server.interface, port),
            server.ws_path
        );

        // Watcher before baseline: edits made while we snapshot are buffered
        let roots = watch_paths::collect_watch_roots(&config);
        let fs_actor = FsActor::new(roots, &config, build_tx.clone())
            .map_err(|e| anyhow::anyhow!("watcher failed: {}", e))?;

        let snapshot = initial_build(&config, &orchestrator).await;
        crate::debug!("watch"; "baseline: {} sources", snapshot.len());

        let assets = config.assets.is_enabled().then(|| {
            AssetActor::new(
                AssetWatcher::new(config.assets.css_dirs.clone()),
                config.assets.poll_interval(),
                Arc::clone(&orchestrator),
            )
        });

        let actors = Actors {
            fs: fs_actor,
            build: BuildActor::new(
                build_rx,
                Arc::clone(&config),
                Arc::clone(&orchestrator),
                snapshot,
            ),
            ws: WsActor::new(ws_rx, Arc::clone(&orchestrator)),
            assets,
        };

        crate::debug!("actor"; "start");
        let shutdown_rx = self.shutdown_rx.take();
        runtime::run_actors(actors, build_tx, ws_tx, shutdown_rx).await?;

        crate::debug!("actor"; "stopped");
        Ok(())
    }
}

/// Seed dependency hashes, run the build command once if configured, and
/// capture the baseline snapshot.
async fn initial_build(config: &Arc<ReloadConfig>, orchestrator: &Arc<Orchestrator>) -> Snapshot {
    let config = Arc::clone(config);
    let orchestrator = Arc::clone(orchestrator);
    let sources = config.build.source_paths.clone();

    let task = tokio::task::spawn_blocking(move || {
        if config.build.has_command() && hooks::run_and_report(&config, &orchestrator) {
            crate::logger::status_success("initial build complete");
        }
        orchestrator.seed_dependencies();
        Snapshot::capture(&config.build.source_paths)
    });

    match task.await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            crate::log!("build"; "initial build failed: {}", e);
            Snapshot::capture(&sources)
        }
    }
}
