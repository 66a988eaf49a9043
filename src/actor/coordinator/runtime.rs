use std::time::Duration;

use anyhow::Result;
use crossbeam::channel::Receiver;
use tokio::sync::mpsc;

use crate::actor::assets::AssetActor;
use crate::actor::build::BuildActor;
use crate::actor::fs::FsActor;
use crate::actor::messages::{BuildMsg, WsMsg};
use crate::actor::ws::WsActor;

/// Every actor the coordinator runs.
pub(super) struct Actors {
    pub(super) fs: FsActor,
    pub(super) build: BuildActor,
    pub(super) ws: WsActor,
    pub(super) assets: Option<AssetActor>,
}

/// Run all actors concurrently until shutdown.
pub(super) async fn run_actors(
    actors: Actors,
    build_tx: mpsc::Sender<BuildMsg>,
    ws_tx: mpsc::Sender<WsMsg>,
    shutdown_rx: Option<Receiver<()>>,
) -> Result<()> {
    let Actors {
        fs,
        build,
        ws,
        assets,
    } = actors;

    let mut fs_handle = tokio::spawn(async move { fs.run().await });
    let mut build_handle = tokio::spawn(async move { build.run().await });
    let ws_handle = tokio::spawn(async move { ws.run().await });
    let assets_handle = assets.map(|actor| tokio::spawn(async move { actor.run().await }));

    if let Some(rx) = shutdown_rx {
        loop {
            if rx.try_recv().is_ok() {
                crate::debug!("actor"; "shutdown signal received");
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    } else {
        tokio::select! {
            _ = &mut fs_handle => {}
            _ = &mut build_handle => {}
        }
    }

    fs_handle.abort();
    if let Some(handle) = assets_handle {
        handle.abort();
    }

    let _ = build_tx.send(BuildMsg::Shutdown).await;
    crate::debug!("actor"; "closing client channels");
    let _ = ws_tx.send(WsMsg::Shutdown).await;

    let _ = tokio::time::timeout(Duration::from_millis(500), ws_handle).await;
    let _ = tokio::time::timeout(Duration::from_millis(500), build_handle).await;

    Ok(())
}
