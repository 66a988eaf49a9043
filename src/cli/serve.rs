//! `serve`: run the change notification service until Ctrl+C.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam::channel;

use crate::actor::Coordinator;
use crate::config::ReloadConfig;
use crate::core::register_shutdown;

pub fn serve(config: ReloadConfig) -> Result<()> {
    let config = Arc::new(config);

    let (shutdown_tx, shutdown_rx) = channel::unbounded::<()>();
    register_shutdown(shutdown_tx);

    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    let result = rt.block_on(
        Coordinator::with_config(config)
            .with_shutdown_signal(shutdown_rx)
            .run(),
    );

    // Blocking build tasks may still be running the external command
    rt.shutdown_timeout(Duration::from_secs(2));
    result
}
