//! Actor Message Types
//!
//! ```text
//! FsActor --BuildMsg--> BuildActor --append--> ChangeLog
//! WS accept thread --WsMsg--> WsActor --connect--> Orchestrator
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use crate::reload::server::WsConnection;

/// Settled file changes, split by where they live.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChangeBatch {
    /// Changes under `source_paths`.
    pub sources: Vec<PathBuf>,
    /// Changes to compiler output (`output_dir`, `output_to`).
    pub outputs: Vec<PathBuf>,
}

impl ChangeBatch {
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty() && self.outputs.is_empty()
    }
}

/// Messages to BuildActor
#[derive(Debug)]
pub enum BuildMsg {
    /// Debounced changes from the watcher
    Changed(ChangeBatch),
    /// Stop the actor
    Shutdown,
}

/// Messages to WsActor
pub enum WsMsg {
    /// A client finished the handshake
    AddClient(Arc<WsConnection>),
    /// Close every channel and stop
    Shutdown,
}
