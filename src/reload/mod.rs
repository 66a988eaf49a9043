//! Reload Module
//!
//! Change detection and client notification for hot reload.
//!
//! # Architecture
//!
//! ```text
//! build pass --> Orchestrator --> ChangeLog --> NotificationChannel --> Browser
//!               (diff + hash)    (bounded)     (debounce + ping)
//! ```
//!
//! # Modules
//!
//! - `assets` - Stylesheet polling
//! - `channel` - Per-connection delivery loop
//! - `diff` - Snapshot diffing into changed namespaces
//! - `log` - Bounded observable change log
//! - `message` - Wire records (files-changed, css-files-changed, ...)
//! - `orchestrator` - Wires build results and connections together
//! - `report` - Compile failure and warning capture
//! - `server` - WebSocket server for client connections

pub mod assets;
pub mod channel;
pub mod diff;
pub mod log;
pub mod message;
pub mod orchestrator;
pub mod report;
pub mod server;

pub use assets::AssetWatcher;
pub use channel::ChannelOptions;
pub use diff::{ChangedUnitSet, diff};
pub use log::ChangeLog;
pub use orchestrator::Orchestrator;
pub use report::CompileFailure;
