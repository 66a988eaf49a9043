//! Actor System for the Reload Server
//!
//! Message-passing concurrency for `serve`:
//!
//! ```text
//! FsActor --> BuildActor --> ChangeLog --> NotificationChannel --> client
//! (watch)     (build+diff)      ^                  ^
//! AssetActor (css poll) --------+                  |
//! WsActor (new clients) ---------------------------+
//! ```
//!
//! # Module Structure
//!
//! - `messages` - Message types for inter-actor communication
//! - `fs` - File system watcher with debouncing
//! - `build` - Build command, snapshot and diff
//! - `assets` - Stylesheet polling
//! - `ws` - Client registration
//! - `coordinator` - Wires up and runs actors

pub mod assets;
pub mod build;
pub mod coordinator;
pub mod fs;
pub mod messages;
pub mod ws;

pub use coordinator::Coordinator;
