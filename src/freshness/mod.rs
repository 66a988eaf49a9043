//! Freshness detection: content-hash (blake3) for dependency manifests,
//! mtime snapshots for compiled sources.

mod hash;
pub mod mtime;
mod tracker;

pub use mtime::{Snapshot, get_mtime_millis};
pub use tracker::ContentHashTracker;
