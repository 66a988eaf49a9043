//! `snapshot` and `diff`: run the change detector by hand.
//!
//! ```text
//! nsreload snapshot > before.json
//! # edit, rebuild
//! nsreload snapshot > after.json
//! nsreload diff before.json after.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::ReloadConfig;
use crate::freshness::Snapshot;
use crate::reload::{ChangedUnitSet, diff};

/// Print the namespaces that differ between two snapshot files.
pub fn diff_snapshots(old: &Path, new: &Path) -> Result<()> {
    for namespace in diff_files(old, new)? {
        println!("{}", namespace);
    }
    Ok(())
}

/// Print a snapshot of `dirs` (or the configured source paths) as JSON.
pub fn print_snapshot(dirs: &[PathBuf], config: &ReloadConfig) -> Result<()> {
    println!("{}", snapshot_json(dirs, config)?);
    Ok(())
}

fn diff_files(old: &Path, new: &Path) -> Result<ChangedUnitSet> {
    let old = read_snapshot(old)?;
    let new = read_snapshot(new)?;
    Ok(diff(&old, &new))
}

fn read_snapshot(path: &Path) -> Result<Snapshot> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid snapshot {}", path.display()))
}

fn snapshot_json(dirs: &[PathBuf], config: &ReloadConfig) -> Result<String> {
    let roots = if dirs.is_empty() {
        config.build.source_paths.as_slice()
    } else {
        dirs
    };
    let snapshot = Snapshot::capture(roots);
    crate::debug!("snapshot"; "{} sources", snapshot.len());
    serde_json::to_string_pretty(&snapshot).context("Failed to serialize snapshot")
}
