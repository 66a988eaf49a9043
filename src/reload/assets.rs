//! Polling detector for stylesheet changes.
//!
//! Stylesheets are not compiled and have no namespace, so they bypass the
//! snapshot differ: each poll lists files whose mtime is newer than the
//! previous poll.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use jwalk::WalkDir;

use crate::codec::split_extension;
use crate::codec::ext::path_key;
use crate::freshness::get_mtime_millis;

/// Extension the watcher reports (without the dot).
pub const ASSET_EXTENSION: &str = "css";

/// Stylesheet poller over a fixed set of directories.
#[derive(Debug)]
pub struct AssetWatcher {
    dirs: Vec<PathBuf>,
    /// Start of the previous poll, milliseconds since the Unix epoch
    last_pass: u64,
}

impl AssetWatcher {
    /// Watch `dirs`, ignoring files that already exist unmodified.
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self::with_last_pass(dirs, now_millis())
    }

    pub fn with_last_pass(dirs: Vec<PathBuf>, last_pass: u64) -> Self {
        Self { dirs, last_pass }
    }

    #[cfg(test)]
    pub fn last_pass(&self) -> u64 {
        self.last_pass
    }

    /// Stylesheets modified since the previous poll, sorted.
    ///
    /// `last_pass` advances on every call, including empty ones.
    pub fn poll(&mut self) -> Vec<PathBuf> {
        let started = now_millis();
        let since = self.last_pass;

        let mut changed: Vec<PathBuf> = self
            .dirs
            .iter()
            .filter(|dir| dir.is_dir())
            .flat_map(|dir| list_assets(dir))
            .filter(|path| get_mtime_millis(path).is_some_and(|mtime| mtime > since))
            .collect();
        changed.sort();
        changed.dedup();

        self.last_pass = started;
        if !changed.is_empty() {
            crate::debug!("assets"; "{} stylesheet(s) changed", changed.len());
        }
        changed
    }
}

/// Every non-hidden stylesheet below `dir`.
fn list_assets(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .skip_hidden(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path())
        .filter(|p| is_watched_asset(p))
        .collect()
}

fn is_watched_asset(path: &Path) -> bool {
    let key = path_key(path);
    let name = key.rsplit('/').next().unwrap_or(&key);
    if name.starts_with('.') {
        return false;
    }
    split_extension(name).1 == Some(ASSET_EXTENSION)
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::time::Duration;
    use tempfile::TempDir;

    fn write_at(path: &Path, millis: u64) {
        fs::write(path, "body {}").unwrap();
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(UNIX_EPOCH + Duration::from_millis(millis))
            .unwrap();
    }

    #[test]
    fn test_reports_newer_stylesheets() {
        let dir = TempDir::new().unwrap();
        write_at(&dir.path().join("old.css"), 1_000);
        write_at(&dir.path().join("new.css"), 5_000);

        let mut watcher = AssetWatcher::with_last_pass(vec![dir.path().to_path_buf()], 2_000);
        assert_eq!(watcher.poll(), vec![dir.path().join("new.css")]);
    }

    #[test]
    fn test_poll_advances_last_pass() {
        let dir = TempDir::new().unwrap();
        write_at(&dir.path().join("a.css"), 5_000);

        let mut watcher = AssetWatcher::with_last_pass(vec![dir.path().to_path_buf()], 0);
        assert_eq!(watcher.poll().len(), 1);
        assert!(watcher.last_pass() > 5_000);
        assert!(watcher.poll().is_empty());
    }

    #[test]
    fn test_empty_poll_still_advances() {
        let dir = TempDir::new().unwrap();
        let mut watcher = AssetWatcher::with_last_pass(vec![dir.path().to_path_buf()], 0);

        assert!(watcher.poll().is_empty());
        assert!(watcher.last_pass() > 0);
    }

    #[test]
    fn test_ignores_dotfiles_and_other_extensions() {
        let dir = TempDir::new().unwrap();
        let hidden = dir.path().join(".cache");
        fs::create_dir_all(&hidden).unwrap();
        write_at(&dir.path().join(".draft.css"), 5_000);
        write_at(&hidden.join("x.css"), 5_000);
        write_at(&dir.path().join("app.js"), 5_000);
        write_at(&dir.path().join("style.css.map"), 5_000);

        let mut watcher = AssetWatcher::with_last_pass(vec![dir.path().to_path_buf()], 0);
        assert!(watcher.poll().is_empty());
    }

    #[test]
    fn test_nested_and_missing_dirs() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("css/themes");
        fs::create_dir_all(&nested).unwrap();
        write_at(&nested.join("dark.css"), 5_000);

        let mut watcher = AssetWatcher::with_last_pass(
            vec![dir.path().join("css"), dir.path().join("missing")],
            0,
        );
        assert_eq!(watcher.poll(), vec![nested.join("dark.css")]);
    }

    #[test]
    fn test_new_watcher_skips_existing_files() {
        let dir = TempDir::new().unwrap();
        write_at(&dir.path().join("a.css"), 1_000);

        let mut watcher = AssetWatcher::new(vec![dir.path().to_path_buf()]);
        assert!(watcher.poll().is_empty());
    }
}
