//! `[assets]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [assets]
//! css_dirs = ["resources/public/css"]
//! poll_ms = 250
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Stylesheet polling settings. No directories means no polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    pub css_dirs: Vec<PathBuf>,
    pub poll_ms: u64,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            css_dirs: Vec::new(),
            poll_ms: 250,
        }
    }
}

impl AssetsConfig {
    pub fn is_enabled(&self) -> bool {
        !self.css_dirs.is_empty()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_ms.max(1))
    }

    pub(crate) fn resolve_paths(&mut self, root: &Path) {
        self.css_dirs = self
            .css_dirs
            .iter()
            .map(|p| crate::config::resolve_path(root, p))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::config::test_parse_config;

    #[test]
    fn test_assets_disabled_by_default() {
        let config = test_parse_config("");
        assert!(!config.assets.is_enabled());
        assert_eq!(config.assets.poll_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_assets_enabled() {
        let config = test_parse_config("[assets]\ncss_dirs = [\"resources/public/css\"]\npoll_ms = 0");
        assert!(config.assets.is_enabled());
        assert_eq!(config.assets.poll_interval(), Duration::from_millis(1));
    }
}
