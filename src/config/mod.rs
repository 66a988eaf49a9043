//! Server configuration for `nsreload.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # [server], [build], [assets]
//! ├── error          # ConfigError
//! └── mod.rs         # ReloadConfig (this file)
//! ```
//!
//! Every section is optional; a missing config file yields all defaults.
//! Relative paths are resolved against the directory holding the config
//! file, and `serve` flags override whatever the file says.

mod error;
pub mod section;

pub use error::ConfigError;
pub use section::{AssetsConfig, BuildConfig, ServerConfig};

use crate::cli::{Cli, ServeArgs};
use crate::codec::UrlMapper;
use crate::codec::ext::path_key;
use crate::log;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing nsreload.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReloadConfig {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root directory - parent of config file (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    pub server: ServerConfig,

    pub build: BuildConfig,

    pub assets: AssetsConfig,
}

impl ReloadConfig {
    /// Load configuration for the parsed command line.
    ///
    /// Searches upward from cwd for the config file. The project root is
    /// the config file's parent directory, or cwd when there is no file.
    pub fn load(cli: &Cli) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current working directory")?;
        let (config_path, exists) = match find_config_file(&cli.config) {
            Some(path) => (path, true),
            None => (cwd.join(&cli.config), false),
        };

        let mut config = if exists {
            Self::from_path(&config_path)?
        } else {
            crate::debug!("config"; "{} not found, using defaults", cli.config.display());
            Self::default()
        };

        let root = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or(cwd);
        config.config_path = config_path;
        config.finalize(&root);

        if let Some(args) = cli.serve_args() {
            config.apply_serve_args(args);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file path, warning about unknown fields.
    fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }

        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {}, ignoring:", display_path);
        for field in fields {
            eprintln!("- {}", field);
        }
    }

    /// Get the root directory path
    pub fn get_root(&self) -> &Path {
        &self.root
    }

    /// Set the root directory path and resolve every configured path
    /// against it.
    pub fn finalize(&mut self, root: &Path) {
        let root = normalize_path(root);
        self.build.resolve_paths(&root);
        self.assets.resolve_paths(&root);
        if !self.config_path.as_os_str().is_empty() {
            self.config_path = normalize_path(&self.config_path);
        }
        self.root = root;
    }

    // ========================================================================
    // cli configuration updates
    // ========================================================================

    /// Apply serve-specific options.
    pub fn apply_serve_args(&mut self, args: &ServeArgs) {
        Self::update_option(&mut self.server.interface, args.interface.as_ref());
        Self::update_option(&mut self.server.port, args.port.as_ref());
        Self::update_option(&mut self.server.debounce_ms, args.debounce_ms.as_ref());
    }

    /// Update config option if CLI value is provided.
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    // ========================================================================
    // validation
    // ========================================================================

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("[server] port must be non-zero".into()));
        }
        if !self.server.ws_path.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "[server] ws_path must start with `/`, got `{}`",
                self.server.ws_path
            )));
        }
        if self.build.source_paths.is_empty() {
            return Err(ConfigError::Validation(
                "[build] source_paths must not be empty".into(),
            ));
        }
        for dir in &self.build.source_paths {
            if !dir.exists() {
                log!("warning"; "source path does not exist: {}", dir.display());
            }
        }
        Ok(())
    }

    // ========================================================================
    // derived views
    // ========================================================================

    pub fn url_mapper(&self) -> UrlMapper {
        let resources: Vec<String> = self
            .build
            .resource_paths
            .iter()
            .map(|p| path_key(p))
            .collect();
        UrlMapper::new(
            &resources,
            &self.server.http_server_root,
            &path_key(&self.build.output_dir),
        )
    }
}

/// Resolve `path` against `root` unless it is already absolute.
pub(crate) fn resolve_path(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize_path(path)
    } else {
        normalize_path(&root.join(path))
    }
}

/// Canonicalize if the path exists, otherwise make it absolute.
fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
        }
    })
}

/// Find config file by searching upward from current directory
///
/// ```text
/// /home/user/app/src/app/  ← cwd
/// /home/user/app/nsreload.toml  ← found!
/// ```
fn find_config_file(config_name: &Path) -> Option<PathBuf> {
    if config_name.is_absolute() {
        return config_name.exists().then(|| config_name.to_path_buf());
    }

    let cwd = std::env::current_dir().ok()?;
    let mut current = cwd.as_path();
    loop {
        let candidate = current.join(config_name);
        if candidate.exists() {
            return Some(candidate);
        }
        current = current.parent()?;
    }
}

// ============================================================================
// Test Helpers (available to all modules via `use crate::config::test_*`)
// ============================================================================

/// Parse config, panicking on unknown fields to catch typos in tests.
#[cfg(test)]
pub fn test_parse_config(content: &str) -> ReloadConfig {
    let (parsed, ignored) = ReloadConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

// ============================================================================
// tests
// ============================================================================
