//! `[build]` section configuration.
//!
//! Describes where the external compiler reads sources and writes output.
//!
//! # Example
//!
//! ```toml
//! [build]
//! source_paths = ["src"]
//! resource_paths = ["resources"]
//! output_dir = "resources/public/js/compiled/out"
//! output_to = "resources/public/js/compiled/main.js"
//! command = ["lein", "cljsbuild", "once", "dev"]
//! ```
//!
//! Without `command` the compiler is expected to run on its own (e.g. an
//! auto-build in another terminal).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Compiler layout and optional build command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Directories holding compiled-unit and macro sources.
    pub source_paths: Vec<PathBuf>,

    /// Directories whose `http_server_root` subdirectory is served at `/`.
    pub resource_paths: Vec<PathBuf>,

    /// Compiler output directory for per-namespace files.
    pub output_dir: PathBuf,

    /// Main compiled file.
    pub output_to: PathBuf,

    /// Build command argv. `$NSRELOAD_*` variables are expanded.
    pub command: Option<Vec<String>>,

    /// Generated dependency manifests (content-hash tracked).
    /// Defaults to `output_to`, `<output_dir>/goog/deps.js` and
    /// `<output_dir>/cljs_deps.js`.
    pub dependency_files: Option<Vec<PathBuf>>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            source_paths: vec!["src".into()],
            resource_paths: vec!["resources".into()],
            output_dir: "resources/public/js/compiled/out".into(),
            output_to: "resources/public/js/compiled/main.js".into(),
            command: None,
            dependency_files: None,
        }
    }
}

impl BuildConfig {
    /// Configured dependency manifests, or the compiler's default set.
    pub fn dependency_files(&self) -> Vec<PathBuf> {
        match &self.dependency_files {
            Some(files) => files.clone(),
            None => vec![
                self.output_to.clone(),
                self.output_dir.join("goog").join("deps.js"),
                self.output_dir.join("cljs_deps.js"),
            ],
        }
    }

    /// Whether a build command is configured.
    pub fn has_command(&self) -> bool {
        self.command.as_ref().is_some_and(|c| !c.is_empty())
    }

    /// Resolve every path against `root`.
    pub(crate) fn resolve_paths(&mut self, root: &Path) {
        let resolve = |p: &Path| crate::config::resolve_path(root, p);

        self.source_paths = self.source_paths.iter().map(|p| resolve(p)).collect();
        self.resource_paths = self.resource_paths.iter().map(|p| resolve(p)).collect();
        self.output_dir = resolve(&self.output_dir);
        self.output_to = resolve(&self.output_to);
        if let Some(files) = self.dependency_files.take() {
            self.dependency_files = Some(files.iter().map(|p| resolve(p)).collect());
        }
    }
}
