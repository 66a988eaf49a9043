//! Glue between build results, the change log and client channels.
//!
//! The orchestrator owns nothing the core needs to be tested in isolation:
//! it only composes the differ, hash tracker and log, and keeps the list of
//! open channels for shutdown.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

use super::channel::{ChannelOptions, Connection, NotificationChannel};
use super::diff::diff;
use super::log::ChangeLog;
use super::message::{ChangeEvent, FileRef};
use super::report::{CompileFailure, report_compile_failure, report_compile_warning};
use crate::codec::UrlMapper;
use crate::codec::ext::path_key;
use crate::freshness::{ContentHashTracker, Snapshot};

pub struct Orchestrator {
    log: Arc<ChangeLog>,
    hashes: ContentHashTracker,
    urls: UrlMapper,
    dependency_files: Vec<PathBuf>,
    channel_options: ChannelOptions,
    channels: Mutex<Vec<NotificationChannel>>,
}

impl Orchestrator {
    pub fn new(
        log: Arc<ChangeLog>,
        urls: UrlMapper,
        dependency_files: Vec<PathBuf>,
        channel_options: ChannelOptions,
    ) -> Self {
        Self {
            log,
            hashes: ContentHashTracker::new(),
            urls,
            dependency_files,
            channel_options,
            channels: Mutex::new(Vec::new()),
        }
    }

    #[cfg(test)]
    pub fn log(&self) -> &Arc<ChangeLog> {
        &self.log
    }

    /// Record the current dependency manifest hashes as the baseline.
    pub fn seed_dependencies(&self) {
        self.hashes.seed_baseline(&self.dependency_files);
        crate::debug!("build"; "seeded {} dependency file(s)", self.hashes.len());
    }

    /// Files the client must reload after a build pass.
    ///
    /// Changed dependency manifests come first, then compiled namespaces in
    /// identifier order.
    pub fn changed_files(&self, old: &Snapshot, new: &Snapshot) -> Vec<FileRef> {
        let dependencies = self
            .dependency_files
            .iter()
            .filter(|path| self.hashes.has_changed(path))
            .map(|path| FileRef::dependency(self.urls.served_url(&path_key(path))));

        let namespaces = diff(old, new)
            .into_iter()
            .map(|id| FileRef::namespace(self.urls.compiled_asset_url(&id), id));

        dependencies.chain(namespaces).collect()
    }

    /// Build completion hook. Appends `files-changed` unless nothing changed.
    ///
    /// Returns whether an event was appended.
    pub fn on_build_complete(&self, old: &Snapshot, new: &Snapshot) -> bool {
        let files = self.changed_files(old, new);
        if files.is_empty() {
            crate::debug!("build"; "no namespaces changed");
            return false;
        }

        let namespaces = files.iter().filter(|f| !f.is_dependency_file).count();
        crate::logger::status_success(&format!(
            "{} namespace{} changed",
            namespaces,
            if namespaces == 1 { "" } else { "s" }
        ));
        self.log.append(ChangeEvent::files_changed(files));
        true
    }

    pub fn on_compile_error(&self, failure: CompileFailure) {
        report_compile_failure(&self.log, failure);
    }

    pub fn on_compile_warning(&self, message: impl Into<String>) {
        report_compile_warning(&self.log, message);
    }

    /// Stylesheet poll result. Empty input appends nothing.
    pub fn on_assets_changed(&self, paths: &[PathBuf]) {
        if paths.is_empty() {
            return;
        }

        let files: Vec<FileRef> = paths
            .iter()
            .map(|p| FileRef::asset(self.urls.served_url(&path_key(p))))
            .collect();
        for file in &files {
            crate::log!("assets"; "{}", file.path);
        }
        self.log.append(ChangeEvent::css_files_changed(files));
    }

    /// Open a notification channel for a new client.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(&self, conn: Arc<dyn Connection>) -> NotificationChannel {
        let channel = NotificationChannel::open(conn, Arc::clone(&self.log), self.channel_options);

        let mut channels = self.channels.lock();
        channels.retain(|c| !c.is_closed());
        channels.push(channel.clone());
        crate::debug!("ws"; "{} client(s) connected", channels.len());

        channel
    }

    /// Number of channels still open.
    #[cfg(test)]
    pub fn open_channels(&self) -> usize {
        let mut channels = self.channels.lock();
        channels.retain(|c| !c.is_closed());
        channels.len()
    }

    /// Close every open channel.
    pub fn close_all(&self) {
        let channels: Vec<_> = self.channels.lock().drain(..).collect();
        for channel in channels {
            channel.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reload::channel::MemoryConnection;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        orchestrator: Orchestrator,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let root = path_key(dir.path());
            let out = dir.path().join("resources/public/js/out");
            fs::create_dir_all(&out).unwrap();
            fs::write(out.join("cljs_deps.js"), "goog.addDependency('a');").unwrap();

            let urls = UrlMapper::new(
                &[format!("{root}/resources")],
                "public",
                &format!("{root}/resources/public/js/out"),
            );
            let orchestrator = Orchestrator::new(
                Arc::new(ChangeLog::new()),
                urls,
                vec![out.join("cljs_deps.js"), out.join("missing.js")],
                ChannelOptions::default(),
            );
            Self { dir, orchestrator }
        }

        fn source(&self, name: &str, body: &str) -> String {
            let path = self.dir.path().join("src").join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, body).unwrap();
            path_key(&path)
        }

        fn deps(&self) -> PathBuf {
            self.dir.path().join("resources/public/js/out/cljs_deps.js")
        }
    }

    fn snap(entries: &[(&str, u64)]) -> Snapshot {
        entries.iter().map(|(p, t)| (*p, *t)).collect()
    }

    #[test]
    fn test_namespace_change_appends_files_changed() {
        let fx = Fixture::new();
        fx.orchestrator.seed_dependencies();
        let core = fx.source("app/core.cljs", "(ns app.core)");

        let appended = fx
            .orchestrator
            .on_build_complete(&snap(&[(core.as_str(), 1)]), &snap(&[(core.as_str(), 2)]));

        assert!(appended);
        let head = fx.orchestrator.log().head().unwrap();
        assert_eq!(
            *head,
            ChangeEvent::files_changed(vec![FileRef::namespace(
                "/js/out/app/core.js",
                "app.core"
            )])
        );
    }

    #[test]
    fn test_unchanged_dependency_not_reported() {
        let fx = Fixture::new();
        fx.orchestrator.seed_dependencies();

        // Rewritten with identical content: mtime moves, hash does not
        fs::write(fx.deps(), "goog.addDependency('a');").unwrap();
        let s = snap(&[]);

        assert!(!fx.orchestrator.on_build_complete(&s, &s));
        assert!(fx.orchestrator.log().is_empty());
    }

    #[test]
    fn test_changed_dependency_comes_first() {
        let fx = Fixture::new();
        fx.orchestrator.seed_dependencies();
        let core = fx.source("app/core.cljs", "(ns app.core)");
        fs::write(fx.deps(), "goog.addDependency('b');").unwrap();

        let files = fx
            .orchestrator
            .changed_files(&snap(&[(core.as_str(), 1)]), &snap(&[(core.as_str(), 2)]));

        assert_eq!(
            files,
            vec![
                FileRef::dependency("/js/out/cljs_deps.js"),
                FileRef::namespace("/js/out/app/core.js", "app.core"),
            ]
        );
    }

    #[test]
    fn test_unseeded_dependency_counts_as_changed() {
        let fx = Fixture::new();
        let s = snap(&[]);

        let files = fx.orchestrator.changed_files(&s, &s);
        assert_eq!(files, vec![FileRef::dependency("/js/out/cljs_deps.js")]);
        assert!(fx.orchestrator.changed_files(&s, &s).is_empty());
    }

    #[test]
    fn test_assets_and_reports() {
        let fx = Fixture::new();
        let css = fx.dir.path().join("resources/public/css/site.css");

        fx.orchestrator.on_assets_changed(&[]);
        assert!(fx.orchestrator.log().is_empty());

        fx.orchestrator.on_assets_changed(&[css]);
        fx.orchestrator.on_compile_warning("careful");
        fx.orchestrator
            .on_compile_error(CompileFailure::new("error", "boom"));

        let events = fx.orchestrator.log().events();
        assert_eq!(events[0].name(), "compile-failed");
        assert_eq!(events[1].name(), "compile-warning");
        assert_eq!(
            *events[2],
            ChangeEvent::css_files_changed(vec![FileRef::asset("/css/site.css")])
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_connected_clients_receive_build_results() {
        let fx = Fixture::new();
        fx.orchestrator.seed_dependencies();
        let core = fx.source("app/core.cljs", "(ns app.core)");

        let conn = MemoryConnection::new();
        fx.orchestrator.connect(conn.clone());
        tokio::task::yield_now().await;

        fx.orchestrator
            .on_build_complete(&snap(&[(core.as_str(), 1)]), &snap(&[(core.as_str(), 2)]));
        tokio::time::sleep(Duration::from_millis(50)).await;

        let events = conn.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name(), "files-changed");
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_all() {
        let fx = Fixture::new();
        let a = MemoryConnection::new();
        let b = MemoryConnection::new();
        let channel = fx.orchestrator.connect(a.clone());
        fx.orchestrator.connect(b.clone());
        assert_eq!(fx.orchestrator.open_channels(), 2);

        channel.close();
        assert_eq!(fx.orchestrator.open_channels(), 1);

        fx.orchestrator.close_all();
        assert_eq!(fx.orchestrator.open_channels(), 0);
        assert_eq!(fx.orchestrator.log().observer_count(), 0);
        assert!(!a.is_open() && !b.is_open());
    }
}
