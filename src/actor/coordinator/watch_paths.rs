use std::path::PathBuf;

use rustc_hash::FxHashSet;

use crate::config::ReloadConfig;

/// Roots the FsActor watches: every source path plus the directory the
/// compiler writes its main file into.
pub(super) fn collect_watch_roots(config: &ReloadConfig) -> Vec<PathBuf> {
    let mut paths = config.build.source_paths.clone();

    let output_root = config
        .build
        .output_to
        .parent()
        .map_or_else(|| config.build.output_dir.clone(), |p| p.to_path_buf());
    if !paths.contains(&output_root) {
        paths.push(output_root);
    }

    dedupe_nested(&mut paths);
    paths
}

/// Drop roots that sit inside another root; recursive watches already
/// cover them.
fn dedupe_nested(paths: &mut Vec<PathBuf>) {
    let all = paths.clone();
    let mut seen = FxHashSet::default();
    paths.retain(|path| {
        let nested = all
            .iter()
            .any(|other| other != path && path.starts_with(other));
        !nested && seen.insert(path.clone())
    });
}
