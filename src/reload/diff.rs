//! Snapshot diffing: which namespaces did a build pass touch?
//!
//! Compares two mtime snapshots and maps the differing sources to namespace
//! identifiers. A changed host-macro source escalates to every compiled unit,
//! since a macro can expand into any of them.

use std::collections::BTreeSet;
use std::path::Path;

use crate::codec::{ExtensionClass, classify, derive_namespace};
use crate::freshness::Snapshot;

/// Namespace identifiers affected by a build pass.
pub type ChangedUnitSet = BTreeSet<String>;

/// Differing source paths, grouped by extension class.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ChangeGroups<'a> {
    pub compiled: Vec<&'a str>,
    pub macros: Vec<&'a str>,
}

/// Paths present in either snapshot whose mtimes differ, grouped by class.
///
/// A path missing from one side counts as differing.
pub fn changed_paths<'a>(old: &'a Snapshot, new: &'a Snapshot) -> ChangeGroups<'a> {
    let all: BTreeSet<&str> = old.paths().chain(new.paths()).collect();

    let mut groups = ChangeGroups::default();
    for path in all {
        if old.get(path) == new.get(path) {
            continue;
        }
        match classify(path) {
            ExtensionClass::CompiledUnit => groups.compiled.push(path),
            ExtensionClass::HostMacro => groups.macros.push(path),
            ExtensionClass::Other => {}
        }
    }
    groups
}

/// Compiled-unit paths the client must reload after this pass.
pub fn affected_paths<'a>(old: &'a Snapshot, new: &'a Snapshot) -> Vec<&'a str> {
    let groups = changed_paths(old, new);
    if groups.macros.is_empty() {
        return groups.compiled;
    }

    crate::debug!("diff"; "macro sources changed: {:?}", groups.macros);
    new.paths()
        .filter(|p| classify(p) == ExtensionClass::CompiledUnit)
        .collect()
}

/// Diff two snapshots into the set of changed namespaces.
pub fn diff(old: &Snapshot, new: &Snapshot) -> ChangedUnitSet {
    diff_with(old, new, |path| derive_namespace(Path::new(path)))
}

/// [`diff`] with a custom path → namespace resolver.
pub fn diff_with<F>(old: &Snapshot, new: &Snapshot, resolve: F) -> ChangedUnitSet
where
    F: Fn(&str) -> Option<String>,
{
    affected_paths(old, new)
        .into_iter()
        .filter_map(|path| resolve(path))
        .collect()
}
