//! Extension classification and separator normalization.

use std::path::Path;

/// Source classes the differ cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtensionClass {
    /// Translated into one deployable artifact per file (`.cljs`).
    CompiledUnit,
    /// Only evaluated at build time, may affect any compiled unit (`.clj`).
    HostMacro,
    /// Anything else; ignored by the differ.
    Other,
}

impl ExtensionClass {
    /// Whether files of this class belong in a source snapshot.
    pub const fn is_source(self) -> bool {
        matches!(self, Self::CompiledUnit | Self::HostMacro)
    }
}

/// Split `path` into `(name, extension)`.
///
/// The extension is whatever follows the last `.` of the final path segment,
/// without the dot. A final segment without `.` has no extension.
///
/// ```ignore
/// assert_eq!(split_extension("src/app/core.cljs"), ("src/app/core", Some("cljs")));
/// assert_eq!(split_extension("src/v1.2/README"), ("src/v1.2/README", None));
/// ```
pub fn split_extension(path: &str) -> (&str, Option<&str>) {
    let segment_start = path.rfind(['/', '\\']).map_or(0, |i| i + 1);
    match path[segment_start..].rfind('.') {
        Some(dot) => {
            let dot = segment_start + dot;
            (&path[..dot], Some(&path[dot + 1..]))
        }
        None => (path, None),
    }
}

/// Classify a path by its extension.
pub fn classify(path: &str) -> ExtensionClass {
    match split_extension(path).1 {
        Some("cljs") => ExtensionClass::CompiledUnit,
        Some("clj") => ExtensionClass::HostMacro,
        _ => ExtensionClass::Other,
    }
}

/// Rewrite backslash separators to forward slashes.
pub fn normalize(path: &str) -> String {
    path.replace('\\', "/")
}

/// Normalize a filesystem path into the string form used as snapshot key.
pub fn path_key(path: &Path) -> String {
    normalize(&path.to_string_lossy())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_extension() {
        assert_eq!(
            split_extension("src/app/core.cljs"),
            ("src/app/core", Some("cljs"))
        );
        assert_eq!(split_extension("core.clj"), ("core", Some("clj")));
        assert_eq!(split_extension("Makefile"), ("Makefile", None));
    }

    #[test]
    fn test_split_extension_only_final_segment() {
        assert_eq!(split_extension("src/v1.2/README"), ("src/v1.2/README", None));
        assert_eq!(
            split_extension("src\\v1.2\\core.cljs"),
            ("src\\v1.2\\core", Some("cljs"))
        );
    }

    #[test]
    fn test_split_extension_last_dot_wins() {
        assert_eq!(
            split_extension("out/app.core.js.map"),
            ("out/app.core.js", Some("map"))
        );
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("src/app/core.cljs"), ExtensionClass::CompiledUnit);
        assert_eq!(classify("src/app/macros.clj"), ExtensionClass::HostMacro);
        assert_eq!(classify("resources/public/css/style.css"), ExtensionClass::Other);
        assert_eq!(classify("src/app/core"), ExtensionClass::Other);
        assert!(ExtensionClass::HostMacro.is_source());
        assert!(!ExtensionClass::Other.is_source());
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("src\\app\\core.cljs"), "src/app/core.cljs");
        assert_eq!(normalize("src/app/core.cljs"), "src/app/core.cljs");
    }
}
