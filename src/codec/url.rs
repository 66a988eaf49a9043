//! Server-relative URL derivation.
//!
//! Files under `<resource_path>/<http_server_root>` are served from `/`,
//! so a URL is the path with that prefix stripped.

use super::ext::normalize;
use super::ns::munge;

/// Convert a namespace identifier into its relative output path (no extension).
///
/// `app.my-core` becomes `app/my_core`.
pub fn namespace_to_url_path(id: &str) -> String {
    munge(id).replace('.', "/")
}

/// Maps filesystem paths to the URLs the browser fetches them from.
#[derive(Debug, Clone)]
pub struct UrlMapper {
    /// Normalized `<resource_path>/<http_server_root>` prefixes, longest first.
    served_roots: Vec<String>,
    /// Normalized compiler output directory.
    output_dir: String,
}

impl UrlMapper {
    /// Create a mapper for the given resource paths, server root label and
    /// compiler output directory.
    pub fn new<S: AsRef<str>>(resource_paths: &[S], http_server_root: &str, output_dir: &str) -> Self {
        let root = http_server_root.trim_matches(['/', '\\']);
        let mut served_roots: Vec<String> = resource_paths
            .iter()
            .map(|r| {
                let r = normalize(r.as_ref());
                format!("{}/{}", r.trim_end_matches('/'), root)
            })
            .collect();
        // Longest prefix first so nested resource paths resolve correctly
        served_roots.sort_by_key(|r| std::cmp::Reverse(r.len()));

        Self {
            served_roots,
            output_dir: normalize(output_dir).trim_end_matches('/').to_string(),
        }
    }

    /// URL of any file below a served root.
    ///
    /// Paths outside every served root are returned normalized, rooted at `/`.
    pub fn served_url(&self, path: &str) -> String {
        let path = normalize(path);
        let rest = self
            .served_roots
            .iter()
            .find_map(|root| strip_dir_prefix(&path, root))
            .unwrap_or(path.as_str());

        if rest.starts_with('/') {
            rest.to_string()
        } else {
            format!("/{rest}")
        }
    }

    /// URL of the compiled JavaScript for a namespace identifier.
    ///
    /// `app.core` with output dir `resources/public/js/out` becomes
    /// `/js/out/app/core.js`.
    pub fn compiled_asset_url(&self, id: &str) -> String {
        let base = self.served_url(&self.output_dir);
        let base = base.trim_end_matches('/');
        format!("{base}/{}.js", namespace_to_url_path(id))
    }
}

/// Strip `prefix` from `path` only on a segment boundary.
fn strip_dir_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(prefix)?;
    (rest.is_empty() || rest.starts_with('/')).then_some(rest)
}
