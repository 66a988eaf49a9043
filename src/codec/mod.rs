//! Path codec: file paths to logical identifiers and back to URLs.
//!
//! Pure functions, except for [`derive_namespace`] which reads the file.
//!
//! - [`ext`]: extension splitting, classification and separator normalization
//! - [`ns`]: best-effort namespace extraction from a source file's first form
//! - [`url`]: namespace / file path to server-relative URL

pub mod ext;
pub mod ns;
pub mod url;

pub use ext::{ExtensionClass, classify, split_extension};
pub use ns::derive_namespace;
pub use url::UrlMapper;
