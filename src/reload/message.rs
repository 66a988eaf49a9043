//! Hot Reload Message Protocol
//!
//! Defines the JSON records pushed to browser clients, one per frame.
//!
//! # Message Types
//!
//! - `files-changed`: compiled namespaces (and dependency manifests) to reload
//! - `css-files-changed`: stylesheets to swap in place
//! - `compile-failed`: build error with structured and formatted trace
//! - `compile-warning`: build warning text
//! - `ping`: server liveness signal
//!
//! Every record carries a `msg-name` tag. Clients are expected to ignore
//! unknown fields and unknown `msg-name` values.

use serde::{Deserialize, Serialize};

use super::report::CompileFailure;

/// A file the client should (re)load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FileRef {
    /// Server-relative URL (e.g. `/js/compiled/out/app/core.js`)
    pub path: String,
    /// Namespace identifier for compiled units
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace_id: Option<String>,
    /// Generated dependency manifest rather than a namespace
    #[serde(default)]
    pub is_dependency_file: bool,
}

impl FileRef {
    /// Reference to the compiled output of a namespace.
    pub fn namespace(path: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            namespace_id: Some(id.into()),
            is_dependency_file: false,
        }
    }

    /// Reference to a generated dependency manifest.
    pub fn dependency(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            namespace_id: None,
            is_dependency_file: true,
        }
    }

    /// Reference to a plain served file (stylesheets).
    pub fn asset(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            namespace_id: None,
            is_dependency_file: false,
        }
    }
}

/// Notification record sent over the WebSocket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "msg-name",
    rename_all = "kebab-case",
    rename_all_fields = "kebab-case"
)]
pub enum ChangeEvent {
    /// Compiled namespaces / dependency manifests changed
    FilesChanged { files: Vec<FileRef> },

    /// Stylesheets changed
    CssFilesChanged { files: Vec<FileRef> },

    /// Build failed (display overlay, no reload)
    CompileFailed {
        exception: CompileFailure,
        formatted_trace: String,
    },

    /// Build produced a warning
    CompileWarning { message: String },

    /// Keep-alive (server → client)
    Ping,
}

impl ChangeEvent {
    pub fn files_changed(files: Vec<FileRef>) -> Self {
        Self::FilesChanged { files }
    }

    pub fn css_files_changed(files: Vec<FileRef>) -> Self {
        Self::CssFilesChanged { files }
    }

    pub fn compile_failed(exception: CompileFailure) -> Self {
        let formatted_trace = exception.formatted_trace();
        Self::CompileFailed {
            exception,
            formatted_trace,
        }
    }

    pub fn compile_warning(message: impl Into<String>) -> Self {
        Self::CompileWarning {
            message: message.into(),
        }
    }

    pub fn ping() -> Self {
        Self::Ping
    }

    /// Wire name of this record (the `msg-name` value).
    pub fn name(&self) -> &'static str {
        match self {
            Self::FilesChanged { .. } => "files-changed",
            Self::CssFilesChanged { .. } => "css-files-changed",
            Self::CompileFailed { .. } => "compile-failed",
            Self::CompileWarning { .. } => "compile-warning",
            Self::Ping => "ping",
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parse from JSON string
    ///
    /// Unknown fields are ignored; an unknown `msg-name` yields `None`.
    #[cfg(test)]
    pub fn from_json(s: &str) -> Option<Self> {
        serde_json::from_str(s).ok()
    }
}
