//! Compile failure and warning reporting.
//!
//! Build errors are data, not control flow: they are captured into a
//! [`CompileFailure`], pushed onto the change log, and shown in the terminal.
//! Nothing in here returns an error or panics.

use serde::{Deserialize, Serialize};

use super::log::ChangeLog;
use super::message::ChangeEvent;

/// One frame of a compile failure trace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StackFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    /// Function name or cause description for this frame
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
}

impl StackFrame {
    /// Frame pointing at a source position.
    pub fn at(file: impl Into<String>, line: u32, column: Option<u32>) -> Self {
        Self {
            file: Some(file.into()),
            line: Some(line),
            column,
            function: None,
        }
    }

    /// Frame describing a cause, with no position.
    #[cfg(test)]
    pub fn cause(description: impl Into<String>) -> Self {
        Self {
            function: Some(description.into()),
            ..Self::default()
        }
    }

    fn render(&self) -> String {
        let location = match (&self.file, self.line, self.column) {
            (Some(file), Some(line), Some(col)) => Some(format!("{file}:{line}:{col}")),
            (Some(file), Some(line), None) => Some(format!("{file}:{line}")),
            (Some(file), None, _) => Some(file.clone()),
            _ => None,
        };
        match (&self.function, location) {
            (Some(function), Some(location)) => format!("at {function} ({location})"),
            (None, Some(location)) => format!("at {location}"),
            (Some(function), None) => format!("caused by: {function}"),
            (None, None) => "at <unknown>".to_string(),
        }
    }
}

/// A captured build failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CompileFailure {
    /// Kind of failure (exception class, tool name, ...)
    pub class: String,
    pub message: String,
    #[serde(default)]
    pub trace: Vec<StackFrame>,
}

impl CompileFailure {
    pub fn new(class: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            message: message.into(),
            trace: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn with_frame(mut self, frame: StackFrame) -> Self {
        self.trace.push(frame);
        self
    }

    /// Capture an error and its cause chain.
    ///
    /// Causes become frames; any `file:line[:col]` mentioned in a cause
    /// message is lifted into the frame position.
    pub fn from_error(err: &anyhow::Error) -> Self {
        let mut failure = Self::new("error", err.to_string());
        if let Some(frame) = find_location(&failure.message) {
            failure.trace.push(frame);
        }
        for cause in err.chain().skip(1) {
            let text = cause.to_string();
            let mut frame = find_location(&text).unwrap_or_default();
            frame.function = Some(text);
            failure.trace.push(frame);
        }
        failure
    }

    /// Capture a failed build command from its combined output.
    ///
    /// The first non-empty line is the message; every line that mentions a
    /// source position becomes a frame.
    pub fn from_output(tool: &str, output: &str) -> Self {
        let message = output
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("build failed")
            .to_string();
        let trace = output.lines().filter_map(find_location).collect();
        Self {
            class: tool.to_string(),
            message,
            trace,
        }
    }

    /// Human-readable multi-line rendering of the failure.
    pub fn formatted_trace(&self) -> String {
        let mut out = format!("{}: {}", self.class, self.message);
        for frame in &self.trace {
            out.push_str("\n  ");
            out.push_str(&frame.render());
        }
        out
    }
}

/// Find the first `path.ext:line[:col]` token in `text`.
fn find_location(text: &str) -> Option<StackFrame> {
    text.split(|c: char| c.is_whitespace() || matches!(c, '(' | ')' | ',' | '"' | '\''))
        .find_map(parse_location_token)
}

fn parse_location_token(token: &str) -> Option<StackFrame> {
    let mut parts = token.trim_end_matches(['.', ':']).rsplitn(3, ':');
    let last: u32 = parts.next()?.parse().ok()?;
    let middle = parts.next()?;

    let (file, line, column) = match (middle.parse::<u32>(), parts.next()) {
        (Ok(line), Some(file)) => (file, line, Some(last)),
        _ => {
            // Only `file:line`; rebuild the file part from what we split off
            let file = token.trim_end_matches(['.', ':']).rsplit_once(':')?.0;
            (file, last, None)
        }
    };

    let has_extension = file
        .rsplit(['/', '\\'])
        .next()
        .is_some_and(|name| name.contains('.') && !name.starts_with('.'));
    has_extension.then(|| StackFrame::at(file, line, column))
}

/// Append a `compile-failed` event and show the failure in the terminal.
pub fn report_compile_failure(log: &ChangeLog, failure: CompileFailure) {
    crate::logger::status_error("compile failed", &failure.formatted_trace());
    log.append(ChangeEvent::compile_failed(failure));
}

/// Append a `compile-warning` event and show it in the terminal.
pub fn report_compile_warning(log: &ChangeLog, message: impl Into<String>) {
    let message = message.into();
    crate::logger::status_warning(&message);
    log.append(ChangeEvent::compile_warning(message));
}
