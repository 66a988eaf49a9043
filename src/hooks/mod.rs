//! Build command hook.
//!
//! - `runner`: environment variables, command execution and reporting

mod runner;

pub use runner::*;
