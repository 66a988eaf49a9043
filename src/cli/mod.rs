//! Command-line interface module.

mod args;
pub mod inspect;
pub mod serve;

pub use args::{Cli, Commands, ServeArgs};
