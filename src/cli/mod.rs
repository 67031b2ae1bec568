//! Command-line interface: a `clap`-derived binary exposing `serve`,
//! `worker`, `monitor`, `migrate`, and `task submit|list|show|cancel|matrix`.

pub mod commands;
pub mod output;
pub mod types;

pub use types::{Cli, Commands, TaskCommands};
