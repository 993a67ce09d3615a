//! CLI module - argument parsing and command dispatch

pub mod args;
pub mod commands;
pub mod filters;
pub mod helpers;
pub mod output;
pub mod viz;

pub use args::{Cli, Commands, GlobalOpts, OutputFormat};
pub use filters::{FilterArgs, MissingFilter};
