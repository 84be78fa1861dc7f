//! Subcommands.

pub mod batch;
pub mod config;
pub mod process;
pub mod rename;
mod settings;
