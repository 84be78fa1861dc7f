//! Data models: receipt records and configuration.

pub mod config;
pub mod receipt;
