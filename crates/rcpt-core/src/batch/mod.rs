//! Directory runs over many receipts.

pub mod artifacts;
pub mod discovery;
mod events;
mod outcome;
mod processor;
pub mod relocate;
mod rename;

pub use discovery::{SUPPORTED_EXTENSIONS, discover_files, supported_extension};
pub use events::BatchEvent;
pub use outcome::{BatchSummary, FileOutcome};
pub use processor::{BatchProcessor, BatchTask};
pub use rename::rename_from_artifacts;
