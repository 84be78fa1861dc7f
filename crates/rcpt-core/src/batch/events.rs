//! Progress events emitted during a directory run.

use std::path::PathBuf;
use std::time::Duration;

use super::outcome::{BatchSummary, FileOutcome};

/// Progress of a running batch, delivered in order over an mpsc channel.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    Started {
        total: usize,
    },
    FileStarted {
        /// 1-based position in the run.
        index: usize,
        total: usize,
        path: PathBuf,
    },
    RateLimited {
        path: PathBuf,
        attempt: u32,
        max_retries: u32,
        wait: Duration,
    },
    FileFinished {
        index: usize,
        outcome: FileOutcome,
    },
    /// Inter-file pacing wait.
    Paused {
        delay: Duration,
    },
    Cancelled {
        remaining: usize,
    },
    Completed {
        summary: BatchSummary,
    },
}
