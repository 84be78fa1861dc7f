//! Core library for renaming receipt scans from their extracted fields.
//!
//! This crate provides:
//! - Extraction providers (Gemini, Mistral, Naver CLOVA) behind one trait
//! - Field normalization (date, merchant, amount, currency)
//! - Deterministic, collision-free filename derivation
//! - Rate-limit backoff with cooperative cancellation
//! - Image to PDF conversion and first-page trimming
//! - Sequential directory runs with per-file outcomes and a summary
//! - Renaming from saved artifacts without another provider call

pub mod batch;
pub mod error;
pub mod extract;
pub mod filename;
pub mod models;
pub mod normalize;
pub mod pdf;
pub mod retry;

pub use batch::{BatchEvent, BatchProcessor, BatchSummary, BatchTask, FileOutcome, rename_from_artifacts};
pub use error::{ConversionError, ExtractionError, InputError, PersistenceError, RcptError, Result};
pub use extract::{ExtractionClient, ScriptedClient, create_client};
pub use filename::{FilenameBuilder, resolve_collision};
pub use models::config::{ProviderKind, RcptConfig};
pub use models::receipt::{Currency, ExtractedRecord, FieldName, NA, NormalizedRecord, ReceiptDate};
pub use normalize::FieldNormalizer;
pub use pdf::{DocumentConverter, LopdfConverter};
pub use retry::{RetryError, RetryPolicy, RetryScheduler, StopHandle};
