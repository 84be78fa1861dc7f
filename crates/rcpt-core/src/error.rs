//! Error types for the rcpt-core library.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Main error type for the rcpt library.
#[derive(Error, Debug)]
pub enum RcptError {
    /// Input file or directory problem.
    #[error("input error: {0}")]
    Input(#[from] InputError),

    /// Image to PDF conversion error.
    #[error("conversion error: {0}")]
    Conversion(#[from] ConversionError),

    /// Extraction provider error.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Failure to write an intermediate artifact.
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors about a single input path.
#[derive(Error, Debug)]
pub enum InputError {
    /// The file or directory does not exist.
    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The path exists but is not a directory.
    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// The file extension is not one we process.
    #[error("unsupported file extension: {}", .0.display())]
    UnsupportedExtension(PathBuf),

    /// The file could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors while turning a raster image into a PDF.
#[derive(Error, Debug)]
pub enum ConversionError {
    /// The image could not be decoded.
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    /// The decoded image has no pixels.
    #[error("image has zero width or height")]
    EmptyImage,

    /// Building or serializing the PDF failed.
    #[error("failed to write PDF: {0}")]
    Pdf(String),
}

/// Typed failures of an extraction provider call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
    /// Upstream quota or 429.
    #[error("rate limited by provider")]
    RateLimited {
        /// Server-suggested wait, when the provider sent one.
        retry_after: Option<Duration>,
    },

    /// Credentials missing, invalid or suspended.
    #[error("authentication failed (check that the API key is valid and not suspended): {0}")]
    Auth(String),

    /// The provider answered but not with the expected JSON object.
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    /// Network or timeout failure before a response arrived.
    #[error("transport error: {0}")]
    Transport(String),

    /// Any other non-success HTTP status.
    #[error("provider returned {status}: {message}")]
    Upstream { status: u16, message: String },
}

impl ExtractionError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ExtractionError::RateLimited { .. })
    }

    /// Whether the retry scheduler should try again after this failure.
    pub fn is_retryable(&self, retry_malformed: bool) -> bool {
        match self {
            ExtractionError::RateLimited { .. } => true,
            ExtractionError::MalformedResponse(_) => retry_malformed,
            _ => false,
        }
    }
}

/// Failure to write an intermediate artifact. Logged, never fatal to a file.
#[derive(Error, Debug)]
#[error("failed to write {}: {reason}", path.display())]
pub struct PersistenceError {
    pub path: PathBuf,
    pub reason: String,
}

/// Result type for the rcpt library.
pub type Result<T> = std::result::Result<T, RcptError>;
