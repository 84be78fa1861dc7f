//! PDF preparation: image conversion and page trimming.

mod converter;
mod pages;

pub use converter::LopdfConverter;
pub use pages::{first_page_only, first_page_or_original, page_count};

use crate::error::ConversionError;

/// Result type for conversion operations.
pub type Result<T> = std::result::Result<T, ConversionError>;

/// Turns a raster image into a process-ready PDF.
pub trait DocumentConverter: Send + Sync {
    /// Convert encoded image bytes (JPEG, PNG, TIFF) to PDF bytes.
    fn to_pdf(&self, bytes: &[u8]) -> Result<Vec<u8>>;
}

/// Extensions handled as raster images.
pub fn is_image_extension(ext: &str) -> bool {
    matches!(
        ext.to_ascii_lowercase().as_str(),
        "jpg" | "jpeg" | "png" | "tif" | "tiff"
    )
}
