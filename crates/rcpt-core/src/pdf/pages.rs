//! Page selection on existing PDFs.

use lopdf::Document;
use tracing::{debug, warn};

use crate::error::ConversionError;

/// Number of pages in a PDF.
pub fn page_count(bytes: &[u8]) -> Result<u32, ConversionError> {
    let doc = load(bytes)?;
    Ok(doc.get_pages().len() as u32)
}

/// Keep only the first page of a PDF.
///
/// Single-page input is returned unchanged. Encrypted files are opened with
/// the empty password.
pub fn first_page_only(bytes: &[u8]) -> Result<Vec<u8>, ConversionError> {
    let mut doc = load(bytes)?;

    let count = doc.get_pages().len() as u32;
    if count == 0 {
        return Err(ConversionError::Pdf("document has no pages".to_string()));
    }
    if count == 1 {
        return Ok(bytes.to_vec());
    }

    let extra: Vec<u32> = (2..=count).collect();
    doc.delete_pages(&extra);
    doc.prune_objects();

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| ConversionError::Pdf(e.to_string()))?;

    debug!("trimmed PDF from {} pages to 1 ({} bytes)", count, out.len());
    Ok(out)
}

/// [`first_page_only`], falling back to the untouched bytes when the PDF
/// cannot be parsed.
pub fn first_page_or_original(bytes: &[u8]) -> Vec<u8> {
    match first_page_only(bytes) {
        Ok(trimmed) => trimmed,
        Err(e) => {
            warn!("could not trim PDF to its first page, sending all pages: {}", e);
            bytes.to_vec()
        }
    }
}

fn load(bytes: &[u8]) -> Result<Document, ConversionError> {
    let mut doc = Document::load_mem(bytes).map_err(|e| ConversionError::Pdf(e.to_string()))?;
    if doc.is_encrypted() {
        doc.decrypt("")
            .map_err(|_| ConversionError::Pdf("encrypted PDF".to_string()))?;
        debug!("Decrypted PDF with empty password");
    }
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::LopdfConverter;
    use image::DynamicImage;

    fn three_pages() -> Vec<u8> {
        let images: Vec<DynamicImage> = (1..=3).map(|i| DynamicImage::new_rgb8(8 * i, 8)).collect();
        LopdfConverter::new().images_to_pdf(&images).unwrap()
    }

    #[test]
    fn test_first_page_only() {
        let pdf = three_pages();
        assert_eq!(page_count(&pdf).unwrap(), 3);

        let trimmed = first_page_only(&pdf).unwrap();
        assert_eq!(page_count(&trimmed).unwrap(), 1);

        let doc = Document::load_mem(&trimmed).unwrap();
        let page = doc.get_dictionary(doc.get_pages()[&1]).unwrap();
        let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
        assert_eq!(media_box[2].as_i64().unwrap(), 8);
    }

    #[test]
    fn test_single_page_is_unchanged() {
        let pdf = LopdfConverter::new()
            .images_to_pdf(&[DynamicImage::new_rgb8(5, 5)])
            .unwrap();
        assert_eq!(first_page_only(&pdf).unwrap(), pdf);
    }

    #[test]
    fn test_unparseable_falls_back() {
        let junk = b"%PDF-1.4 truncated".to_vec();
        assert!(first_page_only(&junk).is_err());
        assert_eq!(first_page_or_original(&junk), junk);
    }
}
