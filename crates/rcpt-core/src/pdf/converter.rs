//! Raster image to PDF conversion using image and lopdf.

use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use tracing::{debug, trace};

use super::{DocumentConverter, Result};
use crate::error::ConversionError;

/// Converts decoded images to PDFs with one page per image.
///
/// Each image becomes a DCTDecode XObject drawn over a page whose size in
/// points equals the image size in pixels.
#[derive(Debug, Clone)]
pub struct LopdfConverter {
    jpeg_quality: u8,
}

impl LopdfConverter {
    pub fn new() -> Self {
        Self { jpeg_quality: 90 }
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    fn encode_jpeg(&self, image: &DynamicImage) -> Result<Vec<u8>> {
        let rgb = image.to_rgb8();
        let mut data = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut data, self.jpeg_quality);
        rgb.write_with_encoder(encoder)?;
        Ok(data)
    }

    /// Build a PDF with one page per image.
    pub fn images_to_pdf(&self, images: &[DynamicImage]) -> Result<Vec<u8>> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids: Vec<Object> = Vec::with_capacity(images.len());

        for (index, image) in images.iter().enumerate() {
            let (width, height) = (image.width(), image.height());
            if width == 0 || height == 0 {
                return Err(ConversionError::EmptyImage);
            }

            let jpeg = self.encode_jpeg(image)?;
            trace!("page {}: {}x{} jpeg {} bytes", index + 1, width, height, jpeg.len());

            let image_id = doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => width as i64,
                    "Height" => height as i64,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8,
                    "Filter" => "DCTDecode",
                },
                jpeg,
            ));

            let content = Content {
                operations: vec![
                    Operation::new("q", vec![]),
                    Operation::new(
                        "cm",
                        vec![
                            (width as i64).into(),
                            0.into(),
                            0.into(),
                            (height as i64).into(),
                            0.into(),
                            0.into(),
                        ],
                    ),
                    Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                    Operation::new("Q", vec![]),
                ],
            };
            let encoded = content
                .encode()
                .map_err(|e| ConversionError::Pdf(e.to_string()))?;
            let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), (width as i64).into(), (height as i64).into()],
                "Resources" => dictionary! {
                    "XObject" => dictionary! { "Im0" => image_id },
                },
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        doc.save_to(&mut out)
            .map_err(|e| ConversionError::Pdf(e.to_string()))?;

        debug!("built {}-page PDF ({} bytes)", count, out.len());
        Ok(out)
    }
}

impl Default for LopdfConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentConverter for LopdfConverter {
    fn to_pdf(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        let image = image::load_from_memory(bytes)?;
        self.images_to_pdf(&[image])
    }
}
