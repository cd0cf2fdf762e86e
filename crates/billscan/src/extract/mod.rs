pub mod ocr;
pub mod prepare;
#[cfg(feature = "tesseract")]
pub mod tesseract;
pub mod tsv;

use async_trait::async_trait;

use crate::error::ExtractionError;
use crate::layout::TextFragment;

pub use ocr::{OcrExtractor, OcrOptions};
pub use prepare::prepare_image;
#[cfg(feature = "tesseract")]
pub use tesseract::TesseractDetector;

/// Turns image bytes into reading-order text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_text(&self, bytes: &[u8]) -> Result<String, ExtractionError>;

    async fn health_check(&self) -> Result<(), String> {
        Ok(())
    }
}

/// A synchronous text-detection backend producing positioned fragments.
pub trait TextDetector: Send + Sync {
    fn name(&self) -> &'static str;

    fn detect(&self, image: &::image::DynamicImage) -> Result<Vec<TextFragment>, ExtractionError>;

    fn health_check(&self) -> Result<(), String> {
        Ok(())
    }
}
