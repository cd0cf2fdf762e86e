use image::DynamicImage;

use super::prepare::encode_png;
use super::tsv::parse_tsv;
use super::TextDetector;
use crate::error::ExtractionError;
use crate::layout::TextFragment;

/// Word-level detector backed by Tesseract.
pub struct TesseractDetector {
    languages: String,
}

impl TesseractDetector {
    pub fn new(languages: &[String]) -> Self {
        let languages = if languages.is_empty() {
            "eng".to_string()
        } else {
            languages.join("+")
        };
        Self { languages }
    }

    pub fn languages(&self) -> &str {
        &self.languages
    }
}

impl TextDetector for TesseractDetector {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn detect(&self, image: &DynamicImage) -> Result<Vec<TextFragment>, ExtractionError> {
        let _span = tracing::info_span!("extract.tesseract", languages = %self.languages).entered();

        let png = encode_png(image)?;

        let mut lt = leptess::LepTess::new(None, &self.languages).map_err(|e| {
            ExtractionError::DetectionFailed(format!("Failed to initialize Tesseract: {}", e))
        })?;
        lt.set_image_from_mem(&png).map_err(|e| {
            ExtractionError::DetectionFailed(format!("Failed to set image for OCR: {}", e))
        })?;
        let tsv = lt
            .get_tsv_text(0)
            .map_err(|e| ExtractionError::DetectionFailed(format!("OCR failed: {}", e)))?;

        Ok(parse_tsv(&tsv))
    }

    fn health_check(&self) -> Result<(), String> {
        leptess::LepTess::new(None, &self.languages)
            .map(|_| ())
            .map_err(|e| format!("Tesseract unavailable for '{}': {}", self.languages, e))
    }
}
