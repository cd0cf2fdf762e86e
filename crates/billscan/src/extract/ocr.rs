use std::sync::Arc;

use async_trait::async_trait;

use super::prepare::prepare_image;
use super::{TextDetector, TextExtractor};
use crate::error::ExtractionError;
use crate::layout::{filter_confident, Reconstructor};

/// Tunables for the OCR extraction path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OcrOptions {
    pub max_image_side: u32,
    pub confidence_threshold: f32,
    pub line_band: f32,
}

impl Default for OcrOptions {
    fn default() -> Self {
        Self {
            max_image_side: 1200,
            confidence_threshold: crate::layout::DEFAULT_CONFIDENCE_THRESHOLD,
            line_band: crate::layout::DEFAULT_LINE_BAND,
        }
    }
}

/// Decode, detect, drop low-confidence fragments, rebuild reading order.
#[derive(Clone)]
pub struct OcrExtractor {
    detector: Arc<dyn TextDetector>,
    options: OcrOptions,
}

impl OcrExtractor {
    pub fn new(detector: Arc<dyn TextDetector>, options: OcrOptions) -> Self {
        Self { detector, options }
    }

    pub fn options(&self) -> &OcrOptions {
        &self.options
    }

    /// Synchronous extraction; callers on the runtime should go through [`TextExtractor`].
    pub fn extract_blocking(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        let _span = tracing::info_span!("extract.ocr", detector = self.detector.name()).entered();

        let image = prepare_image(bytes, self.options.max_image_side)?;
        let detected = self.detector.detect(&image)?;
        let total = detected.len();
        let fragments = filter_confident(detected, self.options.confidence_threshold);

        tracing::debug!(
            detected = total,
            kept = fragments.len(),
            "Filtered fragments by confidence"
        );

        Ok(Reconstructor::new(self.options.line_band).reconstruct(&fragments))
    }
}

#[async_trait]
impl TextExtractor for OcrExtractor {
    async fn extract_text(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        let this = self.clone();
        let bytes = bytes.to_vec();
        tokio::task::spawn_blocking(move || this.extract_blocking(&bytes))
            .await
            .map_err(|e| ExtractionError::TaskAborted(e.to_string()))?
    }

    async fn health_check(&self) -> Result<(), String> {
        self.detector.health_check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::TextFragment;
    use image::{DynamicImage, ImageBuffer, Rgb};

    struct FixedDetector(Vec<TextFragment>);

    impl TextDetector for FixedDetector {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn detect(&self, _image: &DynamicImage) -> Result<Vec<TextFragment>, ExtractionError> {
            Ok(self.0.clone())
        }
    }

    struct BrokenDetector;

    impl TextDetector for BrokenDetector {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn detect(&self, _image: &DynamicImage) -> Result<Vec<TextFragment>, ExtractionError> {
            Err(ExtractionError::DetectionFailed("model missing".to_string()))
        }

        fn health_check(&self) -> Result<(), String> {
            Err("model missing".to_string())
        }
    }

    fn png() -> Vec<u8> {
        let buffer = ImageBuffer::from_pixel(8, 8, Rgb([0u8, 0, 0]));
        super::super::prepare::encode_png(&DynamicImage::ImageRgb8(buffer)).unwrap()
    }

    fn extractor(detector: impl TextDetector + 'static) -> OcrExtractor {
        OcrExtractor::new(Arc::new(detector), OcrOptions::default())
    }

    #[tokio::test]
    async fn test_extract_orders_and_filters() {
        let detector = FixedDetector(vec![
            TextFragment::from_rect("18.50", 0.95, 200.0, 40.0, 50.0, 12.0),
            TextFragment::from_rect("noise", 0.3, 0.0, 20.0, 50.0, 12.0),
            TextFragment::from_rect("Amount", 0.9, 10.0, 42.0, 50.0, 12.0),
            TextFragment::from_rect("Starbucks", 0.99, 10.0, 0.0, 80.0, 12.0),
        ]);

        let text = extractor(detector).extract_text(&png()).await.unwrap();
        assert_eq!(text, "Starbucks\nAmount 18.50");
    }

    #[tokio::test]
    async fn test_low_confidence_only_yields_empty() {
        let detector = FixedDetector(vec![TextFragment::from_rect(
            "ghost", 0.4, 0.0, 0.0, 10.0, 10.0,
        )]);
        let text = extractor(detector).extract_text(&png()).await.unwrap();
        assert_eq!(text, "");
    }

    #[tokio::test]
    async fn test_detector_error_propagates() {
        let result = extractor(BrokenDetector).extract_text(&png()).await;
        assert!(matches!(result, Err(ExtractionError::DetectionFailed(_))));
    }

    #[tokio::test]
    async fn test_undecodable_bytes() {
        let result = extractor(FixedDetector(vec![]))
            .extract_text(b"not an image")
            .await;
        assert!(matches!(result, Err(ExtractionError::ImageDecode(_))));
    }

    #[tokio::test]
    async fn test_health_reflects_detector() {
        assert!(extractor(FixedDetector(vec![])).health_check().await.is_ok());
        assert!(extractor(BrokenDetector).health_check().await.is_err());
    }
}
