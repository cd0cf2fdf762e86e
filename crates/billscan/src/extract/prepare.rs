use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};

use crate::error::ExtractionError;

/// Decodes image bytes and shrinks the image so its longer side is at most `max_side`.
///
/// Images already within bounds are returned as decoded. A `max_side` of 0 disables resizing.
pub fn prepare_image(bytes: &[u8], max_side: u32) -> Result<DynamicImage, ExtractionError> {
    let _span = tracing::debug_span!("extract.prepare").entered();

    let img = image::load_from_memory(bytes)
        .map_err(|e| ExtractionError::ImageDecode(e.to_string()))?;

    let (width, height) = img.dimensions();
    match scaled_dimensions(width, height, max_side) {
        Some((w, h)) => {
            tracing::debug!(from = ?(width, height), to = ?(w, h), "Downscaling image");
            Ok(img.resize_exact(w, h, FilterType::Triangle))
        }
        None => Ok(img),
    }
}

/// Target size preserving aspect ratio, or `None` when no resize is needed.
pub fn scaled_dimensions(width: u32, height: u32, max_side: u32) -> Option<(u32, u32)> {
    let longest = width.max(height);
    if max_side == 0 || longest <= max_side {
        return None;
    }
    let ratio = max_side as f64 / longest as f64;
    let scale = |v: u32| ((v as f64 * ratio).round() as u32).max(1);
    Some((scale(width), scale(height)))
}

/// Encodes an image as PNG.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, ExtractionError> {
    let mut png = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .map_err(|e| ExtractionError::ImageDecode(format!("Failed to encode PNG: {}", e)))?;
    Ok(png)
}
