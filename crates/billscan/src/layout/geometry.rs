use serde::{Deserialize, Serialize};

/// A 2-D point in image pixel coordinates (origin top-left, y grows downwards).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// One detected span of text with its recognition confidence and bounding polygon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFragment {
    pub text: String,
    /// Recognition confidence in `0.0..=1.0`.
    pub confidence: f32,
    /// Ordered polygon corners, usually the 4 corners of a quadrilateral.
    pub polygon: Vec<Point>,
}

impl TextFragment {
    pub fn new(text: impl Into<String>, confidence: f32, polygon: Vec<Point>) -> Self {
        Self {
            text: text.into(),
            confidence,
            polygon,
        }
    }

    /// Builds a fragment from an axis-aligned box, corners clockwise from top-left.
    pub fn from_rect(
        text: impl Into<String>,
        confidence: f32,
        left: f32,
        top: f32,
        width: f32,
        height: f32,
    ) -> Self {
        let right = left + width;
        let bottom = top + height;
        Self::new(
            text,
            confidence,
            vec![
                Point::new(left, top),
                Point::new(right, top),
                Point::new(right, bottom),
                Point::new(left, bottom),
            ],
        )
    }

    /// Top edge of the polygon, `None` when the polygon has no points.
    pub fn min_y(&self) -> Option<f32> {
        self.polygon.iter().map(|p| p.y).reduce(f32::min)
    }

    /// Left edge of the polygon, `None` when the polygon has no points.
    pub fn min_x(&self) -> Option<f32> {
        self.polygon.iter().map(|p| p.x).reduce(f32::min)
    }

    pub(crate) fn has_finite_polygon(&self) -> bool {
        self.polygon
            .iter()
            .all(|p| p.x.is_finite() && p.y.is_finite())
    }
}
