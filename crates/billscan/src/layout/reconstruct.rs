//! Reading-order reconstruction for OCR detections.
//!
//! Detections arrive in arbitrary order. They are scanned top to bottom,
//! grouped into horizontal bands ("lines") anchored on the first fragment of
//! each band, ordered left to right inside a band, and joined into one text
//! block. When the geometry is unusable the texts are joined in the order
//! they were received instead.

use std::fmt::Display;

use thiserror::Error;
use tracing::warn;

use super::geometry::TextFragment;

/// Fragments at or below this confidence are discarded before reconstruction.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;

/// Maximum top-edge distance (in polygon units) from a line's first fragment.
pub const DEFAULT_LINE_BAND: f32 = 20.0;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LayoutError {
    #[error("fragment {index} has an empty polygon")]
    EmptyPolygon { index: usize },

    #[error("fragment {index} has a non-finite coordinate")]
    NonFiniteCoordinate { index: usize },
}

/// Keeps only fragments whose confidence is strictly above `threshold`.
pub fn filter_confident(fragments: Vec<TextFragment>, threshold: f32) -> Vec<TextFragment> {
    fragments
        .into_iter()
        .filter(|f| f.confidence > threshold)
        .collect()
}

/// Reconstructs with the default line band.
pub fn reconstruct(fragments: &[TextFragment]) -> String {
    Reconstructor::default().reconstruct(fragments)
}

#[derive(Debug, Clone, Copy)]
pub struct Reconstructor {
    line_band: f32,
}

impl Default for Reconstructor {
    fn default() -> Self {
        Self::new(DEFAULT_LINE_BAND)
    }
}

impl Reconstructor {
    pub fn new(line_band: f32) -> Self {
        Self { line_band }
    }

    pub fn line_band(&self) -> f32 {
        self.line_band
    }

    /// Produces reading-order text. Never fails: geometry errors degrade to
    /// [`join_in_scan_order`].
    pub fn reconstruct(&self, fragments: &[TextFragment]) -> String {
        or_fallback(
            || self.try_reconstruct(fragments),
            || join_in_scan_order(fragments),
        )
    }

    /// Geometry-based ordering. Fails on fragments without usable polygons.
    pub fn try_reconstruct(&self, fragments: &[TextFragment]) -> Result<String, LayoutError> {
        if fragments.is_empty() {
            return Ok(String::new());
        }

        let mut anchored = fragments
            .iter()
            .enumerate()
            .map(|(index, fragment)| Anchored::new(index, fragment))
            .collect::<Result<Vec<_>, _>>()?;

        // `sort_by` is stable, so equal tops keep scan order.
        anchored.sort_by(|a, b| a.top.total_cmp(&b.top));

        let lines = self.group_lines(anchored);
        let text = lines
            .iter()
            .map(Line::render)
            .collect::<Vec<_>>()
            .join("\n");

        Ok(text.trim_end().to_string())
    }

    fn group_lines<'a>(&self, sorted: Vec<Anchored<'a>>) -> Vec<Line<'a>> {
        let mut lines: Vec<Line<'a>> = Vec::new();
        let mut current: Option<Line<'a>> = None;

        for item in sorted {
            match current.as_mut() {
                Some(line) if (item.top - line.anchor_top).abs() <= self.line_band => {
                    line.items.push(item);
                }
                _ => {
                    if let Some(done) = current.take() {
                        lines.push(done.closed());
                    }
                    current = Some(Line::start(item));
                }
            }
        }

        if let Some(done) = current {
            lines.push(done.closed());
        }

        lines
    }
}

/// Joins fragment texts with single spaces in the order given.
pub fn join_in_scan_order(fragments: &[TextFragment]) -> String {
    fragments
        .iter()
        .map(|f| f.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Runs `primary`, falling back to `fallback` when it errors.
fn or_fallback<T, E: Display>(
    primary: impl FnOnce() -> Result<T, E>,
    fallback: impl FnOnce() -> T,
) -> T {
    match primary() {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "ReconstructionDegraded: falling back to scan order");
            fallback()
        }
    }
}

struct Anchored<'a> {
    fragment: &'a TextFragment,
    top: f32,
    left: f32,
}

impl<'a> Anchored<'a> {
    fn new(index: usize, fragment: &'a TextFragment) -> Result<Self, LayoutError> {
        if !fragment.has_finite_polygon() {
            return Err(LayoutError::NonFiniteCoordinate { index });
        }
        let (top, left) = fragment
            .min_y()
            .zip(fragment.min_x())
            .ok_or(LayoutError::EmptyPolygon { index })?;
        Ok(Self {
            fragment,
            top,
            left,
        })
    }
}

struct Line<'a> {
    anchor_top: f32,
    items: Vec<Anchored<'a>>,
}

impl<'a> Line<'a> {
    fn start(first: Anchored<'a>) -> Self {
        Self {
            anchor_top: first.top,
            items: vec![first],
        }
    }

    fn closed(mut self) -> Self {
        self.items.sort_by(|a, b| a.left.total_cmp(&b.left));
        self
    }

    fn render(&self) -> String {
        self.items
            .iter()
            .map(|a| a.fragment.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
