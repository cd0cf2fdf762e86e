pub mod geometry;
pub mod reconstruct;

pub use geometry::{Point, TextFragment};
pub use reconstruct::{
    filter_confident, join_in_scan_order, reconstruct, LayoutError, Reconstructor,
    DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_LINE_BAND,
};
