//! Tesseract TSV output to [`TextFragment`]s.
//!
//! Columns: `level page_num block_num par_num line_num word_num left top width height conf text`.
//! Only word rows (level 5) with a non-negative confidence and non-blank text are kept.

use crate::layout::TextFragment;

const WORD_LEVEL: &str = "5";
const COLUMNS: usize = 12;

pub fn parse_tsv(tsv: &str) -> Vec<TextFragment> {
    tsv.lines().filter_map(parse_row).collect()
}

fn parse_row(line: &str) -> Option<TextFragment> {
    let cols: Vec<&str> = line.splitn(COLUMNS, '\t').collect();
    if cols.len() < COLUMNS || cols[0] != WORD_LEVEL {
        return None;
    }

    let text = cols[11].trim();
    if text.is_empty() {
        return None;
    }

    let left: f32 = cols[6].parse().ok()?;
    let top: f32 = cols[7].parse().ok()?;
    let width: f32 = cols[8].parse().ok()?;
    let height: f32 = cols[9].parse().ok()?;
    let conf: f32 = cols[10].parse().ok()?;
    if conf < 0.0 {
        return None;
    }

    Some(TextFragment::from_rect(
        text,
        (conf / 100.0).clamp(0.0, 1.0),
        left,
        top,
        width,
        height,
    ))
}
