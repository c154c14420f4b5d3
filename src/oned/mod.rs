//! Linear symbologies, read one binarized row at a time.

mod code93;
mod itf;
mod rss;

pub use code93::{Code93Reader, Code93Writer};
pub use itf::{ItfReader, ItfWriter};
pub use rss::{
    expanded::{RssExpandedReader, RssExpandedWriter},
    rss14::{Rss14Reader, Rss14Writer},
};

use log::trace;

use crate::{
    common::{Barcode, BitArray, BitMatrix, DecodeHints, MetadataValue, ResultMetadataKey, ScanError, ScanResult},
    reader::{error_rank, BinaryBitmap, Reader},
};

// Row reader
//------------------------------------------------------------------------------

/// Decodes a symbol out of a single row. Readers that combine several rows, like
/// RSS-14, keep that state until `reset`.
pub trait RowReader: Send {
    fn decode_row(&mut self, row_number: usize, row: &BitArray, hints: &DecodeHints) -> ScanResult<Barcode>;

    fn reset(&mut self) {}
}

/// Adapts a [`RowReader`] to a whole image by scanning rows outward from the middle.
pub struct OneDReader<R> {
    inner: R,
}

impl<R: RowReader> OneDReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }
}

pub fn scan_rows(height: usize, try_harder: bool) -> Vec<usize> {
    let step = (height >> if try_harder { 8 } else { 5 }).max(1);
    let max_lines = if try_harder { height } else { 15 };
    let middle = (height / 2) as isize;
    let mut rows = Vec::with_capacity(max_lines);
    for x in 0..max_lines {
        let steps = ((x + 1) / 2) as isize;
        let offset = if x & 1 == 0 { steps } else { -steps };
        let row = middle + step as isize * offset;
        if row < 0 || row >= height as isize {
            break;
        }
        rows.push(row as usize);
    }
    rows
}

impl<R: RowReader> Reader for OneDReader<R> {
    fn decode(&mut self, image: &BinaryBitmap, hints: &DecodeHints) -> ScanResult<Barcode> {
        self.inner.reset();
        let width = image.width();
        let attempts = if hints.try_harder { 2 } else { 1 };

        let mut best = ScanError::NotFound;
        for row_number in scan_rows(image.height(), hints.try_harder) {
            let mut row = match image.black_row(row_number) {
                Ok(row) => row,
                Err(_) => continue,
            };
            for attempt in 0..attempts {
                if attempt == 1 {
                    row.reverse();
                }
                match self.inner.decode_row(row_number, &row, hints) {
                    Ok(mut barcode) => {
                        if attempt == 1 {
                            barcode.put_metadata(ResultMetadataKey::Orientation, MetadataValue::Int(180));
                            barcode.mirror_points(width);
                        }
                        return Ok(barcode);
                    }
                    Err(err) if !err.is_recoverable() => return Err(err),
                    Err(err) => {
                        trace!("Row {row_number} failed: {err}");
                        if error_rank(&err) > error_rank(&best) {
                            best = err;
                        }
                    }
                }
            }
        }
        Err(best)
    }

    fn reset(&mut self) {
        self.inner.reset();
    }
}

// Pattern helpers
//------------------------------------------------------------------------------

pub fn record_pattern(row: &BitArray, start: usize, counters: &mut [usize]) -> ScanResult<()> {
    counters.fill(0);
    let end = row.len();
    if start >= end {
        return Err(ScanError::NotFound);
    }
    let mut is_white = !row.get(start);
    let mut pos = 0;
    let mut i = start;
    while i < end {
        if row.get(i) != is_white {
            counters[pos] += 1;
        } else {
            pos += 1;
            if pos == counters.len() {
                break;
            }
            counters[pos] = 1;
            is_white = !is_white;
        }
        i += 1;
    }
    if pos == counters.len() || (pos == counters.len() - 1 && i == end) {
        Ok(())
    } else {
        Err(ScanError::NotFound)
    }
}

pub fn record_pattern_in_reverse(row: &BitArray, start: usize, counters: &mut [usize]) -> ScanResult<()> {
    let mut transitions_left = counters.len() as isize;
    let mut start = start;
    let mut last = row.get(start);
    while start > 0 && transitions_left >= 0 {
        start -= 1;
        if row.get(start) != last {
            transitions_left -= 1;
            last = !last;
        }
    }
    if transitions_left >= 0 {
        return Err(ScanError::NotFound);
    }
    record_pattern(row, start + 1, counters)
}

pub fn pattern_match_variance(counters: &[usize], pattern: &[usize], max_individual_variance: f32) -> f32 {
    let total: usize = counters.iter().sum();
    let pattern_len: usize = pattern.iter().sum();
    if total < pattern_len || total == 0 {
        return f32::INFINITY;
    }
    let unit = total as f32 / pattern_len as f32;
    let max_individual = max_individual_variance * unit;

    let mut total_variance = 0.0;
    for (&counter, &p) in counters.iter().zip(pattern) {
        let scaled = p as f32 * unit;
        let variance = (counter as f32 - scaled).abs();
        if variance > max_individual {
            return f32::INFINITY;
        }
        total_variance += variance;
    }
    total_variance / total as f32
}

// Row writer helpers
//------------------------------------------------------------------------------

pub const DEFAULT_QUIET_ZONE: usize = 5;

pub fn append_pattern(target: &mut Vec<bool>, pattern: &[usize], start_color: bool) -> usize {
    let mut color = start_color;
    let mut written = 0;
    for &width in pattern {
        target.resize(target.len() + width, color);
        written += width;
        color = !color;
    }
    written
}

pub fn render_row(code: &[bool], width: usize, height: usize, quiet_zone: usize) -> ScanResult<BitMatrix> {
    let full_width = code.len() + 2 * quiet_zone;
    let out_w = width.max(full_width);
    let out_h = height.max(1);
    let multiple = out_w / full_width;
    let left = (out_w - code.len() * multiple) / 2;

    let mut out = BitMatrix::new(out_w, out_h)?;
    for (i, _) in code.iter().enumerate().filter(|(_, &dark)| dark) {
        out.set_region(left + i * multiple, 0, multiple, out_h)?;
    }
    Ok(out)
}

pub(crate) fn check_digits(content: &str) -> ScanResult<()> {
    if content.is_empty() {
        return Err(ScanError::invalid("Found empty contents"));
    }
    if let Some(c) = content.chars().find(|c| !c.is_ascii_digit()) {
        return Err(ScanError::invalid(format!("Input should only contain digits 0-9: Found {c:?}")));
    }
    Ok(())
}
