use std::fmt::{Display, Formatter};

use super::{BitArray, ScanError, ScanResult};

// Bit matrix
//------------------------------------------------------------------------------

/// A 2D grid of modules or binarized pixels. `true` is a dark module.
///
/// Rows are packed into 32-bit words. Indexing outside the matrix is a caller bug and
/// panics; use [`BitMatrix::try_get`] when probing near edges.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BitMatrix {
    width: usize,
    height: usize,
    row_size: usize,
    bits: Vec<u32>,
}

impl BitMatrix {
    pub fn new(width: usize, height: usize) -> ScanResult<Self> {
        if width == 0 || height == 0 {
            return Err(ScanError::invalid(format!(
                "Matrix dimensions must be positive: Width {width}, Height {height}"
            )));
        }
        let row_size = width.div_ceil(32);
        Ok(Self { width, height, row_size, bits: vec![0; row_size * height] })
    }

    pub fn square(dimension: usize) -> ScanResult<Self> {
        Self::new(dimension, dimension)
    }

    pub fn parse(repr: &str, set: &str, unset: &str) -> ScanResult<Self> {
        let mut rows: Vec<Vec<bool>> = Vec::new();
        for line in repr.lines().filter(|l| !l.is_empty()) {
            let mut row = Vec::new();
            let mut rest = line;
            while !rest.is_empty() {
                if let Some(r) = rest.strip_prefix(set) {
                    row.push(true);
                    rest = r;
                } else if let Some(r) = rest.strip_prefix(unset) {
                    row.push(false);
                    rest = r;
                } else {
                    return Err(ScanError::invalid(format!("Illegal character in matrix: {rest}")));
                }
            }
            rows.push(row);
        }
        let width = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != width) {
            return Err(ScanError::invalid("Matrix rows have different lengths"));
        }
        let mut matrix = Self::new(width, rows.len())?;
        for (y, row) in rows.iter().enumerate() {
            for (x, &v) in row.iter().enumerate() {
                if v {
                    matrix.set(x, y);
                }
            }
        }
        Ok(matrix)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    fn offset(&self, x: usize, y: usize) -> usize {
        assert!(
            x < self.width && y < self.height,
            "Matrix index out of bounds: ({x}, {y}) in {}x{}",
            self.width,
            self.height
        );
        y * self.row_size + (x >> 5)
    }

    pub fn get(&self, x: usize, y: usize) -> bool {
        (self.bits[self.offset(x, y)] >> (x & 31)) & 1 != 0
    }

    pub fn try_get(&self, x: i32, y: i32) -> Option<bool> {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return None;
        }
        Some(self.get(x as usize, y as usize))
    }

    pub fn set(&mut self, x: usize, y: usize) {
        let off = self.offset(x, y);
        self.bits[off] |= 1 << (x & 31);
    }

    pub fn unset(&mut self, x: usize, y: usize) {
        let off = self.offset(x, y);
        self.bits[off] &= !(1 << (x & 31));
    }

    pub fn set_value(&mut self, x: usize, y: usize, value: bool) {
        if value {
            self.set(x, y)
        } else {
            self.unset(x, y)
        }
    }

    pub fn flip(&mut self, x: usize, y: usize) {
        let off = self.offset(x, y);
        self.bits[off] ^= 1 << (x & 31);
    }

    pub fn flip_all(&mut self) {
        for y in 0..self.height {
            for x in 0..self.width {
                self.flip(x, y);
            }
        }
    }

    pub fn clear(&mut self) {
        self.bits.iter_mut().for_each(|w| *w = 0);
    }

    pub fn set_region(&mut self, left: usize, top: usize, width: usize, height: usize) -> ScanResult<()> {
        if width == 0 || height == 0 {
            return Err(ScanError::invalid("Region must have positive size"));
        }
        let (right, bottom) = (left + width, top + height);
        if right > self.width || bottom > self.height {
            return Err(ScanError::invalid("Region must fit inside the matrix"));
        }
        for y in top..bottom {
            for x in left..right {
                self.set(x, y);
            }
        }
        Ok(())
    }

    pub fn row(&self, y: usize) -> BitArray {
        let mut row = BitArray::new(self.width);
        let start = y * self.row_size;
        for i in 0..self.row_size {
            row.set_bulk(i << 5, self.bits[start + i]);
        }
        row
    }

    pub fn set_row(&mut self, y: usize, row: &BitArray) {
        for x in 0..self.width {
            self.set_value(x, y, row.get(x));
        }
    }

    pub fn count_ones(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn rotate180(&mut self) {
        let mut rotated = self.clone();
        rotated.clear();
        for y in 0..self.height {
            for x in 0..self.width {
                if self.get(x, y) {
                    rotated.set(self.width - 1 - x, self.height - 1 - y);
                }
            }
        }
        *self = rotated;
    }

    pub fn rotate90(&mut self) {
        let mut rotated = Self {
            width: self.height,
            height: self.width,
            row_size: self.height.div_ceil(32),
            bits: vec![0; self.height.div_ceil(32) * self.width],
        };
        for y in 0..self.height {
            for x in 0..self.width {
                if self.get(x, y) {
                    rotated.set(y, self.width - 1 - x);
                }
            }
        }
        *self = rotated;
    }

    pub fn enclosing_rectangle(&self) -> Option<[usize; 4]> {
        let (mut left, mut top) = (self.width, self.height);
        let (mut right, mut bottom) = (0, 0);
        let mut found = false;
        for y in 0..self.height {
            for x in 0..self.width {
                if self.get(x, y) {
                    found = true;
                    left = left.min(x);
                    right = right.max(x);
                    top = top.min(y);
                    bottom = bottom.max(y);
                }
            }
        }
        found.then(|| [left, top, right - left + 1, bottom - top + 1])
    }

    pub fn top_left_on_bit(&self) -> Option<(usize, usize)> {
        let idx = self.bits.iter().position(|&w| w != 0)?;
        let (y, word) = (idx / self.row_size, idx % self.row_size);
        Some(((word << 5) + self.bits[idx].trailing_zeros() as usize, y))
    }

    pub fn bottom_right_on_bit(&self) -> Option<(usize, usize)> {
        let idx = self.bits.iter().rposition(|&w| w != 0)?;
        let (y, word) = (idx / self.row_size, idx % self.row_size);
        Some(((word << 5) + 31 - self.bits[idx].leading_zeros() as usize, y))
    }

    pub fn with_quiet_zone(&self, margin: usize) -> ScanResult<Self> {
        let mut out = Self::new(self.width + 2 * margin, self.height + 2 * margin)?;
        for y in 0..self.height {
            for x in 0..self.width {
                if self.get(x, y) {
                    out.set(x + margin, y + margin);
                }
            }
        }
        Ok(out)
    }
}

impl Display for BitMatrix {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for y in 0..self.height {
            for x in 0..self.width {
                f.write_str(if self.get(x, y) { "X " } else { "  " })?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
