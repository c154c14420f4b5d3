use std::sync::LazyLock;

use crate::common::{BitMatrix, ScanError, ScanResult};

pub const MATRIX_WIDTH: usize = 30;
pub const MATRIX_HEIGHT: usize = 33;
pub const CODEWORDS: usize = 144;

const FINDER_CELLS: usize = 90;
const PRIMARY_BITS: usize = 120;
const TOTAL_BITS: usize = CODEWORDS * 6;
const ROW_PITCH: f64 = 0.866_025_403_784_438_6;
const ANCHORS: [(usize, usize); 4] = [(28, 0), (29, 0), (0, 32), (1, 32)];

/// Role of one hexagon in the 30 x 33 grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    // Never printed. The last hexagon of every odd row and the leftover modules.
    Unused,
    // Part of the central bullseye, painted by ring.
    Finder { dark: bool },
    // Always dark, pinning the corners of the symbol.
    Anchor,
    // Bit `n` of the codeword stream, most significant bit of codeword 0 first.
    Bit(u16),
}

/// Module placement shared by the encoder and the bit matrix parser.
///
/// The bullseye takes the hexagons nearest the center, the primary message the ring
/// around it. The secondary message fills the rest in bands three rows high, each
/// codeword a block two modules wide, bands walked alternately left to right and right
/// to left. Hexagons already taken are skipped, the stream continuing in the next one.
pub struct Layout {
    cells: Vec<Cell>,
    positions: Vec<(usize, usize)>,
}

pub static LAYOUT: LazyLock<Layout> = LazyLock::new(Layout::build);

fn center_distance(x: usize, y: usize) -> f64 {
    let cx = x as f64 + if y & 1 == 1 { 0.5 } else { 0.0 };
    let cy = y as f64 * ROW_PITCH;
    (cx - 14.5).hypot(cy - 16.0 * ROW_PITCH)
}

fn exists(x: usize, y: usize) -> bool {
    y & 1 == 0 || x < MATRIX_WIDTH - 1
}

impl Layout {
    fn build() -> Self {
        let mut cells: Vec<Option<Cell>> = vec![None; MATRIX_WIDTH * MATRIX_HEIGHT];
        let idx = |x: usize, y: usize| y * MATRIX_WIDTH + x;
        for y in 0..MATRIX_HEIGHT {
            for x in 0..MATRIX_WIDTH {
                if !exists(x, y) {
                    cells[idx(x, y)] = Some(Cell::Unused);
                }
            }
        }
        for (x, y) in ANCHORS {
            cells[idx(x, y)] = Some(Cell::Anchor);
        }

        let mut free: Vec<(usize, usize)> = (0..MATRIX_HEIGHT)
            .flat_map(|y| (0..MATRIX_WIDTH).map(move |x| (x, y)))
            .filter(|&(x, y)| cells[idx(x, y)].is_none())
            .collect();
        free.sort_by(|a, b| {
            center_distance(a.0, a.1)
                .total_cmp(&center_distance(b.0, b.1))
                .then((a.1, a.0).cmp(&(b.1, b.0)))
        });

        for &(x, y) in &free[..FINDER_CELLS] {
            let ring = (center_distance(x, y) / 0.9) as usize;
            cells[idx(x, y)] = Some(Cell::Finder { dark: ring % 2 == 1 });
        }
        let mut primary = free[FINDER_CELLS..FINDER_CELLS + PRIMARY_BITS].to_vec();
        primary.sort_by_key(|&(x, y)| (y, x));

        let mut positions = vec![(0, 0); TOTAL_BITS];
        for (bit, &(x, y)) in primary.iter().enumerate() {
            cells[idx(x, y)] = Some(Cell::Bit(bit as u16));
            positions[bit] = (x, y);
        }

        let mut next = PRIMARY_BITS;
        for band in 0..MATRIX_HEIGHT / 3 {
            let blocks: Vec<usize> = if band % 2 == 0 {
                (0..MATRIX_WIDTH / 2).collect()
            } else {
                (0..MATRIX_WIDTH / 2).rev().collect()
            };
            for block in blocks {
                for dy in 0..3 {
                    for x in [2 * block + 1, 2 * block] {
                        let y = band * 3 + dy;
                        let cell = &mut cells[idx(x, y)];
                        if cell.is_none() && next < TOTAL_BITS {
                            *cell = Some(Cell::Bit(next as u16));
                            positions[next] = (x, y);
                            next += 1;
                        }
                    }
                }
            }
        }
        debug_assert_eq!(next, TOTAL_BITS);

        Self { cells: cells.into_iter().map(|c| c.unwrap_or(Cell::Unused)).collect(), positions }
    }

    pub fn cell(&self, x: usize, y: usize) -> Cell {
        self.cells[y * MATRIX_WIDTH + x]
    }

    pub fn position(&self, bit: usize) -> (usize, usize) {
        self.positions[bit]
    }

    pub fn read_codewords(&self, bits: &BitMatrix) -> ScanResult<Vec<u8>> {
        if bits.width() != MATRIX_WIDTH || bits.height() != MATRIX_HEIGHT {
            return Err(ScanError::Format("MaxiCode grid must be 30 x 33"));
        }
        let mut codewords = vec![0u8; CODEWORDS];
        for (bit, &(x, y)) in self.positions.iter().enumerate() {
            if bits.get(x, y) {
                codewords[bit / 6] |= 1 << (5 - bit % 6);
            }
        }
        Ok(codewords)
    }

    pub fn place(&self, codewords: &[u8]) -> ScanResult<BitMatrix> {
        if codewords.len() != CODEWORDS {
            return Err(ScanError::invalid(format!("MaxiCode needs {CODEWORDS} codewords: Got {}", codewords.len())));
        }
        let mut matrix = BitMatrix::new(MATRIX_WIDTH, MATRIX_HEIGHT)?;
        for y in 0..MATRIX_HEIGHT {
            for x in 0..MATRIX_WIDTH {
                let dark = match self.cell(x, y) {
                    Cell::Unused => false,
                    Cell::Finder { dark } => dark,
                    Cell::Anchor => true,
                    Cell::Bit(bit) => {
                        let bit = bit as usize;
                        codewords[bit / 6] & (1 << (5 - bit % 6)) != 0
                    }
                };
                matrix.set_value(x, y, dark);
            }
        }
        Ok(matrix)
    }
}

pub fn extract_pure_bits(image: &BitMatrix) -> ScanResult<BitMatrix> {
    let [left, top, width, height] = image.enclosing_rectangle().ok_or(ScanError::NotFound)?;
    if width < MATRIX_WIDTH || height < MATRIX_HEIGHT {
        return Err(ScanError::NotFound);
    }
    let mut bits = BitMatrix::new(MATRIX_WIDTH, MATRIX_HEIGHT)?;
    for y in 0..MATRIX_HEIGHT {
        let iy = top + ((y * height + height / 2) / MATRIX_HEIGHT).min(height - 1);
        for x in 0..MATRIX_WIDTH {
            let ix = left + ((x * width + width / 2 + (y & 1) * width / 2) / MATRIX_WIDTH).min(width - 1);
            if image.get(ix, iy) {
                bits.set(x, y);
            }
        }
    }
    Ok(bits)
}

pub fn render(modules: &BitMatrix, scale: usize) -> ScanResult<BitMatrix> {
    let scale = scale.max(2) & !1;
    let mut out = BitMatrix::new(MATRIX_WIDTH * scale, MATRIX_HEIGHT * scale)?;
    for y in 0..MATRIX_HEIGHT {
        for x in 0..MATRIX_WIDTH {
            if modules.get(x, y) {
                let left = x * scale + (y & 1) * scale / 2;
                out.set_region(left, y * scale, scale, scale)?;
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod layout_tests {
    use std::f64::consts::PI;

    use super::*;

    fn module_angle(x: usize, y: usize) -> f64 {
        let cx = x as f64 + if y & 1 == 1 { 0.5 } else { 0.0 } - 14.5;
        let cy = (y as f64 - 16.0) * ROW_PITCH;
        cy.atan2(cx).rem_euclid(2.0 * PI)
    }

    #[test]
    fn test_every_bit_placed_once() {
        let mut seen = vec![false; TOTAL_BITS];
        for y in 0..MATRIX_HEIGHT {
            for x in 0..MATRIX_WIDTH {
                if let Cell::Bit(b) = LAYOUT.cell(x, y) {
                    assert!(!seen[b as usize], "bit {b} placed twice");
                    seen[b as usize] = true;
                    assert_eq!(LAYOUT.position(b as usize), (x, y));
                }
            }
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_odd_rows_are_one_short() {
        for y in (1..MATRIX_HEIGHT).step_by(2) {
            assert_eq!(LAYOUT.cell(MATRIX_WIDTH - 1, y), Cell::Unused);
        }
    }

    #[test]
    fn test_primary_surrounds_finder() {
        let finder_max = (0..MATRIX_HEIGHT)
            .flat_map(|y| (0..MATRIX_WIDTH).map(move |x| (x, y)))
            .filter(|&(x, y)| matches!(LAYOUT.cell(x, y), Cell::Finder { .. }))
            .map(|(x, y)| center_distance(x, y))
            .fold(0.0, f64::max);
        for bit in 0..PRIMARY_BITS {
            let (x, y) = LAYOUT.position(bit);
            assert!(center_distance(x, y) >= finder_max);
        }
        // The primary ring goes all the way around.
        let mut quadrants = [false; 4];
        for bit in 0..PRIMARY_BITS {
            let (x, y) = LAYOUT.position(bit);
            quadrants[(module_angle(x, y) / (PI / 2.0)) as usize % 4] = true;
        }
        assert_eq!(quadrants, [true; 4]);
    }

    #[test]
    fn test_place_then_read() {
        let codewords: Vec<u8> = (0..CODEWORDS).map(|i| (i * 37 % 64) as u8).collect();
        let modules = LAYOUT.place(&codewords).unwrap();
        assert_eq!(LAYOUT.read_codewords(&modules).unwrap(), codewords);
    }

    #[test]
    fn test_render_then_extract() {
        let codewords: Vec<u8> = (0..CODEWORDS).map(|i| (i * 11 % 64) as u8).collect();
        let modules = LAYOUT.place(&codewords).unwrap();
        for scale in [2, 4, 7] {
            let image = render(&modules, scale).unwrap();
            assert_eq!(extract_pure_bits(&image).unwrap(), modules);
        }
    }

    #[test]
    fn test_extract_blank() {
        assert_eq!(extract_pure_bits(&BitMatrix::square(50).unwrap()).unwrap_err(), ScanError::NotFound);
    }
}
