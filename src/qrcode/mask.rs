use std::ops::Deref;

use crate::common::{BitMatrix, ScanError, ScanResult};

// Mask pattern
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Copy, Clone, PartialOrd, Ord, Hash)]
pub struct MaskPattern(u8);

impl MaskPattern {
    pub fn new(pattern: u8) -> ScanResult<Self> {
        if pattern >= 8 {
            return Err(ScanError::invalid(format!("Invalid masking pattern: {pattern}")));
        }
        Ok(Self(pattern))
    }

    pub fn all() -> impl Iterator<Item = Self> {
        (0..8).map(Self)
    }
}

impl Deref for MaskPattern {
    type Target = u8;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// x is the column and y the row of a module
mod mask_functions {
    pub fn checkerboard(x: usize, y: usize) -> bool {
        (x + y) & 1 == 0
    }

    pub fn horizontal_lines(_: usize, y: usize) -> bool {
        y & 1 == 0
    }

    pub fn vertical_lines(x: usize, _: usize) -> bool {
        x % 3 == 0
    }

    pub fn diagonal_lines(x: usize, y: usize) -> bool {
        (x + y) % 3 == 0
    }

    pub fn large_checkerboard(x: usize, y: usize) -> bool {
        ((y >> 1) + (x / 3)) & 1 == 0
    }

    pub fn fields(x: usize, y: usize) -> bool {
        ((x * y) & 1) + ((x * y) % 3) == 0
    }

    pub fn diamonds(x: usize, y: usize) -> bool {
        (((x * y) & 1) + ((x * y) % 3)) & 1 == 0
    }

    pub fn meadow(x: usize, y: usize) -> bool {
        (((x + y) & 1) + ((x * y) % 3)) & 1 == 0
    }
}

impl MaskPattern {
    pub fn mask_function(self) -> fn(usize, usize) -> bool {
        match self.0 {
            0b000 => mask_functions::checkerboard,
            0b001 => mask_functions::horizontal_lines,
            0b010 => mask_functions::vertical_lines,
            0b011 => mask_functions::diagonal_lines,
            0b100 => mask_functions::large_checkerboard,
            0b101 => mask_functions::fields,
            0b110 => mask_functions::diamonds,
            0b111 => mask_functions::meadow,
            _ => unreachable!(),
        }
    }

    pub fn apply(self, matrix: &mut BitMatrix, reserved: &BitMatrix) {
        let mask_fn = self.mask_function();
        for y in 0..matrix.height() {
            for x in 0..matrix.width() {
                if !reserved.get(x, y) && mask_fn(x, y) {
                    matrix.flip(x, y);
                }
            }
        }
    }
}

// Penalty
//------------------------------------------------------------------------------

pub fn compute_total_penalty(m: &BitMatrix) -> u32 {
    let adj_pen = compute_adjacent_penalty(m);
    let blk_pen = compute_block_penalty(m);
    let fp_pen_h = compute_finder_pattern_penalty(m, true);
    let fp_pen_v = compute_finder_pattern_penalty(m, false);
    let bal_pen = compute_balance_penalty(m);
    adj_pen + blk_pen + fp_pen_h + fp_pen_v + bal_pen
}

// 3 for a run of 5 same colored modules, plus 1 per extra module
fn compute_adjacent_penalty(m: &BitMatrix) -> u32 {
    let w = m.width();
    let mut pen = 0;
    for is_hor in [true, false] {
        for i in 0..w {
            let get = |j: usize| if is_hor { m.get(j, i) } else { m.get(i, j) };
            let mut run = 1;
            for j in 1..=w {
                if j < w && get(j) == get(j - 1) {
                    run += 1;
                    continue;
                }
                if run >= 5 {
                    pen += run as u32 - 2;
                }
                run = 1;
            }
        }
    }
    pen
}

fn compute_block_penalty(m: &BitMatrix) -> u32 {
    let mut pen = 0;
    let w = m.width();
    for y in 0..w - 1 {
        for x in 0..w - 1 {
            let clr = m.get(x, y);
            if clr == m.get(x + 1, y) && clr == m.get(x, y + 1) && clr == m.get(x + 1, y + 1) {
                pen += 3;
            }
        }
    }
    pen
}

fn compute_finder_pattern_penalty(m: &BitMatrix, is_hor: bool) -> u32 {
    static PATTERN: [bool; 7] = [true, false, true, true, true, false, true];
    let mut pen = 0;
    let w = m.width();
    for i in 0..w {
        let get = |j: usize| if is_hor { m.get(j, i) } else { m.get(i, j) };
        let is_light = |from: usize, to: usize| (from..to.min(w)).all(|j| !get(j));
        for j in 0..w.saturating_sub(6) {
            if (0..7).any(|k| get(j + k) != PATTERN[k]) {
                continue;
            }
            if is_light(j.saturating_sub(4), j) || is_light(j + 7, j + 11) {
                pen += 40;
            }
        }
    }
    pen
}

fn compute_balance_penalty(m: &BitMatrix) -> u32 {
    let dark_cnt = m.count_ones();
    let tot = m.width() * m.height();
    let variance = (dark_cnt * 2).abs_diff(tot) * 10 / tot;
    (variance * 10) as u32
}

#[cfg(test)]
mod mask_tests {
    use test_case::test_case;

    use super::{compute_adjacent_penalty, compute_balance_penalty, compute_block_penalty, MaskPattern};
    use crate::common::BitMatrix;

    #[test_case(0, 0, 0, true)]
    #[test_case(1, 1, 0, true)]
    #[test_case(1, 0, 1, false)]
    #[test_case(2, 3, 1, true)]
    #[test_case(2, 1, 3, false)]
    #[test_case(4, 3, 0, false)]
    #[test_case(5, 2, 3, true)]
    #[test_case(7, 1, 1, false)]
    #[test_case(7, 1, 3, true)]
    fn test_mask_functions(mask: u8, x: usize, y: usize, exp: bool) {
        let f = MaskPattern::new(mask).unwrap().mask_function();
        assert_eq!(f(x, y), exp);
    }

    #[test]
    fn test_invalid_mask() {
        assert!(MaskPattern::new(8).is_err());
    }

    #[test]
    fn test_apply_skips_reserved() {
        let mut m = BitMatrix::square(4).unwrap();
        let mut reserved = BitMatrix::square(4).unwrap();
        reserved.set(0, 0);
        MaskPattern::new(0).unwrap().apply(&mut m, &reserved);
        assert!(!m.get(0, 0));
        assert!(m.get(1, 1));
        assert!(!m.get(1, 0));
    }

    #[test]
    fn test_penalties() {
        let m = BitMatrix::parse("XXXXXX\nXXXXXX\nX.X.X.\n.X.X.X\nX.X.X.\n.X.X.X\n", "X", ".").unwrap();
        // Rows 0 and 1 score 4 each
        assert_eq!(compute_adjacent_penalty(&m), 8);
        // Five 2x2 blocks across rows 0 and 1
        assert_eq!(compute_block_penalty(&m), 15);
        // 24 of 36 dark
        assert_eq!(compute_balance_penalty(&m), 30);
    }
}
