use crate::common::{BitMatrix, ScanResult};

use super::{format_info_bits, EcLevel, Version};

// Iterator over data modules
//------------------------------------------------------------------------------

/// Walks a symbol in codeword placement order: two module wide columns from the right
/// edge, alternating upward and downward and skipping the vertical timing column.
///
/// Yields `(x, y)` for every module outside column 6, function modules included;
/// callers skip reserved modules.
pub struct DataRegionIter {
    r: i16,
    c: i16,
    width: i16,
}

const VERT_TIMING_COL: i16 = 6;

impl DataRegionIter {
    pub fn new(version: Version) -> Self {
        let w = version.width() as i16;
        Self { r: w - 1, c: w - 1, width: w }
    }
}

impl Iterator for DataRegionIter {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        if self.c < 0 {
            return None;
        }
        let adjusted_col = if self.c <= VERT_TIMING_COL { self.c + 1 } else { self.c };
        let res = (self.c as usize, self.r as usize);
        let col_type = (self.width - adjusted_col) % 4;
        match col_type {
            2 if self.r > 0 => {
                self.r -= 1;
                self.c += 1;
            }
            0 if self.r < self.width - 1 => {
                self.r += 1;
                self.c += 1;
            }
            0 | 2 if self.c == VERT_TIMING_COL + 1 => {
                self.c -= 2;
            }
            _ => {
                self.c -= 1;
            }
        }
        Some(res)
    }
}

// Function patterns
//------------------------------------------------------------------------------

pub fn draw_function_patterns(m: &mut BitMatrix, ver: Version) {
    let w = ver.width();
    for i in 0..w {
        m.set_value(6, i, i % 2 == 0);
        m.set_value(i, 6, i % 2 == 0);
    }

    for (cx, cy) in [(3, 3), (w - 4, 3), (3, w - 4)] {
        for dy in -4i32..=4 {
            for dx in -4i32..=4 {
                let (x, y) = (cx as i32 + dx, cy as i32 + dy);
                if x < 0 || y < 0 || x >= w as i32 || y >= w as i32 {
                    continue;
                }
                let dist = dx.abs().max(dy.abs());
                m.set_value(x as usize, y as usize, dist != 2 && dist != 4);
            }
        }
    }

    let pos = ver.alignment_pattern_positions();
    let n = pos.len();
    for (i, &cx) in pos.iter().enumerate() {
        for (j, &cy) in pos.iter().enumerate() {
            if (i == 0 && j == 0) || (i == 0 && j == n - 1) || (i == n - 1 && j == 0) {
                continue;
            }
            for dy in -2i32..=2 {
                for dx in -2i32..=2 {
                    let (x, y) = ((cx as i32 + dx) as usize, (cy as i32 + dy) as usize);
                    m.set_value(x, y, dx.abs().max(dy.abs()) != 1);
                }
            }
        }
    }

    m.set(8, w - 8);
}

// Format and version information
//------------------------------------------------------------------------------

// (x, y) of format bits, least significant first; negative values count from the far edge
static FORMAT_INFO_COORDS_MAIN: [(i32, i32); 15] = [
    (8, 0),
    (8, 1),
    (8, 2),
    (8, 3),
    (8, 4),
    (8, 5),
    (8, 7),
    (8, 8),
    (7, 8),
    (5, 8),
    (4, 8),
    (3, 8),
    (2, 8),
    (1, 8),
    (0, 8),
];

static FORMAT_INFO_COORDS_SIDE: [(i32, i32); 15] = [
    (-1, 8),
    (-2, 8),
    (-3, 8),
    (-4, 8),
    (-5, 8),
    (-6, 8),
    (-7, 8),
    (-8, 8),
    (8, -7),
    (8, -6),
    (8, -5),
    (8, -4),
    (8, -3),
    (8, -2),
    (8, -1),
];

fn resolve(coord: i32, w: usize) -> usize {
    if coord < 0 {
        (w as i32 + coord) as usize
    } else {
        coord as usize
    }
}

fn version_info_coords(w: usize, i: usize, top_right: bool) -> (usize, usize) {
    let (a, b) = (w - 11 + i % 3, i / 3);
    if top_right {
        (a, b)
    } else {
        (b, a)
    }
}

pub fn draw_format_info(m: &mut BitMatrix, ecl: EcLevel, mask: u8) {
    let w = m.width();
    let bits = format_info_bits(ecl, mask);
    for (i, (&main, &side)) in FORMAT_INFO_COORDS_MAIN.iter().zip(&FORMAT_INFO_COORDS_SIDE).enumerate() {
        let bit = (bits >> i) & 1 == 1;
        m.set_value(resolve(main.0, w), resolve(main.1, w), bit);
        m.set_value(resolve(side.0, w), resolve(side.1, w), bit);
    }
}

pub fn draw_version_info(m: &mut BitMatrix, ver: Version) {
    if ver.number() < 7 {
        return;
    }
    let w = m.width();
    let bits = ver.info_bits();
    for i in 0..18 {
        let bit = (bits >> i) & 1 == 1;
        for tr in [true, false] {
            let (x, y) = version_info_coords(w, i, tr);
            m.set_value(x, y, bit);
        }
    }
}

pub fn read_format_info(m: &BitMatrix) -> (u32, u32) {
    let w = m.width();
    let read = |coords: &[(i32, i32); 15]| {
        coords
            .iter()
            .enumerate()
            .filter(|(_, &(x, y))| m.get(resolve(x, w), resolve(y, w)))
            .fold(0u32, |acc, (i, _)| acc | (1 << i))
    };
    (read(&FORMAT_INFO_COORDS_MAIN), read(&FORMAT_INFO_COORDS_SIDE))
}

pub fn read_version_info(m: &BitMatrix) -> (u32, u32) {
    let w = m.width();
    let read = |tr: bool| {
        (0..18).fold(0u32, |acc, i| {
            let (x, y) = version_info_coords(w, i, tr);
            acc | ((m.get(x, y) as u32) << i)
        })
    };
    (read(true), read(false))
}

pub fn new_symbol(ver: Version) -> ScanResult<BitMatrix> {
    let mut m = BitMatrix::square(ver.width())?;
    draw_function_patterns(&mut m, ver);
    draw_version_info(&mut m, ver);
    Ok(m)
}

#[cfg(test)]
mod symbol_tests {
    use super::*;

    #[test]
    fn test_data_region_iter_covers_raw_modules() {
        for v in 1..=40 {
            let ver = Version::new(v).unwrap();
            let reserved = ver.function_pattern().unwrap();
            let n = DataRegionIter::new(ver).filter(|&(x, y)| !reserved.get(x, y)).count();
            assert_eq!(n, ver.raw_data_modules());
        }
    }

    #[test]
    fn test_data_region_iter_order() {
        let ver = Version::new(1).unwrap();
        let coords: Vec<_> = DataRegionIter::new(ver).take(5).collect();
        assert_eq!(coords, vec![(20, 20), (19, 20), (20, 19), (19, 19), (20, 18)]);
        assert!(DataRegionIter::new(ver).all(|(x, _)| x != 6));
    }

    #[test]
    fn test_format_info_round_trip() {
        let ver = Version::new(2).unwrap();
        let mut m = new_symbol(ver).unwrap();
        draw_format_info(&mut m, EcLevel::Q, 5);
        let exp = format_info_bits(EcLevel::Q, 5);
        assert_eq!(read_format_info(&m), (exp, exp));
        // Dark module survives
        assert!(m.get(8, ver.width() - 8));
    }

    #[test]
    fn test_version_info_round_trip() {
        let ver = Version::new(12).unwrap();
        let m = new_symbol(ver).unwrap();
        assert_eq!(read_version_info(&m), (ver.info_bits(), ver.info_bits()));
    }

    #[test]
    fn test_finder_pattern() {
        let m = new_symbol(Version::new(1).unwrap()).unwrap();
        assert!(m.get(0, 0) && m.get(6, 6) && m.get(3, 3));
        assert!(!m.get(1, 1) && !m.get(7, 7));
        assert!(m.get(20, 0) && m.get(0, 20));
    }
}
