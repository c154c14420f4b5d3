use std::fmt;

use crate::common::{BitMatrix, ScanError, ScanResult};

// Error correction level
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum EcLevel {
    #[default]
    L = 0,
    M = 1,
    Q = 2,
    H = 3,
}

impl EcLevel {
    pub const ALL: [EcLevel; 4] = [Self::L, Self::M, Self::Q, Self::H];

    pub fn format_bits(self) -> u32 {
        match self {
            Self::L => 0b01,
            Self::M => 0b00,
            Self::Q => 0b11,
            Self::H => 0b10,
        }
    }

    pub fn from_format_bits(bits: u32) -> Self {
        match bits & 0b11 {
            0b01 => Self::L,
            0b00 => Self::M,
            0b11 => Self::Q,
            _ => Self::H,
        }
    }
}

impl fmt::Display for EcLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::L => "L",
            Self::M => "M",
            Self::Q => "Q",
            Self::H => "H",
        };
        f.write_str(s)
    }
}

// Version
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(usize);

impl Version {
    pub fn new(v: usize) -> ScanResult<Self> {
        if !(1..=40).contains(&v) {
            return Err(ScanError::invalid(format!("QR version out of range: {v}")));
        }
        Ok(Self(v))
    }

    pub fn number(self) -> usize {
        self.0
    }

    pub fn width(self) -> usize {
        self.0 * 4 + 17
    }

    pub fn from_dimension(width: usize) -> ScanResult<Self> {
        if width < 21 || width % 4 != 1 {
            return Err(ScanError::Format("invalid QR dimension"));
        }
        Self::new((width - 17) / 4).map_err(|_| ScanError::Format("invalid QR dimension"))
    }

    pub fn alignment_pattern_positions(self) -> Vec<usize> {
        let v = self.0;
        if v == 1 {
            return vec![];
        }
        let num = v / 7 + 2;
        let step = if v == 32 { 26 } else { (v * 4 + num * 2 + 1) / (num * 2 - 2) * 2 };
        let last = self.width() - 7;
        (0..num).map(|i| if i == 0 { 6 } else { last - (num - 1 - i) * step }).collect()
    }

    pub fn raw_data_modules(self) -> usize {
        let v = self.0;
        let mut res = (16 * v + 128) * v + 64;
        if v >= 2 {
            let num_align = v / 7 + 2;
            res -= (25 * num_align - 10) * num_align - 55;
            if v >= 7 {
                res -= 36;
            }
        }
        res
    }

    pub fn total_codewords(self) -> usize {
        self.raw_data_modules() >> 3
    }

    pub fn remainder_bits(self) -> usize {
        self.raw_data_modules() & 7
    }

    pub fn ecc_per_block(self, ecl: EcLevel) -> usize {
        ECC_CODEWORDS_PER_BLOCK[ecl as usize][self.0] as usize
    }

    pub fn num_blocks(self, ecl: EcLevel) -> usize {
        NUM_ERROR_CORRECTION_BLOCKS[ecl as usize][self.0] as usize
    }

    pub fn data_codewords(self, ecl: EcLevel) -> usize {
        self.total_codewords() - self.ecc_per_block(ecl) * self.num_blocks(ecl)
    }

    pub fn data_bit_capacity(self, ecl: EcLevel) -> usize {
        self.data_codewords(ecl) << 3
    }

    pub fn data_codewords_per_block(self, ecl: EcLevel) -> Vec<usize> {
        let blocks = self.num_blocks(ecl);
        let total = self.total_codewords();
        let short_len = total / blocks;
        let num_short = blocks - total % blocks;
        let ecc = self.ecc_per_block(ecl);
        (0..blocks).map(|b| short_len - ecc + usize::from(b >= num_short)).collect()
    }

    pub fn info_bits(self) -> u32 {
        let v = self.0 as u32;
        let mut rem = v;
        for _ in 0..12 {
            rem = (rem << 1) ^ ((rem >> 11) * 0x1F25);
        }
        (v << 12) | rem
    }

    pub fn decode_info_bits(bits: u32) -> Option<Self> {
        let (best, dist) = (7..=40)
            .map(|v| (v, (Self(v).info_bits() ^ bits).count_ones()))
            .min_by_key(|&(_, d)| d)?;
        (dist <= 3).then_some(Self(best))
    }

    pub fn function_pattern(self) -> ScanResult<BitMatrix> {
        let dim = self.width();
        let mut m = BitMatrix::square(dim)?;
        m.set_region(0, 0, 9, 9)?;
        m.set_region(dim - 8, 0, 8, 9)?;
        m.set_region(0, dim - 8, 9, 8)?;

        let pos = self.alignment_pattern_positions();
        let max = pos.len();
        for (xi, &x) in pos.iter().enumerate() {
            for (yi, &y) in pos.iter().enumerate() {
                if (xi == 0 && (yi == 0 || yi == max - 1)) || (xi == max - 1 && yi == 0) {
                    continue;
                }
                m.set_region(x - 2, y - 2, 5, 5)?;
            }
        }

        m.set_region(6, 9, 1, dim - 17)?;
        m.set_region(9, 6, dim - 17, 1)?;
        if self.0 > 6 {
            m.set_region(dim - 11, 0, 3, 6)?;
            m.set_region(0, dim - 11, 6, 3)?;
        }
        Ok(m)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Format information
//------------------------------------------------------------------------------

pub const FORMAT_MASK: u32 = 0x5412;

pub fn format_info_bits(ecl: EcLevel, mask: u8) -> u32 {
    let data = (ecl.format_bits() << 3) | mask as u32;
    let mut rem = data;
    for _ in 0..10 {
        rem = (rem << 1) ^ ((rem >> 9) * 0x537);
    }
    ((data << 10) | rem) ^ FORMAT_MASK
}

pub fn decode_format_info(bits1: u32, bits2: u32) -> Option<(EcLevel, u8)> {
    let mut best = None;
    let mut best_dist = u32::MAX;
    for ecl in EcLevel::ALL {
        for mask in 0..8u8 {
            let target = format_info_bits(ecl, mask);
            if target == bits1 || target == bits2 {
                return Some((ecl, mask));
            }
            for bits in [bits1, bits2] {
                let d = (bits ^ target).count_ones();
                if d < best_dist {
                    best_dist = d;
                    best = Some((ecl, mask));
                }
            }
        }
    }
    if best_dist <= 3 {
        best
    } else {
        None
    }
}

// Tables
//------------------------------------------------------------------------------

static ECC_CODEWORDS_PER_BLOCK: [[i8; 41]; 4] = [
    [
        -1, 7, 10, 15, 20, 26, 18, 20, 24, 30, 18, 20, 24, 26, 30, 22, 24, 28, 30, 28, 28, 28, 28,
        30, 30, 26, 28, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ],
    [
        -1, 10, 16, 26, 18, 24, 16, 18, 22, 22, 26, 30, 22, 22, 24, 24, 28, 28, 26, 26, 26, 26, 28,
        28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28,
    ],
    [
        -1, 13, 22, 18, 26, 18, 24, 18, 22, 20, 24, 28, 26, 24, 20, 30, 24, 28, 28, 26, 30, 28, 30,
        30, 30, 30, 28, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ],
    [
        -1, 17, 28, 22, 16, 22, 28, 26, 26, 24, 28, 24, 28, 22, 24, 24, 30, 28, 28, 26, 28, 30, 24,
        30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ],
];

static NUM_ERROR_CORRECTION_BLOCKS: [[i8; 41]; 4] = [
    [
        -1, 1, 1, 1, 1, 1, 2, 2, 2, 2, 4, 4, 4, 4, 4, 6, 6, 6, 6, 7, 8, 8, 9, 9, 10, 12, 12, 12, 13,
        14, 15, 16, 17, 18, 19, 19, 20, 21, 22, 24, 25,
    ],
    [
        -1, 1, 1, 1, 2, 2, 4, 4, 4, 5, 5, 5, 8, 9, 9, 10, 10, 11, 13, 14, 16, 17, 17, 18, 20, 21,
        23, 25, 26, 28, 29, 31, 33, 35, 37, 38, 40, 43, 45, 47, 49,
    ],
    [
        -1, 1, 1, 2, 2, 4, 4, 6, 6, 8, 8, 8, 10, 12, 16, 12, 17, 16, 18, 21, 20, 23, 23, 25, 27,
        29, 34, 34, 35, 38, 40, 43, 45, 48, 51, 53, 56, 59, 62, 65, 68,
    ],
    [
        -1, 1, 1, 2, 4, 4, 4, 5, 6, 8, 8, 11, 11, 16, 16, 18, 16, 19, 21, 25, 25, 25, 34, 30, 32,
        35, 37, 40, 42, 45, 48, 51, 54, 57, 60, 63, 66, 70, 74, 77, 81,
    ],
];

#[cfg(test)]
mod version_tests {
    use test_case::test_case;

    use super::*;

    #[test_case(1, &[])]
    #[test_case(2, &[6, 18])]
    #[test_case(7, &[6, 22, 38])]
    #[test_case(32, &[6, 34, 60, 86, 112, 138])]
    #[test_case(36, &[6, 24, 50, 76, 102, 128, 154])]
    #[test_case(39, &[6, 26, 54, 82, 110, 138, 166])]
    #[test_case(40, &[6, 30, 58, 86, 114, 142, 170])]
    fn test_alignment_positions(v: usize, exp: &[usize]) {
        assert_eq!(Version::new(v).unwrap().alignment_pattern_positions(), exp);
    }

    #[test_case(1, EcLevel::L, 19)]
    #[test_case(1, EcLevel::H, 9)]
    #[test_case(5, EcLevel::Q, 62)]
    #[test_case(40, EcLevel::L, 2956)]
    #[test_case(40, EcLevel::H, 1276)]
    fn test_data_codewords(v: usize, ecl: EcLevel, exp: usize) {
        assert_eq!(Version::new(v).unwrap().data_codewords(ecl), exp);
    }

    #[test]
    fn test_blocks_cover_codewords() {
        for v in 1..=40 {
            let ver = Version::new(v).unwrap();
            for ecl in EcLevel::ALL {
                let blocks = ver.data_codewords_per_block(ecl);
                assert_eq!(blocks.iter().sum::<usize>(), ver.data_codewords(ecl));
            }
        }
    }

    #[test]
    fn test_function_pattern_leaves_raw_modules() {
        for v in 1..=40 {
            let ver = Version::new(v).unwrap();
            let w = ver.width();
            assert_eq!(w * w - ver.function_pattern().unwrap().count_ones(), ver.raw_data_modules());
        }
    }

    #[test]
    fn test_version_info() {
        assert_eq!(Version::new(7).unwrap().info_bits(), 0x07C94);
        assert_eq!(Version::decode_info_bits(0x07C94 ^ 0b101), Some(Version::new(7).unwrap()));
        assert_eq!(Version::decode_info_bits(0x28C69), Some(Version::new(40).unwrap()));
    }

    #[test]
    fn test_format_info() {
        assert_eq!(format_info_bits(EcLevel::M, 0), 0x5412);
        assert_eq!(format_info_bits(EcLevel::L, 0), 0x77C4);
        assert_eq!(format_info_bits(EcLevel::L, 4), 0x662F);
        assert_eq!(format_info_bits(EcLevel::H, 7), 0x083B);
        assert_eq!(decode_format_info(0x5412 ^ 0b111, 0), Some((EcLevel::M, 0)));
        assert_eq!(decode_format_info(0x662F ^ 0x7000, 0x662F ^ 0b1000_0001), Some((EcLevel::L, 4)));
    }

    #[test]
    fn test_dimension() {
        assert_eq!(Version::from_dimension(21).unwrap().number(), 1);
        assert!(Version::from_dimension(22).is_err());
        assert!(Version::from_dimension(181).is_err());
    }
}
