use crate::common::{ScanError, ScanResult};

use super::Version;

// Mode
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Copy, Clone, Hash)]
pub enum Mode {
    Terminator = 0b0000,
    Numeric = 0b0001,
    Alphanumeric = 0b0010,
    StructuredAppend = 0b0011,
    Byte = 0b0100,
    Fnc1First = 0b0101,
    Eci = 0b0111,
    Kanji = 0b1000,
    Fnc1Second = 0b1001,
    Hanzi = 0b1101,
}

pub const SEGMENT_MODES: [Mode; 3] = [Mode::Numeric, Mode::Alphanumeric, Mode::Byte];

const ALPHANUMERIC_CHARS: &[u8; 45] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ $%*+-./:";

impl Mode {
    pub fn from_bits(bits: u32) -> ScanResult<Self> {
        let mode = match bits {
            0b0000 => Self::Terminator,
            0b0001 => Self::Numeric,
            0b0010 => Self::Alphanumeric,
            0b0011 => Self::StructuredAppend,
            0b0100 => Self::Byte,
            0b0101 => Self::Fnc1First,
            0b0111 => Self::Eci,
            0b1000 => Self::Kanji,
            0b1001 => Self::Fnc1Second,
            0b1101 => Self::Hanzi,
            _ => return Err(ScanError::Format("invalid QR mode indicator")),
        };
        Ok(mode)
    }

    pub fn char_cnt_bits(self, ver: Version) -> usize {
        let idx = match ver.number() {
            1..=9 => 0,
            10..=26 => 1,
            _ => 2,
        };
        let bits = match self {
            Self::Numeric => [10, 12, 14],
            Self::Alphanumeric => [9, 11, 13],
            Self::Byte => [8, 16, 16],
            Self::Kanji | Self::Hanzi => [8, 10, 12],
            _ => [0, 0, 0],
        };
        bits[idx]
    }

    pub fn contains(self, byte: u8) -> bool {
        match self {
            Self::Numeric => byte.is_ascii_digit(),
            Self::Alphanumeric => ALPHANUMERIC_CHARS.contains(&byte),
            Self::Byte => true,
            _ => false,
        }
    }

    pub fn encode_chunk(self, data: &[u8]) -> u16 {
        let len = data.len();
        match self {
            Self::Numeric => {
                debug_assert!(len <= 3, "Data is too long for numeric conversion: {len}");
                data.iter().fold(0_u16, |n, b| n * 10 + (b - b'0') as u16)
            }
            Self::Alphanumeric => {
                debug_assert!(len <= 2, "Data is too long for alphanumeric conversion: {len}");
                data.iter().fold(0_u16, |n, b| n * 45 + alphanumeric_digit(*b))
            }
            Self::Byte => {
                debug_assert!(len == 1, "Data is too long for byte conversion: {len}");
                data[0] as u16
            }
            _ => unreachable!("Mode {self:?} has no character data"),
        }
    }

    pub fn encoded_len(self, len: usize) -> usize {
        match self {
            Self::Numeric => (len * 10).div_ceil(3),
            Self::Alphanumeric => (len * 11).div_ceil(2),
            Self::Byte => len * 8,
            Self::Kanji | Self::Hanzi => len * 13,
            _ => 0,
        }
    }
}

fn alphanumeric_digit(char: u8) -> u16 {
    debug_assert!(Mode::Alphanumeric.contains(char), "Invalid alphanumeric data: {char}");
    ALPHANUMERIC_CHARS.iter().position(|&c| c == char).unwrap_or_default() as u16
}

pub fn alphanumeric_char(value: u32) -> ScanResult<char> {
    ALPHANUMERIC_CHARS
        .get(value as usize)
        .map(|&b| b as char)
        .ok_or(ScanError::Format("alphanumeric value out of range"))
}

#[cfg(test)]
mod mode_tests {
    use test_case::test_case;

    use super::{alphanumeric_char, Mode};
    use crate::qrcode::Version;

    #[test_case(b"123", 123)]
    #[test_case(b"07", 7)]
    fn test_numeric_chunk(data: &[u8], exp: u16) {
        assert_eq!(Mode::Numeric.encode_chunk(data), exp);
    }

    #[test]
    fn test_alphanumeric_chunk() {
        assert_eq!(Mode::Alphanumeric.encode_chunk(b"AC"), 10 * 45 + 12);
        assert_eq!(Mode::Alphanumeric.encode_chunk(b":"), 44);
        assert_eq!(alphanumeric_char(44).unwrap(), ':');
        assert!(alphanumeric_char(45).is_err());
    }

    #[test_case(1, Mode::Numeric, 10)]
    #[test_case(10, Mode::Alphanumeric, 11)]
    #[test_case(27, Mode::Byte, 16)]
    #[test_case(40, Mode::Kanji, 12)]
    fn test_char_cnt_bits(v: usize, mode: Mode, exp: usize) {
        assert_eq!(mode.char_cnt_bits(Version::new(v).unwrap()), exp);
    }

    #[test]
    fn test_from_bits() {
        assert_eq!(Mode::from_bits(0b0111).unwrap(), Mode::Eci);
        assert!(Mode::from_bits(0b0110).is_err());
    }

    #[test]
    fn test_contains() {
        assert!(Mode::Alphanumeric.contains(b'$'));
        assert!(!Mode::Alphanumeric.contains(b'a'));
        assert!(Mode::Byte.contains(0xFF));
    }
}
