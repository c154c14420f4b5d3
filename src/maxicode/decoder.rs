use std::sync::LazyLock;

use log::debug;

use super::layout::LAYOUT;
use crate::common::{
    ec::{galois::MAXICODE_FIELD_64, ReedSolomonDecoder},
    BitMatrix, CharacterSet, DecodeHints, DecoderResult, ScanError, ScanResult,
};

// Code sets
//------------------------------------------------------------------------------

// Values below 0x100 are plain bytes.
pub(crate) const SHIFT_A: u16 = 0x100;
pub(crate) const SHIFT_B: u16 = 0x101;
pub(crate) const SHIFT_C: u16 = 0x102;
pub(crate) const SHIFT_D: u16 = 0x103;
pub(crate) const SHIFT_E: u16 = 0x104;
pub(crate) const TWO_SHIFT_A: u16 = 0x105;
pub(crate) const THREE_SHIFT_A: u16 = 0x106;
pub(crate) const LATCH_A: u16 = 0x107;
pub(crate) const LATCH_B: u16 = 0x108;
pub(crate) const LOCK: u16 = 0x109;
pub(crate) const ECI: u16 = 0x10A;
pub(crate) const NS: u16 = 0x10B;
pub(crate) const PAD: u16 = 0x10C;

const FS: u16 = 0x1C;
const GS: u16 = 0x1D;
const RS: u16 = 0x1E;

// Code sets A to E, 64 values each.
pub(crate) static SETS: LazyLock<[Vec<u16>; 5]> = LazyLock::new(|| {
    let bytes = |s: &[u8]| s.iter().map(|&b| u16::from(b)).collect::<Vec<_>>();
    let range = |a: u8, b: u8| (a..=b).map(u16::from).collect::<Vec<_>>();
    [
        [
            vec![0x0D],
            range(b'A', b'Z'),
            vec![ECI, FS, GS, RS, NS, 0x20, PAD],
            bytes(b"\"#$%&'()*+,-./0123456789:"),
            vec![SHIFT_B, SHIFT_C, SHIFT_D, SHIFT_E, LATCH_B],
        ]
        .concat(),
        [
            vec![0x60],
            range(b'a', b'z'),
            vec![ECI, FS, GS, RS, NS, 0x7B, PAD],
            bytes(b"}~\x7F;<=>?[\\]^_ ,./:@!|"),
            vec![PAD, TWO_SHIFT_A, THREE_SHIFT_A, PAD, SHIFT_A, SHIFT_C, SHIFT_D, SHIFT_E, LATCH_A],
        ]
        .concat(),
        [
            range(0xC0, 0xDA),
            vec![ECI, FS, GS, RS, NS],
            bytes(&[0xDB, 0xDC, 0xDD, 0xDE, 0xDF, 0xAA, 0xAC, 0xB1, 0xB2, 0xB3, 0xB5, 0xB9, 0xBA, 0xBC, 0xBD, 0xBE]),
            range(0x80, 0x89),
            vec![LATCH_A, 0x20, LOCK, SHIFT_D, SHIFT_E, LATCH_B],
        ]
        .concat(),
        [
            range(0xE0, 0xFA),
            vec![ECI, FS, GS, RS, NS],
            bytes(&[0xFB, 0xFC, 0xFD, 0xFE, 0xFF, 0xA1, 0xA8, 0xAB, 0xAF, 0xB0, 0xB4, 0xB7, 0xB8, 0xBB, 0xBF]),
            range(0x8A, 0x94),
            vec![LATCH_A, 0x20, SHIFT_C, LOCK, SHIFT_E, LATCH_B],
        ]
        .concat(),
        [
            range(0x00, 0x1A),
            vec![ECI, PAD, PAD, 0x1B, NS, FS, GS, RS, 0x1F],
            bytes(&[0x9F, 0xA0, 0xA2, 0xA3, 0xA4, 0xA5, 0xA6, 0xA7, 0xA9, 0xAD, 0xAE, 0xB6]),
            range(0x95, 0x9E),
            vec![LATCH_A, 0x20, SHIFT_C, SHIFT_D, LOCK, LATCH_B],
        ]
        .concat(),
    ]
});

// Primary message fields, as 1-based bit positions into the first ten codewords
//------------------------------------------------------------------------------

pub(crate) const MODE_BITS: [usize; 4] = [3, 4, 5, 6];
pub(crate) const POSTCODE_2: [usize; 30] = [
    33, 34, 35, 36, 25, 26, 27, 28, 29, 30, 19, 20, 21, 22, 23, 24, 13, 14, 15, 16, 17, 18, 7, 8, 9, 10, 11, 12, 1,
    2,
];
pub(crate) const POSTCODE_2_LENGTH: [usize; 6] = [39, 40, 41, 42, 31, 32];
pub(crate) const POSTCODE_3: [[usize; 6]; 6] = [
    [39, 40, 41, 42, 31, 32],
    [33, 34, 35, 36, 25, 26],
    [27, 28, 29, 30, 19, 20],
    [21, 22, 23, 24, 13, 14],
    [15, 16, 17, 18, 7, 8],
    [9, 10, 11, 12, 1, 2],
];
pub(crate) const COUNTRY: [usize; 10] = [53, 54, 43, 44, 45, 46, 47, 48, 37, 38];
pub(crate) const SERVICE: [usize; 10] = [55, 56, 57, 58, 59, 60, 49, 50, 51, 52];

pub(crate) const PRIMARY_DATA: usize = 10;
pub(crate) const PRIMARY_EC: usize = 10;

fn get_int(codewords: &[u8], positions: &[usize]) -> u32 {
    positions.iter().fold(0, |acc, &pos| {
        let bit = pos - 1;
        (acc << 1) | u32::from((codewords[bit / 6] >> (5 - bit % 6)) & 1)
    })
}

// Data and error correction codewords of the secondary message.
pub(crate) fn secondary_split(mode: u8) -> ScanResult<(usize, usize)> {
    match mode {
        2 | 3 | 4 | 6 => Ok((84, 40)),
        5 => Ok((68, 56)),
        _ => Err(ScanError::Format("Unknown MaxiCode mode")),
    }
}

/// Postal fields carried in the primary message of modes 2 and 3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Carrier {
    pub postcode: String,
    pub country: u32,
    pub service: u32,
}

fn read_carrier(primary: &[u8], mode: u8) -> ScanResult<Carrier> {
    let postcode = if mode == 2 {
        let len = get_int(primary, &POSTCODE_2_LENGTH) as usize;
        if len > 10 {
            return Err(ScanError::Format("Postcode too long"));
        }
        format!("{:0len$}", get_int(primary, &POSTCODE_2))
    } else {
        let chars = POSTCODE_3
            .iter()
            .map(|pos| match SETS[0][get_int(primary, pos) as usize] {
                c @ 0..=0xFF => Ok(char::from(c as u8)),
                _ => Err(ScanError::Format("Postcode holds a control code")),
            })
            .collect::<ScanResult<String>>()?;
        chars.trim_end_matches(' ').to_string()
    };
    Ok(Carrier { postcode, country: get_int(primary, &COUNTRY), service: get_int(primary, &SERVICE) })
}

// Message
//------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MaxiText {
    pub text: String,
    pub has_eci: bool,
}

struct TextBuilder {
    out: MaxiText,
    charset: CharacterSet,
    pending: Vec<u8>,
}

impl TextBuilder {
    fn flush(&mut self) {
        if !self.pending.is_empty() {
            self.out.text.push_str(&self.charset.decode(&self.pending));
            self.pending.clear();
        }
    }
}

fn take(codewords: &[u8], i: &mut usize) -> ScanResult<u32> {
    *i += 1;
    codewords.get(*i).map(|&c| u32::from(c & 0x3F)).ok_or(ScanError::Format("Message ends inside a sequence"))
}

fn read_eci(codewords: &[u8], i: &mut usize) -> ScanResult<u32> {
    let first = take(codewords, i)?;
    let (extra, mut value) = match first {
        0..=31 => (0, first),
        32..=47 => (1, first & 0x0F),
        48..=55 => (2, first & 0x07),
        _ => (3, first & 0x03),
    };
    for _ in 0..extra {
        value = (value << 6) | take(codewords, i)?;
    }
    Ok(value)
}

pub fn decode_message(codewords: &[u8], charset: CharacterSet) -> ScanResult<MaxiText> {
    let mut b = TextBuilder { out: MaxiText::default(), charset, pending: vec![] };
    let (mut set, mut last_set) = (0usize, 0usize);
    let mut shift: i32 = -1;
    let mut i = 0;
    while i < codewords.len() {
        let code = SETS[set][usize::from(codewords[i] & 0x3F)];
        match code {
            LATCH_A => (set, shift) = (0, -1),
            LATCH_B => (set, shift) = (1, -1),
            SHIFT_A..=SHIFT_E => {
                last_set = set;
                set = usize::from(code - SHIFT_A);
                shift = 1;
            }
            TWO_SHIFT_A | THREE_SHIFT_A => {
                last_set = set;
                set = 0;
                shift = if code == TWO_SHIFT_A { 2 } else { 3 };
            }
            LOCK => shift = -1,
            NS => {
                let mut value = 0;
                for _ in 0..5 {
                    value = (value << 6) | take(codewords, &mut i)?;
                }
                b.pending.extend_from_slice(format!("{value:09}").as_bytes());
            }
            ECI => {
                let eci = read_eci(codewords, &mut i)?;
                b.flush();
                b.charset = CharacterSet::from_eci(eci).ok_or(ScanError::Format("Unknown ECI"))?;
                b.out.has_eci = true;
            }
            PAD => {}
            byte => b.pending.push(byte as u8),
        }
        if shift == 0 {
            set = last_set;
        }
        shift -= 1;
        i += 1;
    }
    b.flush();
    Ok(b.out)
}

// Codeword correction
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum Part {
    All,
    Even,
    Odd,
}

// Corrects one interleaved slice of `codewords[start..]` in place, returning the
// number of errors fixed.
fn correct_errors(codewords: &mut [u8], start: usize, data: usize, ec: usize, part: Part) -> ScanResult<usize> {
    let (first, step) = match part {
        Part::All => (0, 1),
        Part::Even => (0, 2),
        Part::Odd => (1, 2),
    };
    let mut words: Vec<u16> =
        (first..data + ec).step_by(step).map(|i| u16::from(codewords[start + i])).collect();
    let correction = ReedSolomonDecoder::new(&MAXICODE_FIELD_64).decode(&mut words, ec / step, &[])?;
    for (k, i) in (first..data).step_by(step).enumerate() {
        codewords[start + i] = words[k] as u8;
    }
    Ok(correction.errors)
}

pub fn decode(bits: &BitMatrix, hints: &DecodeHints) -> ScanResult<DecoderResult> {
    let mut codewords = LAYOUT.read_codewords(bits)?;
    let mut errors = correct_errors(&mut codewords, 0, PRIMARY_DATA, PRIMARY_EC, Part::All)?;
    let mode = codewords[0] & 0x0F;
    let (data, ec) = secondary_split(mode)?;
    let start = PRIMARY_DATA + PRIMARY_EC;
    errors += correct_errors(&mut codewords, start, data, ec, Part::Even)?;
    errors += correct_errors(&mut codewords, start, data, ec, Part::Odd)?;

    let mut datawords = codewords[..PRIMARY_DATA].to_vec();
    datawords.extend_from_slice(&codewords[start..start + data]);
    let charset = hints.character_set.unwrap_or(CharacterSet::Latin1);

    let structured = matches!(mode, 2 | 3);
    let message = if structured {
        let carrier = read_carrier(&datawords, mode)?;
        let mut message = decode_message(&datawords[PRIMARY_DATA..], charset)?;
        let fields = format!("{}\x1d{:03}\x1d{:03}\x1d", carrier.postcode, carrier.country, carrier.service);
        let at = if message.text.starts_with("[)>\x1e01\x1d") {
            message.text.char_indices().nth(9).map_or(message.text.len(), |(i, _)| i)
        } else {
            0
        };
        message.text.insert_str(at, &fields);
        message
    } else {
        decode_message(&datawords[1..], charset)?
    };
    debug!("MaxiCode decoded: mode {mode}, {errors} errors corrected");

    let mut res = DecoderResult::new(datawords, message.text).with_ec_level(mode.to_string());
    res.errors_corrected = errors;
    res.symbology_modifier = u32::from(structured) + if message.has_eci { 2 } else { 0 };
    Ok(res)
}

#[cfg(test)]
mod decoder_tests {
    use test_case::test_case;

    use super::*;

    #[test]
    fn test_sets_are_complete() {
        for set in SETS.iter() {
            assert_eq!(set.len(), 64);
        }
        // Every byte value is reachable from some set.
        for b in 0..=0xFFu16 {
            assert!(SETS.iter().any(|s| s.contains(&b)), "byte {b:#x} missing");
        }
    }

    #[test_case(&[1, 2, 3], "ABC")]
    #[test_case(&[63, 1, 2, 59, 3], "abC")]
    #[test_case(&[8, 59, 5, 9], "HeI")]
    #[test_case(&[60, 0, 1], "ÀA")]
    #[test_case(&[62, 13, 32, 33], "\r ")]
    #[test_case(&[31, 7, 22, 60, 52, 21], "123456789")]
    fn test_decode_message(codewords: &[u8], text: &str) {
        assert_eq!(decode_message(codewords, CharacterSet::Latin1).unwrap().text, text);
    }

    #[test]
    fn test_lock_keeps_shifted_set() {
        // Shift C, lock, then two characters of set C
        let text = decode_message(&[60, 60, 1, 2, 58, 1], CharacterSet::Latin1).unwrap().text;
        assert_eq!(text, "ÁÂA");
    }

    #[test]
    fn test_three_shift_a() {
        let text = decode_message(&[63, 57, 1, 2, 3, 1], CharacterSet::Latin1).unwrap().text;
        assert_eq!(text, "ABCa");
    }

    #[test]
    fn test_eci_switches_charset() {
        // ECI 26, then the UTF-8 bytes of 'é' (C3 A9) from sets C and E
        let res = decode_message(&[27, 26, 60, 3, 62, 44], CharacterSet::Latin1).unwrap();
        assert!(res.has_eci);
        assert_eq!(res.text, "é");
    }

    #[test]
    fn test_truncated_numeric_shift() {
        assert!(decode_message(&[31, 1, 2], CharacterSet::Latin1).is_err());
    }

    #[test]
    fn test_pad_dropped_anywhere_in_message() {
        assert_eq!(decode_message(&[1, 33, 2, 33, 33], CharacterSet::Latin1).unwrap().text, "AB");
    }

    fn put_int(codewords: &mut [u8], positions: &[usize], value: u32) {
        for (i, &pos) in positions.iter().enumerate() {
            if (value >> (positions.len() - 1 - i)) & 1 == 1 {
                let bit = pos - 1;
                codewords[bit / 6] |= 1 << (5 - bit % 6);
            }
        }
    }

    #[test]
    fn test_mode3_postcode_drops_space_padding() {
        let mut primary = [0u8; PRIMARY_DATA];
        for (pos, c) in POSTCODE_3.iter().zip(b"B1050 ") {
            let value = SETS[0].iter().position(|&v| v == u16::from(*c)).unwrap();
            put_int(&mut primary, pos, value as u32);
        }
        put_int(&mut primary, &COUNTRY, 56);
        put_int(&mut primary, &SERVICE, 999);
        let carrier = read_carrier(&primary, 3).unwrap();
        assert_eq!(carrier, Carrier { postcode: "B1050".into(), country: 56, service: 999 });
    }

    #[test]
    fn test_unknown_mode() {
        assert!(secondary_split(7).is_err());
        assert_eq!(secondary_split(5).unwrap(), (68, 56));
    }
}
