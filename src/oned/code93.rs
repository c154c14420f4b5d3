use super::{record_pattern, render_row, RowReader, DEFAULT_QUIET_ZONE};
use crate::{
    common::{Barcode, BarcodeFormat, BitArray, BitMatrix, DecodeHints, DecoderResult, EncodeHints, ResultPoint, ScanError, ScanResult},
    writer::{check_format, Writer},
};

// Symbol alphabet. `a` to `d` are the `($)`, `(%)`, `(/)` and `(+)` shift characters.
const ALPHABET: &[u8; 48] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ-. $/+%abcd*";

// Nine module bar patterns, most significant bit first.
const CHARACTER_ENCODINGS: [u16; 48] = [
    0x114, 0x148, 0x144, 0x142, 0x128, 0x124, 0x122, 0x150, 0x112, 0x10A, // 0-9
    0x1A8, 0x1A4, 0x1A2, 0x194, 0x192, 0x18A, 0x168, 0x164, 0x162, 0x134, // A-J
    0x11A, 0x158, 0x14C, 0x146, 0x12C, 0x116, 0x1B4, 0x1B2, 0x1AC, 0x1A6, // K-T
    0x196, 0x19A, 0x16C, 0x166, 0x136, 0x13A, // U-Z
    0x12E, 0x1D4, 0x1D2, 0x1CA, 0x16E, 0x176, 0x1AE, // - . space $ / + %
    0x126, 0x1DA, 0x1D6, 0x132, 0x15E, // shifts and *
];
const ASTERISK_ENCODING: u16 = CHARACTER_ENCODINGS[47];

const MAX_LENGTH: usize = 80;

fn index_of(c: u8) -> Option<usize> {
    ALPHABET.iter().position(|&a| a == c)
}

// Reader
//------------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct Code93Reader {
    counters: [usize; 6],
}

impl RowReader for Code93Reader {
    fn decode_row(&mut self, row_number: usize, row: &BitArray, _hints: &DecodeHints) -> ScanResult<Barcode> {
        let start = self.find_asterisk_pattern(row)?;
        let mut next = row.next_set(start[1]);
        let end = row.len();

        let mut encoded = Vec::with_capacity(20);
        let mut last_start;
        loop {
            record_pattern(row, next, &mut self.counters)?;
            let pattern = to_pattern(&self.counters).ok_or(ScanError::NotFound)?;
            let c = pattern_to_char(pattern)?;
            encoded.push(c);
            last_start = next;
            next = row.next_set(next + self.counters.iter().sum::<usize>());
            if c == b'*' {
                break;
            }
        }
        encoded.pop();

        // Termination bar after the stop character
        if next == end || !row.get(next) {
            return Err(ScanError::NotFound);
        }
        if encoded.len() < 2 {
            return Err(ScanError::NotFound);
        }
        check_checksums(&encoded)?;
        encoded.truncate(encoded.len() - 2);
        let text = decode_extended(&encoded)?;

        let last_size: usize = self.counters.iter().sum();
        let y = row_number as f32;
        let left = (start[1] + start[0]) as f32 / 2.0;
        let right = last_start as f32 + last_size as f32 / 2.0;
        let points = vec![ResultPoint::new(left, y), ResultPoint::new(right, y)];
        Ok(DecoderResult::new(encoded, text).into_barcode(points, BarcodeFormat::Code93))
    }
}

impl Code93Reader {
    fn find_asterisk_pattern(&mut self, row: &BitArray) -> ScanResult<[usize; 2]> {
        let offset = row.next_set(0);
        let counters = &mut self.counters;
        counters.fill(0);
        let len = counters.len();
        let mut pattern_start = offset;
        let mut is_white = false;
        let mut pos = 0;
        for i in offset..row.len() {
            if row.get(i) != is_white {
                counters[pos] += 1;
                continue;
            }
            if pos == len - 1 {
                if to_pattern(counters) == Some(ASTERISK_ENCODING) {
                    return Ok([pattern_start, i]);
                }
                pattern_start += counters[0] + counters[1];
                counters.copy_within(2.., 0);
                counters[len - 2] = 0;
                counters[len - 1] = 0;
                pos -= 1;
            } else {
                pos += 1;
            }
            counters[pos] = 1;
            is_white = !is_white;
        }
        Err(ScanError::NotFound)
    }
}

// Scales six runs to nine modules, none wider than four
fn to_pattern(counters: &[usize]) -> Option<u16> {
    let sum: usize = counters.iter().sum();
    if sum == 0 {
        return None;
    }
    let mut pattern = 0u16;
    for (i, &c) in counters.iter().enumerate() {
        let scaled = (c as f32 * 9.0 / sum as f32).round() as u32;
        if !(1..=4).contains(&scaled) {
            return None;
        }
        if i & 1 == 0 {
            for _ in 0..scaled {
                pattern = (pattern << 1) | 1;
            }
        } else {
            pattern <<= scaled;
        }
    }
    Some(pattern)
}

fn pattern_to_char(pattern: u16) -> ScanResult<u8> {
    CHARACTER_ENCODINGS
        .iter()
        .position(|&p| p == pattern)
        .map(|i| ALPHABET[i])
        .ok_or(ScanError::NotFound)
}

fn check_checksums(encoded: &[u8]) -> ScanResult<()> {
    let len = encoded.len();
    check_one_checksum(encoded, len - 2, 20)?;
    check_one_checksum(encoded, len - 1, 15)
}

fn check_one_checksum(encoded: &[u8], check_position: usize, weight_max: usize) -> ScanResult<()> {
    if encoded[check_position] != ALPHABET[checksum_index(&encoded[..check_position], weight_max)?] {
        return Err(ScanError::Checksum);
    }
    Ok(())
}

// Weights run 1, 2, .. `weight_max` from the last character backwards, then wrap
fn checksum_index(encoded: &[u8], weight_max: usize) -> ScanResult<usize> {
    let mut weight = 1;
    let mut total = 0;
    for &c in encoded.iter().rev() {
        total += weight * index_of(c).ok_or(ScanError::Format("Character outside the Code 93 alphabet"))?;
        weight += 1;
        if weight > weight_max {
            weight = 1;
        }
    }
    Ok(total % 47)
}

pub fn decode_extended(encoded: &[u8]) -> ScanResult<String> {
    let mut decoded = String::with_capacity(encoded.len());
    let mut iter = encoded.iter().copied();
    while let Some(c) = iter.next() {
        if !(b'a'..=b'd').contains(&c) {
            decoded.push(char::from(c));
            continue;
        }
        let next = iter.next().ok_or(ScanError::Format("Dangling Code 93 shift"))?;
        let value = match (c, next) {
            (b'd', b'A'..=b'Z') => next + 32,
            (b'a', b'A'..=b'Z') => next - 64,
            (b'b', b'A'..=b'E') => next - 38,
            (b'b', b'F'..=b'J') => next - 11,
            (b'b', b'K'..=b'O') => next + 16,
            (b'b', b'P'..=b'T') => next + 43,
            (b'b', b'U') => 0,
            (b'b', b'V') => b'@',
            (b'b', b'W') => b'`',
            (b'b', b'X'..=b'Z') => 127,
            (b'c', b'A'..=b'O') => next - 32,
            (b'c', b'Z') => b':',
            _ => return Err(ScanError::Format("Invalid Code 93 shift pair")),
        };
        decoded.push(char::from(value));
    }
    Ok(decoded)
}

// Writer
//------------------------------------------------------------------------------

pub fn convert_to_extended(content: &str) -> ScanResult<Vec<u8>> {
    let mut out = Vec::with_capacity(content.len() * 2);
    for ch in content.chars() {
        if !ch.is_ascii() {
            return Err(ScanError::invalid(format!("Requested content contains a non-encodable character: {ch:?}")));
        }
        let c = ch as u8;
        match c {
            0 => out.extend_from_slice(b"bU"),
            1..=26 => out.extend_from_slice(&[b'a', b'A' + c - 1]),
            27..=31 => out.extend_from_slice(&[b'b', b'A' + c - 27]),
            b' ' | b'$' | b'%' | b'+' => out.push(c),
            b'!'..=b',' => out.extend_from_slice(&[b'c', b'A' + c - b'!']),
            b'-'..=b'9' => out.push(c),
            b':' => out.extend_from_slice(b"cZ"),
            b';'..=b'?' => out.extend_from_slice(&[b'b', b'F' + c - b';']),
            b'@' => out.extend_from_slice(b"bV"),
            b'A'..=b'Z' => out.push(c),
            b'['..=b'_' => out.extend_from_slice(&[b'b', b'K' + c - b'[']),
            b'`' => out.extend_from_slice(b"bW"),
            b'a'..=b'z' => out.extend_from_slice(&[b'd', b'A' + c - b'a']),
            _ => out.extend_from_slice(&[b'b', b'P' + c - b'{']),
        }
    }
    Ok(out)
}

fn append_encoding(target: &mut Vec<bool>, encoding: u16) {
    target.extend((0..9).rev().map(|i| (encoding >> i) & 1 == 1));
}

pub struct Code93Writer;

impl Code93Writer {
    pub fn encode_row(&self, content: &str) -> ScanResult<Vec<bool>> {
        if content.is_empty() {
            return Err(ScanError::invalid("Found empty contents"));
        }
        let mut encoded = convert_to_extended(content)?;
        if encoded.len() > MAX_LENGTH {
            return Err(ScanError::invalid(format!(
                "Requested contents should be less than 80 digits long after converting to extended encoding: Got {}",
                encoded.len()
            )));
        }

        let mut code = Vec::with_capacity((encoded.len() + 4) * 9 + 1);
        append_encoding(&mut code, ASTERISK_ENCODING);
        for &c in &encoded {
            let index = index_of(c).ok_or_else(|| ScanError::invalid("Unencodable character"))?;
            append_encoding(&mut code, CHARACTER_ENCODINGS[index]);
        }
        for weight_max in [20, 15] {
            let check = checksum_index(&encoded, weight_max)?;
            append_encoding(&mut code, CHARACTER_ENCODINGS[check]);
            encoded.push(ALPHABET[check]);
        }
        append_encoding(&mut code, ASTERISK_ENCODING);
        code.push(true);
        Ok(code)
    }
}

impl Writer for Code93Writer {
    fn encode(
        &self,
        content: &str,
        format: BarcodeFormat,
        width: usize,
        height: usize,
        hints: &EncodeHints,
    ) -> ScanResult<BitMatrix> {
        check_format(format, BarcodeFormat::Code93)?;
        let code = self.encode_row(content)?;
        render_row(&code, width, height, hints.margin.unwrap_or(DEFAULT_QUIET_ZONE))
    }
}

#[cfg(test)]
mod code93_tests {
    use test_case::test_case;

    use super::*;
    use crate::{
        common::ResultMetadataKey,
        oned::OneDReader,
        reader::{BinaryBitmap, Reader},
    };

    fn row(s: &str) -> BitArray {
        s.chars().map(|c| c == '1').collect()
    }

    fn to_string(code: &[bool]) -> String {
        code.iter().map(|&b| if b { '1' } else { '0' }).collect()
    }

    const EXTENDED_ROW: &str = "0000001010111101101000101001100101001011001001100101100101001001100101100100101\
        000010101010000101110101101101010001001001101001101001110010101101011101011011101011101101110100101\
        110101101001110101110110101101010001110110101100010101110110101000110101110110101000101101110110101\
        101001101110110101100101101110110101100110101110110101011011001110110101011001101110110101001101101\
        110110101001110101001100101101010001010111101000";

    #[test]
    fn test_decode_extended_row() {
        let b = Code93Reader::default().decode_row(3, &row(EXTENDED_ROW), &DecodeHints::default()).unwrap();
        assert_eq!(b.text(), "Code93!\n$%/+ :\u{1b};[{\u{7f}\u{0}@`\u{7f}\u{7f}\u{7f}");
        assert_eq!(b.format(), BarcodeFormat::Code93);
        assert_eq!(b.get_metadata(ResultMetadataKey::SymbologyIdentifier).and_then(|v| v.as_text()), Some("]G0"));
        assert_eq!(b.points()[0].y, 3.0);
    }

    #[test]
    fn test_encode_row() {
        let code = Code93Writer.encode_row("Code93!\n$%/+ :\u{1b};[{\u{7f}\u{0}@`\u{7f}\u{7f}\u{7f}").unwrap();
        // The writer maps DEL to %T, the reader also accepts %X to %Z
        let s = to_string(&code);
        assert_eq!(s.len(), (42 + 4) * 9 + 1);
        assert!(s.starts_with("101011110"));
        assert!(s.ends_with("1010111101"));
    }

    #[test_case("CODE93")]
    #[test_case("Mixed case, with: punctuation?")]
    #[test_case("\u{0}\u{1}\u{7f} control")]
    fn test_round_trip(text: &str) {
        let m = Code93Writer.encode(text, BarcodeFormat::Code93, 600, 20, &EncodeHints::default()).unwrap();
        let b = OneDReader::new(Code93Reader::default())
            .decode(&BinaryBitmap::from_bit_matrix(&m).unwrap(), &DecodeHints::default())
            .unwrap();
        assert_eq!(b.text(), text);
    }

    #[test]
    fn test_checksum_failure() {
        // Swap the two data characters of "AB"
        let mut code = vec![];
        append_encoding(&mut code, ASTERISK_ENCODING);
        let good = Code93Writer.encode_row("AB").unwrap();
        append_encoding(&mut code, CHARACTER_ENCODINGS[11]);
        append_encoding(&mut code, CHARACTER_ENCODINGS[10]);
        code.extend_from_slice(&good[27..]);
        let mut padded = vec![false; 5];
        padded.extend(code);
        padded.extend([false; 5]);
        let r: BitArray = padded.into_iter().collect();
        assert_eq!(Code93Reader::default().decode_row(0, &r, &DecodeHints::default()).unwrap_err(), ScanError::Checksum);
    }

    #[test_case(b"dA", "a")]
    #[test_case(b"aM", "\r")]
    #[test_case(b"bUbVbW", "\u{0}@`")]
    #[test_case(b"cAcZ", "!:")]
    fn test_decode_extended(encoded: &[u8], exp: &str) {
        assert_eq!(decode_extended(encoded).unwrap(), exp);
    }

    #[test_case(b"d1")]
    #[test_case(b"AB c")]
    #[test_case(b"Xa")]
    fn test_decode_extended_invalid(encoded: &[u8]) {
        assert!(matches!(decode_extended(encoded), Err(ScanError::Format(_))));
    }

    #[test]
    fn test_writer_rejects() {
        let hints = EncodeHints::default();
        assert!(Code93Writer.encode("é", BarcodeFormat::Code93, 0, 0, &hints).is_err());
        assert!(Code93Writer.encode(&"a".repeat(41), BarcodeFormat::Code93, 0, 0, &hints).is_err());
        assert!(Code93Writer.encode(&"A".repeat(80), BarcodeFormat::Code93, 0, 0, &hints).is_ok());
    }
}
