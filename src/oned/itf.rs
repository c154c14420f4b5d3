use super::{append_pattern, check_digits, pattern_match_variance, record_pattern, render_row, RowReader, DEFAULT_QUIET_ZONE};
use crate::{
    common::{Barcode, BarcodeFormat, BitArray, BitMatrix, DecodeHints, DecoderResult, EncodeHints, ResultPoint, ScanError, ScanResult},
    writer::{check_format, Writer},
};

const MAX_AVG_VARIANCE: f32 = 0.38;
const MAX_INDIVIDUAL_VARIANCE: f32 = 0.5;

const N: usize = 1;
const W_READ: usize = 2;
const W: usize = 3;

const DEFAULT_ALLOWED_LENGTHS: [usize; 5] = [6, 8, 10, 12, 14];
const MAX_LENGTH: usize = 80;

const START_PATTERN: [usize; 4] = [N, N, N, N];
const END_PATTERN: [usize; 3] = [W, N, N];
const END_PATTERN_REVERSED: [[usize; 3]; 2] = [[N, N, W_READ], [N, N, W]];

// Bar widths for each digit, both with wide = 2 and wide = 3.
const PATTERNS: [[usize; 5]; 20] = [
    [N, N, W_READ, W_READ, N],
    [W_READ, N, N, N, W_READ],
    [N, W_READ, N, N, W_READ],
    [W_READ, W_READ, N, N, N],
    [N, N, W_READ, N, W_READ],
    [W_READ, N, W_READ, N, N],
    [N, W_READ, W_READ, N, N],
    [N, N, N, W_READ, W_READ],
    [W_READ, N, N, W_READ, N],
    [N, W_READ, N, W_READ, N],
    [N, N, W, W, N],
    [W, N, N, N, W],
    [N, W, N, N, W],
    [W, W, N, N, N],
    [N, N, W, N, W],
    [W, N, W, N, N],
    [N, W, W, N, N],
    [N, N, N, W, W],
    [W, N, N, W, N],
    [N, W, N, W, N],
];

// Reader
//------------------------------------------------------------------------------

/// Interleaved 2 of 5: digits in pairs, the first of each pair in the bars and the second
/// in the spaces between them.
#[derive(Debug, Default)]
pub struct ItfReader {
    narrow_line_width: usize,
}

impl RowReader for ItfReader {
    fn decode_row(&mut self, row_number: usize, row: &BitArray, hints: &DecodeHints) -> ScanResult<Barcode> {
        let start = self.decode_start(row)?;
        let end = self.decode_end(row)?;
        if end[0] < start[1] {
            return Err(ScanError::NotFound);
        }
        let text = decode_middle(row, start[1], end[0])?;

        let allowed: &[usize] =
            if hints.allowed_lengths.is_empty() { &DEFAULT_ALLOWED_LENGTHS } else { &hints.allowed_lengths };
        let max_allowed = allowed.iter().copied().max().unwrap_or(0);
        if !allowed.contains(&text.len()) && text.len() <= max_allowed {
            return Err(ScanError::Format("ITF length not allowed"));
        }

        let y = row_number as f32;
        let points = vec![ResultPoint::new(start[1] as f32, y), ResultPoint::new(end[0] as f32, y)];
        Ok(DecoderResult::new(vec![], text).into_barcode(points, BarcodeFormat::Itf))
    }
}

impl ItfReader {
    fn decode_start(&mut self, row: &BitArray) -> ScanResult<[usize; 2]> {
        let offset = skip_white_space(row)?;
        let start = find_guard_pattern(row, offset, &START_PATTERN)?;
        self.narrow_line_width = (start[1] - start[0]) / 4;
        self.validate_quiet_zone(row, start[0])?;
        Ok(start)
    }

    fn decode_end(&self, row: &BitArray) -> ScanResult<[usize; 2]> {
        let mut reversed = row.clone();
        reversed.reverse();
        let offset = skip_white_space(&reversed)?;
        let end = find_guard_pattern(&reversed, offset, &END_PATTERN_REVERSED[0])
            .or_else(|_| find_guard_pattern(&reversed, offset, &END_PATTERN_REVERSED[1]))?;
        self.validate_quiet_zone(&reversed, end[0])?;
        Ok([row.len() - end[1], row.len() - end[0]])
    }

    // Up to ten narrow lines of white, fewer if the row ends first
    fn validate_quiet_zone(&self, row: &BitArray, start: usize) -> ScanResult<()> {
        let mut quiet = (self.narrow_line_width * 10).min(start);
        let mut i = start;
        while quiet > 0 && i > 0 {
            i -= 1;
            if row.get(i) {
                break;
            }
            quiet -= 1;
        }
        if quiet != 0 {
            return Err(ScanError::NotFound);
        }
        Ok(())
    }
}

fn skip_white_space(row: &BitArray) -> ScanResult<usize> {
    let start = row.next_set(0);
    if start == row.len() {
        return Err(ScanError::NotFound);
    }
    Ok(start)
}

fn find_guard_pattern(row: &BitArray, offset: usize, pattern: &[usize]) -> ScanResult<[usize; 2]> {
    let len = pattern.len();
    let mut counters = vec![0; len];
    let mut is_white = false;
    let mut pos = 0;
    let mut pattern_start = offset;
    for x in offset..row.len() {
        if row.get(x) != is_white {
            counters[pos] += 1;
            continue;
        }
        if pos == len - 1 {
            if pattern_match_variance(&counters, pattern, MAX_INDIVIDUAL_VARIANCE) < MAX_AVG_VARIANCE {
                return Ok([pattern_start, x]);
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

fn decode_middle(row: &BitArray, mut start: usize, end: usize) -> ScanResult<String> {
    let mut text = String::with_capacity(20);
    let mut pair = [0; 10];
    while start < end {
        record_pattern(row, start, &mut pair)?;
        let bars: Vec<usize> = pair.iter().step_by(2).copied().collect();
        let spaces: Vec<usize> = pair.iter().skip(1).step_by(2).copied().collect();
        text.push(decode_digit(&bars)?);
        text.push(decode_digit(&spaces)?);
        start += pair.iter().sum::<usize>();
    }
    Ok(text)
}

// A tie between two patterns is no match at all
fn decode_digit(counters: &[usize]) -> ScanResult<char> {
    let mut best_variance = MAX_AVG_VARIANCE;
    let mut best = None;
    for (i, pattern) in PATTERNS.iter().enumerate() {
        let variance = pattern_match_variance(counters, pattern, MAX_INDIVIDUAL_VARIANCE);
        if variance < best_variance {
            best_variance = variance;
            best = Some(i);
        } else if variance == best_variance {
            best = None;
        }
    }
    best.map(|i| char::from(b'0' + (i % 10) as u8)).ok_or(ScanError::NotFound)
}

// Writer
//------------------------------------------------------------------------------

pub struct ItfWriter;

impl ItfWriter {
    pub fn encode_row(&self, content: &str) -> ScanResult<Vec<bool>> {
        check_digits(content)?;
        if content.len() % 2 != 0 {
            return Err(ScanError::invalid("The length of the input should be even"));
        }
        if content.len() > MAX_LENGTH {
            return Err(ScanError::invalid(format!(
                "Requested contents should be less than 80 digits long: Got {}",
                content.len()
            )));
        }

        let digits: Vec<usize> = content.bytes().map(|b| (b - b'0') as usize).collect();
        let mut code = Vec::with_capacity(9 + 9 * digits.len());
        append_pattern(&mut code, &START_PATTERN, true);
        for pair in digits.chunks(2) {
            let mut widths = [0; 10];
            for j in 0..5 {
                widths[2 * j] = PATTERNS[pair[0] + 10][j];
                widths[2 * j + 1] = PATTERNS[pair[1] + 10][j];
            }
            append_pattern(&mut code, &widths, true);
        }
        append_pattern(&mut code, &END_PATTERN, true);
        Ok(code)
    }
}

impl Writer for ItfWriter {
    fn encode(
        &self,
        content: &str,
        format: BarcodeFormat,
        width: usize,
        height: usize,
        hints: &EncodeHints,
    ) -> ScanResult<BitMatrix> {
        check_format(format, BarcodeFormat::Itf)?;
        let code = self.encode_row(content)?;
        render_row(&code, width, height, hints.margin.unwrap_or(DEFAULT_QUIET_ZONE))
    }
}

#[cfg(test)]
mod itf_tests {
    use test_case::test_case;

    use super::*;
    use crate::{
        common::{ResultMetadataKey, ScanError},
        oned::OneDReader,
        reader::{BinaryBitmap, Reader},
    };

    fn read(m: &BitMatrix, hints: &DecodeHints) -> ScanResult<Barcode> {
        OneDReader::new(ItfReader::default()).decode(&BinaryBitmap::from_bit_matrix(m)?, hints)
    }

    #[test]
    fn test_default_size_round_trip() {
        let m = ItfWriter.encode("00123456789012", BarcodeFormat::Itf, 0, 0, &EncodeHints::default()).unwrap();
        assert_eq!((m.width(), m.height()), (145, 1));
        let b = read(&m, &DecodeHints::default()).unwrap();
        assert_eq!(b.text(), "00123456789012");
        assert_eq!(b.format(), BarcodeFormat::Itf);
        assert_eq!(b.get_metadata(ResultMetadataKey::SymbologyIdentifier).and_then(|v| v.as_text()), Some("]I0"));
    }

    #[test_case("123456", 200, 40)]
    #[test_case("30712345000010", 400, 60)]
    #[test_case("1234567890123456", 500, 30)]
    fn test_round_trip(text: &str, width: usize, height: usize) {
        let m = ItfWriter.encode(text, BarcodeFormat::Itf, width, height, &EncodeHints::default()).unwrap();
        assert_eq!(read(&m, &DecodeHints::default()).unwrap().text(), text);
    }

    #[test]
    fn test_encode_row() {
        let code = ItfWriter.encode_row("00").unwrap();
        let s: String = code.iter().map(|&b| if b { '1' } else { '0' }).collect();
        // start, 0/0 interleaved, end
        assert_eq!(s, "1010".to_owned() + "101011100011100010" + "11101");
    }

    #[test]
    fn test_allowed_lengths() {
        let m = ItfWriter.encode("1234", BarcodeFormat::Itf, 0, 0, &EncodeHints::default()).unwrap();
        assert!(read(&m, &DecodeHints::default()).is_err());
        let mut hints = DecodeHints::new();
        hints.allowed_lengths(&[4]);
        assert_eq!(read(&m, &hints).unwrap().text(), "1234");
    }

    #[test]
    fn test_reversed_row_with_try_harder() {
        let m = ItfWriter.encode("0123456789", BarcodeFormat::Itf, 0, 0, &EncodeHints::default()).unwrap();
        let mut flipped = BitMatrix::new(m.width(), 1).unwrap();
        for x in 0..m.width() {
            flipped.set_value(m.width() - 1 - x, 0, m.get(x, 0));
        }
        assert!(read(&flipped, &DecodeHints::default()).is_err());
        let mut hints = DecodeHints::new();
        hints.try_harder(true);
        let b = read(&flipped, &hints).unwrap();
        assert_eq!(b.text(), "0123456789");
        assert_eq!(b.get_metadata(ResultMetadataKey::Orientation).and_then(|v| v.as_int()), Some(180));
    }

    #[test_case("123"; "odd length")]
    #[test_case("12a4"; "not numeric")]
    #[test_case(""; "empty")]
    fn test_writer_rejects(text: &str) {
        let err = ItfWriter.encode(text, BarcodeFormat::Itf, 0, 0, &EncodeHints::default()).unwrap_err();
        assert!(matches!(err, ScanError::InvalidArgument(_)));
    }

    #[test]
    fn test_writer_max_length() {
        assert!(ItfWriter.encode_row(&"1".repeat(80)).is_ok());
        assert!(ItfWriter.encode_row(&"1".repeat(82)).is_err());
    }
}
