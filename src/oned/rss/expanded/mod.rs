//! RSS Expanded (GS1 DataBar Expanded), single row.

mod decoder;
mod encoder;
mod field_parser;

use log::trace;

use super::{interleave, is_finder_pattern, parse_finder_value, rss_value, rss_widths, CharacterCounts, DataCharacter, FinderPattern};
use crate::{
    common::{Barcode, BarcodeFormat, BitArray, BitMatrix, BitStream, DecodeHints, DecoderResult, EncodeHints, ScanError, ScanResult},
    oned::{append_pattern, record_pattern, record_pattern_in_reverse, render_row, RowReader, DEFAULT_QUIET_ZONE},
    writer::{check_format, Writer},
};

const SYMBOL_WIDEST: [usize; 5] = [7, 5, 4, 3, 1];
const EVEN_TOTAL_SUBSET: [u32; 5] = [4, 20, 52, 104, 204];
const GSUM: [u32; 5] = [0, 348, 1388, 2948, 3988];

const FINDER_PAT_A: usize = 0;
const FINDER_PAT_B: usize = 1;
const FINDER_PAT_C: usize = 2;
const FINDER_PAT_D: usize = 3;
const FINDER_PAT_E: usize = 4;
const FINDER_PAT_F: usize = 5;

const FINDER_PATTERNS: [[usize; 4]; 6] = [
    [1, 8, 4, 1], // A
    [3, 6, 4, 1], // B
    [3, 4, 6, 1], // C
    [3, 2, 8, 1], // D
    [2, 6, 5, 1], // E
    [2, 2, 9, 1], // F
];

// Finder order for symbols of 2 to 11 pairs.
const FINDER_PATTERN_SEQUENCES: [&[usize]; 10] = [
    &[FINDER_PAT_A, FINDER_PAT_A],
    &[FINDER_PAT_A, FINDER_PAT_B, FINDER_PAT_B],
    &[FINDER_PAT_A, FINDER_PAT_C, FINDER_PAT_B, FINDER_PAT_D],
    &[FINDER_PAT_A, FINDER_PAT_E, FINDER_PAT_B, FINDER_PAT_D, FINDER_PAT_C],
    &[FINDER_PAT_A, FINDER_PAT_E, FINDER_PAT_B, FINDER_PAT_D, FINDER_PAT_D, FINDER_PAT_F],
    &[FINDER_PAT_A, FINDER_PAT_E, FINDER_PAT_B, FINDER_PAT_D, FINDER_PAT_E, FINDER_PAT_F, FINDER_PAT_F],
    &[FINDER_PAT_A, FINDER_PAT_A, FINDER_PAT_B, FINDER_PAT_B, FINDER_PAT_C, FINDER_PAT_C, FINDER_PAT_D, FINDER_PAT_D],
    &[
        FINDER_PAT_A,
        FINDER_PAT_A,
        FINDER_PAT_B,
        FINDER_PAT_B,
        FINDER_PAT_C,
        FINDER_PAT_C,
        FINDER_PAT_D,
        FINDER_PAT_E,
        FINDER_PAT_E,
    ],
    &[
        FINDER_PAT_A,
        FINDER_PAT_A,
        FINDER_PAT_B,
        FINDER_PAT_B,
        FINDER_PAT_C,
        FINDER_PAT_C,
        FINDER_PAT_D,
        FINDER_PAT_E,
        FINDER_PAT_F,
        FINDER_PAT_F,
    ],
    &[
        FINDER_PAT_A,
        FINDER_PAT_A,
        FINDER_PAT_B,
        FINDER_PAT_B,
        FINDER_PAT_C,
        FINDER_PAT_D,
        FINDER_PAT_D,
        FINDER_PAT_E,
        FINDER_PAT_E,
        FINDER_PAT_F,
        FINDER_PAT_F,
    ],
];

const MAX_PAIRS: usize = 11;

const CHARACTER_MODULES: usize = 17;
const FINDER_MODULES: usize = 15;

// Modules between one finder and the next: a right and a left character
const FINDER_GAP_MODULES: f32 = 2.0 * CHARACTER_MODULES as f32;

// Checksum weight of element `col` for the character in weight row `row`.
fn checksum_weight(row: usize, col: usize) -> u32 {
    (0..8 * row + col).fold(1, |w, _| w * 3 % 211)
}

// Weight row of a character, None for the check character
fn weight_row(finder: usize, odd_pattern: bool, left: bool) -> Option<usize> {
    if finder == FINDER_PAT_A && odd_pattern && left {
        return None;
    }
    Some(4 * finder + if odd_pattern { 0 } else { 2 } + if left { 0 } else { 1 } - 1)
}

fn checksum_portion(odd: &[usize; 4], even: &[usize; 4], row: Option<usize>) -> u32 {
    let Some(row) = row else {
        return 0;
    };
    (0..4).map(|i| odd[i] as u32 * checksum_weight(row, 2 * i) + even[i] as u32 * checksum_weight(row, 2 * i + 1)).sum()
}

#[derive(Debug, Clone)]
struct ExpandedPair {
    left: DataCharacter,
    right: Option<DataCharacter>,
    finder: FinderPattern,
}

// Reader
//------------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct RssExpandedReader;

impl RowReader for RssExpandedReader {
    fn decode_row(&mut self, row_number: usize, row: &BitArray, _hints: &DecodeHints) -> ScanResult<Barcode> {
        let pairs = decode_pairs(row, row_number)?;
        if !is_complete_sequence(&pairs) {
            return Err(ScanError::NotFound);
        }
        if !check_checksum(&pairs) {
            return Err(ScanError::Checksum);
        }
        construct_result(&pairs)
    }
}

fn decode_pairs(row: &BitArray, row_number: usize) -> ScanResult<Vec<ExpandedPair>> {
    let mut pairs = Vec::with_capacity(MAX_PAIRS);
    while pairs.len() < MAX_PAIRS {
        let Some(pair) = retrieve_next_pair(row, &pairs, row_number) else {
            break;
        };
        let last = pair.right.is_none();
        pairs.push(pair);
        if last {
            break;
        }
    }
    if pairs.is_empty() {
        return Err(ScanError::NotFound);
    }
    Ok(pairs)
}

fn is_complete_sequence(pairs: &[ExpandedPair]) -> bool {
    FINDER_PATTERN_SEQUENCES
        .iter()
        .any(|seq| seq.len() == pairs.len() && pairs.iter().zip(seq.iter()).all(|(p, &f)| p.finder.value == f))
}

fn check_checksum(pairs: &[ExpandedPair]) -> bool {
    let Some(first_right) = pairs[0].right else {
        return false;
    };
    let mut checksum = first_right.checksum_portion;
    let mut chars: u32 = 2;
    for pair in &pairs[1..] {
        checksum += pair.left.checksum_portion;
        chars += 1;
        if let Some(right) = pair.right {
            checksum += right.checksum_portion;
            chars += 1;
        }
    }
    if chars < 4 {
        return false;
    }
    let check_value = 211 * (chars - 4) + checksum % 211;
    pairs[0].left.value == check_value
}

fn construct_result(pairs: &[ExpandedPair]) -> ScanResult<Barcode> {
    let mut bits = BitStream::with_capacity(12 * 2 * pairs.len());
    for (i, pair) in pairs.iter().enumerate() {
        if i > 0 {
            bits.push_bits(pair.left.value, 12);
        }
        if let Some(right) = pair.right {
            bits.push_bits(right.value, 12);
        }
    }
    let text = decoder::decode_bits(&bits)?;
    trace!("RSS Expanded with {} pairs gives {text}", pairs.len());

    let first = &pairs[0].finder.points;
    let last = &pairs[pairs.len() - 1].finder.points;
    let points = vec![first[0], first[1], last[0], last[1]];
    let mut result = DecoderResult::new(vec![], text);
    result.num_bits = bits.len();
    Ok(result.into_barcode(points, BarcodeFormat::RssExpanded))
}

fn retrieve_next_pair(row: &BitArray, previous: &[ExpandedPair], row_number: usize) -> Option<ExpandedPair> {
    let odd_pattern = previous.len() % 2 == 0;
    let offset = previous.last().map_or(0, |p| p.finder.start_end[1]);

    for (start_end, counters) in finder_candidates(row, offset, !odd_pattern) {
        let Ok(finder) = parse_found_finder_pattern(row, row_number, odd_pattern, start_end, counters) else {
            continue;
        };
        if !follows(previous, &finder) {
            continue;
        }
        let Ok(left) = decode_data_character(row, &finder, odd_pattern, true) else {
            continue;
        };
        let right = decode_data_character(row, &finder, odd_pattern, false).ok();
        return Some(ExpandedPair { left, right, finder });
    }
    None
}

// The finder continues a valid sequence and sits two characters after the previous one
fn follows(previous: &[ExpandedPair], finder: &FinderPattern) -> bool {
    let in_sequence = FINDER_PATTERN_SEQUENCES
        .iter()
        .filter(|seq| seq.len() > previous.len())
        .any(|seq| seq[previous.len()] == finder.value && previous.iter().zip(seq.iter()).all(|(p, &f)| p.finder.value == f));
    if !in_sequence {
        return false;
    }
    let Some(last) = previous.last() else {
        return true;
    };
    let module = (last.finder.start_end[1] - last.finder.start_end[0]) as f32 / FINDER_MODULES as f32;
    let gap = finder.start_end[0].saturating_sub(last.finder.start_end[1]) as f32 / module;
    (gap - FINDER_GAP_MODULES).abs() <= FINDER_GAP_MODULES / 4.0
}

// Windows of four elements that look like finder elements two to five, starting on a bar.
// Even pairs carry the finder mirrored.
fn finder_candidates(row: &BitArray, offset: usize, even_pair: bool) -> Vec<([usize; 2], [usize; 4])> {
    let width = row.len();
    let offset = row.next_set(offset);
    let mut found = vec![];
    let mut counters = [0usize; 4];
    let mut pos = 0;
    let mut is_white = false;
    let mut pattern_start = offset;
    for x in offset..width {
        if row.get(x) != is_white {
            counters[pos] += 1;
            continue;
        }
        if pos == 3 {
            let mut ordered = counters;
            if even_pair {
                ordered.reverse();
            }
            if is_finder_pattern(&ordered) {
                found.push(([pattern_start, x], ordered));
            }
            pattern_start += counters[0] + counters[1];
            counters = [counters[2], counters[3], 0, 0];
            pos -= 1;
        } else {
            pos += 1;
        }
        counters[pos] = 1;
        is_white = !is_white;
    }
    found
}

fn parse_found_finder_pattern(
    row: &BitArray,
    row_number: usize,
    odd_pattern: bool,
    start_end: [usize; 2],
    counters: [usize; 4],
) -> ScanResult<FinderPattern> {
    let (start, end, first_counter) = if odd_pattern {
        // Element one is the space before the window
        let mut first_start = start_end[0];
        while first_start > 0 && !row.get(first_start - 1) {
            first_start -= 1;
        }
        (first_start, start_end[1], start_end[0] - first_start)
    } else {
        // and here the bar after it
        let end = row.next_unset(start_end[1] + 1);
        (start_end[0], end, end - start_end[1])
    };
    let elements = [first_counter, counters[0], counters[1], counters[2]];
    let value = parse_finder_value(&elements, &FINDER_PATTERNS)?;
    Ok(FinderPattern::new(value, [start, end], start, end, row_number))
}

fn decode_data_character(
    row: &BitArray,
    finder: &FinderPattern,
    odd_pattern: bool,
    left: bool,
) -> ScanResult<DataCharacter> {
    let mut counters = [0usize; 8];
    if left {
        record_pattern_in_reverse(row, finder.start_end[0], &mut counters)?;
    } else {
        record_pattern(row, finder.start_end[1], &mut counters)?;
        counters.reverse();
    }

    let element_width = counters.iter().sum::<usize>() as f32 / CHARACTER_MODULES as f32;
    let expected = (finder.start_end[1] - finder.start_end[0]) as f32 / FINDER_MODULES as f32;
    if (element_width - expected).abs() / expected > 0.3 {
        return Err(ScanError::NotFound);
    }

    let mut counts = CharacterCounts::from_counters(&counters, CHARACTER_MODULES, true)?;
    counts.adjust(CHARACTER_MODULES, (4, 13), (4, 13), true, false)?;

    let odd_sum = counts.odd_sum();
    if odd_sum % 2 == 1 || !(4..=12).contains(&odd_sum) {
        return Err(ScanError::NotFound);
    }
    let checksum_portion = checksum_portion(&counts.odd, &counts.even, weight_row(finder.value, odd_pattern, left));
    let group = (13 - odd_sum) / 2;
    let odd_widest = SYMBOL_WIDEST[group];
    let v_odd = rss_value(&counts.odd, odd_widest, true);
    let v_even = rss_value(&counts.even, 9 - odd_widest, false);
    let value = v_odd * EVEN_TOTAL_SUBSET[group] + v_even + GSUM[group];
    Ok(DataCharacter { value, checksum_portion })
}

// Writer
//------------------------------------------------------------------------------

// Odd and even element widths of a character value
fn character_widths(value: u32) -> ([usize; 4], [usize; 4]) {
    let group = GSUM.iter().rposition(|&g| g <= value).unwrap_or(0);
    let rest = value - GSUM[group];
    let t_even = EVEN_TOTAL_SUBSET[group];
    let odd_sum = 12 - 2 * group;
    let odd_widest = SYMBOL_WIDEST[group];
    let odd = rss_widths(rest / t_even, odd_sum, 4, odd_widest, true);
    let even = rss_widths(rest % t_even, CHARACTER_MODULES - odd_sum, 4, 9 - odd_widest, false);
    ([odd[0], odd[1], odd[2], odd[3]], [even[0], even[1], even[2], even[3]])
}

type CharacterWidths = ([usize; 4], [usize; 4]);

// Check character first, then the data characters
fn symbol_characters(values: &[u32]) -> Vec<CharacterWidths> {
    let symbol_chars = values.len() + 1;
    let sequence = FINDER_PATTERN_SEQUENCES[symbol_chars.div_ceil(2) - 2];

    // Character p belongs to pair p / 2, on its left when p is even
    let mut chars = vec![character_widths(0)];
    let mut checksum = 0;
    for (i, &value) in values.iter().enumerate() {
        let p = i + 1;
        let widths = character_widths(value);
        let row = weight_row(sequence[p / 2], (p / 2) % 2 == 0, p % 2 == 0);
        checksum += checksum_portion(&widths.0, &widths.1, row);
        chars.push(widths);
    }
    let check_value = 211 * (symbol_chars as u32 - 4) + checksum % 211;
    trace!("RSS Expanded: {} data characters, check value {check_value}", values.len());
    chars[0] = character_widths(check_value);
    chars
}

// Guard, pairs of character, finder, character with every other finder mirrored, guard
fn layout(chars: &[CharacterWidths]) -> Vec<bool> {
    let sequence = FINDER_PATTERN_SEQUENCES[chars.len().div_ceil(2) - 2];
    let mut widths = vec![1, 1];
    for (k, &finder) in sequence.iter().enumerate() {
        let (odd, even) = &chars[2 * k];
        widths.extend_from_slice(&interleave(odd, even));
        if k % 2 == 0 {
            widths.extend_from_slice(&FINDER_PATTERNS[finder]);
            widths.push(1);
        } else {
            widths.push(1);
            widths.extend(FINDER_PATTERNS[finder].iter().rev());
        }
        if let Some((odd, even)) = chars.get(2 * k + 1) {
            widths.extend(interleave(odd, even).iter().rev());
        }
    }
    widths.extend_from_slice(&[1, 1]);

    let mut code = Vec::with_capacity(widths.iter().sum());
    append_pattern(&mut code, &widths, false);
    code
}

pub struct RssExpandedWriter;

impl RssExpandedWriter {
    pub fn encode_row(&self, content: &str) -> ScanResult<Vec<bool>> {
        let bits = encoder::encode(content)?;
        let values: Vec<u32> = bits.to_codewords(12).into_iter().map(u32::from).collect();
        Ok(layout(&symbol_characters(&values)))
    }
}

impl Writer for RssExpandedWriter {
    fn encode(
        &self,
        content: &str,
        format: BarcodeFormat,
        width: usize,
        height: usize,
        hints: &EncodeHints,
    ) -> ScanResult<BitMatrix> {
        check_format(format, BarcodeFormat::RssExpanded)?;
        let code = self.encode_row(content)?;
        render_row(&code, width, height, hints.margin.unwrap_or(DEFAULT_QUIET_ZONE))
    }
}

#[cfg(test)]
mod rss_expanded_tests {
    use test_case::test_case;

    use super::*;
    use crate::{
        common::ResultMetadataKey,
        oned::OneDReader,
        reader::{BinaryBitmap, Reader},
    };

    fn read(m: &BitMatrix) -> ScanResult<Barcode> {
        OneDReader::new(RssExpandedReader).decode(&BinaryBitmap::from_bit_matrix(m)?, &DecodeHints::default())
    }

    #[test]
    fn test_checksum_weights() {
        assert_eq!((0..8).map(|c| checksum_weight(0, c)).collect::<Vec<_>>(), vec![1, 3, 9, 27, 81, 32, 96, 77]);
        assert_eq!((0..8).map(|c| checksum_weight(1, c)).collect::<Vec<_>>(), vec![20, 60, 180, 118, 143, 7, 21, 63]);
        assert_eq!(weight_row(FINDER_PAT_A, true, true), None);
        assert_eq!(weight_row(FINDER_PAT_A, true, false), Some(0));
        assert_eq!(weight_row(FINDER_PAT_F, false, false), Some(22));
    }

    #[test]
    fn test_character_widths() {
        for value in [0, 347, 348, 1387, 1388, 2947, 2948, 3987, 3988, 4095] {
            let (odd, even) = character_widths(value);
            assert_eq!(odd.iter().sum::<usize>() + even.iter().sum::<usize>(), CHARACTER_MODULES);
            let group = (13 - odd.iter().sum::<usize>()) / 2;
            let v_odd = rss_value(&odd, SYMBOL_WIDEST[group], true);
            let v_even = rss_value(&even, 9 - SYMBOL_WIDEST[group], false);
            assert_eq!(v_odd * EVEN_TOTAL_SUBSET[group] + v_even + GSUM[group], value);
        }
    }

    #[test]
    fn test_row_width() {
        // Four data characters and the check character: three pairs, the last one short
        let code = RssExpandedWriter.encode_row("(01)90012345678908").unwrap();
        assert_eq!(code.len(), 2 + 3 * 15 + 5 * 17 + 2);
    }

    #[test_case("(01)90012345678908")]
    #[test_case("(10)ABC")]
    #[test_case("(01)98898765432106(3202)012345(15)991231")]
    #[test_case("(21)abc-DEF(10)12")]
    #[test_case("(8200)http://ex.com/?q=1")]
    #[test_case("(01)00012345678905(10)ABC123(11)991231")]
    fn test_round_trip(content: &str) {
        let m = RssExpandedWriter.encode(content, BarcodeFormat::RssExpanded, 0, 10, &EncodeHints::default()).unwrap();
        let b = read(&m).unwrap();
        assert_eq!(b.text(), content);
        assert_eq!(b.format(), BarcodeFormat::RssExpanded);
        assert_eq!(b.get_metadata(ResultMetadataKey::SymbologyIdentifier).and_then(|v| v.as_text()), Some("]e0"));
    }

    #[test]
    fn test_round_trip_scaled() {
        let content = "(01)98898765432106(3202)012345(15)991231";
        let code = RssExpandedWriter.encode_row(content).unwrap();
        let width = 3 * (code.len() + 2 * DEFAULT_QUIET_ZONE);
        let m = RssExpandedWriter.encode(content, BarcodeFormat::RssExpanded, width, 30, &EncodeHints::default()).unwrap();
        assert_eq!(read(&m).unwrap().text(), content);
    }

    #[test]
    fn test_wrong_character_fails_checksum() {
        let values: Vec<u32> =
            encoder::encode("(10)ABC").unwrap().to_codewords(12).into_iter().map(u32::from).collect();
        let mut chars = symbol_characters(&values);
        chars[2] = character_widths(values[1] ^ 1);
        let m = render_row(&layout(&chars), 0, 1, DEFAULT_QUIET_ZONE).unwrap();
        assert_eq!(read(&m).unwrap_err(), ScanError::Checksum);
    }

    #[test]
    fn test_truncated_row_fails() {
        let code = RssExpandedWriter.encode_row("(01)98898765432106(3202)012345(15)991231").unwrap();
        let m = render_row(&code[..code.len() / 2], 0, 1, DEFAULT_QUIET_ZONE).unwrap();
        assert!(read(&m).is_err());
    }

    #[test_case("(01)12345678901234"; "bad check digit")]
    #[test_case("10ABC"; "no parentheses")]
    fn test_writer_rejects(content: &str) {
        let err = RssExpandedWriter.encode(content, BarcodeFormat::RssExpanded, 0, 0, &EncodeHints::default()).unwrap_err();
        assert!(matches!(err, ScanError::InvalidArgument(_)));
    }
}
