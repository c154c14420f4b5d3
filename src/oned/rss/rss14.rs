use log::trace;

use super::{
    gtin_check_digit, interleave, is_finder_pattern, parse_finder_value, rss_value, rss_widths, CharacterCounts,
    DataCharacter, FinderPattern,
};
use crate::{
    common::{Barcode, BarcodeFormat, BitArray, BitMatrix, DecodeHints, DecoderResult, EncodeHints, ScanError, ScanResult},
    oned::{append_pattern, check_digits, record_pattern, record_pattern_in_reverse, render_row, RowReader, DEFAULT_QUIET_ZONE},
    writer::{check_format, Writer},
};

const OUTSIDE_EVEN_TOTAL_SUBSET: [u32; 5] = [1, 10, 34, 70, 126];
const INSIDE_ODD_TOTAL_SUBSET: [u32; 4] = [4, 20, 48, 81];
const OUTSIDE_GSUM: [u32; 5] = [0, 161, 961, 2015, 2715];
const INSIDE_GSUM: [u32; 4] = [0, 336, 1036, 1516];
const OUTSIDE_ODD_WIDEST: [usize; 5] = [8, 6, 4, 3, 1];
const INSIDE_ODD_WIDEST: [usize; 4] = [2, 4, 6, 8];

const OUTSIDE_VALUES: u32 = 2841;
const INSIDE_VALUES: u32 = 1597;
const PAIR_VALUES: u64 = OUTSIDE_VALUES as u64 * INSIDE_VALUES as u64;

// First four elements of the nine finder patterns. The fifth is always one module.
const FINDER_PATTERNS: [[usize; 4]; 9] = [
    [3, 8, 2, 1],
    [3, 5, 5, 1],
    [3, 3, 7, 1],
    [3, 1, 9, 1],
    [2, 7, 4, 1],
    [2, 5, 6, 1],
    [2, 3, 8, 1],
    [1, 5, 7, 1],
    [1, 3, 9, 1],
];

// One half of the symbol: outside character, finder, inside character.
#[derive(Debug, Clone)]
struct Pair {
    value: u64,
    checksum_portion: u32,
    finder: FinderPattern,
    count: usize,
}

// Reader
//------------------------------------------------------------------------------

/// RSS-14 (GS1 DataBar Omnidirectional). Each half must be seen on two rows of the same
/// image before a result is reported.
#[derive(Debug, Default)]
pub struct Rss14Reader {
    left_pairs: Vec<Pair>,
    right_pairs: Vec<Pair>,
}

impl RowReader for Rss14Reader {
    fn decode_row(&mut self, row_number: usize, row: &BitArray, _hints: &DecodeHints) -> ScanResult<Barcode> {
        if let Some(left) = decode_pair(row, false, row_number) {
            add_or_tally(&mut self.left_pairs, left);
        }
        let mut reversed = row.clone();
        reversed.reverse();
        if let Some(right) = decode_pair(&reversed, true, row_number) {
            add_or_tally(&mut self.right_pairs, right);
        }

        for left in self.left_pairs.iter().filter(|p| p.count > 1) {
            for right in self.right_pairs.iter().filter(|p| p.count > 1) {
                if check_checksum(left, right) {
                    return Ok(construct_result(left, right));
                }
            }
        }
        Err(ScanError::NotFound)
    }

    fn reset(&mut self) {
        self.left_pairs.clear();
        self.right_pairs.clear();
    }
}

fn add_or_tally(pairs: &mut Vec<Pair>, pair: Pair) {
    match pairs.iter_mut().find(|p| p.value == pair.value) {
        Some(other) => other.count += 1,
        None => pairs.push(pair),
    }
}

fn check_checksum(left: &Pair, right: &Pair) -> bool {
    let check = (left.checksum_portion + 16 * right.checksum_portion) % 79;
    check == check_target(left.finder.value, right.finder.value)
}

// Two of the 81 finder combinations are never used
fn check_target(left_finder: usize, right_finder: usize) -> u32 {
    let mut target = 9 * left_finder as u32 + right_finder as u32;
    if target > 72 {
        target -= 1;
    }
    if target > 8 {
        target -= 1;
    }
    target
}

fn finders_for_check(check: u32) -> (usize, usize) {
    let mut value = check;
    if value >= 8 {
        value += 1;
    }
    if value >= 72 {
        value += 1;
    }
    ((value / 9) as usize, (value % 9) as usize)
}

fn construct_result(left: &Pair, right: &Pair) -> Barcode {
    let symbol_value = PAIR_VALUES * left.value + right.value;
    let mut text = format!("{symbol_value:013}");
    let digits: Vec<u8> = text.bytes().map(|b| b - b'0').collect();
    text.push(char::from(b'0' + gtin_check_digit(&digits)));
    trace!("RSS-14 pairs {} and {} give {text}", left.value, right.value);

    let points = vec![left.finder.points[0], left.finder.points[1], right.finder.points[0], right.finder.points[1]];
    DecoderResult::new(vec![], text).into_barcode(points, BarcodeFormat::Rss14)
}

fn decode_pair(row: &BitArray, right: bool, row_number: usize) -> Option<Pair> {
    for (start_end, counters) in finder_candidates(row, right) {
        let Ok(finder) = parse_found_finder_pattern(row, row_number, right, start_end, counters) else {
            continue;
        };
        let Ok(outside) = decode_data_character(row, &finder, true) else {
            continue;
        };
        let Ok(inside) = decode_data_character(row, &finder, false) else {
            continue;
        };
        return Some(Pair {
            value: INSIDE_VALUES as u64 * outside.value as u64 + inside.value as u64,
            checksum_portion: outside.checksum_portion + 4 * inside.checksum_portion,
            finder,
            count: 1,
        });
    }
    None
}

// Every run of four elements shaped like finder elements two to five. The left finder
// starts on a bar, the right one, in the reversed row, on a space.
fn finder_candidates(row: &BitArray, right: bool) -> Vec<([usize; 2], [usize; 4])> {
    let width = row.len();
    let mut offset = 0;
    let mut is_white = false;
    while offset < width {
        is_white = !row.get(offset);
        if right == is_white {
            break;
        }
        offset += 1;
    }

    let mut found = vec![];
    let mut counters = [0usize; 4];
    let mut pos = 0;
    let mut pattern_start = offset;
    for x in offset..width {
        if row.get(x) != is_white {
            counters[pos] += 1;
            continue;
        }
        if pos == 3 {
            if is_finder_pattern(&counters) {
                found.push(([pattern_start, x], counters));
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
    right: bool,
    start_end: [usize; 2],
    counters: [usize; 4],
) -> ScanResult<FinderPattern> {
    // Element one sits just before the four that matched
    let first_is_black = row.get(start_end[0]);
    let mut first_start = start_end[0];
    while first_start > 0 && row.get(first_start - 1) != first_is_black {
        first_start -= 1;
    }
    let first_counter = start_end[0] - first_start;
    let elements = [first_counter, counters[0], counters[1], counters[2]];
    let value = parse_finder_value(&elements, &FINDER_PATTERNS)?;

    let (mut start, mut end) = (first_start, start_end[1]);
    if right {
        start = row.len() - 1 - start;
        end = row.len() - 1 - end;
    }
    Ok(FinderPattern::new(value, [first_start, start_end[1]], start, end, row_number))
}

// Powers of nine over odd and even widths
fn checksum_portion(odd: &[usize; 4], even: &[usize; 4]) -> u32 {
    let weigh = |w: &[usize; 4]| w.iter().rev().fold(0, |acc, &c| acc * 9 + c as u32);
    weigh(odd) + 3 * weigh(even)
}

fn decode_data_character(row: &BitArray, finder: &FinderPattern, outside: bool) -> ScanResult<DataCharacter> {
    let mut counters = [0usize; 8];
    if outside {
        record_pattern_in_reverse(row, finder.start_end[0], &mut counters)?;
    } else {
        record_pattern(row, finder.start_end[1], &mut counters)?;
        counters.reverse();
    }

    let num_modules = if outside { 16 } else { 15 };
    let mut counts = CharacterCounts::from_counters(&counters, num_modules, false)?;
    if outside {
        counts.adjust(num_modules, (4, 12), (4, 12), true, true)?;
    } else {
        counts.adjust(num_modules, (5, 11), (4, 10), false, true)?;
    }

    let odd_sum = counts.odd_sum();
    let even_sum = counts.even_sum();
    let checksum_portion = checksum_portion(&counts.odd, &counts.even);
    let value = if outside {
        if odd_sum % 2 == 1 || !(4..=12).contains(&odd_sum) {
            return Err(ScanError::NotFound);
        }
        let group = (12 - odd_sum) / 2;
        let odd_widest = OUTSIDE_ODD_WIDEST[group];
        let v_odd = rss_value(&counts.odd, odd_widest, false);
        let v_even = rss_value(&counts.even, 9 - odd_widest, true);
        v_odd * OUTSIDE_EVEN_TOTAL_SUBSET[group] + v_even + OUTSIDE_GSUM[group]
    } else {
        if even_sum % 2 == 1 || !(4..=10).contains(&even_sum) {
            return Err(ScanError::NotFound);
        }
        let group = (10 - even_sum) / 2;
        let odd_widest = INSIDE_ODD_WIDEST[group];
        let v_odd = rss_value(&counts.odd, odd_widest, true);
        let v_even = rss_value(&counts.even, 9 - odd_widest, false);
        v_even * INSIDE_ODD_TOTAL_SUBSET[group] + v_odd + INSIDE_GSUM[group]
    };
    Ok(DataCharacter { value, checksum_portion })
}

// Writer
//------------------------------------------------------------------------------

fn group_of(value: u32, gsums: &[u32]) -> usize {
    gsums.iter().rposition(|&g| g <= value).unwrap_or(0)
}

// Element widths in reading order, odd elements first
fn outside_widths(value: u32) -> [usize; 8] {
    let group = group_of(value, &OUTSIDE_GSUM);
    let rest = value - OUTSIDE_GSUM[group];
    let t_even = OUTSIDE_EVEN_TOTAL_SUBSET[group];
    let odd_sum = 12 - 2 * group;
    let odd_widest = OUTSIDE_ODD_WIDEST[group];
    let odd = rss_widths(rest / t_even, odd_sum, 4, odd_widest, false);
    let even = rss_widths(rest % t_even, 16 - odd_sum, 4, 9 - odd_widest, true);
    interleave(&to_array(&odd), &to_array(&even))
}

fn inside_widths(value: u32) -> [usize; 8] {
    let group = group_of(value, &INSIDE_GSUM);
    let rest = value - INSIDE_GSUM[group];
    let t_odd = INSIDE_ODD_TOTAL_SUBSET[group];
    let even_sum = 10 - 2 * group;
    let odd_widest = INSIDE_ODD_WIDEST[group];
    let odd = rss_widths(rest % t_odd, 15 - even_sum, 4, odd_widest, true);
    let even = rss_widths(rest / t_odd, even_sum, 4, 9 - odd_widest, false);
    interleave(&to_array(&odd), &to_array(&even))
}

fn to_array(widths: &[usize]) -> [usize; 4] {
    [widths[0], widths[1], widths[2], widths[3]]
}

fn element_checksum(elements: &[usize; 8]) -> u32 {
    let odd = [elements[0], elements[2], elements[4], elements[6]];
    let even = [elements[1], elements[3], elements[5], elements[7]];
    checksum_portion(&odd, &even)
}

// Guard, outside character, finder, then the inside character facing the middle
fn half_widths(outside: &[usize; 8], finder: usize, inside: &[usize; 8]) -> Vec<usize> {
    let mut widths = vec![1, 1];
    widths.extend_from_slice(outside);
    widths.extend_from_slice(&FINDER_PATTERNS[finder]);
    widths.push(1);
    widths.extend(inside.iter().rev());
    widths
}

pub struct Rss14Writer;

impl Rss14Writer {
    pub fn encode_row(&self, content: &str) -> ScanResult<Vec<bool>> {
        check_digits(content)?;
        let digits: Vec<u8> = content.bytes().map(|b| b - b'0').collect();
        match digits.len() {
            13 => {}
            14 if gtin_check_digit(&digits[..13]) == digits[13] => {}
            14 => return Err(ScanError::invalid("Contents do not pass checksum")),
            n => return Err(ScanError::invalid(format!("Requested contents should be 13 or 14 digits long: Got {n}"))),
        }

        let value = digits[..13].iter().fold(0u64, |acc, &d| acc * 10 + d as u64);
        let halves = [value / PAIR_VALUES, value % PAIR_VALUES];
        let chars: Vec<([usize; 8], [usize; 8])> = halves
            .iter()
            .map(|&half| {
                let outside = (half / INSIDE_VALUES as u64) as u32;
                let inside = (half % INSIDE_VALUES as u64) as u32;
                (outside_widths(outside), inside_widths(inside))
            })
            .collect();

        let portions: Vec<u32> =
            chars.iter().map(|(out, inn)| element_checksum(out) + 4 * element_checksum(inn)).collect();
        let (left_finder, right_finder) = finders_for_check((portions[0] + 16 * portions[1]) % 79);

        let mut widths = half_widths(&chars[0].0, left_finder, &chars[0].1);
        widths.extend(half_widths(&chars[1].0, right_finder, &chars[1].1).into_iter().rev());
        let mut code = Vec::with_capacity(96);
        append_pattern(&mut code, &widths, false);
        Ok(code)
    }
}

impl Writer for Rss14Writer {
    fn encode(
        &self,
        content: &str,
        format: BarcodeFormat,
        width: usize,
        height: usize,
        hints: &EncodeHints,
    ) -> ScanResult<BitMatrix> {
        check_format(format, BarcodeFormat::Rss14)?;
        let code = self.encode_row(content)?;
        render_row(&code, width, height, hints.margin.unwrap_or(DEFAULT_QUIET_ZONE))
    }
}
