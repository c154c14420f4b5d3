//! Reduced Space Symbology, now GS1 DataBar. Both variants pair data characters around
//! finder patterns and spell each character as an (n, k) width combination.

pub mod expanded;
pub mod rss14;

use super::pattern_match_variance;
use crate::common::{ResultPoint, ScanError, ScanResult};

const MAX_AVG_VARIANCE: f32 = 0.2;
const MAX_INDIVIDUAL_VARIANCE: f32 = 0.45;
const MIN_FINDER_PATTERN_RATIO: f32 = 9.5 / 12.0;
const MAX_FINDER_PATTERN_RATIO: f32 = 12.5 / 14.0;

/// A decoded symbol character and its contribution to the symbol checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataCharacter {
    pub value: u32,
    pub checksum_portion: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FinderPattern {
    pub value: usize,
    pub start_end: [usize; 2],
    pub points: [ResultPoint; 2],
}

impl FinderPattern {
    pub fn new(value: usize, start_end: [usize; 2], start: usize, end: usize, row_number: usize) -> Self {
        let y = row_number as f32;
        Self { value, start_end, points: [ResultPoint::new(start as f32, y), ResultPoint::new(end as f32, y)] }
    }
}

// Finder patterns
//------------------------------------------------------------------------------

// Elements two to five of a finder: a wide pair followed by a narrow pair.
pub(crate) fn is_finder_pattern(counters: &[usize; 4]) -> bool {
    let first_two = counters[0] + counters[1];
    let sum = first_two + counters[2] + counters[3];
    let ratio = first_two as f32 / sum as f32;
    if !(MIN_FINDER_PATTERN_RATIO..=MAX_FINDER_PATTERN_RATIO).contains(&ratio) {
        return false;
    }
    let min = counters.iter().copied().min().unwrap_or(0);
    let max = counters.iter().copied().max().unwrap_or(0);
    max < 10 * min
}

pub(crate) fn parse_finder_value(counters: &[usize; 4], patterns: &[[usize; 4]]) -> ScanResult<usize> {
    patterns
        .iter()
        .position(|p| pattern_match_variance(counters, p, MAX_INDIVIDUAL_VARIANCE) < MAX_AVG_VARIANCE)
        .ok_or(ScanError::NotFound)
}

// Character widths
//------------------------------------------------------------------------------

// Module counts of a data character rounded from pixel widths, with the rounding error
// of each kept for later nudging.
#[derive(Debug, Default)]
pub(crate) struct CharacterCounts {
    pub odd: [usize; 4],
    pub even: [usize; 4],
    pub odd_errors: [f32; 4],
    pub even_errors: [f32; 4],
}

impl CharacterCounts {
    pub fn from_counters(counters: &[usize; 8], num_modules: usize, strict: bool) -> ScanResult<Self> {
        let element_width = counters.iter().sum::<usize>() as f32 / num_modules as f32;
        let mut res = Self::default();
        for (i, &c) in counters.iter().enumerate() {
            let value = c as f32 / element_width;
            let mut count = (value + 0.5) as usize;
            if count < 1 {
                if strict && value < 0.3 {
                    return Err(ScanError::NotFound);
                }
                count = 1;
            } else if count > 8 {
                if strict && value > 8.7 {
                    return Err(ScanError::NotFound);
                }
                count = 8;
            }
            if i & 1 == 0 {
                res.odd[i / 2] = count;
                res.odd_errors[i / 2] = value - count as f32;
            } else {
                res.even[i / 2] = count;
                res.even_errors[i / 2] = value - count as f32;
            }
        }
        Ok(res)
    }

    pub fn odd_sum(&self) -> usize {
        self.odd.iter().sum()
    }

    pub fn even_sum(&self) -> usize {
        self.even.iter().sum()
    }

    pub fn adjust(
        &mut self,
        num_modules: usize,
        odd_range: (usize, usize),
        even_range: (usize, usize),
        odd_sum_even: bool,
        even_sum_even: bool,
    ) -> ScanResult<()> {
        let odd_sum = self.odd_sum();
        let even_sum = self.even_sum();
        let mut increment_odd = odd_sum < odd_range.0;
        let mut decrement_odd = odd_sum > odd_range.1;
        let mut increment_even = even_sum < even_range.0;
        let mut decrement_even = even_sum > even_range.1;

        let mismatch = (odd_sum + even_sum) as isize - num_modules as isize;
        let odd_parity_bad = (odd_sum % 2 == 0) != odd_sum_even;
        let even_parity_bad = (even_sum % 2 == 0) != even_sum_even;
        match mismatch {
            1 => {
                if odd_parity_bad == even_parity_bad {
                    return Err(ScanError::NotFound);
                }
                if odd_parity_bad {
                    decrement_odd = true;
                } else {
                    decrement_even = true;
                }
            }
            -1 => {
                if odd_parity_bad == even_parity_bad {
                    return Err(ScanError::NotFound);
                }
                if odd_parity_bad {
                    increment_odd = true;
                } else {
                    increment_even = true;
                }
            }
            0 => {
                if odd_parity_bad != even_parity_bad {
                    return Err(ScanError::NotFound);
                }
                if odd_parity_bad {
                    if odd_sum < even_sum {
                        increment_odd = true;
                        decrement_even = true;
                    } else {
                        decrement_odd = true;
                        increment_even = true;
                    }
                }
            }
            _ => return Err(ScanError::NotFound),
        }

        if increment_odd {
            if decrement_odd {
                return Err(ScanError::NotFound);
            }
            increment(&mut self.odd, &self.odd_errors);
        }
        if decrement_odd {
            decrement(&mut self.odd, &self.odd_errors);
        }
        if increment_even {
            if decrement_even {
                return Err(ScanError::NotFound);
            }
            increment(&mut self.even, &self.even_errors);
        }
        if decrement_even {
            decrement(&mut self.even, &self.even_errors);
        }
        Ok(())
    }

    pub fn elements(&self) -> [usize; 8] {
        interleave(&self.odd, &self.even)
    }
}

// Widens the element that was rounded down the most
fn increment(counts: &mut [usize; 4], errors: &[f32; 4]) {
    let mut index = 0;
    for i in 1..4 {
        if errors[i] > errors[index] {
            index = i;
        }
    }
    counts[index] += 1;
}

fn decrement(counts: &mut [usize; 4], errors: &[f32; 4]) {
    let mut index = 0;
    for i in 1..4 {
        if errors[i] < errors[index] {
            index = i;
        }
    }
    counts[index] = counts[index].saturating_sub(1);
}

pub(crate) fn interleave(odd: &[usize; 4], even: &[usize; 4]) -> [usize; 8] {
    let mut out = [0; 8];
    for i in 0..4 {
        out[2 * i] = odd[i];
        out[2 * i + 1] = even[i];
    }
    out
}

// Width combinations
//------------------------------------------------------------------------------

fn combins(n: i64, r: i64) -> i64 {
    let (min_denom, max_denom) = if n - r > r { (r, n - r) } else { (n - r, r) };
    let mut val = 1;
    let mut j = 1;
    let mut i = n;
    while i > max_denom {
        val *= i;
        if j <= min_denom {
            val /= j;
            j += 1;
        }
        i -= 1;
    }
    while j <= min_denom {
        val /= j;
        j += 1;
    }
    val
}

// Number of width combinations skipped by choosing `elm_width` for element `bar`
fn skipped_combinations(
    n: i64,
    elm_width: i64,
    bar: i64,
    elements: i64,
    max_width: i64,
    no_narrow: bool,
    narrow_mask: u32,
) -> i64 {
    let mut sub_val = combins(n - elm_width - 1, elements - bar - 2);
    if no_narrow && narrow_mask == 0 && n - elm_width - (elements - bar - 1) >= elements - bar - 1 {
        sub_val -= combins(n - elm_width - (elements - bar), elements - bar - 2);
    }
    if elements - bar - 1 > 1 {
        let mut less_val = 0;
        let mut mxw_element = n - elm_width - (elements - bar - 2);
        while mxw_element > max_width {
            less_val += combins(n - elm_width - mxw_element - 1, elements - bar - 3);
            mxw_element -= 1;
        }
        sub_val -= less_val * (elements - 1 - bar);
    } else if n - elm_width > max_width {
        sub_val -= 1;
    }
    sub_val
}

pub fn rss_value(widths: &[usize], max_width: usize, no_narrow: bool) -> u32 {
    let elements = widths.len() as i64;
    let max_width = max_width as i64;
    let mut n: i64 = widths.iter().sum::<usize>() as i64;
    let mut val = 0;
    let mut narrow_mask = 0u32;
    for bar in 0..elements - 1 {
        let mut elm_width = 1;
        narrow_mask |= 1 << bar;
        while elm_width < widths[bar as usize] as i64 {
            val += skipped_combinations(n, elm_width, bar, elements, max_width, no_narrow, narrow_mask);
            elm_width += 1;
            narrow_mask &= !(1 << bar);
        }
        n -= elm_width;
    }
    val as u32
}

pub fn rss_widths(value: u32, n: usize, elements: usize, max_width: usize, no_narrow: bool) -> Vec<usize> {
    let el = elements as i64;
    let max_width = max_width as i64;
    let mut n = n as i64;
    let mut val = value as i64;
    let mut widths = vec![0; elements];
    let mut narrow_mask = 0u32;
    for bar in 0..el - 1 {
        narrow_mask |= 1 << bar;
        let mut elm_width = 1;
        let mut sub_val;
        loop {
            sub_val = skipped_combinations(n, elm_width, bar, el, max_width, no_narrow, narrow_mask);
            val -= sub_val;
            if val < 0 {
                break;
            }
            elm_width += 1;
            narrow_mask &= !(1 << bar);
        }
        val += sub_val;
        n -= elm_width;
        widths[bar as usize] = elm_width as usize;
    }
    widths[elements - 1] = n as usize;
    widths
}

// Check digit of a 13 digit GTIN prefix, weights 3 and 1 from the left.
pub(crate) fn gtin_check_digit(digits: &[u8]) -> u8 {
    let sum: u32 = digits.iter().enumerate().map(|(i, &d)| if i & 1 == 0 { 3 * d as u32 } else { d as u32 }).sum();
    ((10 - sum % 10) % 10) as u8
}

#[cfg(test)]
mod rss_tests {
    use test_case::test_case;

    use super::*;

    #[test_case(&[1, 1, 1, 1], 4, false, 0)]
    #[test_case(&[2, 1, 1, 1], 4, false, 3)]
    #[test_case(&[3, 8, 2, 1], 8, false, 135)]
    #[test_case(&[2, 2, 2, 2], 5, true, 20)]
    fn test_rss_value(widths: &[usize], max_width: usize, no_narrow: bool, exp: u32) {
        assert_eq!(rss_value(widths, max_width, no_narrow), exp);
    }

    #[test]
    fn test_widths_invert_value() {
        // Outside characters of RSS-14 group 0: odd sum 12 over widest 8
        for value in 0..161 {
            let w = rss_widths(value, 12, 4, 8, false);
            assert_eq!(w.iter().sum::<usize>(), 12);
            assert!(w.iter().all(|&x| (1..=8).contains(&x)));
            assert_eq!(rss_value(&w, 8, false), value);
        }
        // RSS Expanded group 2, even side with no narrow exclusion
        for value in 0..52 {
            let w = rss_widths(value, 9, 4, 5, false);
            assert_eq!(rss_value(&w, 5, false), value);
        }
    }

    #[test]
    fn test_no_narrow_always_has_a_narrow() {
        for value in 0..34 {
            let w = rss_widths(value, 8, 4, 5, true);
            assert!(w.contains(&1), "{w:?}");
        }
    }

    #[test_case([8, 2, 1, 1], true)]
    #[test_case([2, 2, 2, 2], false)]
    #[test_case([20, 1, 1, 1], false)]
    fn test_is_finder_pattern(counters: [usize; 4], exp: bool) {
        assert_eq!(is_finder_pattern(&counters), exp);
    }

    #[test_case("0001234567890", 5)]
    #[test_case("9501234567891", 0)]
    #[test_case("2001234567890", 9)]
    fn test_gtin_check_digit(digits: &str, exp: u8) {
        let digits: Vec<u8> = digits.bytes().map(|d| d - b'0').collect();
        assert_eq!(gtin_check_digit(&digits), exp);
    }
}
