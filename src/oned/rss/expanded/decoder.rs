//! Turns the data characters' bit stream back into `(AI)data` text.

use super::field_parser::parse_fields;
use crate::{
    common::{BitStream, ScanError, ScanResult},
    oned::rss::gtin_check_digit,
};

pub(super) const FNC1: u32 = 10;

// Alphanumeric set 6-bit values 58 to 62.
pub(super) const ALPHA_SPECIALS: &[u8; 5] = b"*,-./";

// ISO 646 set 8-bit values 232 to 252.
pub(super) const ISO_SPECIALS: &[u8; 21] = b"!\"%&'()*+,-./:;<=>?_ ";

const GTIN_SIZE: usize = 40;

// Date value for "no date"
const NO_DATE: u32 = 38400;

fn extract(bits: &BitStream, pos: usize, n: usize) -> ScanResult<u32> {
    bits.peek_at(pos, n).ok_or(ScanError::Format("RSS Expanded data ends early"))
}

pub fn decode_bits(bits: &BitStream) -> ScanResult<String> {
    let mut out = String::with_capacity(48);

    // Method 1: (01) then anything
    if extract(bits, 1, 1)? == 1 {
        let first_digit = extract(bits, 4, 4)?;
        append_gtin(bits, 8, first_digit, &mut out)?;
        decode_all_codes(bits, 8 + GTIN_SIZE, &mut out)?;
        return Ok(out);
    }
    // Method 00: anything
    if extract(bits, 2, 1)? == 0 {
        decode_all_codes(bits, 5, &mut out)?;
        return Ok(out);
    }

    match extract(bits, 1, 4)? {
        // 0100: (01) and (3103)
        4 => {
            check_size(bits, 5 + GTIN_SIZE + 15)?;
            append_gtin(bits, 5, 9, &mut out)?;
            let weight = extract(bits, 5 + GTIN_SIZE, 15)?;
            out.push_str(&format!("(3103){weight:06}"));
            return Ok(out);
        }
        // 0101: (01) and (3202) or (3203)
        5 => {
            check_size(bits, 5 + GTIN_SIZE + 15)?;
            append_gtin(bits, 5, 9, &mut out)?;
            let weight = extract(bits, 5 + GTIN_SIZE, 15)?;
            if weight < 10000 {
                out.push_str(&format!("(3202){weight:06}"));
            } else {
                out.push_str(&format!("(3203){:06}", weight - 10000));
            }
            return Ok(out);
        }
        _ => {}
    }

    match extract(bits, 1, 5)? {
        // 01100: (01) and (392x)
        12 => {
            append_gtin(bits, 8, 9, &mut out)?;
            let last_digit = extract(bits, 8 + GTIN_SIZE, 2)?;
            out.push_str(&format!("(392{last_digit})"));
            out.push_str(&decode_general_purpose(bits, 8 + GTIN_SIZE + 2)?);
            return Ok(out);
        }
        // 01101: (01) and (393x) with an ISO 4217 currency
        13 => {
            append_gtin(bits, 8, 9, &mut out)?;
            let last_digit = extract(bits, 8 + GTIN_SIZE, 2)?;
            let currency = extract(bits, 8 + GTIN_SIZE + 2, 10)?;
            out.push_str(&format!("(393{last_digit}){currency:03}"));
            out.push_str(&decode_general_purpose(bits, 8 + GTIN_SIZE + 12)?);
            return Ok(out);
        }
        _ => {}
    }

    // 0111000 to 0111111: (01), weight in kg or lb, optional date
    let method = extract(bits, 1, 7)?;
    if (56..=63).contains(&method) {
        let weight_ai = if method % 2 == 0 { "310" } else { "320" };
        let date_ai = ["11", "13", "15", "17"][(method as usize - 56) / 2];
        check_size(bits, 8 + GTIN_SIZE + 20 + 16)?;
        append_gtin(bits, 8, 9, &mut out)?;
        let weight = extract(bits, 8 + GTIN_SIZE, 20)?;
        out.push_str(&format!("({weight_ai}{}){:06}", weight / 100000, weight % 100000));
        let date = extract(bits, 8 + GTIN_SIZE + 20, 16)?;
        if date != NO_DATE {
            let (day, month, year) = (date % 32, date / 32 % 12 + 1, date / 32 / 12);
            out.push_str(&format!("({date_ai}){year:02}{month:02}{day:02}"));
        }
        return Ok(out);
    }
    Err(ScanError::Format("Unknown RSS Expanded encodation method"))
}

fn check_size(bits: &BitStream, size: usize) -> ScanResult<()> {
    if bits.len() != size {
        return Err(ScanError::Format("RSS Expanded data has the wrong size for its method"));
    }
    Ok(())
}

// (01), the indicator digit, twelve digits in 10-bit groups of three and a check digit
fn append_gtin(bits: &BitStream, pos: usize, first_digit: u32, out: &mut String) -> ScanResult<()> {
    if first_digit > 9 {
        return Err(ScanError::Format("Invalid GTIN indicator digit"));
    }
    let mut gtin = first_digit.to_string();
    for i in 0..4 {
        let block = extract(bits, pos + 10 * i, 10)?;
        if block > 999 {
            return Err(ScanError::Format("Invalid GTIN digit group"));
        }
        gtin.push_str(&format!("{block:03}"));
    }
    let digits: Vec<u8> = gtin.bytes().map(|b| b - b'0').collect();
    out.push_str("(01)");
    out.push_str(&gtin);
    out.push(char::from(b'0' + gtin_check_digit(&digits)));
    Ok(())
}

pub fn decode_all_codes(bits: &BitStream, pos: usize, out: &mut String) -> ScanResult<()> {
    let mut decoder = GeneralDecoder::new(bits, pos);
    let mut remaining = None;
    loop {
        let start = decoder.pos;
        let (raw, rest) = decoder.decode_field(remaining)?;
        out.push_str(&parse_fields(&raw)?);
        remaining = rest;
        if decoder.pos == start {
            return Ok(());
        }
    }
}

pub fn decode_general_purpose(bits: &BitStream, pos: usize) -> ScanResult<String> {
    GeneralDecoder::new(bits, pos).decode_field(None).map(|(raw, _)| raw)
}

// General purpose decoder
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Numeric,
    Alpha,
    IsoIec646,
}

// Outcome of a block: whether FNC1 ended the run and, for an FNC1 that opened a
// numeric pair, the digit left over for the next run.
type Block = (bool, Option<char>);

struct GeneralDecoder<'a> {
    bits: &'a BitStream,
    size: usize,
    pos: usize,
    mode: Mode,
    buffer: String,
}

impl<'a> GeneralDecoder<'a> {
    fn new(bits: &'a BitStream, pos: usize) -> Self {
        Self { bits, size: bits.len(), pos, mode: Mode::Numeric, buffer: String::new() }
    }

    fn decode_field(&mut self, remaining: Option<char>) -> ScanResult<(String, Option<char>)> {
        self.buffer.clear();
        self.buffer.extend(remaining);
        let rest = self.parse_blocks()?;
        Ok((std::mem::take(&mut self.buffer), rest))
    }

    fn parse_blocks(&mut self) -> ScanResult<Option<char>> {
        loop {
            let start = self.pos;
            let (finished, rest) = match self.mode {
                Mode::Alpha => self.parse_alpha_block()?,
                Mode::IsoIec646 => self.parse_iso_block()?,
                Mode::Numeric => self.parse_numeric_block()?,
            };
            if finished {
                return Ok(rest);
            }
            if start == self.pos {
                return Ok(None);
            }
        }
    }

    fn peek(&self, n: usize) -> Option<u32> {
        self.bits.peek_at(self.pos, n)
    }

    fn has(&self, n: usize) -> bool {
        self.pos + n <= self.size
    }

    // Numeric
    //--------------------------------------------------------------------------

    fn parse_numeric_block(&mut self) -> ScanResult<Block> {
        while self.is_still_numeric() {
            let (first, second) = self.decode_numeric()?;
            if first == FNC1 {
                let rest = (second != FNC1).then(|| digit(second));
                return Ok((true, rest));
            }
            self.buffer.push(digit(first));
            if second == FNC1 {
                return Ok((true, None));
            }
            self.buffer.push(digit(second));
        }
        if self.is_numeric_to_alpha_latch() {
            self.mode = Mode::Alpha;
            self.pos += 4;
        }
        Ok((false, None))
    }

    fn is_still_numeric(&self) -> bool {
        if !self.has(7) {
            return self.has(4);
        }
        self.peek(4).is_some_and(|v| v != 0)
    }

    // Pairs of digits in 7 bits, or a lone digit in 4 bits at the very end
    fn decode_numeric(&mut self) -> ScanResult<(u32, u32)> {
        if !self.has(7) {
            let value = self.peek(4).unwrap_or(0);
            self.pos = self.size;
            return match value {
                0 => Ok((FNC1, FNC1)),
                1..=11 => Ok((value - 1, FNC1)),
                _ => Err(ScanError::Format("Invalid numeric value")),
            };
        }
        let value = self.peek(7).unwrap_or(0);
        if value < 8 {
            return Err(ScanError::Format("Invalid numeric value"));
        }
        self.pos += 7;
        Ok(((value - 8) / 11, (value - 8) % 11))
    }

    fn is_numeric_to_alpha_latch(&self) -> bool {
        if !self.has(1) {
            return false;
        }
        (self.pos..(self.pos + 4).min(self.size)).all(|i| !self.bits.get(i))
    }

    // Alphanumeric
    //--------------------------------------------------------------------------

    fn parse_alpha_block(&mut self) -> ScanResult<Block> {
        while self.is_still_alpha() {
            match self.decode_alphanumeric()? {
                Some(c) => self.buffer.push(c),
                None => return Ok((true, None)),
            }
        }
        if self.is_to_numeric_latch() {
            self.pos += 3;
            self.mode = Mode::Numeric;
        } else if self.is_alpha_iso_latch() {
            self.pos = (self.pos + 5).min(self.size);
            self.mode = Mode::IsoIec646;
        }
        Ok((false, None))
    }

    fn is_still_alpha(&self) -> bool {
        if self.peek(5).is_some_and(|v| (5..16).contains(&v)) {
            return true;
        }
        self.peek(6).is_some_and(|v| (16..63).contains(&v))
    }

    // FNC1 is `None`
    fn decode_alphanumeric(&mut self) -> ScanResult<Option<char>> {
        if let Some(c) = self.decode_digit_or_fnc1() {
            return Ok(c);
        }
        let value = self.peek(6).unwrap_or(0);
        let c = match value {
            32..=57 => char::from(value as u8 + 33),
            58..=62 => char::from(ALPHA_SPECIALS[value as usize - 58]),
            _ => return Err(ScanError::Format("Invalid alphanumeric value")),
        };
        self.pos += 6;
        Ok(Some(c))
    }

    // The 5-bit values 5 to 15 shared by the alphanumeric and ISO 646 sets
    fn decode_digit_or_fnc1(&mut self) -> Option<Option<char>> {
        let value = self.peek(5)?;
        let c = match value {
            15 => None,
            5..=14 => Some(char::from(b'0' + value as u8 - 5)),
            _ => return None,
        };
        self.pos += 5;
        Some(c)
    }

    fn is_to_numeric_latch(&self) -> bool {
        self.peek(3) == Some(0)
    }

    // 00100, possibly cut short by the end of the data
    fn is_alpha_iso_latch(&self) -> bool {
        if !self.has(1) {
            return false;
        }
        (self.pos..(self.pos + 5).min(self.size)).all(|i| self.bits.get(i) == (i == self.pos + 2))
    }

    // ISO 646
    //--------------------------------------------------------------------------

    fn parse_iso_block(&mut self) -> ScanResult<Block> {
        while self.is_still_iso() {
            match self.decode_iso()? {
                Some(c) => self.buffer.push(c),
                None => return Ok((true, None)),
            }
        }
        if self.is_to_numeric_latch() {
            self.pos += 3;
            self.mode = Mode::Numeric;
        } else if self.is_alpha_iso_latch() {
            self.pos = (self.pos + 5).min(self.size);
            self.mode = Mode::Alpha;
        }
        Ok((false, None))
    }

    fn is_still_iso(&self) -> bool {
        let Some(five) = self.peek(5) else {
            return false;
        };
        if (5..16).contains(&five) {
            return true;
        }
        let Some(seven) = self.peek(7) else {
            return false;
        };
        if (64..116).contains(&seven) {
            return true;
        }
        self.peek(8).is_some_and(|v| (232..253).contains(&v))
    }

    fn decode_iso(&mut self) -> ScanResult<Option<char>> {
        if let Some(c) = self.decode_digit_or_fnc1() {
            return Ok(c);
        }
        if let Some(value @ 64..=115) = self.peek(7) {
            self.pos += 7;
            let c = if value < 90 { value + 1 } else { value + 7 };
            return Ok(Some(char::from(c as u8)));
        }
        let value = self.peek(8).unwrap_or(0);
        if !(232..=252).contains(&value) {
            return Err(ScanError::Format("Invalid ISO 646 value"));
        }
        self.pos += 8;
        Ok(Some(char::from(ISO_SPECIALS[value as usize - 232])))
    }
}

fn digit(value: u32) -> char {
    char::from(b'0' + value as u8)
}

#[cfg(test)]
mod decoder_tests {
    use super::*;

    // Fields of (value, bit count)
    fn stream(fields: &[(u32, usize)]) -> BitStream {
        let mut bits = BitStream::new();
        for &(value, n) in fields {
            bits.push_bits(value, n);
        }
        bits
    }

    fn pad_to_chars(mut bits: BitStream) -> BitStream {
        while bits.len() % 12 != 0 {
            bits.push(false);
        }
        bits
    }

    #[test]
    fn test_method_1_gtin_only() {
        // 0 1 00, indicator 9, 001 234 567 890
        let bits = stream(&[(0b0100, 4), (9, 4), (1, 10), (234, 10), (567, 10), (890, 10)]);
        assert_eq!(decode_bits(&bits).unwrap(), "(01)90012345678908");
    }

    #[test]
    fn test_method_1_with_more_fields() {
        // GTIN 0 0001 2345 6789, then 15 991231 in numeric pairs, padded
        let mut fields = vec![(0b0100, 4), (0, 4), (0, 10), (123, 10), (456, 10), (789, 10)];
        for pair in [(1, 5), (9, 9), (1, 2), (3, 1)] {
            fields.push((8 + 11 * pair.0 + pair.1, 7));
        }
        let bits = pad_to_chars(stream(&fields));
        assert_eq!(decode_bits(&bits).unwrap(), "(01)00001234567895(15)991231");
    }

    #[test]
    fn test_method_0100() {
        let bits = stream(&[(0b00100, 5), (1, 10), (234, 10), (567, 10), (890, 10), (1750, 15)]);
        assert_eq!(decode_bits(&bits).unwrap(), "(01)90012345678908(3103)001750");
    }

    #[test]
    fn test_method_0101() {
        let bits = stream(&[(0b00101, 5), (1, 10), (234, 10), (567, 10), (890, 10), (11750, 15)]);
        assert_eq!(decode_bits(&bits).unwrap(), "(01)90012345678908(3203)001750");
    }

    #[test]
    fn test_method_01100() {
        // Last digit 2, then price 12 in numeric pairs
        let mut fields = vec![(0b001100, 6), (0, 2), (1, 10), (234, 10), (567, 10), (890, 10), (2, 2)];
        fields.push((8 + 11 + 2, 7));
        let bits = pad_to_chars(stream(&fields));
        assert_eq!(decode_bits(&bits).unwrap(), "(01)90012345678908(3922)12");
    }

    #[test]
    fn test_method_01101() {
        let mut fields = vec![(0b001101, 6), (0, 2), (1, 10), (234, 10), (567, 10), (890, 10), (1, 2), (978, 10)];
        fields.push((8 + 11 * 5 + 5, 7));
        let bits = pad_to_chars(stream(&fields));
        assert_eq!(decode_bits(&bits).unwrap(), "(01)90012345678908(3931)97855");
    }

    #[test]
    fn test_method_0111001_with_date() {
        // Weight 1750 under (3201), 31 Dec 2011
        let date = (11 * 12 + 11) * 32 + 31;
        let bits = stream(&[(0b0111001, 8), (1, 10), (234, 10), (567, 10), (890, 10), (101750, 20), (date, 16)]);
        assert_eq!(decode_bits(&bits).unwrap(), "(01)90012345678908(3201)001750(11)111231");
    }

    #[test]
    fn test_method_0111000_without_date() {
        let bits = stream(&[(0b0111000, 8), (1, 10), (234, 10), (567, 10), (890, 10), (1750, 20), (NO_DATE, 16)]);
        assert_eq!(decode_bits(&bits).unwrap(), "(01)90012345678908(3100)001750");
    }

    #[test]
    fn test_any_ai_with_alpha_and_iso() {
        // 000 00, numeric "10", latch alpha, "AB", latch ISO, "c", FNC1
        let fields = [(0, 5), (8 + 11 + 0, 7), (0, 4), (32, 6), (33, 6), (0b00100, 5), (99 - 7, 7), (15, 5)];
        let bits = pad_to_chars(stream(&fields));
        assert_eq!(decode_bits(&bits).unwrap(), "(10)ABc");
    }

    #[test]
    fn test_fnc1_carries_digit() {
        // (10)1 FNC1 (11)121212 as numeric pairs: 10 1F 11 12 12 12
        let fields =
            [(0, 5), (8 + 11, 7), (8 + 11 + 10, 7), (8 + 11 + 1, 7), (8 + 11 + 2, 7), (8 + 11 + 2, 7), (8 + 11 + 2, 7)];
        let bits = pad_to_chars(stream(&fields));
        assert_eq!(decode_bits(&bits).unwrap(), "(10)1(11)121212");

        // (10)12 then FNC1 opening a pair: 10 12 F1 11 21 21 2F
        let fields = [
            (0, 5),
            (8 + 11, 7),
            (8 + 11 + 2, 7),
            (8 + 110 + 1, 7),
            (8 + 11 + 1, 7),
            (8 + 22 + 1, 7),
            (8 + 22 + 1, 7),
            (8 + 22 + 10, 7),
        ];
        let bits = pad_to_chars(stream(&fields));
        assert_eq!(decode_bits(&bits).unwrap(), "(10)12(11)121212");
    }

    #[test]
    fn test_bad_method_size() {
        let bits = stream(&[(0b00100, 5), (1, 10), (234, 10), (567, 10), (890, 10), (1750, 15), (0, 12)]);
        assert!(decode_bits(&bits).is_err());
    }

    #[test]
    fn test_unknown_ai() {
        let bits = pad_to_chars(stream(&[(0, 5), (8 + 88 + 8, 7)]));
        assert_eq!(decode_bits(&bits), Err(ScanError::Format("Unknown application identifier")));
    }
}
