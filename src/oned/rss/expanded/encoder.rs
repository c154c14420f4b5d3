//! Packs `(AI)data` text into the bit stream carried by the data characters.

use super::{
    decoder::{ALPHA_SPECIALS, FNC1, ISO_SPECIALS},
    field_parser::{field_at, FieldLength},
};
use crate::{
    common::{BitStream, ScanError, ScanResult},
    oned::rss::gtin_check_digit,
};

pub const MIN_DATA_CHARS: usize = 3;
pub const MAX_DATA_CHARS: usize = 21;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field<'a> {
    pub ai: &'a str,
    pub data: &'a str,
    pub length: FieldLength,
}

pub fn parse_content(content: &str) -> ScanResult<Vec<Field<'_>>> {
    let mut fields = vec![];
    let mut rest = content;
    while !rest.is_empty() {
        let Some(after) = rest.strip_prefix('(') else {
            return Err(ScanError::invalid(format!("Expected an application identifier in parentheses: Got {rest:?}")));
        };
        let close = after.find(')').ok_or_else(|| ScanError::invalid("Unclosed application identifier"))?;
        let ai = &after[..close];
        let unknown = || ScanError::invalid(format!("Unknown application identifier: ({ai})"));
        let (ai_len, length) = field_at(ai).map_err(|_| unknown())?;
        if ai_len != ai.len() {
            return Err(unknown());
        }

        let tail = &after[close + 1..];
        let end = match length {
            FieldLength::Fixed(n) => n.min(tail.len()),
            FieldLength::Variable(_) => tail.find('(').unwrap_or(tail.len()),
        };
        let data = tail.get(..end).ok_or_else(|| ScanError::invalid("Invalid field boundary"))?;
        match length {
            FieldLength::Fixed(n) if data.len() != n => {
                return Err(ScanError::invalid(format!("({ai}) takes {n} characters: Got {}", data.len())));
            }
            FieldLength::Variable(n) if data.is_empty() || data.len() > n => {
                return Err(ScanError::invalid(format!("({ai}) takes 1 to {n} characters: Got {}", data.len())));
            }
            _ => {}
        }
        fields.push(Field { ai, data, length });
        rest = &tail[end..];
    }
    if fields.is_empty() {
        return Err(ScanError::invalid("Found empty contents"));
    }
    Ok(fields)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Symbol {
    Digit(u8),
    Fnc1,
    Char(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Numeric,
    Alpha,
    IsoIec646,
}

impl Symbol {
    fn numeric(self) -> Option<u32> {
        match self {
            Symbol::Digit(d) => Some(d as u32),
            Symbol::Fnc1 => Some(FNC1),
            Symbol::Char(_) => None,
        }
    }

    fn alpha(self) -> Option<(u32, usize)> {
        match self {
            Symbol::Digit(d) => Some((5 + d as u32, 5)),
            Symbol::Fnc1 => Some((15, 5)),
            Symbol::Char(c @ b'A'..=b'Z') => Some((c as u32 - 33, 6)),
            Symbol::Char(c) => ALPHA_SPECIALS.iter().position(|&s| s == c).map(|p| (58 + p as u32, 6)),
        }
    }

    fn iso(self) -> Option<(u32, usize)> {
        match self {
            Symbol::Digit(_) | Symbol::Fnc1 => self.alpha(),
            Symbol::Char(c @ b'A'..=b'Z') => Some((c as u32 - 1, 7)),
            Symbol::Char(c @ b'a'..=b'z') => Some((c as u32 - 7, 7)),
            Symbol::Char(c) => ISO_SPECIALS.iter().position(|&s| s == c).map(|p| (232 + p as u32, 8)),
        }
    }
}

// AI digits and data, with FNC1 closing every variable field but the last
fn to_symbols(fields: &[Field]) -> ScanResult<Vec<Symbol>> {
    let mut symbols = vec![];
    for (i, field) in fields.iter().enumerate() {
        symbols.extend(field.ai.bytes().map(|b| Symbol::Digit(b - b'0')));
        for c in field.data.bytes() {
            let symbol = if c.is_ascii_digit() { Symbol::Digit(c - b'0') } else { Symbol::Char(c) };
            if symbol.iso().is_none() {
                return Err(ScanError::invalid(format!("Character {:?} cannot be encoded", char::from(c))));
            }
            symbols.push(symbol);
        }
        if matches!(field.length, FieldLength::Variable(_)) && i + 1 < fields.len() {
            symbols.push(Symbol::Fnc1);
        }
    }
    Ok(symbols)
}

fn numeric_run(symbols: &[Symbol]) -> usize {
    symbols.iter().take_while(|s| s.numeric().is_some()).count()
}

// Greedy: pairs of digits while possible, alphanumeric otherwise, ISO 646 only when a
// character needs it
fn encode_general_purpose(symbols: &[Symbol], bits: &mut BitStream) -> Mode {
    let mut mode = Mode::Numeric;
    let mut i = 0;
    while i < symbols.len() {
        if mode == Mode::Numeric {
            let first = symbols[i].numeric();
            let second = symbols.get(i + 1).and_then(|s| s.numeric());
            match (first, second) {
                (Some(a), Some(b)) if a != FNC1 || b != FNC1 => {
                    bits.push_bits(8 + 11 * a + b, 7);
                    i += 2;
                }
                (Some(a), None) if a != FNC1 && i + 1 == symbols.len() => {
                    bits.push_bits(8 + 11 * a + FNC1, 7);
                    i += 1;
                }
                _ => {
                    bits.push_bits(0u8, 4);
                    mode = Mode::Alpha;
                }
            }
            continue;
        }

        let run = numeric_run(&symbols[i..]);
        if run >= 4 || (run >= 2 && i + run == symbols.len()) {
            bits.push_bits(0u8, 3);
            mode = Mode::Numeric;
            continue;
        }
        let value = if mode == Mode::Alpha { symbols[i].alpha() } else { symbols[i].iso() };
        match value {
            Some((v, n)) => {
                bits.push_bits(v, n);
                i += 1;
            }
            None => {
                bits.push_bits(0b00100u8, 5);
                mode = Mode::IsoIec646;
            }
        }
    }
    mode
}

// A numeric latch first if needed, then repeated alphanumeric/ISO 646 latches
fn pad(bits: &mut BitStream, size: usize, mode: Mode) {
    if mode == Mode::Numeric {
        let latch_end = size.min(bits.len() + 4);
        while bits.len() < latch_end {
            bits.push(false);
        }
    }
    let mut k = 0;
    while bits.len() < size {
        bits.push(k % 5 == 2);
        k += 1;
    }
}

pub fn encode(content: &str) -> ScanResult<BitStream> {
    let fields = parse_content(content)?;
    let (gtin, rest) = match fields.split_first() {
        Some((first, rest)) if first.ai == "01" => (Some(checked_gtin(first.data)?), rest),
        _ => (None, &fields[..]),
    };

    let mut payload = BitStream::new();
    let mode = encode_general_purpose(&to_symbols(rest)?, &mut payload);
    let header_len = if gtin.is_some() { 48 } else { 5 };
    let data_chars = (header_len + payload.len()).div_ceil(12).max(MIN_DATA_CHARS);
    if data_chars > MAX_DATA_CHARS {
        return Err(ScanError::invalid(format!(
            "Contents need {data_chars} data characters, at most {MAX_DATA_CHARS} fit"
        )));
    }
    let symbol_chars = data_chars + 1;

    let mut bits = BitStream::with_capacity(12 * data_chars);
    // Linkage flag
    bits.push(false);
    match &gtin {
        Some(digits) => {
            bits.push(true);
            push_variable_length(&mut bits, symbol_chars);
            bits.push_bits(digits[0], 4);
            for block in digits[1..13].chunks(3) {
                bits.push_bits(block.iter().fold(0u32, |acc, &d| acc * 10 + d as u32), 10);
            }
        }
        None => {
            bits.push_bits(0u8, 2);
            push_variable_length(&mut bits, symbol_chars);
        }
    }
    bits.append(&payload);
    pad(&mut bits, 12 * data_chars, mode);
    Ok(bits)
}

fn push_variable_length(bits: &mut BitStream, symbol_chars: usize) {
    bits.push(symbol_chars % 2 == 1);
    bits.push(symbol_chars > 14);
}

fn checked_gtin(data: &str) -> ScanResult<Vec<u8>> {
    if !data.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ScanError::invalid("(01) takes digits only"));
    }
    let digits: Vec<u8> = data.bytes().map(|b| b - b'0').collect();
    if gtin_check_digit(&digits[..13]) != digits[13] {
        return Err(ScanError::invalid("(01) fails its check digit"));
    }
    Ok(digits)
}
