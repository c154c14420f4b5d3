use log::debug;

use super::{codeword_field, layer_positions, word_size, AztecDetectorResult};
use crate::common::{
    ec::ReedSolomonDecoder, CharacterSet, DecodeHints, DecoderResult, ScanError, ScanResult,
};

// Character tables
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Table {
    Upper,
    Lower,
    Mixed,
    Digit,
    Punct,
    Binary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Code {
    Chars(&'static [u8]),
    Shift(Table),
    Latch(Table),
    Flag,
}

impl Table {
    fn code(self, value: u32) -> Code {
        use Code::*;
        use Table::*;

        let v = value as usize;
        match (self, v) {
            (Upper | Lower | Mixed | Digit, 0) => Shift(Punct),
            (Upper | Lower | Mixed | Digit, 1) => Chars(b" "),
            (Upper, 2..=27) => Chars(&UPPER_CHARS[v - 2..v - 1]),
            (Upper, 28) | (Mixed, 28) => Latch(Lower),
            (Upper | Lower, 29) => Latch(Mixed),
            (Upper | Lower, 30) => Latch(Digit),
            (Upper | Lower | Mixed, 31) => Shift(Binary),
            (Lower, 2..=27) => Chars(&LOWER_CHARS[v - 2..v - 1]),
            (Lower, 28) => Shift(Upper),
            (Mixed, 2..=27) => Chars(&MIXED_CHARS[v - 2..v - 1]),
            (Mixed, 29) => Latch(Upper),
            (Mixed, 30) => Latch(Punct),
            (Digit, 2..=11) => Chars(&DIGIT_CHARS[v - 2..v - 1]),
            (Digit, 12) => Chars(b","),
            (Digit, 13) => Chars(b"."),
            (Digit, 14) => Latch(Upper),
            (Digit, _) => Shift(Upper),
            (Punct, 0) => Flag,
            (Punct, 1) => Chars(b"\r"),
            (Punct, 2) => Chars(b"\r\n"),
            (Punct, 3) => Chars(b". "),
            (Punct, 4) => Chars(b", "),
            (Punct, 5) => Chars(b": "),
            (Punct, 6..=30) => Chars(&PUNCT_CHARS[v - 6..v - 5]),
            _ => Latch(Upper),
        }
    }
}

static UPPER_CHARS: &[u8; 26] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
static LOWER_CHARS: &[u8; 26] = b"abcdefghijklmnopqrstuvwxyz";
static DIGIT_CHARS: &[u8; 10] = b"0123456789";
static MIXED_CHARS: &[u8; 26] = b"\x01\x02\x03\x04\x05\x06\x07\x08\t\n\x0b\x0c\r\x1b\x1c\x1d\x1e\x1f@\\^_`|~\x7f";
static PUNCT_CHARS: &[u8; 25] = b"!\"#$%&'()*+,-./:;<=>?[]{}";

// High level decoding
//------------------------------------------------------------------------------

/// Text recovered from the corrected bit stream.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AztecText {
    pub text: String,
    pub gs1: bool,
    pub has_eci: bool,
}

struct TextBuilder {
    out: AztecText,
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

    fn is_empty(&self) -> bool {
        self.out.text.is_empty() && self.pending.is_empty()
    }
}

fn read_code(bits: &[bool], start: usize, len: usize) -> u32 {
    bits[start..start + len].iter().fold(0, |acc, &b| (acc << 1) | b as u32)
}

pub fn decode_text(bits: &[bool]) -> ScanResult<AztecText> {
    let end = bits.len();
    let mut latch = Table::Upper;
    let mut shift = Table::Upper;
    let mut b = TextBuilder { out: AztecText::default(), charset: CharacterSet::Latin1, pending: vec![] };
    let mut index = 0;

    while index < end {
        if shift == Table::Binary {
            if end - index < 5 {
                break;
            }
            let mut length = read_code(bits, index, 5) as usize;
            index += 5;
            if length == 0 {
                if end - index < 11 {
                    break;
                }
                length = read_code(bits, index, 11) as usize + 31;
                index += 11;
            }
            for _ in 0..length {
                if end - index < 8 {
                    index = end;
                    break;
                }
                b.pending.push(read_code(bits, index, 8) as u8);
                index += 8;
            }
            shift = latch;
            continue;
        }

        let size = if shift == Table::Digit { 4 } else { 5 };
        if end - index < size {
            break;
        }
        let code = read_code(bits, index, size);
        index += size;
        match shift.code(code) {
            Code::Flag => {
                if end - index < 3 {
                    break;
                }
                let n = read_code(bits, index, 3) as usize;
                index += 3;
                match n {
                    0 if b.is_empty() => b.out.gs1 = true,
                    0 => b.pending.push(29),
                    7 => return Err(ScanError::Format("Reserved FLG(7)")),
                    _ => {
                        if end - index < 4 * n {
                            break;
                        }
                        let mut eci = 0;
                        for _ in 0..n {
                            let digit = read_code(bits, index, 4);
                            index += 4;
                            if !(2..=11).contains(&digit) {
                                return Err(ScanError::Format("ECI digit out of range"));
                            }
                            eci = eci * 10 + (digit - 2);
                        }
                        b.flush();
                        b.charset = CharacterSet::from_eci(eci).ok_or(ScanError::Format("Unknown ECI"))?;
                        b.out.has_eci = true;
                    }
                }
                shift = latch;
            }
            // A shift ends in the mode it was invoked from, even when that is itself a shift
            Code::Shift(t) => {
                latch = shift;
                shift = t;
            }
            Code::Latch(t) => {
                latch = t;
                shift = t;
            }
            Code::Chars(chars) => {
                b.pending.extend_from_slice(chars);
                shift = latch;
            }
        }
    }
    b.flush();
    Ok(b.out)
}

// Codeword correction
//------------------------------------------------------------------------------

/// Data bits after error correction and unstuffing.
#[derive(Debug, Clone)]
pub struct CorrectedBits {
    pub bits: Vec<bool>,
    pub errors_corrected: usize,
    pub ec_level: usize,
}

fn extract_bits(det: &AztecDetectorResult) -> Vec<bool> {
    layer_positions(det.compact, det.layers).into_iter().map(|(x, y)| det.bits.get(x, y)).collect()
}

fn correct_bits(det: &AztecDetectorResult, raw: &[bool]) -> ScanResult<CorrectedBits> {
    let ws = word_size(det.layers);
    let num_data = det.data_blocks;
    let num_codewords = raw.len() / ws;
    if num_codewords < num_data {
        return Err(ScanError::Format("More data blocks than codewords"));
    }
    let offset = raw.len() % ws;
    let mut words: Vec<u16> =
        (0..num_codewords).map(|i| read_code(raw, offset + i * ws, ws) as u16).collect();

    let correction =
        ReedSolomonDecoder::new(codeword_field(ws)?).decode(&mut words, num_codewords - num_data, &[])?;

    let mask = (1u16 << ws) - 1;
    let mut bits = Vec::with_capacity(num_data * ws);
    for &w in &words[..num_data] {
        if w == 0 || w == mask {
            return Err(ScanError::Format("Invalid stuffed codeword"));
        }
        if w == 1 || w == mask - 1 {
            bits.extend(std::iter::repeat(w > 1).take(ws - 1));
        } else {
            bits.extend((0..ws).rev().map(|bit| w & (1 << bit) != 0));
        }
    }
    let ec_level = 100 * (num_codewords - num_data) / num_codewords;
    Ok(CorrectedBits { bits, errors_corrected: correction.errors, ec_level })
}

fn bits_to_bytes(bits: &[bool]) -> Vec<u8> {
    bits.chunks(8).map(|c| c.iter().enumerate().fold(0u8, |acc, (i, &b)| acc | ((b as u8) << (7 - i)))).collect()
}

pub fn decode(det: &AztecDetectorResult, hints: &DecodeHints) -> ScanResult<DecoderResult> {
    let raw = extract_bits(det);
    let corrected = correct_bits(det, &raw)?;
    let text = decode_text(&corrected.bits)?;
    debug!(
        "Aztec decoded: compact {}, layers {}, {} data blocks, {} errors corrected",
        det.compact, det.layers, det.data_blocks, corrected.errors_corrected
    );

    let mut res = DecoderResult::new(bits_to_bytes(&corrected.bits), text.text)
        .with_ec_level(format!("{}%", corrected.ec_level));
    res.num_bits = corrected.bits.len();
    res.errors_corrected = corrected.errors_corrected;
    res.symbology_modifier = u32::from(text.gs1 || hints.assume_gs1) + if text.has_eci { 3 } else { 0 };
    Ok(res)
}
