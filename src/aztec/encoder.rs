use std::rc::Rc;

use log::debug;

use super::{alignment_map, codeword_field, layer_positions, matrix_size, total_bits_in_layer, word_size};
use crate::common::{ec::ReedSolomonEncoder, BitArray, BitMatrix, CharacterSet, ScanError, ScanResult};

pub const DEFAULT_EC_PERCENT: u32 = 33;
const MAX_LAYERS: usize = 32;
const MAX_LAYERS_COMPACT: usize = 4;

// Modes
//------------------------------------------------------------------------------

const UPPER: usize = 0;
const LOWER: usize = 1;
const DIGIT: usize = 2;
const MIXED: usize = 3;
const PUNCT: usize = 4;

// (bit count << 16) | code bits, to latch from the row mode to the column mode
static LATCH_TABLE: [[u32; 5]; 5] = [
    [0, (5 << 16) + 28, (5 << 16) + 30, (5 << 16) + 29, (10 << 16) + (29 << 5) + 30],
    [(9 << 16) + (30 << 4) + 14, 0, (5 << 16) + 30, (5 << 16) + 29, (10 << 16) + (29 << 5) + 30],
    [(4 << 16) + 14, (9 << 16) + (14 << 5) + 28, 0, (9 << 16) + (14 << 5) + 29, (14 << 16) + (14 << 10) + (29 << 5) + 30],
    [(5 << 16) + 29, (5 << 16) + 28, (10 << 16) + (29 << 5) + 30, 0, (5 << 16) + 30],
    [(5 << 16) + 31, (10 << 16) + (31 << 5) + 28, (10 << 16) + (31 << 5) + 30, (10 << 16) + (31 << 5) + 29, 0],
];

// Shift code from the row mode to the column mode; shifts exist only to UPPER and PUNCT
fn shift_code(from: usize, to: usize) -> Option<u32> {
    match (from, to) {
        (UPPER | LOWER | MIXED | DIGIT, PUNCT) => Some(0),
        (LOWER, UPPER) => Some(28),
        (DIGIT, UPPER) => Some(15),
        _ => None,
    }
}

static MIXED_CHARS: [u8; 28] = [
    0, b' ', 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 27, 28, 29, 30, 31, b'@', b'\\', b'^', b'_', b'`', b'|',
    b'~', 127,
];

static PUNCT_CHARS: [u8; 31] = [
    0, b'\r', 0, 0, 0, 0, b'!', b'"', b'#', b'$', b'%', b'&', b'\'', b'(', b')', b'*', b'+', b',', b'-', b'.', b'/',
    b':', b';', b'<', b'=', b'>', b'?', b'[', b']', b'{', b'}',
];

// Code of `ch` in `mode`, zero when the mode can't express it.
fn char_code(mode: usize, ch: u8) -> u32 {
    let code = match (mode, ch) {
        (UPPER | LOWER | DIGIT, b' ') => 1,
        (UPPER, b'A'..=b'Z') => ch - b'A' + 2,
        (LOWER, b'a'..=b'z') => ch - b'a' + 2,
        (DIGIT, b'0'..=b'9') => ch - b'0' + 2,
        (DIGIT, b',') => 12,
        (DIGIT, b'.') => 13,
        (MIXED, _) => MIXED_CHARS.iter().skip(1).position(|&c| c == ch).map_or(0, |p| p as u8 + 1),
        (PUNCT, _) if ch != 0 => PUNCT_CHARS.iter().position(|&c| c == ch).map_or(0, |p| p as u8),
        _ => 0,
    };
    code as u32
}

// Tokens
//------------------------------------------------------------------------------

#[derive(Debug)]
enum TokenKind {
    Simple { value: u32, bits: usize },
    BinaryShift { start: usize, count: usize },
}

#[derive(Debug)]
struct Token {
    kind: TokenKind,
    prev: Option<Rc<Token>>,
}

fn push_token(prev: &Option<Rc<Token>>, kind: TokenKind) -> Option<Rc<Token>> {
    Some(Rc::new(Token { kind, prev: prev.clone() }))
}

impl TokenKind {
    fn append_to(&self, out: &mut BitArray, text: &[u8]) {
        match *self {
            Self::Simple { value, bits } => out.append_bits(value, bits),
            Self::BinaryShift { start, count } => {
                for i in 0..count {
                    if i == 0 || (i == 31 && count <= 62) {
                        out.append_bits(31, 5);
                        if count > 62 {
                            out.append_bits((count - 31) as u32, 16);
                        } else if i == 0 {
                            out.append_bits(count.min(31) as u32, 5);
                        } else {
                            out.append_bits((count - 31) as u32, 5);
                        }
                    }
                    out.append_bits(text[start + i] as u32, 8);
                }
            }
        }
    }
}

// Encoder state
//------------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct State {
    token: Option<Rc<Token>>,
    mode: usize,
    binary_bytes: usize,
    bit_count: usize,
}

fn binary_shift_cost(bytes: usize) -> usize {
    // One B/S below 32 bytes, two up to 62, then the long form
    match bytes {
        0 => 0,
        1..=31 => 10,
        32..=62 => 20,
        _ => 21,
    }
}

fn mode_bits(mode: usize) -> usize {
    if mode == DIGIT {
        4
    } else {
        5
    }
}

impl State {
    fn initial() -> Self {
        Self { token: None, mode: UPPER, binary_bytes: 0, bit_count: 0 }
    }

    fn with(&self, token: Option<Rc<Token>>, mode: usize, binary_bytes: usize, bit_count: usize) -> Self {
        Self { token, mode, binary_bytes, bit_count }
    }

    // FLG(n) with an ECI designator, or FNC1 for `None`.
    fn append_flg(&self, eci: Option<u32>) -> ScanResult<Self> {
        let res = self.shift_and_append(PUNCT, 0);
        let mut token = res.token;
        let mut added = 3;
        match eci {
            None => token = push_token(&token, TokenKind::Simple { value: 0, bits: 3 }),
            Some(v) if v > 999_999 => {
                return Err(ScanError::invalid(format!("ECI code must be between 0 and 999999: {v}")));
            }
            Some(v) => {
                let digits = v.to_string();
                token = push_token(&token, TokenKind::Simple { value: digits.len() as u32, bits: 3 });
                for d in digits.bytes() {
                    token = push_token(&token, TokenKind::Simple { value: (d - b'0' + 2) as u32, bits: 4 });
                }
                added += digits.len() * 4;
            }
        }
        Ok(self.with(token, self.mode, 0, res.bit_count + added))
    }

    fn latch_and_append(&self, mode: usize, value: u32) -> Self {
        let mut bit_count = self.bit_count;
        let mut token = self.token.clone();
        if mode != self.mode {
            let latch = LATCH_TABLE[self.mode][mode];
            token = push_token(&token, TokenKind::Simple { value: latch & 0xFFFF, bits: (latch >> 16) as usize });
            bit_count += (latch >> 16) as usize;
        }
        let bits = mode_bits(mode);
        token = push_token(&token, TokenKind::Simple { value, bits });
        self.with(token, mode, 0, bit_count + bits)
    }

    fn shift_and_append(&self, mode: usize, value: u32) -> Self {
        let this_bits = mode_bits(self.mode);
        let shift = shift_code(self.mode, mode).unwrap_or(0);
        let token = push_token(&self.token, TokenKind::Simple { value: shift, bits: this_bits });
        let token = push_token(&token, TokenKind::Simple { value, bits: 5 });
        self.with(token, self.mode, 0, self.bit_count + this_bits + 5)
    }

    fn add_binary_shift_char(&self, index: usize) -> Self {
        let mut token = self.token.clone();
        let mut mode = self.mode;
        let mut bit_count = self.bit_count;
        if mode == PUNCT || mode == DIGIT {
            let latch = LATCH_TABLE[mode][UPPER];
            token = push_token(&token, TokenKind::Simple { value: latch & 0xFFFF, bits: (latch >> 16) as usize });
            bit_count += (latch >> 16) as usize;
            mode = UPPER;
        }
        let delta = match self.binary_bytes {
            0 | 31 => 18,
            62 => 9,
            _ => 8,
        };
        let res = self.with(token, mode, self.binary_bytes + 1, bit_count + delta);
        if res.binary_bytes == 2047 + 31 {
            return res.end_binary_shift(index + 1);
        }
        res
    }

    fn end_binary_shift(&self, index: usize) -> Self {
        if self.binary_bytes == 0 {
            return self.clone();
        }
        let kind = TokenKind::BinaryShift { start: index - self.binary_bytes, count: self.binary_bytes };
        self.with(push_token(&self.token, kind), self.mode, 0, self.bit_count)
    }

    fn is_better_than_or_equal_to(&self, other: &State) -> bool {
        let mut bits = self.bit_count + (LATCH_TABLE[self.mode][other.mode] >> 16) as usize;
        if self.binary_bytes < other.binary_bytes {
            bits += binary_shift_cost(other.binary_bytes) - binary_shift_cost(self.binary_bytes);
        } else if self.binary_bytes > other.binary_bytes && other.binary_bytes > 0 {
            bits += 10;
        }
        bits <= other.bit_count
    }

    fn to_bits(&self, text: &[u8]) -> BitArray {
        let end = self.end_binary_shift(text.len());
        let mut tokens = vec![];
        let mut cur = end.token.as_deref();
        while let Some(t) = cur {
            tokens.push(&t.kind);
            cur = t.prev.as_deref();
        }
        let mut out = BitArray::default();
        tokens.iter().rev().for_each(|k| k.append_to(&mut out, text));
        out
    }
}

// High level encoder
//------------------------------------------------------------------------------

fn simplify(states: Vec<State>) -> Vec<State> {
    let mut res: Vec<State> = vec![];
    for s in states {
        if res.iter().any(|old| old.is_better_than_or_equal_to(&s)) {
            continue;
        }
        res.retain(|old| !s.is_better_than_or_equal_to(old));
        res.push(s);
    }
    res
}

fn update_for_char(state: &State, text: &[u8], index: usize, out: &mut Vec<State>) {
    let ch = text[index];
    let in_current = char_code(state.mode, ch) > 0;
    let mut no_binary = None;
    for mode in UPPER..=PUNCT {
        let code = char_code(mode, ch);
        if code == 0 {
            continue;
        }
        let base = no_binary.get_or_insert_with(|| state.end_binary_shift(index));
        if !in_current || mode == state.mode || mode == DIGIT {
            out.push(base.latch_and_append(mode, code));
        }
        if !in_current && shift_code(state.mode, mode).is_some() {
            out.push(base.shift_and_append(mode, code));
        }
    }
    if state.binary_bytes > 0 || !in_current {
        out.push(state.add_binary_shift_char(index));
    }
}

fn update_for_pair(state: &State, index: usize, pair_code: u32, out: &mut Vec<State>) {
    let no_binary = state.end_binary_shift(index);
    out.push(no_binary.latch_and_append(PUNCT, pair_code));
    if state.mode != PUNCT {
        out.push(no_binary.shift_and_append(PUNCT, pair_code));
    }
    if pair_code == 3 || pair_code == 4 {
        // ". " and ", " as digit mode punctuation followed by a space
        out.push(no_binary.latch_and_append(DIGIT, 16 - pair_code).latch_and_append(DIGIT, 1));
    }
    if state.binary_bytes > 0 {
        out.push(state.add_binary_shift_char(index).add_binary_shift_char(index + 1));
    }
}

pub fn encode_high_level(text: &[u8], eci: Option<u32>, gs1: bool) -> ScanResult<BitArray> {
    let mut initial = State::initial();
    if gs1 {
        initial = initial.append_flg(None)?;
    }
    if let Some(v) = eci {
        initial = initial.append_flg(Some(v))?;
    }
    let mut states = vec![initial];
    let mut index = 0;
    while index < text.len() {
        let next = text.get(index + 1).copied().unwrap_or(0);
        let pair_code = match (text[index], next) {
            (b'\r', b'\n') => 2,
            (b'.', b' ') => 3,
            (b',', b' ') => 4,
            (b':', b' ') => 5,
            _ => 0,
        };
        let mut next_states = vec![];
        if pair_code > 0 {
            states.iter().for_each(|s| update_for_pair(s, index, pair_code, &mut next_states));
            index += 1;
        } else {
            states.iter().for_each(|s| update_for_char(s, text, index, &mut next_states));
        }
        states = simplify(next_states);
        index += 1;
    }
    let best = states.iter().min_by_key(|s| s.bit_count).ok_or(ScanError::invalid("No encoding state left"))?;
    Ok(best.to_bits(text))
}

// Symbol
//------------------------------------------------------------------------------

/// An encoded Aztec symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AztecCode {
    pub compact: bool,
    pub size: usize,
    pub layers: usize,
    pub data_codewords: usize,
    pub matrix: BitMatrix,
}

pub fn stuff_bits(bits: &BitArray, word_size: usize) -> BitArray {
    let mut out = BitArray::default();
    let n = bits.len();
    let mask = (1u32 << word_size) - 2;
    let mut i = 0;
    while i < n {
        let mut word = 0u32;
        for j in 0..word_size {
            if i + j >= n || bits.get(i + j) {
                word |= 1 << (word_size - 1 - j);
            }
        }
        if word & mask == mask {
            out.append_bits(word & mask, word_size);
            i += word_size - 1;
        } else if word & mask == 0 {
            out.append_bits(word | 1, word_size);
            i += word_size - 1;
        } else {
            out.append_bits(word, word_size);
            i += word_size;
        }
    }
    out
}

fn bits_to_words(bits: &BitArray, word_size: usize, total_words: usize) -> Vec<u16> {
    let mut words = vec![0u16; total_words];
    for (i, w) in words.iter_mut().enumerate().take(bits.len() / word_size) {
        *w = (0..word_size).fold(0, |acc, j| (acc << 1) | bits.get(i * word_size + j) as u16);
    }
    words
}

// Appends check words so the message fills `total_bits`, padding the front with the
// bits that don't make up a whole word.
fn generate_check_words(bits: &BitArray, total_bits: usize, word_size: usize) -> ScanResult<BitArray> {
    let data_words = bits.len() / word_size;
    let total_words = total_bits / word_size;
    let mut words = bits_to_words(bits, word_size, total_words);
    ReedSolomonEncoder::new(codeword_field(word_size)?).encode(&mut words, total_words - data_words)?;
    let mut out = BitArray::default();
    out.append_bits(0, total_bits % word_size);
    words.iter().for_each(|&w| out.append_bits(w as u32, word_size));
    Ok(out)
}

fn generate_mode_message(compact: bool, layers: usize, data_words: usize) -> ScanResult<BitArray> {
    let mut msg = BitArray::default();
    if compact {
        msg.append_bits(layers as u32 - 1, 2);
        msg.append_bits(data_words as u32 - 1, 6);
        generate_check_words(&msg, 28, 4)
    } else {
        msg.append_bits(layers as u32 - 1, 5);
        msg.append_bits(data_words as u32 - 1, 11);
        generate_check_words(&msg, 40, 4)
    }
}

fn draw_mode_message(m: &mut BitMatrix, compact: bool, msg: &BitArray) {
    let center = m.width() / 2;
    if compact {
        for i in 0..7 {
            let offset = center - 3 + i;
            m.set_value(offset, center - 5, msg.get(i));
            m.set_value(center + 5, offset, msg.get(i + 7));
            m.set_value(offset, center + 5, msg.get(20 - i));
            m.set_value(center - 5, offset, msg.get(27 - i));
        }
    } else {
        for i in 0..10 {
            let offset = center - 5 + i + i / 5;
            m.set_value(offset, center - 7, msg.get(i));
            m.set_value(center + 7, offset, msg.get(i + 10));
            m.set_value(offset, center + 7, msg.get(29 - i));
            m.set_value(center - 7, offset, msg.get(39 - i));
        }
    }
}

// Rings out to `size` plus the orientation marks at the corners
fn draw_bullseye(m: &mut BitMatrix, center: usize, size: usize) {
    for i in (0..size).step_by(2) {
        for j in center - i..=center + i {
            m.set(j, center - i);
            m.set(j, center + i);
            m.set(center - i, j);
            m.set(center + i, j);
        }
    }
    m.set(center - size, center - size);
    m.set(center - size + 1, center - size);
    m.set(center - size, center - size + 1);
    m.set(center + size, center - size);
    m.set(center + size, center - size + 1);
    m.set(center + size, center + size - 1);
}

// Picks the smallest symbol holding the stuffed message plus `ec_bits`
fn choose_size(bits: &BitArray, ec_bits: usize, user_layers: i32) -> ScanResult<(bool, usize, BitArray)> {
    if user_layers != 0 {
        let compact = user_layers < 0;
        let layers = user_layers.unsigned_abs() as usize;
        if layers == 0 || layers > if compact { MAX_LAYERS_COMPACT } else { MAX_LAYERS } {
            return Err(ScanError::invalid(format!("Illegal value {user_layers} for layers")));
        }
        let total = total_bits_in_layer(layers, compact);
        let ws = word_size(layers);
        let stuffed = stuff_bits(bits, ws);
        if stuffed.len() + ec_bits > total - total % ws {
            return Err(ScanError::invalid("Data too large for user specified layer"));
        }
        if compact && stuffed.len() > ws * 64 {
            return Err(ScanError::invalid("Data too large for user specified layer"));
        }
        return Ok((compact, layers, stuffed));
    }

    let total_size_bits = bits.len() + ec_bits;
    let mut cached: Option<(usize, BitArray)> = None;
    for i in 0..=MAX_LAYERS {
        let compact = i <= 3;
        let layers = if compact { i + 1 } else { i };
        let total = total_bits_in_layer(layers, compact);
        if total_size_bits > total {
            continue;
        }
        let ws = word_size(layers);
        if cached.as_ref().map_or(true, |(w, _)| *w != ws) {
            cached = Some((ws, stuff_bits(bits, ws)));
        }
        let Some((_, stuffed)) = cached.as_ref() else {
            continue;
        };
        if compact && stuffed.len() > ws * 64 {
            continue;
        }
        if stuffed.len() + ec_bits <= total - total % ws {
            return Ok((compact, layers, stuffed.clone()));
        }
    }
    Err(ScanError::invalid("Data too large for an Aztec code"))
}

pub fn encode_bits(bits: &BitArray, min_ec_percent: u32, user_layers: i32) -> ScanResult<AztecCode> {
    let ec_bits = bits.len() * min_ec_percent as usize / 100 + 11;
    let (compact, layers, stuffed) = choose_size(bits, ec_bits, user_layers)?;
    let ws = word_size(layers);
    let total = total_bits_in_layer(layers, compact);
    let message = generate_check_words(&stuffed, total, ws)?;
    let data_words = stuffed.len() / ws;
    let mode_message = generate_mode_message(compact, layers, data_words)?;

    let size = matrix_size(compact, layers);
    let mut m = BitMatrix::square(size)?;
    for (i, (x, y)) in layer_positions(compact, layers).into_iter().enumerate() {
        if message.get(i) {
            m.set(x, y);
        }
    }
    draw_mode_message(&mut m, compact, &mode_message);

    let center = size / 2;
    if compact {
        draw_bullseye(&mut m, center, 5);
    } else {
        draw_bullseye(&mut m, center, 7);
        let base = alignment_map(compact, layers).len();
        let mut j = 0;
        for _ in (0..base / 2 - 1).step_by(15) {
            for k in ((center & 1)..size).step_by(2) {
                m.set(center - j, k);
                m.set(center + j, k);
                m.set(k, center - j);
                m.set(k, center + j);
            }
            j += 16;
        }
    }
    debug!("Aztec symbol: compact {compact}, layers {layers}, {data_words} data words, size {size}");
    Ok(AztecCode { compact, size, layers, data_codewords: data_words, matrix: m })
}

pub fn encode(
    text: &str,
    min_ec_percent: u32,
    user_layers: i32,
    charset: Option<CharacterSet>,
    gs1: bool,
) -> ScanResult<AztecCode> {
    if text.is_empty() {
        return Err(ScanError::invalid("Found empty contents"));
    }
    let charset = match charset {
        Some(cs) => Some(cs),
        None if CharacterSet::Latin1.can_encode(text) => None,
        None => Some(CharacterSet::utf8()),
    };
    let (bytes, eci) = match charset {
        Some(cs) => (cs.encode(text)?, cs.eci_value()),
        None => (CharacterSet::Latin1.encode(text)?, None),
    };
    let bits = encode_high_level(&bytes, eci, gs1)?;
    encode_bits(&bits, min_ec_percent, user_layers)
}
