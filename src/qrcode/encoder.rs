use std::mem::swap;

use log::debug;

use super::{
    compute_total_penalty, draw_format_info, new_symbol, DataRegionIter, EcLevel, MaskPattern, Mode, Version,
    SEGMENT_MODES,
};
use crate::common::{
    ec::{ReedSolomonEncoder, QR_CODE_FIELD_256},
    BitMatrix, BitStream, CharacterSet, EncodeHints, ErrorCorrection, ScanError, ScanResult,
};

pub const PADDING_CODEWORDS: [u8; 2] = [0b1110_1100, 0b0001_0001];

// Encoded symbol
//------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrCode {
    pub matrix: BitMatrix,
    pub version: Version,
    pub ec_level: EcLevel,
    pub mask: MaskPattern,
}

// Segment
//------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment<'a> {
    pub mode: Mode,
    pub len_bits: usize,
    pub data: &'a [u8],
}

impl<'a> Segment<'a> {
    pub fn new(mode: Mode, len_bits: usize, data: &'a [u8]) -> Self {
        Self { mode, len_bits, data }
    }

    pub fn bit_len(&self) -> usize {
        4 + self.len_bits + self.mode.encoded_len(self.data.len())
    }
}

// Encoder
//------------------------------------------------------------------------------

pub fn encode(text: &str, hints: &EncodeHints) -> ScanResult<QrCode> {
    if text.is_empty() {
        return Err(ScanError::invalid("Found empty contents"));
    }
    let ecl = match hints.error_correction {
        Some(ErrorCorrection::Qr(l)) => l,
        Some(ErrorCorrection::Percent(p)) => match p {
            0..=7 => EcLevel::L,
            8..=15 => EcLevel::M,
            16..=25 => EcLevel::Q,
            _ => EcLevel::H,
        },
        None => EcLevel::L,
    };

    let charset = match hints.character_set {
        Some(cs) => Some(cs),
        None if text.is_ascii() => None,
        None if CharacterSet::Latin1.can_encode(text) => Some(CharacterSet::Latin1),
        None => Some(CharacterSet::utf8()),
    };
    let data = match charset {
        Some(cs) => cs.encode(text)?,
        None => text.as_bytes().to_vec(),
    };
    let eci = match charset {
        Some(cs) if !(text.is_ascii() && matches!(cs, CharacterSet::Latin1 | CharacterSet::Ascii)) => {
            Some(cs.eci_value().ok_or_else(|| ScanError::invalid(format!("No ECI for {}", cs.name())))?)
        }
        _ => None,
    };

    let mut header = BitStream::new();
    if let Some(value) = eci {
        push_eci(value, &mut header);
    }
    if hints.gs1_format {
        header.push_bits(Mode::Fnc1First as u8, 4);
    }

    let (ver, segs) = match hints.qr_version {
        Some(v) => {
            let ver = Version::new(v)?;
            let segs = compute_optimal_segments(&data, ver);
            let sz = header.len() + segs.iter().map(Segment::bit_len).sum::<usize>();
            if sz > ver.data_bit_capacity(ecl) {
                return Err(ScanError::invalid(format!("Data too big for requested version {v}")));
            }
            (ver, segs)
        }
        None => find_optimal_version_and_segments(&data, ecl, header.len())?,
    };

    let bcap = ver.data_bit_capacity(ecl);
    let mut bs = BitStream::with_capacity(bcap);
    bs.append(&header);
    for seg in segs {
        push_segment(&seg, &mut bs);
    }
    push_terminator(&mut bs, bcap);
    pad_remaining_capacity(&mut bs, bcap);

    let codewords = add_ec_and_interleave(bs.data(), ver, ecl)?;
    let mask = match hints.qr_mask {
        Some(m) => Some(MaskPattern::new(m)?),
        None => None,
    };
    let code = build_symbol(&codewords, ver, ecl, mask)?;
    debug!("Encoded QR version {} level {} mask {}", ver, ecl, *code.mask);
    Ok(code)
}

fn push_eci(value: u32, out: &mut BitStream) {
    out.push_bits(Mode::Eci as u8, 4);
    match value {
        0..=127 => out.push_bits(value, 8),
        128..=16383 => out.push_bits(0b10 << 14 | value, 16),
        _ => out.push_bits(0b110 << 21 | value, 24),
    }
}

fn find_optimal_version_and_segments(
    data: &[u8],
    ecl: EcLevel,
    header_len: usize,
) -> ScanResult<(Version, Vec<Segment<'_>>)> {
    let mut segs = vec![];
    let mut sz = 0;
    for v in 1..=40 {
        let ver = Version::new(v)?;
        let bcap = ver.data_bit_capacity(ecl);
        if v == 1 || v == 10 || v == 27 {
            segs = compute_optimal_segments(data, ver);
            sz = header_len + segs.iter().map(Segment::bit_len).sum::<usize>();
        }
        if sz <= bcap {
            return Ok((ver, segs));
        }
    }
    Err(ScanError::invalid("Data too big for any QR version"))
}

// Dynamic programming to compute optimum mode segments, costs in sixths of a bit
fn compute_optimal_segments(data: &[u8], ver: Version) -> Vec<Segment<'_>> {
    debug_assert!(!data.is_empty(), "Empty data");

    let len = data.len();
    let mut prev_cost = [0usize; 3];
    SEGMENT_MODES.iter().enumerate().for_each(|(i, &m)| prev_cost[i] = (4 + m.char_cnt_bits(ver)) * 6);
    let mut cur_cost = [usize::MAX; 3];
    let mut min_path = vec![[usize::MAX; 3]; len];
    for (i, b) in data.iter().enumerate() {
        for (j, to_mode) in SEGMENT_MODES.iter().enumerate() {
            if !to_mode.contains(*b) {
                continue;
            }
            let encoded_char_size = match to_mode {
                Mode::Numeric => 20,
                Mode::Alphanumeric => 33,
                _ => 48,
            };
            for (k, from_mode) in SEGMENT_MODES.iter().enumerate() {
                if prev_cost[k] == usize::MAX {
                    continue;
                }
                let mut cost = 0;
                if to_mode != from_mode {
                    cost += prev_cost[k].div_ceil(6) * 6;
                    cost += (4 + to_mode.char_cnt_bits(ver)) * 6;
                } else {
                    cost += prev_cost[k];
                }
                cost += encoded_char_size;
                if cost < cur_cost[j] {
                    cur_cost[j] = cost;
                    min_path[i][j] = k;
                }
            }
        }
        swap(&mut prev_cost, &mut cur_cost);
        cur_cost.fill(usize::MAX);
    }

    let char_modes = trace_optimal_modes(&min_path, prev_cost);
    build_segments(ver, &char_modes, data)
}

// Backtrack min_path and identify optimal char mode
fn trace_optimal_modes(min_path: &[[usize; 3]], prev_cost: [usize; 3]) -> Vec<Mode> {
    let mut mode_index = 0;
    for i in 1..3 {
        if prev_cost[i] < prev_cost[mode_index] {
            mode_index = i;
        }
    }
    let mut modes: Vec<Mode> = (0..min_path.len())
        .rev()
        .scan(mode_index, |mi, i| {
            let old_mi = *mi;
            *mi = min_path[i][*mi];
            Some(SEGMENT_MODES[old_mi])
        })
        .collect();
    modes.reverse();
    modes
}

fn build_segments<'a>(ver: Version, char_modes: &[Mode], data: &'a [u8]) -> Vec<Segment<'a>> {
    let mut segs = vec![];
    let mut seg_start = 0;
    let mut seg_mode = char_modes[0];
    for (i, &m) in char_modes.iter().enumerate().skip(1) {
        if seg_mode != m {
            segs.push(Segment::new(seg_mode, seg_mode.char_cnt_bits(ver), &data[seg_start..i]));
            seg_mode = m;
            seg_start = i;
        }
    }
    segs.push(Segment::new(seg_mode, seg_mode.char_cnt_bits(ver), &data[seg_start..]));
    segs
}

// Writer for encoded data
//------------------------------------------------------------------------------

fn push_segment(seg: &Segment, out: &mut BitStream) {
    push_header(seg, out);
    match seg.mode {
        Mode::Numeric => {
            for chunk in seg.data.chunks(3) {
                let len = (chunk.len() * 10).div_ceil(3);
                out.push_bits(Mode::Numeric.encode_chunk(chunk), len);
            }
        }
        Mode::Alphanumeric => {
            for chunk in seg.data.chunks(2) {
                let len = (chunk.len() * 11).div_ceil(2);
                out.push_bits(Mode::Alphanumeric.encode_chunk(chunk), len);
            }
        }
        _ => out.extend(seg.data),
    }
}

fn push_header(seg: &Segment, out: &mut BitStream) {
    out.push_bits(seg.mode as u8, 4);
    let char_cnt = seg.data.len();
    debug_assert!(
        char_cnt < (1 << seg.len_bits),
        "Char count exceeds bit length: Char count {char_cnt}, Char count bits {}",
        seg.len_bits
    );
    out.push_bits(char_cnt as u16, seg.len_bits);
}

fn push_terminator(out: &mut BitStream, bit_capacity: usize) {
    let bit_len = out.len();
    if bit_len < bit_capacity {
        let term_len = std::cmp::min(4, bit_capacity - bit_len);
        out.push_bits(0u8, term_len);
    }
}

fn pad_remaining_capacity(out: &mut BitStream, bit_capacity: usize) {
    let offset = out.len() & 7;
    if offset > 0 {
        out.push_bits(0u8, 8 - offset);
    }
    let remain_byte_capacity = bit_capacity.saturating_sub(out.len()) >> 3;
    PADDING_CODEWORDS.iter().copied().cycle().take(remain_byte_capacity).for_each(|pc| {
        out.push_bits(pc, 8);
    });
}

// Error correction and placement
//------------------------------------------------------------------------------

pub fn add_ec_and_interleave(data: &[u8], ver: Version, ecl: EcLevel) -> ScanResult<Vec<u8>> {
    let ecc = ver.ecc_per_block(ecl);
    let mut rs = ReedSolomonEncoder::new(&QR_CODE_FIELD_256);
    let mut blocks = Vec::with_capacity(ver.num_blocks(ecl));
    let mut offset = 0;
    for len in ver.data_codewords_per_block(ecl) {
        let block: Vec<u16> = data[offset..offset + len].iter().map(|&b| b as u16).collect();
        let ec = rs.ec_codewords(&block, ecc)?;
        blocks.push((block, ec));
        offset += len;
    }

    let max_len = blocks.iter().map(|(d, _)| d.len()).max().unwrap_or(0);
    let mut res = Vec::with_capacity(ver.total_codewords());
    for i in 0..max_len {
        res.extend(blocks.iter().filter_map(|(d, _)| d.get(i)).map(|&c| c as u8));
    }
    for i in 0..ecc {
        res.extend(blocks.iter().map(|(_, e)| e[i] as u8));
    }
    Ok(res)
}

pub fn build_symbol(codewords: &[u8], ver: Version, ecl: EcLevel, mask: Option<MaskPattern>) -> ScanResult<QrCode> {
    let reserved = ver.function_pattern()?;
    let mut matrix = new_symbol(ver)?;
    let bits = BitStream::from_bytes(codewords);
    let mut i = 0;
    for (x, y) in DataRegionIter::new(ver) {
        if reserved.get(x, y) {
            continue;
        }
        if i < bits.len() && bits.get(i) {
            matrix.set(x, y);
        }
        i += 1;
    }

    let with_mask = |mask: MaskPattern| {
        let mut m = matrix.clone();
        mask.apply(&mut m, &reserved);
        draw_format_info(&mut m, ecl, *mask);
        m
    };
    let mask = match mask {
        Some(m) => m,
        None => MaskPattern::all()
            .min_by_key(|&m| compute_total_penalty(&with_mask(m)))
            .ok_or(ScanError::invalid("No mask candidates"))?,
    };
    Ok(QrCode { matrix: with_mask(mask), version: ver, ec_level: ecl, mask })
}

#[cfg(test)]
mod encoder_tests {
    use test_case::test_case;

    use super::*;

    #[test_case("1111111", 1, &[(Mode::Numeric, 0, None)])]
    #[test_case("AAAAA", 1, &[(Mode::Alphanumeric, 0, None)])]
    #[test_case("aaaaa", 1, &[(Mode::Byte, 0, None)])]
    #[test_case("1111111AAAA", 1, &[(Mode::Numeric, 0, Some(7)), (Mode::Alphanumeric, 7, None)])]
    #[test_case("111111AAAA", 1, &[(Mode::Alphanumeric, 0, None)])]
    #[test_case("aaa11111a", 1, &[(Mode::Byte, 0, None)])]
    #[test_case("aaa111111a", 1, &[(Mode::Byte, 0, Some(3)), (Mode::Numeric, 3, Some(9)), (Mode::Byte, 9, None)])]
    #[test_case("aaa1111A", 1, &[(Mode::Byte, 0, None)])]
    #[test_case("aaa1111AA", 1, &[(Mode::Byte, 0, Some(3)), (Mode::Alphanumeric, 3, None)])]
    fn test_compute_optimal_segments(data: &str, v: usize, chunks: &[(Mode, usize, Option<usize>)]) {
        let ver = Version::new(v).unwrap();
        let segs = compute_optimal_segments(data.as_bytes(), ver);
        assert_eq!(segs.len(), chunks.len());
        for (seg, &(mode, start, end)) in segs.iter().zip(chunks.iter()) {
            let end = end.unwrap_or(data.len());
            assert_eq!(*seg, Segment::new(mode, mode.char_cnt_bits(ver), data[start..end].as_bytes()));
        }
    }

    #[test_case("aaaaa11111AAA", 1, EcLevel::L)]
    #[test_case("A11111111111111A11111111111111", 2, EcLevel::L)]
    #[test_case("01234567", 1, EcLevel::H)]
    fn test_find_optimal_version(data: &str, exp: usize, ecl: EcLevel) {
        let (ver, _) = find_optimal_version_and_segments(data.as_bytes(), ecl, 0).unwrap();
        assert_eq!(ver.number(), exp);
    }

    #[test]
    fn test_data_too_long() {
        let data = "a".repeat(2953);
        let (ver, _) = find_optimal_version_and_segments(data.as_bytes(), EcLevel::L, 0).unwrap();
        assert_eq!(ver.number(), 40);
        let data = "a".repeat(2954);
        assert!(find_optimal_version_and_segments(data.as_bytes(), EcLevel::L, 0).is_err());
    }

    #[test]
    fn test_codewords_01234567() {
        // Version 1-M numeric example from the QR standard
        let ver = Version::new(1).unwrap();
        let bcap = ver.data_bit_capacity(EcLevel::M);
        let mut bs = BitStream::new();
        for seg in compute_optimal_segments(b"01234567", ver) {
            push_segment(&seg, &mut bs);
        }
        push_terminator(&mut bs, bcap);
        pad_remaining_capacity(&mut bs, bcap);
        assert_eq!(
            bs.data(),
            &[16, 32, 12, 86, 97, 128, 236, 17, 236, 17, 236, 17, 236, 17, 236, 17]
        );
        let cw = add_ec_and_interleave(bs.data(), ver, EcLevel::M).unwrap();
        assert_eq!(&cw[16..], &[165, 36, 212, 193, 237, 54, 199, 135, 44, 85]);
    }

    #[test]
    fn test_interleave_uneven_blocks() {
        // 5-Q: two blocks of 15 and two of 16 data codewords
        let ver = Version::new(5).unwrap();
        let data: Vec<u8> = (0..62).collect();
        let cw = add_ec_and_interleave(&data, ver, EcLevel::Q).unwrap();
        assert_eq!(cw.len(), ver.total_codewords());
        assert_eq!(&cw[..4], &[0, 15, 30, 46]);
        assert_eq!(&cw[60..62], &[45, 61]);
    }

    #[test]
    fn test_encode_hints() {
        let mut hints = EncodeHints::new();
        hints.error_correction(ErrorCorrection::Qr(EcLevel::H)).qr_version(7).qr_mask(3);
        let code = encode("HELLO WORLD", &hints).unwrap();
        assert_eq!(code.version.number(), 7);
        assert_eq!(code.ec_level, EcLevel::H);
        assert_eq!(*code.mask, 3);
        assert_eq!(code.matrix.width(), 45);
        assert!(encode("", &hints).is_err());
    }

    #[test]
    fn test_eci_header() {
        let mut bs = BitStream::new();
        push_eci(26, &mut bs);
        assert_eq!(bs.data(), &[0b0111_0001, 0b1010_0000]);
        assert_eq!(bs.len(), 12);
    }
}
