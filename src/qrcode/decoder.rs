use encoding_rs::{GB18030, SHIFT_JIS};
use log::{debug, trace};

use super::{
    alphanumeric_char, decode_format_info, read_format_info, read_version_info, DataRegionIter, EcLevel,
    MaskPattern, Mode, Version,
};
use crate::common::{
    ec::{ReedSolomonDecoder, QR_CODE_FIELD_256},
    guess_encoding, BitMatrix, BitStream, CharacterSet, DecodeHints, DecoderResult, ScanError, ScanResult,
    StructuredAppend,
};

pub const MIRRORED: &str = "mirrored";

// Symbol decoder
//------------------------------------------------------------------------------

pub fn decode(bits: &BitMatrix, hints: &DecodeHints) -> ScanResult<DecoderResult> {
    let dim = bits.width();
    if dim != bits.height() {
        return Err(ScanError::Format("QR symbol must be square"));
    }
    Version::from_dimension(dim)?;

    match decode_matrix(bits, hints) {
        Ok(res) => Ok(res),
        Err(err) => {
            trace!("QR decode failed ({err}), trying mirrored");
            let mut res = decode_matrix(&transpose(bits), hints).map_err(|_| err)?;
            res.other = Some(MIRRORED.to_string());
            Ok(res)
        }
    }
}

fn transpose(m: &BitMatrix) -> BitMatrix {
    let mut t = m.clone();
    for y in 0..m.height() {
        for x in 0..m.width() {
            t.set_value(y, x, m.get(x, y));
        }
    }
    t
}

fn decode_matrix(bits: &BitMatrix, hints: &DecodeHints) -> ScanResult<DecoderResult> {
    let ver = read_version(bits)?;
    let (f1, f2) = read_format_info(bits);
    let (ecl, mask) = decode_format_info(f1, f2).ok_or(ScanError::Format("unreadable QR format information"))?;
    let codewords = read_codewords(bits, ver, MaskPattern::new(mask)?)?;
    let (data, errors) = correct_blocks(&codewords, ver, ecl)?;
    let mut res = decode_bitstream(&data, ver, ecl, hints)?;
    res.errors_corrected = errors;
    Ok(res)
}

pub fn read_version(bits: &BitMatrix) -> ScanResult<Version> {
    let dim = bits.width();
    let provisional = Version::from_dimension(dim)?;
    if provisional.number() <= 6 {
        return Ok(provisional);
    }
    let (tr, bl) = read_version_info(bits);
    [tr, bl]
        .into_iter()
        .filter_map(Version::decode_info_bits)
        .find(|v| v.width() == dim)
        .ok_or(ScanError::Format("unreadable QR version information"))
}

pub fn read_codewords(bits: &BitMatrix, ver: Version, mask: MaskPattern) -> ScanResult<Vec<u8>> {
    let reserved = ver.function_pattern()?;
    let mask_fn = mask.mask_function();
    let total = ver.total_codewords();
    let mut res = Vec::with_capacity(total);
    let mut byte = 0u8;
    let mut bits_read = 0;
    for (x, y) in DataRegionIter::new(ver) {
        if reserved.get(x, y) {
            continue;
        }
        byte = (byte << 1) | (bits.get(x, y) ^ mask_fn(x, y)) as u8;
        bits_read += 1;
        if bits_read == 8 {
            res.push(byte);
            bits_read = 0;
            byte = 0;
            if res.len() == total {
                break;
            }
        }
    }
    if res.len() != total {
        return Err(ScanError::Format("QR codeword count mismatch"));
    }
    Ok(res)
}

pub fn correct_blocks(codewords: &[u8], ver: Version, ecl: EcLevel) -> ScanResult<(Vec<u8>, usize)> {
    let ecc = ver.ecc_per_block(ecl);
    let lens = ver.data_codewords_per_block(ecl);
    let max_len = lens.iter().copied().max().unwrap_or(0);
    let mut blocks: Vec<Vec<u16>> = lens.iter().map(|&l| Vec::with_capacity(l + ecc)).collect();

    let mut it = codewords.iter().map(|&c| c as u16);
    for i in 0..max_len {
        for (b, &len) in blocks.iter_mut().zip(&lens) {
            if i < len {
                b.push(it.next().ok_or(ScanError::Format("QR codewords truncated"))?);
            }
        }
    }
    for _ in 0..ecc {
        for b in blocks.iter_mut() {
            b.push(it.next().ok_or(ScanError::Format("QR codewords truncated"))?);
        }
    }

    let rs = ReedSolomonDecoder::new(&QR_CODE_FIELD_256);
    let mut data = Vec::with_capacity(ver.data_codewords(ecl));
    let mut errors = 0;
    for (b, &len) in blocks.iter_mut().zip(&lens) {
        errors += rs.decode(b, ecc, &[])?.errors;
        data.extend(b[..len].iter().map(|&c| c as u8));
    }
    Ok((data, errors))
}

// Bit stream parser
//------------------------------------------------------------------------------

const GB2312_SUBSET: u32 = 1;

pub fn decode_bitstream(bytes: &[u8], ver: Version, ecl: EcLevel, hints: &DecodeHints) -> ScanResult<DecoderResult> {
    let mut inp = BitStream::from_bytes(bytes);
    let mut text = String::with_capacity(50);
    let mut segments = vec![];
    let mut sa = None;
    let mut eci: Option<CharacterSet> = None;
    let mut fnc1_in_effect = hints.assume_gs1;
    let (mut fnc1_first, mut fnc1_second) = (hints.assume_gs1, false);

    loop {
        let mode = if inp.available() < 4 { Mode::Terminator } else { Mode::from_bits(take(&mut inp, 4)?)? };
        match mode {
            Mode::Terminator => break,
            Mode::Fnc1First => {
                fnc1_first = true;
                fnc1_in_effect = true;
            }
            Mode::Fnc1Second => {
                fnc1_second = true;
                fnc1_in_effect = true;
            }
            Mode::StructuredAppend => {
                if inp.available() < 16 {
                    return Err(ScanError::Format("truncated structured append header"));
                }
                let seq = take(&mut inp, 8)? as usize;
                let parity = take(&mut inp, 8)? as u8;
                sa = Some(StructuredAppend { index: seq >> 4, count: (seq & 0xF) + 1, parity });
            }
            Mode::Eci => {
                let value = parse_eci_value(&mut inp)?;
                eci = Some(CharacterSet::from_eci(value).ok_or(ScanError::Format("unsupported ECI"))?);
            }
            Mode::Hanzi => {
                let subset = take(&mut inp, 4)?;
                let count = take(&mut inp, mode.char_cnt_bits(ver))? as usize;
                if subset == GB2312_SUBSET {
                    write_hanzi(&mut inp, count, &mut text)?;
                }
            }
            _ => {
                let count = take(&mut inp, mode.char_cnt_bits(ver))? as usize;
                match mode {
                    Mode::Numeric => write_numeric(&mut inp, count, &mut text)?,
                    Mode::Alphanumeric => write_alphanumeric(&mut inp, count, fnc1_in_effect, &mut text)?,
                    Mode::Byte => write_byte(&mut inp, count, eci.or(hints.character_set), &mut text, &mut segments)?,
                    Mode::Kanji => write_kanji(&mut inp, count, &mut text)?,
                    _ => return Err(ScanError::Format("invalid QR mode")),
                }
            }
        }
    }

    let symbology_modifier = match (eci.is_some(), fnc1_first, fnc1_second) {
        (true, true, _) => 4,
        (true, false, true) => 6,
        (true, false, false) => 2,
        (false, true, _) => 3,
        (false, false, true) => 5,
        (false, false, false) => 1,
    };
    debug!("QR payload: {} chars, {} byte segments", text.chars().count(), segments.len());

    let mut res = DecoderResult::new(bytes.to_vec(), text).with_ec_level(ecl.to_string());
    res.byte_segments = segments;
    res.structured_append = sa;
    res.symbology_modifier = symbology_modifier;
    Ok(res)
}

fn take(inp: &mut BitStream, n: usize) -> ScanResult<u32> {
    inp.take_bits(n).ok_or(ScanError::Format("QR data segment truncated"))
}

fn parse_eci_value(inp: &mut BitStream) -> ScanResult<u32> {
    let first = take(inp, 8)?;
    if first & 0x80 == 0 {
        return Ok(first & 0x7F);
    }
    if first & 0xC0 == 0x80 {
        return Ok(((first & 0x3F) << 8) | take(inp, 8)?);
    }
    if first & 0xE0 == 0xC0 {
        return Ok(((first & 0x1F) << 16) | take(inp, 16)?);
    }
    Err(ScanError::Format("invalid ECI designator"))
}

fn write_numeric(inp: &mut BitStream, mut char_cnt: usize, out: &mut String) -> ScanResult<()> {
    while char_cnt > 0 {
        let (bit_len, digits, limit) = match char_cnt {
            1 => (4, 1, 10),
            2 => (7, 2, 100),
            _ => (10, 3, 1000),
        };
        let chunk = take(inp, bit_len)?;
        if chunk >= limit {
            return Err(ScanError::Format("numeric chunk out of range"));
        }
        out.push_str(&format!("{chunk:0digits$}"));
        char_cnt -= digits;
    }
    Ok(())
}

fn write_alphanumeric(inp: &mut BitStream, mut char_cnt: usize, fnc1: bool, out: &mut String) -> ScanResult<()> {
    let start = out.len();
    while char_cnt > 1 {
        let chunk = take(inp, 11)?;
        out.push(alphanumeric_char(chunk / 45)?);
        out.push(alphanumeric_char(chunk % 45)?);
        char_cnt -= 2;
    }
    if char_cnt == 1 {
        out.push(alphanumeric_char(take(inp, 6)?)?);
    }
    if fnc1 {
        // "%%" is a literal percent, a single '%' is the GS separator
        let seg = out.split_off(start);
        let mut chars = seg.chars().peekable();
        while let Some(c) = chars.next() {
            if c != '%' {
                out.push(c);
            } else if chars.peek() == Some(&'%') {
                chars.next();
                out.push('%');
            } else {
                out.push('\u{1D}');
            }
        }
    }
    Ok(())
}

fn write_byte(
    inp: &mut BitStream,
    char_cnt: usize,
    charset: Option<CharacterSet>,
    out: &mut String,
    segments: &mut Vec<Vec<u8>>,
) -> ScanResult<()> {
    if char_cnt * 8 > inp.available() {
        return Err(ScanError::Format("byte segment exceeds stream"));
    }
    let bytes = (0..char_cnt).map(|_| take(inp, 8).map(|b| b as u8)).collect::<ScanResult<Vec<_>>>()?;
    out.push_str(&guess_encoding(&bytes, charset).decode(&bytes));
    segments.push(bytes);
    Ok(())
}

fn write_kanji(inp: &mut BitStream, char_cnt: usize, out: &mut String) -> ScanResult<()> {
    if char_cnt * 13 > inp.available() {
        return Err(ScanError::Format("kanji segment exceeds stream"));
    }
    let mut bytes = Vec::with_capacity(char_cnt * 2);
    for _ in 0..char_cnt {
        let chunk = take(inp, 13)?;
        let mut assembled = ((chunk / 0xC0) << 8) | (chunk % 0xC0);
        assembled += if assembled < 0x1F00 { 0x8140 } else { 0xC140 };
        bytes.extend([(assembled >> 8) as u8, assembled as u8]);
    }
    out.push_str(&SHIFT_JIS.decode_without_bom_handling(&bytes).0);
    Ok(())
}

fn write_hanzi(inp: &mut BitStream, char_cnt: usize, out: &mut String) -> ScanResult<()> {
    if char_cnt * 13 > inp.available() {
        return Err(ScanError::Format("hanzi segment exceeds stream"));
    }
    let mut bytes = Vec::with_capacity(char_cnt * 2);
    for _ in 0..char_cnt {
        let chunk = take(inp, 13)?;
        let mut assembled = ((chunk / 0x60) << 8) | (chunk % 0x60);
        assembled += if assembled < 0xA00 { 0xA1A1 } else { 0xA6A1 };
        bytes.extend([(assembled >> 8) as u8, assembled as u8]);
    }
    out.push_str(&GB18030.decode_without_bom_handling(&bytes).0);
    Ok(())
}

#[cfg(test)]
mod decoder_tests {
    use test_case::test_case;

    use super::*;
    use crate::common::{EncodeHints, ErrorCorrection};
    use crate::qrcode::encode;

    fn stream(parts: &[(u32, usize)]) -> Vec<u8> {
        let mut bs = BitStream::new();
        parts.iter().for_each(|&(v, n)| bs.push_bits(v, n));
        bs.data().to_vec()
    }

    fn parse(bytes: &[u8]) -> ScanResult<DecoderResult> {
        decode_bitstream(bytes, Version::new(1).unwrap(), EcLevel::M, &DecodeHints::default())
    }

    #[test]
    fn test_numeric() {
        let bytes = stream(&[(1, 4), (8, 10), (12, 10), (345, 10), (67, 7), (0, 4)]);
        let res = parse(&bytes).unwrap();
        assert_eq!(res.text, "01234567");
        assert_eq!(res.symbology_modifier, 1);
        assert_eq!(res.ec_level.as_deref(), Some("M"));
    }

    #[test]
    fn test_numeric_out_of_range() {
        let bytes = stream(&[(1, 4), (3, 10), (1000, 10)]);
        assert_eq!(parse(&bytes), Err(ScanError::Format("numeric chunk out of range")));
    }

    #[test]
    fn test_alphanumeric_fnc1() {
        // FNC1 first, "A%B" then "%%"
        let a = 10 * 45 + 38;
        let bytes = stream(&[(5, 4), (2, 4), (5, 9), (a, 11), (11 * 45 + 38, 11), (38, 6), (0, 4)]);
        let res = parse(&bytes).unwrap();
        assert_eq!(res.text, "A\u{1D}B%");
        assert_eq!(res.symbology_modifier, 3);
    }

    #[test]
    fn test_assume_gs1() {
        // "A%B" without an FNC1 mode indicator
        let bytes = stream(&[(2, 4), (3, 9), (10 * 45 + 38, 11), (11, 6), (0, 4)]);
        assert_eq!(parse(&bytes).unwrap().text, "A%B");
        let mut hints = DecodeHints::new();
        hints.assume_gs1(true);
        let res = decode_bitstream(&bytes, Version::new(1).unwrap(), EcLevel::M, &hints).unwrap();
        assert_eq!(res.text, "A\u{1D}B");
        assert_eq!(res.symbology_modifier, 3);
    }

    #[test]
    fn test_byte_with_eci() {
        let bytes = stream(&[(7, 4), (26, 8), (4, 4), (2, 8), (0xC3, 8), (0xA9, 8), (0, 4)]);
        let res = parse(&bytes).unwrap();
        assert_eq!(res.text, "é");
        assert_eq!(res.byte_segments, vec![vec![0xC3, 0xA9]]);
        assert_eq!(res.symbology_modifier, 2);
    }

    #[test]
    fn test_kanji() {
        // 0x935F encodes to 0x0D9F
        let bytes = stream(&[(8, 4), (1, 8), (0x0D9F, 13), (0, 4)]);
        assert_eq!(parse(&bytes).unwrap().text, "点");
    }

    #[test]
    fn test_structured_append() {
        let bytes = stream(&[(3, 4), (0x21, 8), (0x5A, 8), (4, 4), (1, 8), (b'x' as u32, 8)]);
        let res = parse(&bytes).unwrap();
        assert_eq!(res.structured_append, Some(StructuredAppend { index: 2, count: 2, parity: 0x5A }));
        assert_eq!(res.text, "x");
    }

    #[test_case(&[(6, 4)]; "bad mode")]
    #[test_case(&[(4, 4), (5, 8), (1, 8)]; "truncated byte segment")]
    #[test_case(&[(7, 4), (0xE0, 8)]; "bad eci")]
    fn test_malformed(parts: &[(u32, usize)]) {
        assert!(matches!(parse(&stream(parts)), Err(ScanError::Format(_))));
    }

    #[test_case("01234567", EcLevel::M)]
    #[test_case("HELLO WORLD", EcLevel::Q)]
    #[test_case("https://example.com/a?b=c", EcLevel::H)]
    #[test_case("Grüße aus Köln", EcLevel::L)]
    fn test_symbol_round_trip(text: &str, ecl: EcLevel) {
        let mut hints = EncodeHints::new();
        hints.error_correction(ErrorCorrection::Qr(ecl));
        let code = encode(text, &hints).unwrap();
        let res = decode(&code.matrix, &DecodeHints::default()).unwrap();
        assert_eq!(res.text, text);
        assert_eq!(res.errors_corrected, 0);
        assert_eq!(res.other, None);
    }

    #[test]
    fn test_mirrored_symbol() {
        let code = encode("MIRROR", &EncodeHints::default()).unwrap();
        let res = decode(&transpose(&code.matrix), &DecodeHints::default()).unwrap();
        assert_eq!(res.text, "MIRROR");
        assert_eq!(res.other.as_deref(), Some(MIRRORED));
    }

    #[test]
    fn test_corrects_damage() {
        let mut hints = EncodeHints::new();
        hints.error_correction(ErrorCorrection::Qr(EcLevel::H)).qr_version(3);
        let code = encode("DAMAGED SYMBOL", &hints).unwrap();
        let mut m = code.matrix.clone();
        // Flip a 3x3 patch in the data region
        for y in 12..15 {
            for x in 12..15 {
                m.flip(x, y);
            }
        }
        let res = decode(&m, &DecodeHints::default()).unwrap();
        assert_eq!(res.text, "DAMAGED SYMBOL");
        assert!(res.errors_corrected > 0);
    }

    #[test]
    fn test_version_info_read() {
        let mut hints = EncodeHints::new();
        hints.qr_version(9);
        let code = encode("V9", &hints).unwrap();
        assert_eq!(read_version(&code.matrix).unwrap().number(), 9);
    }
}
