use log::debug;

use super::{
    decoder::{
        secondary_split, Carrier, COUNTRY, MODE_BITS, POSTCODE_2, POSTCODE_2_LENGTH, POSTCODE_3, PRIMARY_DATA,
        PRIMARY_EC, SERVICE, SETS,
    },
    layout::{CODEWORDS, LAYOUT},
};
use crate::common::{
    ec::{galois::MAXICODE_FIELD_64, ReedSolomonEncoder},
    BitMatrix, CharacterSet, ScanError, ScanResult,
};

// Codewords shared by sets A and B
const CODE_ECI: u8 = 27;
const CODE_NS: u8 = 31;
const CODE_PAD: u8 = 33;
const CODE_SHIFT_OTHER: u8 = 59;
const CODE_SHIFT_C: u8 = 60;
const CODE_LATCH_OTHER: u8 = 63;

/// An encoded symbol: its mode, the 144 codewords and the 30 x 33 module grid.
#[derive(Debug, Clone)]
pub struct MaxiCode {
    pub mode: u8,
    pub codewords: Vec<u8>,
    pub modules: BitMatrix,
}

fn code_in(set: usize, byte: u8) -> Option<u8> {
    SETS[set].iter().position(|&c| c == u16::from(byte)).map(|p| p as u8)
}

fn push_eci(out: &mut Vec<u8>, value: u32) {
    out.push(CODE_ECI);
    match value {
        0..=31 => out.push(value as u8),
        32..=1023 => out.extend([0x20 | (value >> 6) as u8, (value & 0x3F) as u8]),
        1024..=32767 => out.extend([0x30 | (value >> 12) as u8, ((value >> 6) & 0x3F) as u8, (value & 0x3F) as u8]),
        _ => out.extend([
            0x38 | ((value >> 18) & 0x03) as u8,
            ((value >> 12) & 0x3F) as u8,
            ((value >> 6) & 0x3F) as u8,
            (value & 0x3F) as u8,
        ]),
    }
}

pub fn encode_message(bytes: &[u8], eci: Option<u32>) -> Vec<u8> {
    let mut out = vec![];
    if let Some(eci) = eci {
        push_eci(&mut out, eci);
    }
    let mut set = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes.len() - i >= 9 && bytes[i..i + 9].iter().all(u8::is_ascii_digit) {
            let value = bytes[i..i + 9].iter().fold(0u32, |acc, &b| acc * 10 + u32::from(b - b'0'));
            out.push(CODE_NS);
            out.extend((0..5).rev().map(|k| ((value >> (6 * k)) & 0x3F) as u8));
            i += 9;
            continue;
        }
        let byte = bytes[i];
        if let Some(code) = code_in(set, byte) {
            out.push(code);
        } else if let Some(code) = code_in(1 - set, byte) {
            let stays = bytes.get(i + 1).is_some_and(|&n| code_in(set, n).is_none() && code_in(1 - set, n).is_some());
            if stays {
                out.push(CODE_LATCH_OTHER);
                set = 1 - set;
            } else {
                out.push(CODE_SHIFT_OTHER);
            }
            out.push(code);
        } else {
            // Every byte lives in one of the five sets
            let (target, code) = (2..5).find_map(|s| code_in(s, byte).map(|c| (s, c))).unwrap_or((4, 0));
            out.push(CODE_SHIFT_C + (target - 2) as u8);
            out.push(code);
        }
        i += 1;
    }
    out
}

fn put_int(codewords: &mut [u8], positions: &[usize], value: u32) {
    for (i, &pos) in positions.iter().enumerate() {
        if (value >> (positions.len() - 1 - i)) & 1 == 1 {
            let bit = pos - 1;
            codewords[bit / 6] |= 1 << (5 - bit % 6);
        }
    }
}

fn is_postcode_2(postcode: &str) -> bool {
    (1..=9).contains(&postcode.len()) && postcode.bytes().all(|b| b.is_ascii_digit())
}

fn is_postcode_3(postcode: &str) -> bool {
    (1..=6).contains(&postcode.len()) && postcode.bytes().all(|b| b.is_ascii() && code_in(0, b).is_some())
}

pub fn split_carrier(text: &str) -> Option<(Carrier, String)> {
    let (header, rest) = if text.starts_with("[)>\x1e01\x1d") {
        let at = text.char_indices().nth(9).map_or(text.len(), |(i, _)| i);
        text.split_at(at)
    } else {
        ("", text)
    };
    let mut parts = rest.splitn(4, '\x1d');
    let postcode = parts.next()?;
    let country = parts.next()?;
    let service = parts.next()?;
    let message = parts.next()?;
    let three_digits = |s: &str| (s.len() == 3 && s.bytes().all(|b| b.is_ascii_digit())).then(|| s.parse().ok()).flatten();
    let carrier = Carrier { postcode: postcode.to_string(), country: three_digits(country)?, service: three_digits(service)? };
    Some((carrier, format!("{header}{message}")))
}

fn structured_primary(mode: u8, carrier: &Carrier) -> ScanResult<Vec<u8>> {
    let mut primary = vec![0u8; PRIMARY_DATA];
    put_int(&mut primary, &MODE_BITS, u32::from(mode));
    if mode == 2 {
        if !is_postcode_2(&carrier.postcode) {
            return Err(ScanError::invalid(format!("Mode 2 needs a numeric postcode: Got {:?}", carrier.postcode)));
        }
        let value: u32 = carrier.postcode.parse().map_err(|_| ScanError::invalid("Invalid postcode"))?;
        put_int(&mut primary, &POSTCODE_2, value);
        put_int(&mut primary, &POSTCODE_2_LENGTH, carrier.postcode.len() as u32);
    } else {
        if !is_postcode_3(&carrier.postcode) {
            return Err(ScanError::invalid(format!("Mode 3 postcode not encodable: Got {:?}", carrier.postcode)));
        }
        let padded = format!("{:<6}", carrier.postcode);
        for (positions, byte) in POSTCODE_3.iter().zip(padded.bytes()) {
            put_int(&mut primary, positions, u32::from(code_in(0, byte).unwrap_or(0)));
        }
    }
    put_int(&mut primary, &COUNTRY, carrier.country);
    put_int(&mut primary, &SERVICE, carrier.service);
    Ok(primary)
}

fn add_error_correction(data: &[u8], mode: u8) -> ScanResult<Vec<u8>> {
    let (sec_data, sec_ec) = secondary_split(mode).map_err(|_| ScanError::invalid("Unknown MaxiCode mode"))?;
    let mut rs = ReedSolomonEncoder::new(&MAXICODE_FIELD_64);

    let mut primary: Vec<u16> = data[..PRIMARY_DATA].iter().map(|&c| u16::from(c)).collect();
    primary.resize(PRIMARY_DATA + PRIMARY_EC, 0);
    rs.encode(&mut primary, PRIMARY_EC)?;

    let secondary = &data[PRIMARY_DATA..PRIMARY_DATA + sec_data];
    let mut halves = vec![];
    for first in 0..2 {
        let mut block: Vec<u16> = secondary.iter().skip(first).step_by(2).map(|&c| u16::from(c)).collect();
        block.resize(block.len() + sec_ec / 2, 0);
        rs.encode(&mut block, sec_ec / 2)?;
        halves.push(block.split_off(sec_data / 2));
    }

    let mut out: Vec<u8> = primary.iter().map(|&c| c as u8).collect();
    out.extend_from_slice(secondary);
    out.extend((0..sec_ec).map(|j| halves[j % 2][j / 2] as u8));
    Ok(out)
}

pub fn encode(text: &str, mode: Option<u8>, charset: Option<CharacterSet>) -> ScanResult<MaxiCode> {
    if text.is_empty() {
        return Err(ScanError::invalid("Found empty contents"));
    }
    let carrier = split_carrier(text);
    let mode = match (mode, &carrier) {
        (Some(m @ 2..=6), _) => m,
        (Some(m), _) => return Err(ScanError::invalid(format!("MaxiCode mode must be 2 to 6: Got {m}"))),
        (None, Some((c, _))) if is_postcode_2(&c.postcode) => 2,
        (None, Some((c, _))) if is_postcode_3(&c.postcode) => 3,
        (None, _) => 4,
    };

    let message = match (&carrier, mode) {
        (Some((_, message)), 2 | 3) => message.as_str(),
        (None, 2 | 3) => return Err(ScanError::invalid("Modes 2 and 3 need postcode, country and service fields")),
        _ => text,
    };
    let (charset, eci) = match charset {
        Some(cs) if cs != CharacterSet::Latin1 => (cs, cs.eci_value()),
        _ if CharacterSet::Latin1.can_encode(message) => (CharacterSet::Latin1, None),
        _ => (CharacterSet::utf8(), Some(26)),
    };
    let codes = encode_message(&charset.encode(message)?, eci);

    let (sec_data, _) = secondary_split(mode).map_err(|_| ScanError::invalid("Unknown MaxiCode mode"))?;
    let mut data = match (&carrier, mode) {
        (Some((c, _)), 2 | 3) => structured_primary(mode, c)?,
        _ => vec![mode],
    };
    let capacity = PRIMARY_DATA + sec_data;
    if data.len() + codes.len() > capacity {
        return Err(ScanError::invalid(format!(
            "Message too long for MaxiCode mode {mode}: {} codewords, room for {}",
            codes.len(),
            capacity - data.len()
        )));
    }
    data.extend(codes);
    data.resize(capacity, CODE_PAD);

    let codewords = add_error_correction(&data, mode)?;
    debug_assert_eq!(codewords.len(), CODEWORDS);
    debug!("MaxiCode encoded: mode {mode}, {} message codewords", capacity);
    let modules = LAYOUT.place(&codewords)?;
    Ok(MaxiCode { mode, codewords, modules })
}

#[cfg(test)]
mod encoder_tests {
    use test_case::test_case;

    use super::*;
    use crate::maxicode::decoder::decode_message;

    #[test_case(b"ABC", &[1, 2, 3])]
    #[test_case(b"abC", &[63, 1, 2, 59, 3])]
    #[test_case(b"HeI", &[8, 59, 5, 9])]
    #[test_case(b"123456789", &[31, 7, 22, 60, 52, 21])]
    #[test_case(&[0xC0, b'A'], &[60, 0, 1])]
    fn test_encode_message(bytes: &[u8], codes: &[u8]) {
        assert_eq!(encode_message(bytes, None), codes);
    }

    #[test_case("Hello MaxiCode 0123456789 ~|{}")]
    #[test_case("ümlaut £ ¥ Ø")]
    #[test_case("\t\x01 control \x7F")]
    fn test_message_round_trip(text: &str) {
        let bytes = CharacterSet::Latin1.encode(text).unwrap();
        let codes = encode_message(&bytes, None);
        assert_eq!(decode_message(&codes, CharacterSet::Latin1).unwrap().text, text);
    }

    #[test]
    fn test_eci_values() {
        let mut out = vec![];
        push_eci(&mut out, 26);
        push_eci(&mut out, 900);
        assert_eq!(out, vec![27, 26, 27, 0x20 | 14, 4]);
    }

    #[test]
    fn test_split_carrier() {
        let (c, message) = split_carrier("152382802\x1d840\x1d001\x1dParcel").unwrap();
        assert_eq!(c, Carrier { postcode: "152382802".into(), country: 840, service: 1 });
        assert_eq!(message, "Parcel");

        let (c, message) = split_carrier("[)>\x1e01\x1d96B1050\x1d056\x1d999\x1drest").unwrap();
        assert_eq!(c.postcode, "B1050");
        assert_eq!(message, "[)>\x1e01\x1d96rest");

        assert!(split_carrier("no fields here").is_none());
        assert!(split_carrier("1\x1d84\x1d001\x1d").is_none());
    }

    #[test]
    fn test_mode_selection() {
        assert_eq!(encode("plain text", None, None).unwrap().mode, 4);
        assert_eq!(encode("12345\x1d840\x1d001\x1dx", None, None).unwrap().mode, 2);
        assert_eq!(encode("AB12CD\x1d826\x1d001\x1dx", None, None).unwrap().mode, 3);
        assert_eq!(encode("plain", Some(5), None).unwrap().mode, 5);
        assert!(encode("plain", Some(2), None).is_err());
        assert!(encode("plain", Some(1), None).is_err());
    }

    #[test_case(None)]
    #[test_case(Some(4))]
    #[test_case(Some(5))]
    fn test_empty_contents(mode: Option<u8>) {
        assert!(matches!(encode("", mode, None), Err(ScanError::InvalidArgument(_))));
    }

    #[test]
    fn test_capacity() {
        assert!(encode(&"A".repeat(93), Some(4), None).is_ok());
        assert!(encode(&"A".repeat(94), Some(4), None).is_err());
        assert!(encode(&"A".repeat(78), Some(5), None).is_err());
    }

    #[test]
    fn test_codeword_layout() {
        let code = encode("ABC", None, None).unwrap();
        assert_eq!(code.codewords.len(), CODEWORDS);
        assert_eq!(&code.codewords[..4], &[4, 1, 2, 3]);
        assert_eq!(code.codewords[4], CODE_PAD);
    }
}
