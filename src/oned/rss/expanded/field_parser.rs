//! GS1 application identifiers and the length of the data each one carries.

use crate::common::{ScanError, ScanResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldLength {
    Fixed(usize),
    // Up to this many characters, terminated by FNC1 unless last.
    Variable(usize),
}

use FieldLength::{Fixed, Variable};

const TWO_DIGIT_DATA_LENGTH: [(&str, FieldLength); 24] = [
    ("00", Fixed(18)),
    ("01", Fixed(14)),
    ("02", Fixed(14)),
    ("10", Variable(20)),
    ("11", Fixed(6)),
    ("12", Fixed(6)),
    ("13", Fixed(6)),
    ("15", Fixed(6)),
    ("17", Fixed(6)),
    ("20", Fixed(2)),
    ("21", Variable(20)),
    ("22", Variable(29)),
    ("30", Variable(8)),
    ("37", Variable(8)),
    ("90", Variable(30)),
    ("91", Variable(30)),
    ("92", Variable(30)),
    ("93", Variable(30)),
    ("94", Variable(30)),
    ("95", Variable(30)),
    ("96", Variable(30)),
    ("97", Variable(30)),
    ("98", Variable(30)),
    ("99", Variable(30)),
];

const THREE_DIGIT_DATA_LENGTH: [(&str, FieldLength); 23] = [
    ("240", Variable(30)),
    ("241", Variable(30)),
    ("242", Variable(6)),
    ("250", Variable(30)),
    ("251", Variable(30)),
    ("253", Variable(17)),
    ("254", Variable(20)),
    ("400", Variable(30)),
    ("401", Variable(30)),
    ("402", Fixed(17)),
    ("403", Variable(30)),
    ("410", Fixed(13)),
    ("411", Fixed(13)),
    ("412", Fixed(13)),
    ("413", Fixed(13)),
    ("414", Fixed(13)),
    ("420", Variable(20)),
    ("421", Variable(15)),
    ("422", Fixed(3)),
    ("423", Variable(15)),
    ("424", Fixed(3)),
    ("425", Fixed(3)),
    ("426", Fixed(3)),
];

// Three digits plus a fourth, usually a decimal point position
const THREE_DIGIT_PLUS_DIGIT_DATA_LENGTH: [(&str, FieldLength); 57] = [
    ("310", Fixed(6)),
    ("311", Fixed(6)),
    ("312", Fixed(6)),
    ("313", Fixed(6)),
    ("314", Fixed(6)),
    ("315", Fixed(6)),
    ("316", Fixed(6)),
    ("320", Fixed(6)),
    ("321", Fixed(6)),
    ("322", Fixed(6)),
    ("323", Fixed(6)),
    ("324", Fixed(6)),
    ("325", Fixed(6)),
    ("326", Fixed(6)),
    ("327", Fixed(6)),
    ("328", Fixed(6)),
    ("329", Fixed(6)),
    ("330", Fixed(6)),
    ("331", Fixed(6)),
    ("332", Fixed(6)),
    ("333", Fixed(6)),
    ("334", Fixed(6)),
    ("335", Fixed(6)),
    ("336", Fixed(6)),
    ("337", Fixed(6)),
    ("340", Fixed(6)),
    ("341", Fixed(6)),
    ("342", Fixed(6)),
    ("343", Fixed(6)),
    ("344", Fixed(6)),
    ("345", Fixed(6)),
    ("346", Fixed(6)),
    ("347", Fixed(6)),
    ("348", Fixed(6)),
    ("349", Fixed(6)),
    ("350", Fixed(6)),
    ("351", Fixed(6)),
    ("352", Fixed(6)),
    ("353", Fixed(6)),
    ("354", Fixed(6)),
    ("355", Fixed(6)),
    ("356", Fixed(6)),
    ("357", Fixed(6)),
    ("360", Fixed(6)),
    ("361", Fixed(6)),
    ("362", Fixed(6)),
    ("363", Fixed(6)),
    ("364", Fixed(6)),
    ("365", Fixed(6)),
    ("366", Fixed(6)),
    ("367", Fixed(6)),
    ("368", Fixed(6)),
    ("369", Fixed(6)),
    ("390", Variable(15)),
    ("391", Variable(18)),
    ("392", Variable(15)),
    ("393", Variable(18)),
];

const FOUR_DIGIT_DATA_LENGTH: [(&str, FieldLength); 18] = [
    ("7001", Fixed(13)),
    ("7002", Variable(30)),
    ("7003", Fixed(10)),
    ("8001", Fixed(14)),
    ("8002", Variable(20)),
    ("8003", Variable(30)),
    ("8004", Variable(30)),
    ("8005", Fixed(6)),
    ("8006", Fixed(18)),
    ("8007", Variable(30)),
    ("8008", Variable(12)),
    ("8018", Fixed(18)),
    ("8020", Variable(25)),
    ("8100", Fixed(6)),
    ("8101", Fixed(10)),
    ("8102", Fixed(2)),
    ("8110", Variable(70)),
    ("8200", Variable(70)),
];

// 703x, the processor with ISO country code
const THREE_DIGIT_PLUS_DIGIT_EXTRA: (&str, FieldLength) = ("703", Variable(30));

fn lookup(table: &[(&str, FieldLength)], key: &str) -> Option<FieldLength> {
    table.iter().find(|(ai, _)| *ai == key).map(|&(_, len)| len)
}

pub fn field_at(raw: &str) -> ScanResult<(usize, FieldLength)> {
    let prefix = |n: usize| raw.get(..n).filter(|p| p.bytes().all(|b| b.is_ascii_digit()));
    if let Some(len) = prefix(2).and_then(|p| lookup(&TWO_DIGIT_DATA_LENGTH, p)) {
        return Ok((2, len));
    }
    if let Some(len) = prefix(3).and_then(|p| lookup(&THREE_DIGIT_DATA_LENGTH, p)) {
        return Ok((3, len));
    }
    if prefix(4).is_some() {
        let three = &raw[..3];
        let plus_digit = lookup(&THREE_DIGIT_PLUS_DIGIT_DATA_LENGTH, three)
            .or_else(|| (three == THREE_DIGIT_PLUS_DIGIT_EXTRA.0).then_some(THREE_DIGIT_PLUS_DIGIT_EXTRA.1));
        if let Some(len) = plus_digit {
            return Ok((4, len));
        }
        if let Some(len) = lookup(&FOUR_DIGIT_DATA_LENGTH, &raw[..4]) {
            return Ok((4, len));
        }
    }
    Err(ScanError::Format("Unknown application identifier"))
}

pub fn parse_fields(raw: &str) -> ScanResult<String> {
    let mut out = String::with_capacity(raw.len() + 8);
    let mut rest = raw;
    while !rest.is_empty() {
        let (ai_len, field) = field_at(rest)?;
        let end = match field {
            Fixed(n) if rest.len() < ai_len + n => return Err(ScanError::Format("Truncated fixed length field")),
            Fixed(n) => ai_len + n,
            Variable(n) => rest.len().min(ai_len + n),
        };
        let Some((field_text, remaining)) = rest.get(..end).zip(rest.get(end..)) else {
            return Err(ScanError::Format("Invalid field boundary"));
        };
        out.push('(');
        out.push_str(&field_text[..ai_len]);
        out.push(')');
        out.push_str(&field_text[ai_len..]);
        rest = remaining;
    }
    Ok(out)
}

#[cfg(test)]
mod field_parser_tests {
    use test_case::test_case;

    use super::*;

    #[test_case("0195012345678903", "(01)95012345678903")]
    #[test_case("3103000123", "(3103)000123")]
    #[test_case("10ABC", "(10)ABC")]
    #[test_case("1112102010ABC", "(11)121020(10)ABC")]
    #[test_case("8110106141416543213500110000310123196000", "(8110)106141416543213500110000310123196000")]
    #[test_case("7030123ABC", "(7030)123ABC")]
    #[test_case("", "")]
    fn test_parse_fields(raw: &str, exp: &str) {
        assert_eq!(parse_fields(raw).unwrap(), exp);
    }

    #[test]
    fn test_variable_field_stops_at_max_length() {
        let raw = format!("21{}", "1".repeat(25));
        // The five extra digits are read as AI 11 with too little data
        assert!(parse_fields(&raw).is_err());
        let raw = format!("21{}11123456", "1".repeat(20));
        assert_eq!(parse_fields(&raw).unwrap(), format!("(21){}(11)123456", "1".repeat(20)));
    }

    #[test_case("0"; "too short")]
    #[test_case("0112345"; "truncated fixed field")]
    #[test_case("88123"; "unknown")]
    fn test_parse_fields_rejects(raw: &str) {
        assert!(parse_fields(raw).is_err());
    }

    #[test_case("01", Some((2, Fixed(14))))]
    #[test_case("3922", Some((4, Variable(15))))]
    #[test_case("242", Some((3, Variable(6))))]
    #[test_case("8200", Some((4, Variable(70))))]
    #[test_case("999", Some((2, Variable(30))))]
    #[test_case("5", None)]
    fn test_field_at(raw: &str, exp: Option<(usize, FieldLength)>) {
        assert_eq!(field_at(raw).ok(), exp);
    }
}
