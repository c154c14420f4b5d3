use encoding_rs::{
    Encoding, BIG5, EUC_KR, GB18030, ISO_8859_10, ISO_8859_13, ISO_8859_14, ISO_8859_15, ISO_8859_16,
    ISO_8859_2, ISO_8859_3, ISO_8859_4, ISO_8859_5, ISO_8859_6, ISO_8859_7, ISO_8859_8, SHIFT_JIS,
    UTF_16BE, UTF_8, WINDOWS_1250, WINDOWS_1251, WINDOWS_1252, WINDOWS_1254, WINDOWS_1256, WINDOWS_874,
};

use super::{ScanError, ScanResult};

// Character set
//------------------------------------------------------------------------------

/// Text encodings reachable through ECI designators or hints.
///
/// ISO-8859-1 and US-ASCII are kept apart from `encoding_rs`, which folds both into
/// windows-1252.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharacterSet {
    Latin1,
    Ascii,
    Encoding(&'static Encoding),
}

impl CharacterSet {
    pub fn utf8() -> Self {
        Self::Encoding(UTF_8)
    }

    pub fn shift_jis() -> Self {
        Self::Encoding(SHIFT_JIS)
    }

    pub fn utf16be() -> Self {
        Self::Encoding(UTF_16BE)
    }

    pub fn from_eci(value: u32) -> Option<Self> {
        let enc = match value {
            0..=3 => return Some(Self::Latin1),
            4 => ISO_8859_2,
            5 => ISO_8859_3,
            6 => ISO_8859_4,
            7 => ISO_8859_5,
            8 => ISO_8859_6,
            9 => ISO_8859_7,
            10 => ISO_8859_8,
            11 => WINDOWS_1254,
            12 => ISO_8859_10,
            13 => WINDOWS_874,
            15 => ISO_8859_13,
            16 => ISO_8859_14,
            17 => ISO_8859_15,
            18 => ISO_8859_16,
            20 => SHIFT_JIS,
            21 => WINDOWS_1250,
            22 => WINDOWS_1251,
            23 => WINDOWS_1252,
            24 => WINDOWS_1256,
            25 => UTF_16BE,
            26 => UTF_8,
            27 | 170 => return Some(Self::Ascii),
            28 => BIG5,
            29 => GB18030,
            30 => EUC_KR,
            _ => return None,
        };
        Some(Self::Encoding(enc))
    }

    pub fn eci_value(self) -> Option<u32> {
        let enc = match self {
            Self::Latin1 => return Some(3),
            Self::Ascii => return Some(27),
            Self::Encoding(e) => e,
        };
        (4..=30).find(|&v| Self::from_eci(v) == Some(Self::Encoding(enc)))
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let norm = name.trim().to_ascii_lowercase().replace('_', "-");
        match norm.as_str() {
            "iso-8859-1" | "iso8859-1" | "latin1" | "iso-latin-1" | "cp437" => Some(Self::Latin1),
            "ascii" | "us-ascii" | "iso646-us" => Some(Self::Ascii),
            "sjis" | "shift-jis" => Some(Self::shift_jis()),
            "utf-16be" | "unicodebig" => Some(Self::utf16be()),
            _ => Encoding::for_label(norm.as_bytes()).map(Self::Encoding),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Latin1 => "ISO-8859-1",
            Self::Ascii => "US-ASCII",
            Self::Encoding(e) => e.name(),
        }
    }

    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Self::Latin1 | Self::Ascii => encoding_rs::mem::decode_latin1(bytes).into_owned(),
            Self::Encoding(e) => e.decode_without_bom_handling(bytes).0.into_owned(),
        }
    }

    pub fn encode(self, text: &str) -> ScanResult<Vec<u8>> {
        let unmappable = || ScanError::invalid(format!("Text cannot be encoded in {}", self.name()));
        match self {
            Self::Latin1 if encoding_rs::mem::is_str_latin1(text) => {
                Ok(encoding_rs::mem::encode_latin1_lossy(text).into_owned())
            }
            Self::Ascii if text.is_ascii() => Ok(text.as_bytes().to_vec()),
            Self::Latin1 | Self::Ascii => Err(unmappable()),
            Self::Encoding(e) if e == UTF_16BE => Ok(text.encode_utf16().flat_map(u16::to_be_bytes).collect()),
            Self::Encoding(e) => {
                let (out, _, had_errors) = e.encode(text);
                if had_errors {
                    return Err(unmappable());
                }
                Ok(out.into_owned())
            }
        }
    }

    pub fn can_encode(self, text: &str) -> bool {
        self.encode(text).is_ok()
    }
}

pub fn guess_encoding(bytes: &[u8], hint: Option<CharacterSet>) -> CharacterSet {
    if let Some(hint) = hint {
        return hint;
    }
    if bytes.is_ascii() {
        return CharacterSet::Latin1;
    }
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) || std::str::from_utf8(bytes).is_ok() {
        return CharacterSet::utf8();
    }
    let (_, had_errors) = SHIFT_JIS.decode_without_bom_handling(bytes);
    if !had_errors && looks_like_sjis(bytes) {
        return CharacterSet::shift_jis();
    }
    CharacterSet::Latin1
}

fn looks_like_sjis(bytes: &[u8]) -> bool {
    let mut i = 0;
    let mut double = false;
    while i < bytes.len() {
        match bytes[i] {
            0x81..=0x9F | 0xE0..=0xEF => {
                if bytes[i] <= 0x9F {
                    double = true;
                }
                i += 2;
            }
            _ => i += 1,
        }
    }
    double
}

#[cfg(test)]
mod charset_tests {
    use test_case::test_case;

    use super::{guess_encoding, CharacterSet};

    #[test_case(3, "ISO-8859-1")]
    #[test_case(20, "Shift_JIS")]
    #[test_case(26, "UTF-8")]
    #[test_case(170, "US-ASCII")]
    #[test_case(25, "UTF-16BE")]
    fn test_from_eci(eci: u32, name: &str) {
        assert_eq!(CharacterSet::from_eci(eci).unwrap().name(), name);
    }

    #[test]
    fn test_unknown_eci() {
        assert_eq!(CharacterSet::from_eci(14), None);
        assert_eq!(CharacterSet::from_eci(899), None);
    }

    #[test]
    fn test_eci_value() {
        assert_eq!(CharacterSet::utf8().eci_value(), Some(26));
        assert_eq!(CharacterSet::Latin1.eci_value(), Some(3));
        assert_eq!(CharacterSet::from_name("ISO-8859-2").and_then(|c| c.eci_value()), Some(4));
    }

    #[test]
    fn test_latin1_round_trip() {
        let bytes = CharacterSet::Latin1.encode("Grüße").unwrap();
        assert_eq!(bytes, b"Gr\xFC\xDFe");
        assert_eq!(CharacterSet::Latin1.decode(&bytes), "Grüße");
        assert!(CharacterSet::Latin1.encode("日本").is_err());
    }

    #[test]
    fn test_utf16() {
        let bytes = CharacterSet::utf16be().encode("Aé").unwrap();
        assert_eq!(bytes, vec![0x00, 0x41, 0x00, 0xE9]);
        assert_eq!(CharacterSet::utf16be().decode(&bytes), "Aé");
    }

    #[test]
    fn test_guess() {
        assert_eq!(guess_encoding(b"hello", None), CharacterSet::Latin1);
        assert_eq!(guess_encoding("héllo".as_bytes(), None), CharacterSet::utf8());
        assert_eq!(guess_encoding(&[0x93, 0xFA, 0x96, 0x7B], None), CharacterSet::shift_jis());
        assert_eq!(guess_encoding(b"h\xE9llo", None), CharacterSet::Latin1);
        assert_eq!(guess_encoding(b"abc", Some(CharacterSet::utf8())), CharacterSet::utf8());
    }
}
