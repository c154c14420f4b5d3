//! MaxiCode: fixed size 30 x 33 hexagonal symbols read from an unrotated, tightly cropped
//! image. Modes 2 and 3 carry postal fields in the primary message.

mod decoder;
mod encoder;
mod layout;

pub use decoder::{decode, decode_message, Carrier, MaxiText};
pub use encoder::{encode, encode_message, split_carrier, MaxiCode};
pub use layout::{extract_pure_bits, render, Cell, Layout, LAYOUT, MATRIX_HEIGHT, MATRIX_WIDTH};

use crate::{
    common::{Barcode, BarcodeFormat, BitMatrix, DecodeHints, EncodeHints, ScanResult},
    reader::{BinaryBitmap, Reader},
    writer::{check_format, scale_to, Writer},
};

const QUIET_ZONE_SIZE: usize = 1;

// Reader
//------------------------------------------------------------------------------

/// Always samples the symbol as a pure barcode; there is no bullseye detector.
pub struct MaxiCodeReader;

impl Reader for MaxiCodeReader {
    fn decode(&mut self, image: &BinaryBitmap, hints: &DecodeHints) -> ScanResult<Barcode> {
        let bits = extract_pure_bits(image.black_matrix()?)?;
        Ok(decode(&bits, hints)?.into_barcode(vec![], BarcodeFormat::MaxiCode))
    }
}

// Writer
//------------------------------------------------------------------------------

pub struct MaxiCodeWriter;

impl Writer for MaxiCodeWriter {
    fn encode(
        &self,
        content: &str,
        format: BarcodeFormat,
        width: usize,
        height: usize,
        hints: &EncodeHints,
    ) -> ScanResult<BitMatrix> {
        check_format(format, BarcodeFormat::MaxiCode)?;
        let code = encode(content, hints.maxicode_mode, hints.character_set)?;
        let margin = hints.margin.unwrap_or(QUIET_ZONE_SIZE);
        let scale = (width / (MATRIX_WIDTH + 2 * margin)).min(height / (MATRIX_HEIGHT + 2 * margin)).max(2) & !1;
        let image = render(&code.modules, scale)?;
        scale_to(&image, width, height, margin * scale)
    }
}

#[cfg(test)]
mod maxicode_tests {
    use test_case::test_case;

    use super::*;
    use crate::common::{ResultMetadataKey, ScanError};

    fn read(m: &BitMatrix) -> ScanResult<Barcode> {
        MaxiCodeReader.decode(&BinaryBitmap::from_bit_matrix(m)?, &DecodeHints::default())
    }

    fn write(text: &str, mode: Option<u8>) -> BitMatrix {
        let mut hints = EncodeHints::new();
        if let Some(mode) = mode {
            hints.maxicode_mode(mode);
        }
        MaxiCodeWriter.encode(text, BarcodeFormat::MaxiCode, 300, 300, &hints).unwrap()
    }

    #[test_case("Standard symbol, mode 4", None, "4", "]U0")]
    #[test_case("Enhanced error correction", Some(5), "5", "]U0")]
    #[test_case("152382802\x1d840\x1d001\x1dParcel 1 of 2", None, "2", "]U1")]
    #[test_case("B1050\x1d056\x1d999\x1dInternational", None, "3", "]U1")]
    #[test_case("[)>\x1e01\x1d96123456\x1d840\x1d002\x1dTRACK", None, "2", "]U1")]
    fn test_round_trip(text: &str, mode: Option<u8>, level: &str, sid: &str) {
        let b = read(&write(text, mode)).unwrap();
        assert_eq!(b.text(), text);
        assert_eq!(b.format(), BarcodeFormat::MaxiCode);
        assert_eq!(b.get_metadata(ResultMetadataKey::ErrorCorrectionLevel).and_then(|v| v.as_text()), Some(level));
        assert_eq!(b.get_metadata(ResultMetadataKey::SymbologyIdentifier).and_then(|v| v.as_text()), Some(sid));
    }

    #[test]
    fn test_utf8_message() {
        let b = read(&write("Ελληνικά", None)).unwrap();
        assert_eq!(b.text(), "Ελληνικά");
        assert_eq!(b.get_metadata(ResultMetadataKey::SymbologyIdentifier).and_then(|v| v.as_text()), Some("]U2"));
    }

    fn flip_codeword(modules: &mut BitMatrix, codeword: usize) {
        for bit in codeword * 6..codeword * 6 + 6 {
            let (x, y) = LAYOUT.position(bit);
            modules.flip(x, y);
        }
    }

    #[test]
    fn test_corrects_secondary_errors() {
        let mut code = encode("Some correctable damage", None, None).unwrap();
        for cw in [25, 40, 41, 90, 143] {
            flip_codeword(&mut code.modules, cw);
        }
        let res = decode(&code.modules, &DecodeHints::default()).unwrap();
        assert_eq!(res.text, "Some correctable damage");
        assert_eq!(res.errors_corrected, 5);
    }

    #[test]
    fn test_primary_damage_beyond_bound_fails() {
        let mut code = encode("Mode survives?", Some(4), None).unwrap();
        for cw in 0..10 {
            flip_codeword(&mut code.modules, cw);
        }
        assert_eq!(decode(&code.modules, &DecodeHints::default()).unwrap_err(), ScanError::Checksum);
    }

    #[test]
    fn test_blank_image() {
        assert_eq!(read(&BitMatrix::square(80).unwrap()).unwrap_err(), ScanError::NotFound);
    }

    #[test]
    fn test_writer_size() {
        let m = write("size", None);
        assert_eq!((m.width(), m.height()), (300, 300));
        let natural = MaxiCodeWriter.encode("size", BarcodeFormat::MaxiCode, 0, 0, &EncodeHints::default()).unwrap();
        assert_eq!((natural.width(), natural.height()), (64, 70));
    }

    #[test]
    fn test_writer_rejects_bad_input() {
        let hints = EncodeHints::default();
        assert!(matches!(
            MaxiCodeWriter.encode("x", BarcodeFormat::Aztec, 0, 0, &hints),
            Err(ScanError::InvalidArgument(_))
        ));
        assert!(matches!(
            MaxiCodeWriter.encode(&"x".repeat(200), BarcodeFormat::MaxiCode, 0, 0, &hints),
            Err(ScanError::InvalidArgument(_))
        ));
    }
}
