//! QR Code: version and format tables, masking, symbol layout, the finder and alignment
//! pattern detector, the bit-stream decoder and the encoder.

mod decoder;
mod detector;
mod encoder;
mod mask;
mod mode;
mod symbol;
mod version;

pub use decoder::*;
pub use detector::{extract_pure_bits, Detector, FinderPattern, FinderPatternFinder};
pub use encoder::*;
pub use mask::*;
pub use mode::*;
pub use symbol::*;
pub use version::*;

use log::debug;

use crate::{
    common::{
        Barcode, BarcodeFormat, BitMatrix, DecodeHints, DecoderResult, EncodeHints, MetadataValue,
        ResultMetadataKey, ResultPoint, ScanResult,
    },
    reader::{dedupe, BinaryBitmap, MultipleReader, Reader},
    writer::{check_format, scale_to, Writer},
};

const QUIET_ZONE_SIZE: usize = 4;

fn into_barcode(res: DecoderResult, mut points: Vec<ResultPoint>) -> Barcode {
    // A transposed read flips the roles of the bottom left and top right patterns
    if res.other.as_deref() == Some(MIRRORED) && points.len() >= 3 {
        points.swap(0, 2);
    }
    res.into_barcode(points, BarcodeFormat::QrCode)
}

// Reader
//------------------------------------------------------------------------------

pub struct QrCodeReader;

impl Reader for QrCodeReader {
    fn decode(&mut self, image: &BinaryBitmap, hints: &DecodeHints) -> ScanResult<Barcode> {
        let matrix = image.black_matrix()?;
        if hints.pure_barcode {
            let bits = extract_pure_bits(matrix)?;
            return Ok(into_barcode(decode(&bits, hints)?, vec![]));
        }
        let det = Detector::new(matrix).detect(hints.try_harder)?;
        Ok(into_barcode(decode(&det.bits, hints)?, det.points))
    }
}

/// Reads every QR symbol held by an image, joining complete structured append sets.
pub struct QrCodeMultiReader;

impl MultipleReader for QrCodeMultiReader {
    fn decode_multiple(&mut self, image: &BinaryBitmap, hints: &DecodeHints) -> ScanResult<Vec<Barcode>> {
        let matrix = image.black_matrix()?;
        let Ok(triples) = FinderPatternFinder::new(matrix).find_multi(hints.try_harder) else {
            return Ok(vec![]);
        };
        let detector = Detector::new(matrix);
        let mut results = vec![];
        for triple in triples {
            let Ok(det) = detector.process_finder_patterns(triple) else {
                continue;
            };
            if let Ok(res) = decode(&det.bits, hints) {
                results.push(into_barcode(res, det.points));
            }
        }
        debug!("QR multi reader decoded {} candidates", results.len());
        Ok(merge_structured_append(dedupe(results)))
    }
}

fn sequence_of(b: &Barcode) -> Option<(usize, usize, i64)> {
    let seq = b.get_metadata(ResultMetadataKey::StructuredAppendSequence)?.as_int()?;
    let parity = b.get_metadata(ResultMetadataKey::StructuredAppendParity)?.as_int()?;
    Some(((seq >> 4) as usize, (seq & 0xF) as usize + 1, parity))
}

// Parity of a result already joined from its parts
fn merged_parity(b: &Barcode) -> Option<i64> {
    if b.get_metadata(ResultMetadataKey::StructuredAppendSequence).is_some() {
        return None;
    }
    b.get_metadata(ResultMetadataKey::StructuredAppendParity)?.as_int()
}

pub fn merge_structured_append(results: Vec<Barcode>) -> Vec<Barcode> {
    let joined: Vec<i64> = results.iter().filter_map(merged_parity).collect();
    let (mut parts, mut out): (Vec<_>, Vec<_>) = results
        .into_iter()
        .filter(|b| !sequence_of(b).is_some_and(|s| joined.contains(&s.2)))
        .partition(|b| sequence_of(b).is_some());
    parts.sort_by_key(|b| sequence_of(b).map(|(i, _, p)| (p, i)));

    while let Some(first) = parts.first() {
        let Some((_, count, parity)) = sequence_of(first) else {
            break;
        };
        let (set, rest): (Vec<_>, Vec<_>) = parts.into_iter().partition(|b| sequence_of(b).is_some_and(|s| s.2 == parity));
        parts = rest;

        let mut indices: Vec<_> = set.iter().filter_map(|b| sequence_of(b).map(|s| s.0)).collect();
        indices.dedup();
        if indices != (0..count).collect::<Vec<_>>() {
            out.extend(set);
            continue;
        }

        let mut text = String::new();
        let mut raw = vec![];
        let mut segments = vec![];
        let mut last = None;
        for b in &set {
            let index = sequence_of(b).map(|s| s.0);
            if index == last {
                continue;
            }
            last = index;
            text.push_str(b.text());
            raw.extend_from_slice(b.raw_bytes());
            if let Some(MetadataValue::ByteSegments(s)) = b.get_metadata(ResultMetadataKey::ByteSegments) {
                segments.extend(s.iter().cloned());
            }
        }
        let mut merged = Barcode::new(text, raw, vec![], BarcodeFormat::QrCode);
        merged.put_metadata(ResultMetadataKey::StructuredAppendParity, MetadataValue::Int(parity));
        if !segments.is_empty() {
            merged.put_metadata(ResultMetadataKey::ByteSegments, MetadataValue::ByteSegments(segments));
        }
        out.push(merged);
    }
    out
}

// Writer
//------------------------------------------------------------------------------

pub struct QrCodeWriter;

impl Writer for QrCodeWriter {
    fn encode(
        &self,
        content: &str,
        format: BarcodeFormat,
        width: usize,
        height: usize,
        hints: &EncodeHints,
    ) -> ScanResult<BitMatrix> {
        check_format(format, BarcodeFormat::QrCode)?;
        let code = encode(content, hints)?;
        scale_to(&code.matrix, width, height, hints.margin.unwrap_or(QUIET_ZONE_SIZE))
    }
}

#[cfg(test)]
mod qrcode_tests {
    use super::*;
    use crate::common::{ScanError, StructuredAppend};

    #[test]
    fn test_writer_quiet_zone() {
        let m = QrCodeWriter.encode("quiet", BarcodeFormat::QrCode, 0, 0, &EncodeHints::default()).unwrap();
        assert_eq!(m.width(), 21 + 8);
        assert_eq!(m.top_left_on_bit(), Some((4, 4)));
    }

    #[test]
    fn test_reader_pure_and_detected() {
        let m = QrCodeWriter.encode("pure read", BarcodeFormat::QrCode, 150, 150, &EncodeHints::default()).unwrap();
        let image = BinaryBitmap::from_bit_matrix(&m).unwrap();
        let mut hints = DecodeHints::new();
        assert_eq!(QrCodeReader.decode(&image, &hints).unwrap().text(), "pure read");
        hints.pure_barcode(true);
        let b = QrCodeReader.decode(&image, &hints).unwrap();
        assert_eq!(b.text(), "pure read");
        assert_eq!(b.get_metadata(ResultMetadataKey::SymbologyIdentifier).and_then(|v| v.as_text()), Some("]Q1"));
    }

    #[test]
    fn test_reader_not_found() {
        let image = BinaryBitmap::from_bit_matrix(&BitMatrix::square(60).unwrap()).unwrap();
        assert_eq!(QrCodeReader.decode(&image, &DecodeHints::default()).unwrap_err(), ScanError::NotFound);
    }

    fn part(text: &str, index: usize, count: usize, parity: u8) -> Barcode {
        let mut res = DecoderResult::new(text.as_bytes().to_vec(), text.to_string());
        res.structured_append = Some(StructuredAppend { index, count, parity });
        res.into_barcode(vec![ResultPoint::new(index as f32 * 100.0, 0.0)], BarcodeFormat::QrCode)
    }

    #[test]
    fn test_merge_structured_append() {
        let plain = Barcode::new("plain".into(), vec![], vec![], BarcodeFormat::QrCode);
        let merged = merge_structured_append(vec![part("world", 1, 2, 7), plain.clone(), part("hello ", 0, 2, 7)]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0], plain);
        assert_eq!(merged[1].text(), "hello world");
        assert!(merged[1].points().is_empty());
    }

    #[test]
    fn test_parts_of_joined_set_dropped() {
        let mut all = merge_structured_append(vec![part("hello ", 0, 2, 7), part("world", 1, 2, 7)]);
        all.push(part("world", 1, 2, 7));
        all.push(part("x", 0, 2, 9));
        let texts: Vec<_> = merge_structured_append(all).iter().map(|b| b.text().to_string()).collect();
        assert_eq!(texts, vec!["hello world", "x"]);
    }

    #[test]
    fn test_incomplete_structured_append() {
        let merged = merge_structured_append(vec![part("b", 1, 3, 1), part("a", 0, 3, 1)]);
        let texts: Vec<_> = merged.iter().map(|b| b.text()).collect();
        assert_eq!(texts, vec!["a", "b"]);
    }
}
