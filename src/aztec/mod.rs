//! Aztec: bullseye detector, spiral codeword layout, high level decoder and the optimal
//! mode encoder.

mod decoder;
mod detector;
mod encoder;

pub use decoder::*;
pub use detector::{AztecDetectorResult, Detector, WhiteRectangleDetector};
pub use encoder::{encode, encode_bits, encode_high_level, stuff_bits, AztecCode, DEFAULT_EC_PERCENT};

use log::trace;

use crate::{
    common::{
        ec::galois::{GaloisField, AZTEC_DATA_10, AZTEC_DATA_12, AZTEC_DATA_6, AZTEC_DATA_8, AZTEC_PARAM},
        Barcode, BarcodeFormat, BitMatrix, DecodeHints, DecoderResult, EncodeHints, ErrorCorrection, ResultPoint,
        ScanError, ScanResult,
    },
    reader::{BinaryBitmap, Reader},
    writer::{check_format, scale_to, Writer},
};

// Layout
//------------------------------------------------------------------------------

// Codeword width in bits for a symbol with `layers` layers.
pub(crate) fn word_size(layers: usize) -> usize {
    match layers {
        0..=2 => 6,
        3..=8 => 8,
        9..=22 => 10,
        _ => 12,
    }
}

pub(crate) fn codeword_field(word_size: usize) -> ScanResult<&'static GaloisField> {
    match word_size {
        4 => Ok(&AZTEC_PARAM),
        6 => Ok(&AZTEC_DATA_6),
        8 => Ok(&AZTEC_DATA_8),
        10 => Ok(&AZTEC_DATA_10),
        12 => Ok(&AZTEC_DATA_12),
        _ => Err(ScanError::invalid(format!("No Aztec field for word size {word_size}"))),
    }
}

pub(crate) fn total_bits_in_layer(layers: usize, compact: bool) -> usize {
    ((if compact { 88 } else { 112 }) + 16 * layers) * layers
}

// Side of the symbol in modules, reference grid included.
pub(crate) fn matrix_size(compact: bool, layers: usize) -> usize {
    if compact {
        11 + 4 * layers
    } else {
        4 * layers + 2 * ((2 * layers + 6) / 15) + 15
    }
}

// Maps a position in the grid without reference lines onto the symbol.
pub(crate) fn alignment_map(compact: bool, layers: usize) -> Vec<usize> {
    let base = (if compact { 11 } else { 14 }) + 4 * layers;
    if compact {
        return (0..base).collect();
    }
    let mut map = vec![0; base];
    let orig_center = base / 2;
    let center = matrix_size(compact, layers) / 2;
    for i in 0..orig_center {
        let offset = i + i / 15;
        map[orig_center - i - 1] = center - offset - 1;
        map[orig_center + i] = center + offset + 1;
    }
    map
}

// Module position of every data bit, innermost layer last, in stream order. Each layer
// is four bands two modules deep, walked clockwise from the top left.
pub(crate) fn layer_positions(compact: bool, layers: usize) -> Vec<(usize, usize)> {
    let map = alignment_map(compact, layers);
    let base = map.len();
    let mut positions = vec![(0, 0); total_bits_in_layer(layers, compact)];
    let mut row_offset = 0;
    for i in 0..layers {
        let row_size = (layers - i) * 4 + if compact { 9 } else { 12 };
        let low = i * 2;
        let high = base - 1 - low;
        for j in 0..row_size {
            let col = j * 2;
            for k in 0..2 {
                positions[row_offset + col + k] = (map[low + k], map[low + j]);
                positions[row_offset + 2 * row_size + col + k] = (map[low + j], map[high - k]);
                positions[row_offset + 4 * row_size + col + k] = (map[high - k], map[high - j]);
                positions[row_offset + 6 * row_size + col + k] = (map[high - j], map[low + k]);
            }
        }
        row_offset += row_size * 8;
    }
    positions
}

// Reader
//------------------------------------------------------------------------------

// Smallest side a pure symbol is magnified to before the ring walk
const PURE_MIN_SIDE: usize = 300;

// Symbol cut out of a pure image and magnified onto a quiet zone.
struct PureSymbol {
    matrix: BitMatrix,
    origin: (usize, usize),
    factor: usize,
    margin: usize,
}

impl PureSymbol {
    fn extract(image: &BitMatrix) -> ScanResult<Self> {
        let [left, top, width, height] = image.enclosing_rectangle().ok_or(ScanError::NotFound)?;
        let side = width.max(height);
        let factor = PURE_MIN_SIDE.div_ceil(side).max(1);
        let margin = side * factor / 8 + factor;
        let mut matrix = BitMatrix::new(width * factor + 2 * margin, height * factor + 2 * margin)?;
        for y in 0..height {
            for x in 0..width {
                if image.get(left + x, top + y) {
                    matrix.set_region(margin + x * factor, margin + y * factor, factor, factor)?;
                }
            }
        }
        Ok(Self { matrix, origin: (left, top), factor, margin })
    }

    fn restore(&self, p: ResultPoint) -> ResultPoint {
        let map = |v: f32, o: usize| (v - self.margin as f32) / self.factor as f32 + o as f32;
        ResultPoint::new(map(p.x, self.origin.0), map(p.y, self.origin.1))
    }
}

fn read_symbol(matrix: &BitMatrix, hints: &DecodeHints) -> ScanResult<(DecoderResult, Vec<ResultPoint>)> {
    let detector = Detector::new(matrix);
    let mut err = ScanError::NotFound;
    for mirrored in [false, true] {
        let attempt = detector.detect(mirrored).and_then(|det| Ok((decode(&det, hints)?, det.points)));
        match attempt {
            Ok(read) => return Ok(read),
            Err(e) => {
                trace!("Aztec read failed, mirrored {mirrored}: {e}");
                if !matches!(e, ScanError::NotFound) || matches!(err, ScanError::NotFound) {
                    err = e;
                }
            }
        }
    }
    Err(err)
}

/// Reads one Aztec symbol, retrying with a mirrored layout when the normal read fails.
pub struct AztecReader;

impl Reader for AztecReader {
    fn decode(&mut self, image: &BinaryBitmap, hints: &DecodeHints) -> ScanResult<Barcode> {
        let matrix = image.black_matrix()?;
        let (res, points) = if hints.pure_barcode {
            let pure = PureSymbol::extract(matrix)?;
            let (res, points) = read_symbol(&pure.matrix, hints)?;
            (res, points.into_iter().map(|p| pure.restore(p)).collect())
        } else {
            read_symbol(matrix, hints)?
        };
        Ok(res.into_barcode(points, BarcodeFormat::Aztec))
    }
}

// Writer
//------------------------------------------------------------------------------

pub struct AztecWriter;

impl Writer for AztecWriter {
    fn encode(
        &self,
        content: &str,
        format: BarcodeFormat,
        width: usize,
        height: usize,
        hints: &EncodeHints,
    ) -> ScanResult<BitMatrix> {
        check_format(format, BarcodeFormat::Aztec)?;
        let ec_percent = match hints.error_correction {
            Some(ErrorCorrection::Percent(p)) => p,
            _ => DEFAULT_EC_PERCENT,
        };
        let code = encode(content, ec_percent, hints.aztec_layers, hints.character_set, hints.gs1_format)?;
        scale_to(&code.matrix, width, height, hints.margin.unwrap_or(0))
    }
}
