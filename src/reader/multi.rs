use log::{debug, trace};

use super::{BinaryBitmap, MultipleReader, Reader};
use crate::common::{Barcode, DecodeHints, ScanResult};

impl<R: Reader + ?Sized> Reader for &mut R {
    fn decode(&mut self, image: &BinaryBitmap, hints: &DecodeHints) -> ScanResult<Barcode> {
        (**self).decode(image, hints)
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

// Duplicates
//------------------------------------------------------------------------------

fn overlaps(a: &Barcode, b: &Barcode) -> bool {
    match (a.bounds(), b.bounds()) {
        (Some((ax0, ay0, ax1, ay1)), Some((bx0, by0, bx1, by1))) => {
            ax0 <= bx1 && bx0 <= ax1 && ay0 <= by1 && by0 <= ay1
        }
        // Merged results carry no location
        _ => true,
    }
}

fn is_duplicate(a: &Barcode, b: &Barcode) -> bool {
    a.text() == b.text() && a.format() == b.format() && overlaps(a, b)
}

pub fn dedupe(results: Vec<Barcode>) -> Vec<Barcode> {
    let mut kept: Vec<Barcode> = Vec::with_capacity(results.len());
    for r in results {
        if !kept.iter().any(|k| is_duplicate(k, &r)) {
            kept.push(r);
        }
    }
    kept
}

// By quadrant reader
//------------------------------------------------------------------------------

/// Tries the whole image, then each quadrant and finally the center, for symbols that
/// are small relative to the frame.
pub struct ByQuadrantReader<R: Reader> {
    delegate: R,
}

impl<R: Reader> ByQuadrantReader<R> {
    pub fn new(delegate: R) -> Self {
        Self { delegate }
    }

    fn decode_region(
        &mut self,
        image: &BinaryBitmap,
        hints: &DecodeHints,
        (left, top, w, h): (usize, usize, usize, usize),
    ) -> ScanResult<Barcode> {
        let mut b = self.delegate.decode(&image.crop(left, top, w, h)?, hints)?;
        b.translate_points(left as f32, top as f32);
        Ok(b)
    }
}

impl<R: Reader> Reader for ByQuadrantReader<R> {
    fn decode(&mut self, image: &BinaryBitmap, hints: &DecodeHints) -> ScanResult<Barcode> {
        let err = match self.delegate.decode(image, hints) {
            Ok(b) => return Ok(b),
            Err(err) if !err.is_recoverable() => return Err(err),
            Err(err) => err,
        };

        let (hw, hh) = (image.width() / 2, image.height() / 2);
        if hw == 0 || hh == 0 {
            return Err(err);
        }
        let regions = [(0, 0, hw, hh), (hw, 0, hw, hh), (0, hh, hw, hh), (hw, hh, hw, hh), (hw / 2, hh / 2, hw, hh)];
        for region in regions {
            match self.decode_region(image, hints, region) {
                Ok(b) => return Ok(b),
                Err(e) => trace!("Quadrant {region:?} failed: {e}"),
            }
        }
        Err(err)
    }

    fn reset(&mut self) {
        self.delegate.reset()
    }
}

// Generic multiple barcode reader
//------------------------------------------------------------------------------

const MAX_DEPTH: usize = 4;
const MIN_DIMENSION_TO_RECUR: f32 = 100.0;

/// Decodes one symbol, then recurses into the regions left of, above, right of and
/// below it.
pub struct GenericMultipleBarcodeReader<R: Reader> {
    delegate: R,
}

impl<R: Reader> GenericMultipleBarcodeReader<R> {
    pub fn new(delegate: R) -> Self {
        Self { delegate }
    }

    fn decode_recursive(
        &mut self,
        image: &BinaryBitmap,
        hints: &DecodeHints,
        results: &mut Vec<Barcode>,
        (x_off, y_off): (usize, usize),
        depth: usize,
    ) {
        if depth > MAX_DEPTH {
            return;
        }
        let Ok(mut found) = self.delegate.decode(image, hints) else {
            return;
        };
        let Some((min_x, min_y, max_x, max_y)) = found.bounds() else {
            if !results.iter().any(|r| r.text() == found.text()) {
                results.push(found);
            }
            return;
        };

        found.translate_points(x_off as f32, y_off as f32);
        if !results.iter().any(|r| is_duplicate(r, &found)) {
            results.push(found);
        }

        let (w, h) = (image.width() as f32, image.height() as f32);
        let (min_x, min_y) = (min_x.max(0.0), min_y.max(0.0));
        let (max_x, max_y) = (max_x.min(w), max_y.min(h));
        let mut regions = vec![];
        if min_x > MIN_DIMENSION_TO_RECUR {
            regions.push((0, 0, min_x as usize, h as usize));
        }
        if min_y > MIN_DIMENSION_TO_RECUR {
            regions.push((0, 0, w as usize, min_y as usize));
        }
        if max_x < w - MIN_DIMENSION_TO_RECUR {
            regions.push((max_x as usize, 0, (w - max_x) as usize, h as usize));
        }
        if max_y < h - MIN_DIMENSION_TO_RECUR {
            regions.push((0, max_y as usize, w as usize, (h - max_y) as usize));
        }
        for (left, top, rw, rh) in regions {
            if let Ok(sub) = image.crop(left, top, rw, rh) {
                self.decode_recursive(&sub, hints, results, (x_off + left, y_off + top), depth + 1);
            }
        }
    }
}

impl<R: Reader> MultipleReader for GenericMultipleBarcodeReader<R> {
    fn decode_multiple(&mut self, image: &BinaryBitmap, hints: &DecodeHints) -> ScanResult<Vec<Barcode>> {
        let mut results = vec![];
        self.decode_recursive(image, hints, &mut results, (0, 0), 0);
        debug!("Generic multi reader found {} symbols", results.len());
        Ok(results)
    }
}

#[cfg(test)]
mod multi_tests {
    use super::*;
    use crate::{
        common::{BarcodeFormat, BitMatrix, EncodeHints, ResultPoint},
        qrcode::QrCodeReader,
        writer::MultiFormatWriter,
    };

    fn place(canvas: &mut BitMatrix, m: &BitMatrix, ox: usize, oy: usize) {
        for y in 0..m.height() {
            for x in 0..m.width() {
                if m.get(x, y) {
                    canvas.set(ox + x, oy + y);
                }
            }
        }
    }

    fn qr(content: &str) -> BitMatrix {
        MultiFormatWriter::new().encode(content, BarcodeFormat::QrCode, 120, 120, &EncodeHints::default()).unwrap()
    }

    #[test]
    fn test_dedupe() {
        let a = Barcode::new("a".into(), vec![], vec![ResultPoint::new(0.0, 0.0), ResultPoint::new(10.0, 10.0)], BarcodeFormat::QrCode);
        let mut far = a.clone();
        far.translate_points(100.0, 100.0);
        let near = Barcode::new("a".into(), vec![], vec![ResultPoint::new(5.0, 5.0)], BarcodeFormat::QrCode);
        assert_eq!(dedupe(vec![a.clone(), near, far.clone()]), vec![a, far]);
    }

    #[test]
    fn test_by_quadrant_translates_points() {
        let mut canvas = BitMatrix::square(400).unwrap();
        place(&mut canvas, &qr("corner"), 250, 260);
        let image = BinaryBitmap::from_bit_matrix(&canvas).unwrap();
        let b = ByQuadrantReader::new(QrCodeReader).decode(&image, &DecodeHints::default()).unwrap();
        assert_eq!(b.text(), "corner");
        assert!(b.points().iter().all(|p| p.x > 250.0 && p.y > 260.0));
    }

    #[test]
    fn test_generic_multiple() {
        let mut canvas = BitMatrix::new(200, 700).unwrap();
        for (i, text) in ["one", "two", "three"].iter().enumerate() {
            place(&mut canvas, &qr(text), 40, 20 + i * 230);
        }
        let image = BinaryBitmap::from_bit_matrix(&canvas).unwrap();
        let mut reader = GenericMultipleBarcodeReader::new(QrCodeReader);
        let mut texts: Vec<_> =
            reader.decode_multiple(&image, &DecodeHints::default()).unwrap().iter().map(|b| b.text().to_string()).collect();
        texts.sort();
        assert_eq!(texts, vec!["one", "three", "two"]);
    }
}
