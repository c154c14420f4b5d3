mod binarize;
mod bitmap;
mod luminance;
mod multi;

pub use binarize::{Binarizer, GlobalHistogramBinarizer, HybridBinarizer};
pub use bitmap::BinaryBitmap;
pub use luminance::{GrayLuminanceSource, LuminanceSource};
pub use multi::{dedupe, ByQuadrantReader, GenericMultipleBarcodeReader};

use log::{debug, trace};

use crate::{
    aztec::AztecReader,
    common::{Barcode, BarcodeFormat, DecodeHints, MetadataValue, ResultMetadataKey, ScanError, ScanResult},
    maxicode::MaxiCodeReader,
    oned::{Code93Reader, ItfReader, OneDReader, Rss14Reader, RssExpandedReader},
    qrcode::{merge_structured_append, QrCodeMultiReader, QrCodeReader},
};

// Reader traits
//------------------------------------------------------------------------------

/// Locates and decodes one symbol in a binarized image.
pub trait Reader: Send {
    fn decode(&mut self, image: &BinaryBitmap, hints: &DecodeHints) -> ScanResult<Barcode>;

    // Drops state carried between calls, such as partial row pairs.
    fn reset(&mut self) {}
}

/// Locates and decodes every symbol it can find. Failures of single candidates are
/// skipped, so the result may be empty.
pub trait MultipleReader {
    fn decode_multiple(&mut self, image: &BinaryBitmap, hints: &DecodeHints) -> ScanResult<Vec<Barcode>>;
}

// Prefers the error closest to a successful read
pub(crate) fn error_rank(err: &ScanError) -> u8 {
    match err {
        ScanError::NotFound => 0,
        ScanError::Format(_) => 1,
        ScanError::Checksum => 2,
        ScanError::InvalidArgument(_) => 3,
    }
}

// Multi format reader
//------------------------------------------------------------------------------

/// Registry of readers keyed on format, tried in order until one succeeds.
pub struct MultiFormatReader {
    readers: Vec<(BarcodeFormat, Box<dyn Reader>)>,
}

impl Default for MultiFormatReader {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiFormatReader {
    pub fn new() -> Self {
        let readers: Vec<(BarcodeFormat, Box<dyn Reader>)> = vec![
            (BarcodeFormat::Itf, Box::new(OneDReader::new(ItfReader::default()))),
            (BarcodeFormat::Code93, Box::new(OneDReader::new(Code93Reader::default()))),
            (BarcodeFormat::Rss14, Box::new(OneDReader::new(Rss14Reader::default()))),
            (BarcodeFormat::RssExpanded, Box::new(OneDReader::new(RssExpandedReader::default()))),
            (BarcodeFormat::QrCode, Box::new(QrCodeReader)),
            (BarcodeFormat::Aztec, Box::new(AztecReader)),
            (BarcodeFormat::MaxiCode, Box::new(MaxiCodeReader)),
        ];
        Self { readers }
    }

    /// Runs every reader the hints allow. Linear readers go last when trying harder, since
    /// row scanning is the slowest part then.
    pub fn decode(&mut self, image: &BinaryBitmap, hints: &DecodeHints) -> ScanResult<Barcode> {
        match self.decode_internal(image, hints) {
            Ok(b) => Ok(b),
            Err(err) if hints.also_inverted && err.is_recoverable() => {
                trace!("Retrying inverted image");
                self.decode_internal(&image.invert(), hints).map_err(|e2| {
                    if error_rank(&e2) > error_rank(&err) {
                        e2
                    } else {
                        err
                    }
                })
            }
            Err(err) => Err(err),
        }
    }

    fn decode_internal(&mut self, image: &BinaryBitmap, hints: &DecodeHints) -> ScanResult<Barcode> {
        let mut order: Vec<usize> = (0..self.readers.len()).filter(|&i| hints.allows(self.readers[i].0)).collect();
        if hints.try_harder {
            order.sort_by_key(|&i| self.readers[i].0.is_linear());
        }

        let mut best = ScanError::NotFound;
        for i in order {
            let (format, reader) = &mut self.readers[i];
            match reader.decode(image, hints) {
                Ok(b) => {
                    debug!("Decoded {format}");
                    return Ok(b);
                }
                Err(err) if !err.is_recoverable() => return Err(err),
                Err(err) => {
                    trace!("{format} reader failed: {err}");
                    if error_rank(&err) > error_rank(&best) {
                        best = err;
                    }
                }
            }
        }
        Err(best)
    }

    pub fn reset(&mut self) {
        self.readers.iter_mut().for_each(|(_, r)| r.reset());
    }
}

impl Reader for MultiFormatReader {
    fn decode(&mut self, image: &BinaryBitmap, hints: &DecodeHints) -> ScanResult<Barcode> {
        MultiFormatReader::decode(self, image, hints)
    }

    fn reset(&mut self) {
        MultiFormatReader::reset(self)
    }
}

// Barcode reader
//------------------------------------------------------------------------------

/// One rung of the retry ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeAttempt {
    Normal,
    TryHarder,
    // Source rotated a quarter turn counterclockwise.
    Rotated,
    // Luminance inverted, for light-on-dark symbols.
    Inverted,
}

/// Decodes straight from a luminance source, walking an ordered list of attempts until
/// one succeeds.
///
/// Defaults: try harder off, auto rotate on, inversion off.
pub struct BarcodeReader {
    hints: DecodeHints,
    auto_rotate: bool,
    reader: MultiFormatReader,
}

impl Default for BarcodeReader {
    fn default() -> Self {
        Self::new(DecodeHints::default())
    }
}

impl BarcodeReader {
    pub fn new(hints: DecodeHints) -> Self {
        Self { hints, auto_rotate: true, reader: MultiFormatReader::new() }
    }

    pub fn hints(&mut self) -> &mut DecodeHints {
        &mut self.hints
    }

    pub fn try_harder(&mut self, try_harder: bool) -> &mut Self {
        self.hints.try_harder = try_harder;
        self
    }

    pub fn auto_rotate(&mut self, auto_rotate: bool) -> &mut Self {
        self.auto_rotate = auto_rotate;
        self
    }

    pub fn also_inverted(&mut self, inverted: bool) -> &mut Self {
        self.hints.also_inverted = inverted;
        self
    }

    pub fn attempts(&self) -> Vec<DecodeAttempt> {
        let mut res = vec![DecodeAttempt::Normal];
        if self.hints.try_harder {
            res.push(DecodeAttempt::TryHarder);
        }
        if self.auto_rotate {
            res.push(DecodeAttempt::Rotated);
        }
        if self.hints.also_inverted {
            res.push(DecodeAttempt::Inverted);
        }
        res
    }

    pub fn decode(&mut self, source: &dyn LuminanceSource) -> ScanResult<Barcode> {
        let mut best = ScanError::NotFound;
        for attempt in self.attempts() {
            trace!("Decode attempt {attempt:?}");
            match self.run_attempt(source, attempt) {
                Ok(b) => return Ok(b),
                Err(err) if !err.is_recoverable() => return Err(err),
                Err(err) => {
                    if error_rank(&err) > error_rank(&best) {
                        best = err;
                    }
                }
            }
        }
        Err(best)
    }

    fn run_attempt(&mut self, source: &dyn LuminanceSource, attempt: DecodeAttempt) -> ScanResult<Barcode> {
        let mut hints = self.hints.clone();
        // Inversion is its own rung
        hints.also_inverted = false;
        hints.try_harder = false;
        let full = || source.crop(0, 0, source.width(), source.height());

        match attempt {
            DecodeAttempt::Normal => self.reader.decode(&BinaryBitmap::from_source(full()?), &hints),
            DecodeAttempt::TryHarder => {
                hints.try_harder = true;
                self.reader.decode(&BinaryBitmap::from_source(full()?), &hints)
            }
            DecodeAttempt::Rotated => {
                if !source.is_rotate_supported() {
                    return Err(ScanError::NotFound);
                }
                hints.try_harder = self.hints.try_harder;
                let rotated = source.rotate_counter_clockwise()?;
                let height = rotated.height();
                let mut b = self.reader.decode(&BinaryBitmap::from_source(rotated), &hints)?;
                b.unrotate_points(height);
                let orientation = b.get_metadata(ResultMetadataKey::Orientation).and_then(|v| v.as_int()).unwrap_or(0);
                b.put_metadata(ResultMetadataKey::Orientation, MetadataValue::Int((orientation + 270) % 360));
                Ok(b)
            }
            DecodeAttempt::Inverted => {
                hints.try_harder = self.hints.try_harder;
                self.reader.decode(&BinaryBitmap::from_source(source.invert()), &hints)
            }
        }
    }

    /// Every symbol found in the source, using the QR multi finder and recursive region
    /// splitting. Duplicates are dropped.
    pub fn decode_multiple(&mut self, source: &dyn LuminanceSource) -> ScanResult<Vec<Barcode>> {
        let mut hints = self.hints.clone();
        hints.also_inverted = false;
        let mut results = vec![];
        let mut sources = vec![source.crop(0, 0, source.width(), source.height())?];
        if self.hints.also_inverted {
            sources.push(source.invert());
        }

        for src in sources {
            let image = BinaryBitmap::from_source(src);
            if hints.allows(BarcodeFormat::QrCode) {
                results.extend(QrCodeMultiReader.decode_multiple(&image, &hints)?);
            }
            let mut generic = GenericMultipleBarcodeReader::new(&mut self.reader);
            results.extend(generic.decode_multiple(&image, &hints)?);
        }
        let results = dedupe(merge_structured_append(results));
        debug!("Decoded {} symbols", results.len());
        Ok(results)
    }
}

#[cfg(test)]
mod reader_tests {
    use super::*;
    use crate::{
        common::{BitMatrix, BitStream, EncodeHints},
        qrcode::{add_ec_and_interleave, build_symbol, EcLevel, Mode, Version},
        writer::{scale_to, MultiFormatWriter},
    };

    fn source_for(content: &str, format: BarcodeFormat, size: usize) -> GrayLuminanceSource {
        let m = MultiFormatWriter::new().encode(content, format, size, size, &EncodeHints::default()).unwrap();
        GrayLuminanceSource::from_bit_matrix(&m).unwrap()
    }

    #[test]
    fn test_attempt_ladder() {
        let mut r = BarcodeReader::default();
        assert_eq!(r.attempts(), vec![DecodeAttempt::Normal, DecodeAttempt::Rotated]);
        r.try_harder(true).auto_rotate(false).also_inverted(true);
        assert_eq!(r.attempts(), vec![DecodeAttempt::Normal, DecodeAttempt::TryHarder, DecodeAttempt::Inverted]);
    }

    #[test]
    fn test_multi_format_qr() {
        let src = source_for("multi format", BarcodeFormat::QrCode, 200);
        let b = BarcodeReader::default().decode(&src).unwrap();
        assert_eq!(b.text(), "multi format");
        assert_eq!(b.format(), BarcodeFormat::QrCode);
    }

    #[test]
    fn test_restricted_formats() {
        let src = source_for("restricted", BarcodeFormat::QrCode, 200);
        let mut hints = DecodeHints::new();
        hints.possible_formats(&[BarcodeFormat::Aztec]);
        assert!(BarcodeReader::new(hints).decode(&src).is_err());
    }

    #[test]
    fn test_inverted() {
        let src = source_for("inverted", BarcodeFormat::QrCode, 200);
        let inv = src.invert();
        let mut r = BarcodeReader::default();
        r.auto_rotate(false);
        assert!(r.decode(inv.as_ref()).is_err());
        r.also_inverted(true);
        assert_eq!(r.decode(inv.as_ref()).unwrap().text(), "inverted");
    }

    #[test]
    fn test_blank_source() {
        let src = GrayLuminanceSource::new(vec![255; 120 * 120], 120, 120).unwrap();
        assert_eq!(BarcodeReader::default().decode(&src).unwrap_err(), ScanError::NotFound);
        assert!(BarcodeReader::default().decode_multiple(&src).unwrap().is_empty());
    }

    // Version 1-L symbol holding one structured append part in byte mode
    fn structured_part(text: &str, index: usize, count: usize, parity: u8) -> BitMatrix {
        let ver = Version::new(1).unwrap();
        let capacity = ver.data_bit_capacity(EcLevel::L);
        let mut bs = BitStream::new();
        bs.push_bits(Mode::StructuredAppend as u8, 4);
        bs.push_bits(((index << 4) | (count - 1)) as u8, 8);
        bs.push_bits(parity, 8);
        bs.push_bits(Mode::Byte as u8, 4);
        bs.push_bits(text.len() as u8, 8);
        text.bytes().for_each(|b| bs.push_bits(b, 8));
        bs.push_bits(0u8, 4);
        while bs.len() % 8 != 0 {
            bs.push_bits(0u8, 1);
        }
        for pad in [0xECu8, 0x11].iter().cycle().take((capacity - bs.len()) / 8) {
            bs.push_bits(*pad, 8);
        }
        let codewords = add_ec_and_interleave(bs.data(), ver, EcLevel::L).unwrap();
        let code = build_symbol(&codewords, ver, EcLevel::L, None).unwrap();
        scale_to(&code.matrix, 120, 120, 4).unwrap()
    }

    #[test]
    fn test_decode_multiple_joins_structured_append() {
        let mut canvas = BitMatrix::new(300, 150).unwrap();
        for (i, text) in ["hello ", "world"].iter().enumerate() {
            let part = structured_part(text, i, 2, 0x42);
            for y in 0..part.height() {
                for x in 0..part.width() {
                    if part.get(x, y) {
                        canvas.set(20 + i * 150 + x, 15 + y);
                    }
                }
            }
        }
        let src = GrayLuminanceSource::from_bit_matrix(&canvas).unwrap();
        let results = BarcodeReader::default().decode_multiple(&src).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].text(), "hello world");
        assert!(results[0].points().is_empty());
        assert!(results[0].get_metadata(ResultMetadataKey::StructuredAppendSequence).is_none());
    }
}
