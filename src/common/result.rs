use std::collections::HashMap;

use super::{BarcodeFormat, BitMatrix, ResultPoint};

// Result metadata
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultMetadataKey {
    Orientation,
    ByteSegments,
    ErrorCorrectionLevel,
    ErrorsCorrected,
    ErasuresCorrected,
    StructuredAppendSequence,
    StructuredAppendParity,
    SymbologyIdentifier,
    PossibleCountry,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataValue {
    Text(String),
    Int(i64),
    ByteSegments(Vec<Vec<u8>>),
}

impl MetadataValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

// Barcode
//------------------------------------------------------------------------------

/// A decoded symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct Barcode {
    text: String,
    raw_bytes: Vec<u8>,
    num_bits: usize,
    points: Vec<ResultPoint>,
    format: BarcodeFormat,
    metadata: HashMap<ResultMetadataKey, MetadataValue>,
}

impl Barcode {
    pub fn new(text: String, raw_bytes: Vec<u8>, points: Vec<ResultPoint>, format: BarcodeFormat) -> Self {
        let num_bits = raw_bytes.len() * 8;
        Self { text, raw_bytes, num_bits, points, format, metadata: HashMap::new() }
    }

    pub fn with_num_bits(mut self, num_bits: usize) -> Self {
        self.num_bits = num_bits;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn raw_bytes(&self) -> &[u8] {
        &self.raw_bytes
    }

    pub fn num_bits(&self) -> usize {
        self.num_bits
    }

    pub fn points(&self) -> &[ResultPoint] {
        &self.points
    }

    pub fn format(&self) -> BarcodeFormat {
        self.format
    }

    pub fn metadata(&self) -> &HashMap<ResultMetadataKey, MetadataValue> {
        &self.metadata
    }

    pub fn get_metadata(&self, key: ResultMetadataKey) -> Option<&MetadataValue> {
        self.metadata.get(&key)
    }

    pub fn put_metadata(&mut self, key: ResultMetadataKey, value: MetadataValue) {
        self.metadata.insert(key, value);
    }

    pub fn put_all_metadata(&mut self, other: HashMap<ResultMetadataKey, MetadataValue>) {
        self.metadata.extend(other);
    }

    pub fn add_points(&mut self, points: &[ResultPoint]) {
        self.points.extend_from_slice(points);
    }

    pub fn translate_points(&mut self, dx: f32, dy: f32) {
        self.points.iter_mut().for_each(|p| *p = p.translate(dx, dy));
    }

    pub fn unrotate_points(&mut self, rotated_height: usize) {
        let h = rotated_height as f32;
        self.points.iter_mut().for_each(|p| *p = ResultPoint::new(h - p.y - 1.0, p.x));
    }

    pub fn mirror_points(&mut self, width: usize) {
        let w = width as f32;
        self.points.iter_mut().for_each(|p| *p = ResultPoint::new(w - p.x - 1.0, p.y));
    }

    pub fn bounds(&self) -> Option<(f32, f32, f32, f32)> {
        let first = self.points.first()?;
        Some(self.points.iter().fold((first.x, first.y, first.x, first.y), |(a, b, c, d), p| {
            (a.min(p.x), b.min(p.y), c.max(p.x), d.max(p.y))
        }))
    }
}

// Detector and decoder results
//------------------------------------------------------------------------------

/// A located symbol: the sampled module grid and the image points that anchored it.
#[derive(Debug, Clone)]
pub struct DetectorResult {
    pub bits: BitMatrix,
    pub points: Vec<ResultPoint>,
}

impl DetectorResult {
    pub fn new(bits: BitMatrix, points: Vec<ResultPoint>) -> Self {
        Self { bits, points }
    }
}

/// Structured append position: `index` of `count` symbols sharing `parity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructuredAppend {
    pub index: usize,
    pub count: usize,
    pub parity: u8,
}

/// Output of a symbology's bit-stream decoder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecoderResult {
    pub raw_bytes: Vec<u8>,
    pub num_bits: usize,
    pub text: String,
    pub byte_segments: Vec<Vec<u8>>,
    pub ec_level: Option<String>,
    pub errors_corrected: usize,
    pub erasures: usize,
    pub structured_append: Option<StructuredAppend>,
    pub symbology_modifier: u32,
    pub other: Option<String>,
}

impl DecoderResult {
    pub fn new(raw_bytes: Vec<u8>, text: String) -> Self {
        let num_bits = raw_bytes.len() * 8;
        Self { raw_bytes, num_bits, text, ..Default::default() }
    }

    pub fn with_ec_level(mut self, level: impl Into<String>) -> Self {
        self.ec_level = Some(level.into());
        self
    }

    pub fn into_barcode(self, points: Vec<ResultPoint>, format: BarcodeFormat) -> Barcode {
        use MetadataValue as V;
        use ResultMetadataKey as K;

        let mut barcode = Barcode::new(self.text, self.raw_bytes, points, format).with_num_bits(self.num_bits);
        if !self.byte_segments.is_empty() {
            barcode.put_metadata(K::ByteSegments, V::ByteSegments(self.byte_segments));
        }
        if let Some(ec) = self.ec_level {
            barcode.put_metadata(K::ErrorCorrectionLevel, V::Text(ec));
        }
        barcode.put_metadata(K::ErrorsCorrected, V::Int(self.errors_corrected as i64));
        if self.erasures > 0 {
            barcode.put_metadata(K::ErasuresCorrected, V::Int(self.erasures as i64));
        }
        if let Some(sa) = self.structured_append {
            let seq = ((sa.index as i64) << 4) | (sa.count.saturating_sub(1) as i64 & 0xF);
            barcode.put_metadata(K::StructuredAppendSequence, V::Int(seq));
            barcode.put_metadata(K::StructuredAppendParity, V::Int(sa.parity as i64));
        }
        if let Some(other) = self.other {
            barcode.put_metadata(K::Other, V::Text(other));
        }
        let sid = match format {
            BarcodeFormat::QrCode => "]Q",
            BarcodeFormat::Aztec => "]z",
            BarcodeFormat::MaxiCode => "]U",
            BarcodeFormat::Code93 => "]G",
            BarcodeFormat::Itf => "]I",
            BarcodeFormat::Rss14 | BarcodeFormat::RssExpanded => "]e",
        };
        barcode.put_metadata(K::SymbologyIdentifier, V::Text(format!("{sid}{}", self.symbology_modifier)));
        barcode
    }
}
