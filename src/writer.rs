use log::debug;

use crate::{
    aztec::AztecWriter,
    common::{BarcodeFormat, BitMatrix, EncodeHints, ScanError, ScanResult},
    maxicode::MaxiCodeWriter,
    oned::{Code93Writer, ItfWriter, Rss14Writer, RssExpandedWriter},
    qrcode::QrCodeWriter,
};

// Writer
//------------------------------------------------------------------------------

/// Encodes content into a module matrix scaled to at least `width` x `height` pixels.
/// A zero size asks for the natural size of the symbol.
pub trait Writer: Send + Sync {
    fn encode(
        &self,
        content: &str,
        format: BarcodeFormat,
        width: usize,
        height: usize,
        hints: &EncodeHints,
    ) -> ScanResult<BitMatrix>;
}

pub(crate) fn check_format(requested: BarcodeFormat, expected: BarcodeFormat) -> ScanResult<()> {
    if requested != expected {
        return Err(ScanError::invalid(format!("Can only encode {expected}, but got {requested}")));
    }
    Ok(())
}

/// Scales `code` by the largest whole factor that fits `width` x `height` once `quiet_zone`
/// light modules are added on each side, centering it in the output.
pub fn scale_to(code: &BitMatrix, width: usize, height: usize, quiet_zone: usize) -> ScanResult<BitMatrix> {
    let (in_w, in_h) = (code.width(), code.height());
    let (full_w, full_h) = (in_w + 2 * quiet_zone, in_h + 2 * quiet_zone);
    let out_w = width.max(full_w);
    let out_h = height.max(full_h);
    let multiple = (out_w / full_w).min(out_h / full_h);
    let left = (out_w - in_w * multiple) / 2;
    let top = (out_h - in_h * multiple) / 2;

    let mut out = BitMatrix::new(out_w, out_h)?;
    for y in 0..in_h {
        for x in 0..in_w {
            if code.get(x, y) {
                out.set_region(left + x * multiple, top + y * multiple, multiple, multiple)?;
            }
        }
    }
    Ok(out)
}

// Multi format writer
//------------------------------------------------------------------------------

/// Dispatches to the writer registered for the requested format.
pub struct MultiFormatWriter {
    writers: Vec<(BarcodeFormat, Box<dyn Writer>)>,
}

impl Default for MultiFormatWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiFormatWriter {
    pub fn new() -> Self {
        let writers: Vec<(BarcodeFormat, Box<dyn Writer>)> = vec![
            (BarcodeFormat::QrCode, Box::new(QrCodeWriter)),
            (BarcodeFormat::Aztec, Box::new(AztecWriter)),
            (BarcodeFormat::MaxiCode, Box::new(MaxiCodeWriter)),
            (BarcodeFormat::Itf, Box::new(ItfWriter)),
            (BarcodeFormat::Code93, Box::new(Code93Writer)),
            (BarcodeFormat::Rss14, Box::new(Rss14Writer)),
            (BarcodeFormat::RssExpanded, Box::new(RssExpandedWriter)),
        ];
        Self { writers }
    }

    pub fn encode(
        &self,
        content: &str,
        format: BarcodeFormat,
        width: usize,
        height: usize,
        hints: &EncodeHints,
    ) -> ScanResult<BitMatrix> {
        let (_, writer) = self
            .writers
            .iter()
            .find(|(f, _)| *f == format)
            .ok_or_else(|| ScanError::invalid(format!("No encoder available for format {format}")))?;
        debug!("Encoding {} chars as {format} into {width}x{height}", content.chars().count());
        writer.encode(content, format, width, height, hints)
    }
}

#[cfg(test)]
mod writer_tests {
    use test_case::test_case;

    use super::*;

    #[test]
    fn test_scale_to() {
        let code = BitMatrix::parse("X.\n.X\n", "X", ".").unwrap();
        let out = scale_to(&code, 12, 10, 1).unwrap();
        assert_eq!((out.width(), out.height()), (12, 10));
        // Factor min(12 / 4, 10 / 4) = 2, padding (12 - 4) / 2 and (10 - 4) / 2
        assert!(out.get(4, 3) && out.get(5, 4));
        assert!(!out.get(6, 3) && out.get(6, 5) && out.get(7, 6));
        assert_eq!(out.count_ones(), 8);
    }

    #[test]
    fn test_natural_size() {
        let code = BitMatrix::parse("XX\nXX\n", "X", ".").unwrap();
        let out = scale_to(&code, 0, 0, 0).unwrap();
        assert_eq!(out, code);
    }

    #[test]
    fn test_format_mismatch() {
        let writer = MultiFormatWriter::new();
        let err = writer.encode("123", BarcodeFormat::QrCode, 0, 0, &EncodeHints::default()).map(|_| ());
        assert!(err.is_ok());
        let err = QrCodeWriter.encode("123", BarcodeFormat::Aztec, 0, 0, &EncodeHints::default()).unwrap_err();
        assert!(matches!(err, ScanError::InvalidArgument(_)));
    }

    #[test_case(BarcodeFormat::Aztec)]
    #[test_case(BarcodeFormat::Code93)]
    #[test_case(BarcodeFormat::Itf)]
    #[test_case(BarcodeFormat::MaxiCode)]
    #[test_case(BarcodeFormat::QrCode)]
    #[test_case(BarcodeFormat::Rss14)]
    #[test_case(BarcodeFormat::RssExpanded)]
    fn test_empty_contents(format: BarcodeFormat) {
        let err = MultiFormatWriter::new().encode("", format, 0, 0, &EncodeHints::default()).unwrap_err();
        assert!(matches!(err, ScanError::InvalidArgument(_)));
    }
}
