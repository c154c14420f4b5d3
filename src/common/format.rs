use std::{fmt, str::FromStr};

use super::ScanError;

// Barcode format
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BarcodeFormat {
    Aztec,
    Code93,
    Itf,
    MaxiCode,
    QrCode,
    Rss14,
    RssExpanded,
}

impl BarcodeFormat {
    pub const ALL: [BarcodeFormat; 7] = [
        Self::Aztec,
        Self::Code93,
        Self::Itf,
        Self::MaxiCode,
        Self::QrCode,
        Self::Rss14,
        Self::RssExpanded,
    ];

    pub fn is_linear(self) -> bool {
        matches!(self, Self::Code93 | Self::Itf | Self::Rss14 | Self::RssExpanded)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Aztec => "AZTEC",
            Self::Code93 => "CODE_93",
            Self::Itf => "ITF",
            Self::MaxiCode => "MAXICODE",
            Self::QrCode => "QR_CODE",
            Self::Rss14 => "RSS_14",
            Self::RssExpanded => "RSS_EXPANDED",
        }
    }
}

impl fmt::Display for BarcodeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BarcodeFormat {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|f| f.name() == norm || f.name().replace('_', "") == norm)
            .ok_or_else(|| ScanError::invalid(format!("Unknown barcode format: {s}")))
    }
}

#[cfg(test)]
mod barcode_format_tests {
    use test_case::test_case;

    use super::BarcodeFormat;

    #[test_case("QR_CODE", BarcodeFormat::QrCode)]
    #[test_case("qrcode", BarcodeFormat::QrCode)]
    #[test_case("rss-expanded", BarcodeFormat::RssExpanded)]
    #[test_case("Code_93", BarcodeFormat::Code93)]
    fn test_parse(s: &str, exp: BarcodeFormat) {
        assert_eq!(s.parse::<BarcodeFormat>().unwrap(), exp);
    }

    #[test]
    fn test_round_trip_names() {
        for f in BarcodeFormat::ALL {
            assert_eq!(f.to_string().parse::<BarcodeFormat>().unwrap(), f);
        }
        assert!("PDF_417".parse::<BarcodeFormat>().is_err());
    }
}
