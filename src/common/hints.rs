use super::{BarcodeFormat, CharacterSet};
use crate::qrcode::EcLevel;

// Decode hints
//------------------------------------------------------------------------------

/// Options steering the readers. Fields are public; the setters chain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodeHints {
    /// Restricts which readers run. Empty means every format.
    pub possible_formats: Vec<BarcodeFormat>,
    /// Overrides charset guessing for byte segments.
    pub character_set: Option<CharacterSet>,
    /// The image holds one unrotated symbol with only a quiet zone around it.
    pub pure_barcode: bool,
    /// Scan more rows and candidates at the cost of speed.
    pub try_harder: bool,
    /// Accepted ITF lengths. Empty means the defaults.
    pub allowed_lengths: Vec<usize>,
    /// Also try the luminance-inverted image.
    pub also_inverted: bool,
    /// Treat the payload as GS1 data (FNC1 in first position).
    pub assume_gs1: bool,
}

impl DecodeHints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn possible_formats(&mut self, formats: &[BarcodeFormat]) -> &mut Self {
        self.possible_formats = formats.to_vec();
        self
    }

    pub fn character_set(&mut self, charset: CharacterSet) -> &mut Self {
        self.character_set = Some(charset);
        self
    }

    pub fn pure_barcode(&mut self, pure: bool) -> &mut Self {
        self.pure_barcode = pure;
        self
    }

    pub fn try_harder(&mut self, try_harder: bool) -> &mut Self {
        self.try_harder = try_harder;
        self
    }

    pub fn allowed_lengths(&mut self, lengths: &[usize]) -> &mut Self {
        self.allowed_lengths = lengths.to_vec();
        self
    }

    pub fn also_inverted(&mut self, inverted: bool) -> &mut Self {
        self.also_inverted = inverted;
        self
    }

    pub fn assume_gs1(&mut self, gs1: bool) -> &mut Self {
        self.assume_gs1 = gs1;
        self
    }

    /// True if `format` may be attempted under these hints.
    pub fn allows(&self, format: BarcodeFormat) -> bool {
        self.possible_formats.is_empty() || self.possible_formats.contains(&format)
    }
}

// Encode hints
//------------------------------------------------------------------------------

/// Requested error correction strength. QR takes a level; Aztec a minimum percentage
/// of the symbol spent on check words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCorrection {
    Qr(EcLevel),
    Percent(u32),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncodeHints {
    pub error_correction: Option<ErrorCorrection>,
    /// Quiet zone in modules. Each writer has its own default.
    pub margin: Option<usize>,
    pub character_set: Option<CharacterSet>,
    /// Aztec layer count: negative for compact, positive for full range, zero for automatic.
    pub aztec_layers: i32,
    /// MaxiCode mode 2 to 6. Picked from the content when absent.
    pub maxicode_mode: Option<u8>,
    pub gs1_format: bool,
    pub qr_version: Option<usize>,
    pub qr_mask: Option<u8>,
}

impl EncodeHints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error_correction(&mut self, ec: ErrorCorrection) -> &mut Self {
        self.error_correction = Some(ec);
        self
    }

    pub fn margin(&mut self, margin: usize) -> &mut Self {
        self.margin = Some(margin);
        self
    }

    pub fn character_set(&mut self, charset: CharacterSet) -> &mut Self {
        self.character_set = Some(charset);
        self
    }

    pub fn aztec_layers(&mut self, layers: i32) -> &mut Self {
        self.aztec_layers = layers;
        self
    }

    pub fn maxicode_mode(&mut self, mode: u8) -> &mut Self {
        self.maxicode_mode = Some(mode);
        self
    }

    pub fn gs1_format(&mut self, gs1: bool) -> &mut Self {
        self.gs1_format = gs1;
        self
    }

    pub fn qr_version(&mut self, version: usize) -> &mut Self {
        self.qr_version = Some(version);
        self
    }

    pub fn qr_mask(&mut self, mask: u8) -> &mut Self {
        self.qr_mask = Some(mask);
        self
    }
}
