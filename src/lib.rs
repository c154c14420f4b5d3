//! # omniscan
//!
//! A Rust library for locating, decoding and generating barcodes in grayscale images,
//! built around one Reed-Solomon engine shared by every 2D symbology.
//!
//! ## Features
//!
//! - **Matrix codes**: QR Code (versions 1-40), Aztec (compact and full range), MaxiCode (modes 2-6)
//! - **Linear codes**: ITF, Code 93, RSS-14 and RSS-Expanded with GS1 application identifiers
//! - **Binarization**: Global histogram and local block thresholding over any luminance source
//! - **Error correction**: Reed-Solomon over GF(16) to GF(4096), with erasures
//! - **Multiple symbols**: Several QR symbols per image, structured append and region splitting
//! - **Writers**: Every supported format can be encoded and rendered back to an image
//!
//! ## Quick Start
//!
//! ### Encoding a symbol
//!
//! ```rust
//! use omniscan::{render::{to_image, RenderOptions}, BarcodeFormat, EncodeHints, MultiFormatWriter};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let matrix = MultiFormatWriter::new().encode("Hello, World!", BarcodeFormat::QrCode, 0, 0, &EncodeHints::default())?;
//!
//! // 4 pixels per module, 4 modules of quiet zone
//! let img = to_image(&matrix, &RenderOptions::new(4).quiet_zone(4));
//! assert_eq!(img.width(), (matrix.width() as u32 + 8) * 4);
//! # Ok(())
//! # }
//! ```
//!
//! ### Reading a symbol
//!
//! ```rust,no_run
//! use omniscan::{reader::{BarcodeReader, GrayLuminanceSource}, DecodeHints};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let img = image::open("barcode.png")?;
//! let source = GrayLuminanceSource::from_image(&img)?;
//!
//! let mut hints = DecodeHints::new();
//! hints.try_harder(true);
//! let barcode = BarcodeReader::new(hints).decode(&source)?;
//! println!("{}: {}", barcode.format(), barcode.text());
//! # Ok(())
//! # }
//! ```
//!
//! ### Reading every symbol
//!
//! ```rust,no_run
//! use omniscan::reader::{BarcodeReader, GrayLuminanceSource};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let img = image::open("shelf.png")?;
//! let source = GrayLuminanceSource::from_image(&img)?;
//! for barcode in BarcodeReader::default().decode_multiple(&source)? {
//!     println!("{}", barcode.text());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Decoding pipeline
//!
//! A [`reader::LuminanceSource`] is binarized into a [`reader::BinaryBitmap`], either row by
//! row for the linear readers or as a whole matrix for the 2D detectors. Each reader in
//! [`reader::MultiFormatReader`] locates its symbol, samples the module grid, corrects the
//! codewords and decodes the bit stream. [`reader::BarcodeReader`] walks a ladder of attempts
//! on top: normal, try harder, rotated and inverted.
//!
//! ## Errors
//!
//! Every fallible call returns [`ScanResult`]. `NotFound`, `Format` and `Checksum` are the
//! ordinary ways an image fails to decode. `InvalidArgument` reports content a writer cannot
//! encode.

pub mod aztec;
pub mod common;
pub mod maxicode;
pub mod oned;
pub mod qrcode;
pub mod reader;
pub mod render;
pub mod writer;

pub use common::{
    Barcode, BarcodeFormat, BitMatrix, DecodeHints, EncodeHints, ErrorCorrection, ResultMetadataKey, ScanError,
    ScanResult,
};
pub use reader::{BarcodeReader, MultiFormatReader};
pub use writer::MultiFormatWriter;
