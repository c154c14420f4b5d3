mod decoder;
mod encoder;
pub mod galois;

pub use decoder::*;
pub use encoder::*;
pub use galois::{GaloisField, QR_CODE_FIELD_256};
