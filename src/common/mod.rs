mod bit_array;
mod bit_matrix;
mod bitstream;
pub mod charset;
pub mod ec;
mod error;
mod format;
pub mod geometry;
mod hints;
mod point;
mod result;

pub use bit_array::*;
pub use bit_matrix::*;
pub use bitstream::*;
pub use charset::{guess_encoding, CharacterSet};
pub use error::*;
pub use format::*;
pub use geometry::{sample_grid, Homography};
pub use hints::*;
pub use point::*;
pub use result::*;
