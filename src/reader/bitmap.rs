use std::cell::OnceCell;

use super::{
    binarize::{Binarizer, HybridBinarizer},
    luminance::{GrayLuminanceSource, LuminanceSource},
};
use crate::common::{BitArray, BitMatrix, ScanError, ScanResult};

// Binary bitmap
//------------------------------------------------------------------------------

/// A binarizer paired with a lazily computed black matrix.
///
/// The cache lives and dies with this value; every transform yields a fresh bitmap
/// with an empty cache.
pub struct BinaryBitmap {
    binarizer: Box<dyn Binarizer>,
    matrix: OnceCell<BitMatrix>,
}

impl BinaryBitmap {
    pub fn new(binarizer: Box<dyn Binarizer>) -> Self {
        Self { binarizer, matrix: OnceCell::new() }
    }

    pub fn from_source(source: Box<dyn LuminanceSource>) -> Self {
        Self::new(Box::new(HybridBinarizer::new(source)))
    }

    pub fn from_bit_matrix(matrix: &BitMatrix) -> ScanResult<Self> {
        let bitmap = Self::from_source(Box::new(GrayLuminanceSource::from_bit_matrix(matrix)?));
        let _ = bitmap.matrix.set(matrix.clone());
        Ok(bitmap)
    }

    pub fn width(&self) -> usize {
        self.binarizer.width()
    }

    pub fn height(&self) -> usize {
        self.binarizer.height()
    }

    pub fn source(&self) -> &dyn LuminanceSource {
        self.binarizer.source()
    }

    pub fn black_row(&self, y: usize) -> ScanResult<BitArray> {
        if y >= self.height() {
            return Err(ScanError::invalid(format!("Row out of range: Row {y}, Height {}", self.height())));
        }
        match self.matrix.get() {
            Some(m) => Ok(m.row(y)),
            None => self.binarizer.black_row(y),
        }
    }

    pub fn black_matrix(&self) -> ScanResult<&BitMatrix> {
        if let Some(m) = self.matrix.get() {
            return Ok(m);
        }
        let m = self.binarizer.black_matrix()?;
        Ok(self.matrix.get_or_init(|| m))
    }

    pub fn is_crop_supported(&self) -> bool {
        true
    }

    pub fn crop(&self, left: usize, top: usize, width: usize, height: usize) -> ScanResult<Self> {
        let src = self.binarizer.source().crop(left, top, width, height)?;
        Ok(Self::new(self.binarizer.create(src)))
    }

    pub fn is_rotate_supported(&self) -> bool {
        self.binarizer.source().is_rotate_supported()
    }

    pub fn rotate_counter_clockwise(&self) -> ScanResult<Self> {
        let src = self.binarizer.source().rotate_counter_clockwise()?;
        Ok(Self::new(self.binarizer.create(src)))
    }

    pub fn rotate_counter_clockwise_45(&self) -> ScanResult<Self> {
        Err(ScanError::invalid("45 degree rotation is not supported"))
    }

    pub fn invert(&self) -> Self {
        Self::new(self.binarizer.create(self.binarizer.source().invert()))
    }
}

impl std::fmt::Debug for BinaryBitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinaryBitmap")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("cached", &self.matrix.get().is_some())
            .finish()
    }
}

#[cfg(test)]
mod bitmap_tests {
    use super::BinaryBitmap;
    use crate::common::BitMatrix;

    fn matrix() -> BitMatrix {
        let mut m = BitMatrix::new(60, 50).unwrap();
        m.set_region(10, 10, 20, 5).unwrap();
        m
    }

    #[test]
    fn test_cached_matrix() {
        let bmp = BinaryBitmap::from_bit_matrix(&matrix()).unwrap();
        let a = bmp.black_matrix().unwrap() as *const BitMatrix;
        let b = bmp.black_matrix().unwrap() as *const BitMatrix;
        assert_eq!(a, b);
        assert!(bmp.black_row(12).unwrap().get(15));
        assert!(bmp.black_row(50).is_err());
    }

    #[test]
    fn test_transforms_are_fresh() {
        let bmp = BinaryBitmap::from_bit_matrix(&matrix()).unwrap();
        let crop = bmp.crop(5, 5, 30, 20).unwrap();
        assert_eq!((crop.width(), crop.height()), (30, 20));
        assert!(crop.black_matrix().unwrap().get(6, 6));

        let rot = bmp.rotate_counter_clockwise().unwrap();
        assert_eq!((rot.width(), rot.height()), (50, 60));
        let rm = rot.black_matrix().unwrap();
        // (x, y) -> (y, W - 1 - x)
        assert!(rm.get(12, 59 - 15));

        let inv = bmp.invert();
        assert!(!inv.black_matrix().unwrap().get(15, 12));
        assert!(bmp.rotate_counter_clockwise_45().is_err());
    }
}
