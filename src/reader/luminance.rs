use image::{DynamicImage, GrayImage};

use crate::common::{BitMatrix, ScanError, ScanResult};

// Luminance source
//------------------------------------------------------------------------------

/// A row-major grid of 8-bit brightness samples, lower is darker.
///
/// Transforms return a fresh source that owns its own buffer.
pub trait LuminanceSource: Send + Sync {
    fn width(&self) -> usize;

    fn height(&self) -> usize;

    fn row(&self, y: usize) -> &[u8];

    fn matrix(&self) -> &[u8];

    fn crop(&self, left: usize, top: usize, width: usize, height: usize) -> ScanResult<Box<dyn LuminanceSource>>;

    fn is_rotate_supported(&self) -> bool {
        false
    }

    fn rotate_counter_clockwise(&self) -> ScanResult<Box<dyn LuminanceSource>> {
        Err(ScanError::invalid("Rotation is not supported by this luminance source"))
    }

    fn invert(&self) -> Box<dyn LuminanceSource>;
}

/// In-memory luminance grid. Built from raw samples, an `image` buffer or a module matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayLuminanceSource {
    data: Vec<u8>,
    width: usize,
    height: usize,
}

impl GrayLuminanceSource {
    pub fn new(data: Vec<u8>, width: usize, height: usize) -> ScanResult<Self> {
        if width == 0 || height == 0 {
            return Err(ScanError::invalid(format!(
                "Luminance grid must be non-empty: Width {width}, Height {height}"
            )));
        }
        if data.len() != width * height {
            return Err(ScanError::invalid(format!(
                "Sample count doesn't match dimensions: Len {}, Width {width}, Height {height}",
                data.len()
            )));
        }
        Ok(Self { data, width, height })
    }

    pub fn from_gray_image(img: &GrayImage) -> ScanResult<Self> {
        let (w, h) = img.dimensions();
        Self::new(img.as_raw().clone(), w as usize, h as usize)
    }

    pub fn from_image(img: &DynamicImage) -> ScanResult<Self> {
        Self::from_gray_image(&img.to_luma8())
    }

    pub fn from_bit_matrix(matrix: &BitMatrix) -> ScanResult<Self> {
        let (w, h) = (matrix.width(), matrix.height());
        let mut data = Vec::with_capacity(w * h);
        for y in 0..h {
            data.extend((0..w).map(|x| if matrix.get(x, y) { 0 } else { 255 }));
        }
        Self::new(data, w, h)
    }

    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    pub fn to_gray_image(&self) -> Option<GrayImage> {
        GrayImage::from_raw(self.width as u32, self.height as u32, self.data.clone())
    }
}

impl LuminanceSource for GrayLuminanceSource {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn row(&self, y: usize) -> &[u8] {
        assert!(y < self.height, "Row out of range: Row {y}, Height {}", self.height);
        &self.data[y * self.width..(y + 1) * self.width]
    }

    fn matrix(&self) -> &[u8] {
        &self.data
    }

    fn crop(&self, left: usize, top: usize, width: usize, height: usize) -> ScanResult<Box<dyn LuminanceSource>> {
        if left + width > self.width || top + height > self.height {
            return Err(ScanError::invalid(format!(
                "Crop exceeds source: ({left}, {top}) {width}x{height} in {}x{}",
                self.width, self.height
            )));
        }
        let mut data = Vec::with_capacity(width * height);
        for y in top..top + height {
            data.extend_from_slice(&self.row(y)[left..left + width]);
        }
        Ok(Box::new(Self::new(data, width, height)?))
    }

    fn is_rotate_supported(&self) -> bool {
        true
    }

    fn rotate_counter_clockwise(&self) -> ScanResult<Box<dyn LuminanceSource>> {
        let (w, h) = (self.width, self.height);
        let mut data = vec![0u8; w * h];
        // New grid is h wide and w tall
        for y in 0..h {
            for x in 0..w {
                data[(w - 1 - x) * h + y] = self.get(x, y);
            }
        }
        Ok(Box::new(Self::new(data, h, w)?))
    }

    fn invert(&self) -> Box<dyn LuminanceSource> {
        let data = self.data.iter().map(|&v| 255 - v).collect();
        Box::new(Self { data, width: self.width, height: self.height })
    }
}
