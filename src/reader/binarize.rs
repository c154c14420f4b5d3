use log::trace;

use super::luminance::LuminanceSource;
use crate::common::{BitArray, BitMatrix, ScanResult};

// Binarizer
//------------------------------------------------------------------------------

/// Turns luminance into dark/light bits. Implementations never fail on degenerate
/// images; a flat image simply yields an empty matrix.
pub trait Binarizer: Send + Sync {
    fn source(&self) -> &dyn LuminanceSource;

    fn black_row(&self, y: usize) -> ScanResult<BitArray>;

    fn black_matrix(&self) -> ScanResult<BitMatrix>;

    // Same algorithm over another source.
    fn create(&self, source: Box<dyn LuminanceSource>) -> Box<dyn Binarizer>;

    fn width(&self) -> usize {
        self.source().width()
    }

    fn height(&self) -> usize {
        self.source().height()
    }
}

// Global histogram binarizer
// Steps:
// 1. Buckets luminance into 32 bins, from one row or from four rows across the middle
// 2. Picks the tallest bin as the first peak and the bin maximizing distance^2 * count
//    as the second
// 3. Threshold is the deepest valley between the peaks, weighted towards the light peak
//------------------------------------------------------------------------------

const LUMINANCE_BITS: usize = 5;
const LUMINANCE_SHIFT: usize = 8 - LUMINANCE_BITS;
const LUMINANCE_BUCKETS: usize = 1 << LUMINANCE_BITS;

pub struct GlobalHistogramBinarizer {
    source: Box<dyn LuminanceSource>,
}

impl GlobalHistogramBinarizer {
    pub fn new(source: Box<dyn LuminanceSource>) -> Self {
        Self { source }
    }

    // Valley between the two dominant peaks, or `None` when the histogram has a single
    // peak and no meaningful threshold.
    fn estimate_black_point(buckets: &[u32; LUMINANCE_BUCKETS]) -> Option<u8> {
        let mut max_count = 0;
        let mut first_peak = 0;
        let mut first_peak_size = 0;
        for (x, &b) in buckets.iter().enumerate() {
            if b > first_peak_size {
                first_peak = x;
                first_peak_size = b;
            }
            max_count = max_count.max(b);
        }

        let mut second_peak = 0;
        let mut second_peak_score = 0u64;
        for (x, &b) in buckets.iter().enumerate() {
            let dist = x.abs_diff(first_peak) as u64;
            let score = b as u64 * dist * dist;
            if score > second_peak_score {
                second_peak = x;
                second_peak_score = score;
            }
        }

        let (first_peak, second_peak) = if first_peak > second_peak {
            (second_peak, first_peak)
        } else {
            (first_peak, second_peak)
        };

        if second_peak - first_peak <= LUMINANCE_BUCKETS / 16 {
            return None;
        }

        let mut best_valley = second_peak - 1;
        let mut best_valley_score = -1i64;
        for x in (first_peak + 1..second_peak).rev() {
            let from_first = (x - first_peak) as i64;
            let score =
                from_first * from_first * (second_peak - x) as i64 * (max_count - buckets[x]) as i64;
            if score > best_valley_score {
                best_valley = x;
                best_valley_score = score;
            }
        }
        Some((best_valley << LUMINANCE_SHIFT) as u8)
    }
}

impl Binarizer for GlobalHistogramBinarizer {
    fn source(&self) -> &dyn LuminanceSource {
        self.source.as_ref()
    }

    fn black_row(&self, y: usize) -> ScanResult<BitArray> {
        let w = self.source.width();
        let row = self.source.row(y);
        let mut res = BitArray::new(w);

        let mut buckets = [0u32; LUMINANCE_BUCKETS];
        for &p in row {
            buckets[(p as usize) >> LUMINANCE_SHIFT] += 1;
        }
        let Some(black_point) = Self::estimate_black_point(&buckets) else {
            trace!("Flat histogram on row {y}");
            return Ok(res);
        };

        if w < 3 {
            for (x, &p) in row.iter().enumerate() {
                res.set_value(x, p < black_point);
            }
            return Ok(res);
        }

        // Sharpen with a -1 4 -1 kernel
        let (mut left, mut center) = (row[0] as i32, row[1] as i32);
        for x in 1..w - 1 {
            let right = row[x + 1] as i32;
            if ((center * 4) - left - right) / 2 < black_point as i32 {
                res.set(x);
            }
            left = center;
            center = right;
        }
        Ok(res)
    }

    fn black_matrix(&self) -> ScanResult<BitMatrix> {
        let (w, h) = (self.source.width(), self.source.height());
        let mut res = BitMatrix::new(w, h)?;

        let mut buckets = [0u32; LUMINANCE_BUCKETS];
        for y in 1..5 {
            let row = self.source.row(h * y / 5);
            for &p in &row[w / 5..(w * 4 / 5).max(w / 5 + 1).min(w)] {
                buckets[(p as usize) >> LUMINANCE_SHIFT] += 1;
            }
        }
        let Some(black_point) = Self::estimate_black_point(&buckets) else {
            trace!("Flat histogram, empty matrix");
            return Ok(res);
        };

        let data = self.source.matrix();
        for y in 0..h {
            for x in 0..w {
                if data[y * w + x] < black_point {
                    res.set(x, y);
                }
            }
        }
        Ok(res)
    }

    fn create(&self, source: Box<dyn LuminanceSource>) -> Box<dyn Binarizer> {
        Box::new(Self::new(source))
    }
}

// Hybrid binarizer
// Steps:
// 1. Divides image into blocks of 8x8 pixels. The last fractional block on each axis is
//    shifted back so it overlaps its neighbour
// 2. Calculates average of each block. Low contrast blocks (max - min <= 24) take min / 2,
//    raised to the neighbours' average when that is above min
// 3. Calculates the threshold for each block by averaging 5x5 blocks around the current
//    block, clamped at the edges
// 4. Sets pixel as dark if its value is less than or equal to the threshold
//------------------------------------------------------------------------------

const BLOCK_SIZE_POWER: usize = 3;
const BLOCK_SIZE: usize = 1 << BLOCK_SIZE_POWER;
const MINIMUM_DIMENSION: usize = BLOCK_SIZE * 5;
const MIN_DYNAMIC_RANGE: u8 = 24;

pub struct HybridBinarizer {
    inner: GlobalHistogramBinarizer,
}

impl HybridBinarizer {
    pub fn new(source: Box<dyn LuminanceSource>) -> Self {
        Self { inner: GlobalHistogramBinarizer::new(source) }
    }

    fn steps(len: usize) -> usize {
        len.div_ceil(BLOCK_SIZE)
    }

    fn calculate_block_average(&self) -> Vec<u32> {
        let src = self.inner.source.as_ref();
        let (w, h) = (src.width(), src.height());
        let (wsteps, hsteps) = (Self::steps(w), Self::steps(h));
        let data = src.matrix();
        let mut avg = vec![0u32; wsteps * hsteps];

        for by in 0..hsteps {
            let yoff = (by << BLOCK_SIZE_POWER).min(h - BLOCK_SIZE);
            for bx in 0..wsteps {
                let xoff = (bx << BLOCK_SIZE_POWER).min(w - BLOCK_SIZE);
                let mut sum = 0u32;
                let (mut mn, mut mx) = (u8::MAX, 0u8);
                for y in yoff..yoff + BLOCK_SIZE {
                    for &p in &data[y * w + xoff..y * w + xoff + BLOCK_SIZE] {
                        sum += p as u32;
                        mn = mn.min(p);
                        mx = mx.max(p);
                    }
                }

                let i = by * wsteps + bx;
                let mut block = sum >> (2 * BLOCK_SIZE_POWER);
                if mx - mn <= MIN_DYNAMIC_RANGE {
                    block = mn as u32 / 2;
                    if by > 0 && bx > 0 {
                        // Average of neighbors (x-1, y), (x, y-1), (x-1, y-1)
                        let ng_avg = (avg[i - wsteps] + 2 * avg[i - 1] + avg[i - wsteps - 1]) / 4;
                        if (mn as u32) < ng_avg {
                            block = ng_avg;
                        }
                    }
                }
                avg[i] = block;
            }
        }
        avg
    }

    fn calculate_threshold(&self, avg: &[u32]) -> Vec<u8> {
        let src = self.inner.source.as_ref();
        let (wsteps, hsteps) = (Self::steps(src.width()), Self::steps(src.height()));
        let (maxx, maxy) = (wsteps - 3, hsteps - 3);
        let mut res = vec![0u8; wsteps * hsteps];

        for y in 0..hsteps {
            let cy = y.clamp(2, maxy);
            for x in 0..wsteps {
                let cx = x.clamp(2, maxx);
                let mut sum = 0u32;
                for ny in cy - 2..=cy + 2 {
                    let ni = ny * wsteps + cx;
                    sum += avg[ni - 2..=ni + 2].iter().sum::<u32>();
                }
                res[y * wsteps + x] = (sum / 25) as u8;
            }
        }
        res
    }
}

impl Binarizer for HybridBinarizer {
    fn source(&self) -> &dyn LuminanceSource {
        self.inner.source()
    }

    fn black_row(&self, y: usize) -> ScanResult<BitArray> {
        self.inner.black_row(y)
    }

    fn black_matrix(&self) -> ScanResult<BitMatrix> {
        let src = self.inner.source.as_ref();
        let (w, h) = (src.width(), src.height());
        if w < MINIMUM_DIMENSION || h < MINIMUM_DIMENSION {
            return self.inner.black_matrix();
        }

        let avg = self.calculate_block_average();
        let thresh = self.calculate_threshold(&avg);
        let wsteps = Self::steps(w);
        let data = src.matrix();
        let mut res = BitMatrix::new(w, h)?;

        // Pixels of the overlapping last block take that block's threshold
        for y in 0..h {
            let by = if y >= h - BLOCK_SIZE { Self::steps(h) - 1 } else { y >> BLOCK_SIZE_POWER };
            for x in 0..w {
                let bx = if x >= w - BLOCK_SIZE { wsteps - 1 } else { x >> BLOCK_SIZE_POWER };
                if data[y * w + x] <= thresh[by * wsteps + bx] {
                    res.set(x, y);
                }
            }
        }
        Ok(res)
    }

    fn create(&self, source: Box<dyn LuminanceSource>) -> Box<dyn Binarizer> {
        Box::new(Self::new(source))
    }
}

#[cfg(test)]
mod binarize_tests {
    use super::{Binarizer, GlobalHistogramBinarizer, HybridBinarizer};
    use crate::reader::luminance::GrayLuminanceSource;

    fn checker(w: usize, h: usize, cell: usize) -> GrayLuminanceSource {
        let data = (0..w * h)
            .map(|i| if ((i % w) / cell + (i / w) / cell) % 2 == 0 { 20 } else { 230 })
            .collect();
        GrayLuminanceSource::new(data, w, h).unwrap()
    }

    #[test]
    fn test_hybrid_checker() {
        let bin = HybridBinarizer::new(Box::new(checker(80, 64, 10)));
        let m = bin.black_matrix().unwrap();
        for (x, y) in [(0, 0), (25, 5), (45, 35), (79, 63)] {
            assert_eq!(m.get(x, y), ((x / 10 + y / 10) % 2 == 0), "({x}, {y})");
        }
    }

    #[test]
    fn test_uneven_lighting() {
        // Dark gradient on the right half must not swallow the pattern
        let (w, h) = (96, 48);
        let data = (0..w * h)
            .map(|i| {
                let (x, y) = (i % w, i / w);
                let base: i32 = if (x / 6 + y / 6) % 2 == 0 { 40 } else { 200 };
                (base - (x as i32 * 30 / w as i32)) as u8
            })
            .collect();
        let src = GrayLuminanceSource::new(data, w, h).unwrap();
        let m = HybridBinarizer::new(Box::new(src)).black_matrix().unwrap();
        assert!(m.get(2, 2));
        assert!(!m.get(92, 2));
        assert!(m.get(86, 2));
    }

    #[test]
    fn test_flat_images() {
        for v in [0u8, 128, 255] {
            let src = GrayLuminanceSource::new(vec![v; 64 * 64], 64, 64).unwrap();
            let m = HybridBinarizer::new(Box::new(src.clone())).black_matrix().unwrap();
            assert_eq!((m.width(), m.height()), (64, 64));
            let g = GlobalHistogramBinarizer::new(Box::new(src)).black_matrix().unwrap();
            assert_eq!(g.count_ones(), 0);
            let row = GlobalHistogramBinarizer::new(Box::new(GrayLuminanceSource::new(vec![v; 8], 8, 1).unwrap()))
                .black_row(0)
                .unwrap();
            assert_eq!(row.len(), 8);
        }
    }

    #[test]
    fn test_tiny_image() {
        let src = GrayLuminanceSource::new(vec![0, 255, 0, 255], 2, 2).unwrap();
        let m = HybridBinarizer::new(Box::new(src)).black_matrix().unwrap();
        assert_eq!((m.width(), m.height()), (2, 2));
    }

    #[test]
    fn test_idempotent() {
        let src = checker(120, 90, 7);
        let a = HybridBinarizer::new(Box::new(src.clone())).black_matrix().unwrap();
        let b = HybridBinarizer::new(Box::new(src)).black_matrix().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_histogram_row() {
        let row: Vec<u8> = (0..60).map(|x| if (x / 5) % 2 == 0 { 10 } else { 240 }).collect();
        let src = GrayLuminanceSource::new(row, 60, 1).unwrap();
        let bits = GlobalHistogramBinarizer::new(Box::new(src)).black_row(0).unwrap();
        assert!(bits.get(2) && !bits.get(7) && bits.get(12));
    }
}
