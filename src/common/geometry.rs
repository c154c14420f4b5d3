use std::ops::{Index, IndexMut};

use super::{BitMatrix, ResultPoint, ScanError, ScanResult};

// Homographic projection matrix to map a module grid onto the image
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Clone)]
pub struct Homography(pub [f64; 8]);

impl Index<usize> for Homography {
    type Output = f64;

    #[inline]
    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl IndexMut<usize> for Homography {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.0[index]
    }
}

impl Homography {
    pub fn compute(src: [(f64, f64); 4], dst: [(f64, f64); 4]) -> ScanResult<Self> {
        // 2 rows per point pair, 8 unknowns (h33 fixed to 1)
        let mut a = [[0.0_f64; 8]; 8];
        let mut b = [0.0_f64; 8];

        for i in 0..4 {
            let (x, y) = src[i];
            let (xp, yp) = dst[i];

            a[2 * i] = [-x, -y, -1.0, 0.0, 0.0, 0.0, xp * x, xp * y];
            b[2 * i] = -xp;

            a[2 * i + 1] = [0.0, 0.0, 0.0, -x, -y, -1.0, yp * x, yp * y];
            b[2 * i + 1] = -yp;
        }

        let h = Self::solve_linear_system(a, b)?;

        Ok(Self(h))
    }

    pub fn from_grid(w: f64, h: f64, corners: [ResultPoint; 4]) -> ScanResult<Self> {
        let src = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)];
        let dst = corners.map(|p| (p.x as f64, p.y as f64));
        Self::compute(src, dst)
    }

    // Solve 8x8 linear system Ax = b by Gaussian elimination
    fn solve_linear_system(mut a: [[f64; 8]; 8], mut b: [f64; 8]) -> ScanResult<[f64; 8]> {
        for i in 0..8 {
            // Partial pivot
            let mut max_row = i;
            let mut max_val = a[i][i].abs();
            #[allow(clippy::needless_range_loop)]
            for r in (i + 1)..8 {
                if a[r][i].abs() > max_val {
                    max_val = a[r][i].abs();
                    max_row = r;
                }
            }
            if max_row != i {
                a.swap(i, max_row);
                b.swap(i, max_row);
            }

            if a[i][i].abs() < f64::EPSILON {
                return Err(ScanError::NotFound);
            }

            let pivot = a[i][i];
            for c in i..8 {
                a[i][c] /= pivot;
            }
            b[i] /= pivot;

            for r in (i + 1)..8 {
                let factor = a[r][i];
                for c in i..8 {
                    a[r][c] -= factor * a[i][c];
                }
                b[r] -= factor * b[i];
            }
        }

        // Back substitution
        let mut x = [0.0; 8];
        for r in (0..8).rev() {
            let mut sum = 0.0;
            #[allow(clippy::needless_range_loop)]
            for c in (r + 1)..8 {
                sum += a[r][c] * x[c];
            }
            x[r] = (b[r] - sum) / a[r][r];
        }
        Ok(x)
    }

    pub fn map(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let w = self[6] * x + self[7] * y + 1.0;
        if w.abs() <= f64::EPSILON {
            return None;
        }
        let xp = (self[0] * x + self[1] * y + self[2]) / w;
        let yp = (self[3] * x + self[4] * y + self[5]) / w;
        Some((xp, yp))
    }
}

#[cfg(test)]
mod homography_tests {
    use super::Homography;

    #[test]
    fn test_homography() {
        let src = [(3.5, 3.5), (21.5, 3.5), (18.5, 18.5), (3.5, 21.5)];
        let dst = [(75.0, 75.0), (255.0, 75.0), (225.0, 225.0), (75.0, 255.0)];
        let h = Homography::compute(src, dst).unwrap();
        let pts = [(7.0, 7.0), (25.0, 0.0), (25.0, 25.0), (0.0, 25.0)];
        let expected = [(110.0, 110.0), (290.0, 40.0), (290.0, 290.0), (40.0, 290.0)];
        for (pt, exp) in pts.iter().zip(expected) {
            let (x, y) = h.map(pt.0, pt.1).unwrap();
            assert!((x - exp.0).abs() < 0.5 && (y - exp.1).abs() < 0.5, "{x},{y} vs {exp:?}");
        }
    }

    #[test]
    fn test_degenerate() {
        let src = [(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0)];
        let dst = [(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0)];
        assert!(Homography::compute(src, dst).is_err());
    }
}

// Grid sampler
//------------------------------------------------------------------------------

pub fn sample_grid(image: &BitMatrix, dim_x: usize, dim_y: usize, h: &Homography) -> ScanResult<BitMatrix> {
    let mut bits = BitMatrix::new(dim_x, dim_y)?;
    let (w, ht) = (image.width() as f64, image.height() as f64);
    for y in 0..dim_y {
        for x in 0..dim_x {
            let (px, py) = h.map(x as f64 + 0.5, y as f64 + 0.5).ok_or(ScanError::NotFound)?;
            if px < -1.0 || px > w || py < -1.0 || py > ht || px.is_nan() || py.is_nan() {
                return Err(ScanError::NotFound);
            }
            let px = (px.max(0.0) as usize).min(image.width() - 1);
            let py = (py.max(0.0) as usize).min(image.height() - 1);
            if image.get(px, py) {
                bits.set(x, y);
            }
        }
    }
    Ok(bits)
}
