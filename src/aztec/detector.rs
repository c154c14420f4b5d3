use log::{debug, trace};

use super::{codeword_field, matrix_size};
use crate::common::{
    ec::ReedSolomonDecoder, sample_grid, BitMatrix, Homography, ResultPoint, ScanError, ScanResult,
};

/// Sampled Aztec symbol with the parameters read from its mode message.
#[derive(Debug, Clone)]
pub struct AztecDetectorResult {
    pub bits: BitMatrix,
    pub points: Vec<ResultPoint>,
    pub compact: bool,
    pub data_blocks: usize,
    pub layers: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Point {
    x: i32,
    y: i32,
}

impl Point {
    fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    fn to_result(self) -> ResultPoint {
        ResultPoint::new(self.x as f32, self.y as f32)
    }

    fn distance(self, other: Point) -> f32 {
        self.to_result().distance(other.to_result())
    }
}

// White rectangle detector
//------------------------------------------------------------------------------

const INIT_SIZE: i32 = 10;
const CORR: f32 = 1.0;

/// Grows a box from a seed point until every side runs through white only, then
/// reports the outermost black point near each corner of the box.
pub struct WhiteRectangleDetector<'a> {
    image: &'a BitMatrix,
    left: i32,
    right: i32,
    up: i32,
    down: i32,
}

impl<'a> WhiteRectangleDetector<'a> {
    pub fn new(image: &'a BitMatrix) -> ScanResult<Self> {
        Self::with_seed(image, INIT_SIZE, image.width() as i32 / 2, image.height() as i32 / 2)
    }

    pub fn with_seed(image: &'a BitMatrix, init_size: i32, x: i32, y: i32) -> ScanResult<Self> {
        let half = init_size / 2;
        let (left, right, up, down) = (x - half, x + half, y - half, y + half);
        if up < 0 || left < 0 || down >= image.height() as i32 || right >= image.width() as i32 {
            return Err(ScanError::NotFound);
        }
        Ok(Self { image, left, right, up, down })
    }

    fn contains_black(&self, a: i32, b: i32, fixed: i32, horizontal: bool) -> bool {
        (a..=b).any(|i| {
            let (x, y) = if horizontal { (i, fixed) } else { (fixed, i) };
            self.image.try_get(x, y).unwrap_or(false)
        })
    }

    fn black_on_segment(&self, a: (f32, f32), b: (f32, f32)) -> Option<ResultPoint> {
        let dist = ((b.0 - a.0).powi(2) + (b.1 - a.1).powi(2)).sqrt().round() as i32;
        if dist == 0 {
            return None;
        }
        let step = ((b.0 - a.0) / dist as f32, (b.1 - a.1) / dist as f32);
        (0..dist).find_map(|i| {
            let x = (a.0 + i as f32 * step.0).round();
            let y = (a.1 + i as f32 * step.1).round();
            self.image.try_get(x as i32, y as i32)?.then(|| ResultPoint::new(x, y))
        })
    }

    pub fn detect(&self) -> ScanResult<[ResultPoint; 4]> {
        let (w, h) = (self.image.width() as i32, self.image.height() as i32);
        let (mut left, mut right, mut up, mut down) = (self.left, self.right, self.up, self.down);
        let mut found = [false; 4];
        let mut black_on_border = true;

        while black_on_border {
            black_on_border = false;

            let mut not_white = true;
            while (not_white || !found[0]) && right < w {
                not_white = self.contains_black(up, down, right, false);
                if not_white {
                    black_on_border = true;
                    found[0] = true;
                }
                if not_white || !found[0] {
                    right += 1;
                }
            }
            if right >= w {
                return Err(ScanError::NotFound);
            }

            let mut not_white = true;
            while (not_white || !found[1]) && down < h {
                not_white = self.contains_black(left, right, down, true);
                if not_white {
                    black_on_border = true;
                    found[1] = true;
                }
                if not_white || !found[1] {
                    down += 1;
                }
            }
            if down >= h {
                return Err(ScanError::NotFound);
            }

            let mut not_white = true;
            while (not_white || !found[2]) && left >= 0 {
                not_white = self.contains_black(up, down, left, false);
                if not_white {
                    black_on_border = true;
                    found[2] = true;
                }
                if not_white || !found[2] {
                    left -= 1;
                }
            }
            if left < 0 {
                return Err(ScanError::NotFound);
            }

            let mut not_white = true;
            while (not_white || !found[3]) && up >= 0 {
                not_white = self.contains_black(left, right, up, true);
                if not_white {
                    black_on_border = true;
                    found[3] = true;
                }
                if not_white || !found[3] {
                    up -= 1;
                }
            }
            if up < 0 {
                return Err(ScanError::NotFound);
            }
        }

        let max = right - left;
        let (l, r, u, d) = (left as f32, right as f32, up as f32, down as f32);
        let search = |from: &dyn Fn(f32) -> ((f32, f32), (f32, f32))| {
            (1..max).find_map(|i| {
                let (a, b) = from(i as f32);
                self.black_on_segment(a, b)
            })
        };
        let z = search(&|i| ((l, d - i), (l + i, d))).ok_or(ScanError::NotFound)?;
        let t = search(&|i| ((l, u + i), (l + i, u))).ok_or(ScanError::NotFound)?;
        let x = search(&|i| ((r, u + i), (r - i, u))).ok_or(ScanError::NotFound)?;
        let y = search(&|i| ((r, d - i), (r - i, d))).ok_or(ScanError::NotFound)?;
        Ok(self.center_edges(y, z, x, t))
    }

    fn center_edges(&self, y: ResultPoint, z: ResultPoint, x: ResultPoint, t: ResultPoint) -> [ResultPoint; 4] {
        //      t            t
        //  z                      x
        //        x    OR    z
        //   y                    y
        let p = ResultPoint::new;
        if y.x < self.image.width() as f32 / 2.0 {
            [p(t.x - CORR, t.y + CORR), p(z.x + CORR, z.y + CORR), p(x.x - CORR, x.y - CORR), p(y.x + CORR, y.y - CORR)]
        } else {
            [p(t.x + CORR, t.y + CORR), p(z.x + CORR, z.y - CORR), p(x.x - CORR, x.y + CORR), p(y.x - CORR, y.y - CORR)]
        }
    }
}

// Bullseye detector
//------------------------------------------------------------------------------

// Orientation marks read clockwise from each corner, for each of the four rotations
const EXPECTED_CORNER_BITS: [u32; 4] = [0xee0, 0x1dc, 0x83b, 0x707];

struct Bullseye {
    corners: [ResultPoint; 4],
    compact: bool,
    center_layers: usize,
}

pub struct Detector<'a> {
    image: &'a BitMatrix,
}

impl<'a> Detector<'a> {
    pub fn new(image: &'a BitMatrix) -> Self {
        Self { image }
    }

    pub fn detect(&self, mirrored: bool) -> ScanResult<AztecDetectorResult> {
        let center = self.matrix_center()?;
        let mut eye = self.bullseye_corners(center)?;
        if mirrored {
            eye.corners.swap(0, 2);
        }

        let (shift, layers, data_blocks) = self.extract_parameters(&eye)?;
        let dim = matrix_size(eye.compact, layers);
        let c = |i: usize| eye.corners[(shift + i) % 4];
        let ordered = [c(0), c(1), c(2), c(3)];
        let bits = self.sample(dim, eye.center_layers, ordered)?;
        let points = expand_square(ordered, 2 * eye.center_layers, dim).to_vec();
        debug!("Aztec bullseye at {center:?}: compact {}, layers {layers}, {data_blocks} data blocks", eye.compact);
        Ok(AztecDetectorResult { bits, points, compact: eye.compact, data_blocks, layers })
    }

    fn is_valid(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.image.width() as i32 && y < self.image.height() as i32
    }

    fn is_valid_point(&self, p: ResultPoint) -> bool {
        self.is_valid(p.x.round() as i32, p.y.round() as i32)
    }

    fn get(&self, x: i32, y: i32) -> bool {
        self.image.try_get(x, y).unwrap_or(false)
    }

    // Slides diagonally while the color holds, then settles along each axis
    fn first_different(&self, init: Point, color: bool, dx: i32, dy: i32) -> Point {
        let (mut x, mut y) = (init.x + dx, init.y + dy);
        while self.is_valid(x, y) && self.get(x, y) == color {
            x += dx;
            y += dy;
        }
        x -= dx;
        y -= dy;
        while self.is_valid(x, y) && self.get(x, y) == color {
            x += dx;
        }
        x -= dx;
        while self.is_valid(x, y) && self.get(x, y) == color {
            y += dy;
        }
        y -= dy;
        Point::new(x, y)
    }

    fn corner_fallback(&self, cx: i32, cy: i32) -> [ResultPoint; 4] {
        [
            self.first_different(Point::new(cx + 7, cy - 7), false, 1, -1).to_result(),
            self.first_different(Point::new(cx + 7, cy + 7), false, 1, 1).to_result(),
            self.first_different(Point::new(cx - 7, cy + 7), false, -1, 1).to_result(),
            self.first_different(Point::new(cx - 7, cy - 7), false, -1, -1).to_result(),
        ]
    }

    fn average(points: &[ResultPoint; 4]) -> Point {
        let x = points.iter().map(|p| p.x).sum::<f32>() / 4.0;
        let y = points.iter().map(|p| p.y).sum::<f32>() / 4.0;
        Point::new(x.round() as i32, y.round() as i32)
    }

    // Rough symbol center: the middle of the white-bounded black region around the
    // image center, refined once from that estimate.
    fn matrix_center(&self) -> ScanResult<Point> {
        let (w, h) = (self.image.width() as i32, self.image.height() as i32);
        let first = WhiteRectangleDetector::new(self.image)
            .and_then(|d| d.detect())
            .unwrap_or_else(|_| self.corner_fallback(w / 2, h / 2));
        let c = Self::average(&first);

        let second = WhiteRectangleDetector::with_seed(self.image, 15, c.x, c.y)
            .and_then(|d| d.detect())
            .unwrap_or_else(|_| self.corner_fallback(c.x, c.y));
        let c = Self::average(&second);
        if !self.is_valid(c.x, c.y) {
            return Err(ScanError::NotFound);
        }
        Ok(self.bullseye_center(c).unwrap_or(c))
    }

    // Runs of equal color along a row or column as (color, start, length)
    fn runs(&self, fixed: i32, horizontal: bool) -> Vec<(bool, i32, i32)> {
        let len = (if horizontal { self.image.width() } else { self.image.height() }) as i32;
        let at = |i: i32| if horizontal { self.get(i, fixed) } else { self.get(fixed, i) };
        let mut runs: Vec<(bool, i32, i32)> = vec![];
        for i in 0..len {
            let color = at(i);
            match runs.last_mut() {
                Some(last) if last.0 == color => last.2 += 1,
                _ => runs.push((color, i, 1)),
            }
        }
        runs
    }

    // Middle of the center module in a white-black-white-black-white-black-white
    // stretch of equal runs, within a few modules of `near`
    fn ring_center(runs: &[(bool, i32, i32)], near: i32) -> Option<i32> {
        runs.windows(7)
            .filter(|w| !w[0].0)
            .filter_map(|w| {
                let module = w.iter().map(|r| r.2).sum::<i32>() as f32 / 7.0;
                let uniform = w.iter().all(|r| (r.2 as f32 - module).abs() < module / 2.0);
                let center = w[3].1 + w[3].2 / 2;
                (uniform && ((center - near).abs() as f32) < 4.0 * module).then_some(center)
            })
            .min_by_key(|&c| (c - near).abs())
    }

    // Snaps a rough center onto the middle module of the bullseye by scanning rows
    // outwards from it for the ring pattern, confirmed along the column.
    fn bullseye_center(&self, rough: Point) -> Option<Point> {
        let limit = self.image.width().min(self.image.height()) as i32 / 4;
        for d in 0..limit {
            let rows = if d == 0 { vec![rough.y] } else { vec![rough.y - d, rough.y + d] };
            for y in rows {
                if !self.is_valid(rough.x, y) {
                    continue;
                }
                let Some(x) = Self::ring_center(&self.runs(y, true), rough.x) else {
                    continue;
                };
                if let Some(cy) = Self::ring_center(&self.runs(x, false), y) {
                    return Some(Point::new(x, cy));
                }
            }
        }
        None
    }

    // Share of samples along a segment that match its start decides its color:
    // 1 mostly black, -1 mostly white, 0 mixed
    fn segment_color(&self, p1: Point, p2: Point) -> i32 {
        let d = p1.distance(p2);
        if d == 0.0 {
            return 0;
        }
        let (dx, dy) = ((p2.x - p1.x) as f32 / d, (p2.y - p1.y) as f32 / d);
        let (mut px, mut py) = (p1.x as f32, p1.y as f32);
        let model = self.get(p1.x, p1.y);
        let mut error = 0;
        for _ in 0..d.floor() as i32 {
            if self.get(px.round() as i32, py.round() as i32) != model {
                error += 1;
            }
            px += dx;
            py += dy;
        }
        let ratio = error as f32 / d;
        if ratio > 0.1 && ratio < 0.9 {
            return 0;
        }
        if (ratio <= 0.1) == model {
            1
        } else {
            -1
        }
    }

    fn is_uniform_ring(&self, a: Point, b: Point, c: Point, d: Point) -> bool {
        let corr = 3;
        let (w, h) = (self.image.width() as i32 - 1, self.image.height() as i32 - 1);
        let a = Point::new((a.x - corr).max(0), (a.y + corr).min(h));
        let b = Point::new((b.x - corr).max(0), (b.y - corr).max(0));
        let c = Point::new((c.x + corr).min(w), (c.y - corr).clamp(0, h));
        let d = Point::new((d.x + corr).min(w), (d.y + corr).min(h));
        let init = self.segment_color(d, a);
        init != 0
            && self.segment_color(a, b) == init
            && self.segment_color(b, c) == init
            && self.segment_color(c, d) == init
    }

    fn bullseye_corners(&self, center: Point) -> ScanResult<Bullseye> {
        let (mut a, mut b, mut c, mut d) = (center, center, center, center);
        let mut color = true;
        let mut layers = 1;
        while layers < 9 {
            let oa = self.first_different(a, color, 1, -1);
            let ob = self.first_different(b, color, 1, 1);
            let oc = self.first_different(c, color, -1, 1);
            let od = self.first_different(d, color, -1, -1);
            if layers > 2 {
                let q = od.distance(oa) * layers as f32 / (d.distance(a) * (layers + 2) as f32);
                if !(0.75..=1.25).contains(&q) || !self.is_uniform_ring(oa, ob, oc, od) {
                    break;
                }
            }
            (a, b, c, d) = (oa, ob, oc, od);
            color = !color;
            layers += 1;
        }
        if layers != 5 && layers != 7 {
            trace!("Bullseye ring count {layers}");
            return Err(ScanError::NotFound);
        }

        // Onto the border between the last white and black rings
        let inner = [
            ResultPoint::new(a.x as f32 + 0.5, a.y as f32 - 0.5),
            ResultPoint::new(b.x as f32 + 0.5, b.y as f32 + 0.5),
            ResultPoint::new(c.x as f32 - 0.5, c.y as f32 + 0.5),
            ResultPoint::new(d.x as f32 - 0.5, d.y as f32 - 0.5),
        ];
        let corners = expand_square(inner, 2 * layers - 3, 2 * layers);
        Ok(Bullseye { corners, compact: layers == 5, center_layers: layers })
    }

    fn sample_line(&self, p1: ResultPoint, p2: ResultPoint, size: usize) -> u32 {
        let d = p1.distance(p2);
        let module = d / size as f32;
        let (dx, dy) = (module * (p2.x - p1.x) / d, module * (p2.y - p1.y) / d);
        (0..size).fold(0, |acc, i| {
            let x = (p1.x + i as f32 * dx).round() as i32;
            let y = (p1.y + i as f32 * dy).round() as i32;
            (acc << 1) | self.get(x, y) as u32
        })
    }

    // Reads orientation and mode message off the ring around the bullseye. Returns the
    // index of the corner that goes top left, the layer count and the data block count.
    fn extract_parameters(&self, eye: &Bullseye) -> ScanResult<(usize, usize, usize)> {
        if !eye.corners.iter().all(|&p| self.is_valid_point(p)) {
            return Err(ScanError::NotFound);
        }
        let length = 2 * eye.center_layers;
        let sides: Vec<u32> = (0..4).map(|i| self.sample_line(eye.corners[i], eye.corners[(i + 1) % 4], length)).collect();
        let shift = rotation(&sides, length)?;

        let mut data: u64 = 0;
        for i in 0..4 {
            let side = sides[(shift + i) % 4] as u64;
            if eye.compact {
                // ..XXXXXXX.
                data = (data << 7) + ((side >> 1) & 0x7F);
            } else {
                // ..XXXXX.XXXXX.
                data = (data << 10) + ((side >> 2) & (0x1F << 5)) + ((side >> 1) & 0x1F);
            }
        }
        let params = corrected_parameter_data(data, eye.compact)?;
        let (layers, blocks) = if eye.compact {
            ((params >> 6) + 1, (params & 0x3F) + 1)
        } else {
            ((params >> 11) + 1, (params & 0x7FF) + 1)
        };
        Ok((shift, layers as usize, blocks as usize))
    }

    fn sample(&self, dim: usize, center_layers: usize, corners: [ResultPoint; 4]) -> ScanResult<BitMatrix> {
        let low = dim as f64 / 2.0 - center_layers as f64;
        let high = dim as f64 / 2.0 + center_layers as f64;
        let src = [(low, low), (high, low), (high, high), (low, high)];
        let h = Homography::compute(src, corners.map(|p| (p.x as f64, p.y as f64)))?;
        sample_grid(self.image, dim, dim, &h)
    }
}

fn rotation(sides: &[u32], length: usize) -> ScanResult<usize> {
    // Two marks at the start of each side and one at its end, starting at corner A
    let mut bits = 0u32;
    for &side in sides {
        let t = ((side >> (length - 2)) << 1) + (side & 1);
        bits = (bits << 3) + t;
    }
    bits = ((bits & 1) << 11) + (bits >> 1);
    (0..4).find(|&s| (bits ^ EXPECTED_CORNER_BITS[s]).count_ones() <= 2).ok_or(ScanError::NotFound)
}

fn corrected_parameter_data(mut data: u64, compact: bool) -> ScanResult<u32> {
    let (num_codewords, num_data) = if compact { (7, 2) } else { (10, 4) };
    let mut words = vec![0u16; num_codewords];
    for w in words.iter_mut().rev() {
        *w = (data & 0xF) as u16;
        data >>= 4;
    }
    ReedSolomonDecoder::new(codeword_field(4)?)
        .decode(&mut words, num_codewords - num_data, &[])
        .map_err(|_| ScanError::NotFound)?;
    Ok(words[..num_data].iter().fold(0, |acc, &w| (acc << 4) + w as u32))
}

// Scales the square through `corners` from side `old_side` to `new_side` about its
// center.
fn expand_square(corners: [ResultPoint; 4], old_side: usize, new_side: usize) -> [ResultPoint; 4] {
    let ratio = new_side as f32 / (2.0 * old_side as f32);
    let expand = |p: ResultPoint, q: ResultPoint| {
        let (dx, dy) = (p.x - q.x, p.y - q.y);
        let (cx, cy) = ((p.x + q.x) / 2.0, (p.y + q.y) / 2.0);
        (ResultPoint::new(cx + ratio * dx, cy + ratio * dy), ResultPoint::new(cx - ratio * dx, cy - ratio * dy))
    };
    let (r0, r2) = expand(corners[0], corners[2]);
    let (r1, r3) = expand(corners[1], corners[3]);
    [r0, r1, r2, r3]
}
