use log::{debug, trace};

use super::Version;
use crate::common::{sample_grid, BitMatrix, DetectorResult, Homography, ResultPoint, ScanError, ScanResult};

// Finder pattern
//------------------------------------------------------------------------------

/// Center of a 1:1:3:1:1 finder or 1:1:1 alignment pattern with its estimated module size
/// and the number of scans that confirmed it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinderPattern {
    pub x: f32,
    pub y: f32,
    pub module_size: f32,
    pub count: usize,
}

impl FinderPattern {
    fn new(x: f32, y: f32, module_size: f32) -> Self {
        Self { x, y, module_size, count: 1 }
    }

    pub fn point(&self) -> ResultPoint {
        ResultPoint::new(self.x, self.y)
    }

    fn about_equals(&self, module_size: f32, i: f32, j: f32) -> bool {
        if (i - self.y).abs() <= module_size && (j - self.x).abs() <= module_size {
            let diff = (module_size - self.module_size).abs();
            return diff <= 1.0 || diff <= self.module_size;
        }
        false
    }

    fn combine_estimate(&self, i: f32, j: f32, module_size: f32) -> Self {
        let n = self.count as f32;
        let c = n + 1.0;
        Self {
            x: (n * self.x + j) / c,
            y: (n * self.y + i) / c,
            module_size: (n * self.module_size + module_size) / c,
            count: self.count + 1,
        }
    }
}

fn squared_distance(a: &FinderPattern, b: &FinderPattern) -> f64 {
    let (dx, dy) = ((a.x - b.x) as f64, (a.y - b.y) as f64);
    dx * dx + dy * dy
}

// Orders three patterns as `[bottom_left, top_left, top_right]`.
fn order_patterns(p: [FinderPattern; 3]) -> [FinderPattern; 3] {
    let ordered = ResultPoint::order_best_patterns(p.map(|f| f.point()));
    ordered.map(|pt| p.iter().copied().find(|f| f.point() == pt).unwrap_or(p[0]))
}

// Finder pattern finder
//------------------------------------------------------------------------------

const CENTER_QUORUM: usize = 2;
const MIN_SKIP: usize = 3;
const MAX_MODULES: usize = 97;

fn found_pattern_cross(state: &[usize; 5]) -> bool {
    let total: usize = state.iter().sum();
    if state.contains(&0) || total < 7 {
        return false;
    }
    let module_size = total as f32 / 7.0;
    let max_variance = module_size / 2.0;
    check_ratios(state, module_size, max_variance)
}

fn found_pattern_diagonal(state: &[usize; 5]) -> bool {
    let total: usize = state.iter().sum();
    if state.contains(&0) || total < 7 {
        return false;
    }
    let module_size = total as f32 / 7.0;
    let max_variance = module_size / 1.333;
    check_ratios(state, module_size, max_variance)
}

fn check_ratios(state: &[usize; 5], ms: f32, var: f32) -> bool {
    let s = state.map(|v| v as f32);
    (ms - s[0]).abs() < var
        && (ms - s[1]).abs() < var
        && (3.0 * ms - s[2]).abs() < 3.0 * var
        && (ms - s[3]).abs() < var
        && (ms - s[4]).abs() < var
}

fn center_from_end(state: &[usize; 5], end: usize) -> f32 {
    (end - state[4] - state[3]) as f32 - state[2] as f32 / 2.0
}

fn shift_counts2(state: &mut [usize; 5]) {
    state[0] = state[2];
    state[1] = state[3];
    state[2] = state[4];
    state[3] = 1;
    state[4] = 0;
}

pub struct FinderPatternFinder<'a> {
    image: &'a BitMatrix,
    possible_centers: Vec<FinderPattern>,
    has_skipped: bool,
}

impl<'a> FinderPatternFinder<'a> {
    pub fn new(image: &'a BitMatrix) -> Self {
        Self { image, possible_centers: vec![], has_skipped: false }
    }

    // Scans rows for finder candidates. In `multi` mode every row step is scanned and no
    // early exit is taken, so patterns of several symbols accumulate.
    fn scan(&mut self, try_harder: bool, multi: bool) {
        let (max_i, max_j) = (self.image.height(), self.image.width());
        let mut i_skip = (3 * max_i) / (4 * MAX_MODULES);
        if i_skip < MIN_SKIP || try_harder {
            i_skip = MIN_SKIP;
        }

        let mut done = false;
        let mut state = [0usize; 5];
        let mut i = i_skip - 1;
        while i < max_i && !done {
            state = [0; 5];
            let mut cur = 0;
            let mut j = 0;
            while j < max_j {
                if self.image.get(j, i) {
                    if cur & 1 == 1 {
                        cur += 1;
                    }
                    state[cur] += 1;
                } else if cur & 1 == 0 {
                    if cur == 4 {
                        if found_pattern_cross(&state) {
                            if self.handle_possible_center(&state, i, j) {
                                i_skip = 2;
                                if multi {
                                    // keep scanning the row
                                } else if self.has_skipped {
                                    done = self.have_multiply_confirmed_centers();
                                } else {
                                    let row_skip = self.find_row_skip();
                                    if row_skip > state[2] {
                                        i += row_skip - state[2];
                                        i = i.saturating_sub(i_skip);
                                        j = max_j - 1;
                                    }
                                }
                            } else {
                                shift_counts2(&mut state);
                                cur = 3;
                                j += 1;
                                continue;
                            }
                            state = [0; 5];
                            cur = 0;
                        } else {
                            shift_counts2(&mut state);
                            cur = 3;
                        }
                    } else {
                        cur += 1;
                        state[cur] += 1;
                    }
                } else {
                    state[cur] += 1;
                }
                j += 1;
            }
            if found_pattern_cross(&state) && self.handle_possible_center(&state, i, max_j) {
                i_skip = state[0];
                if !multi && self.has_skipped {
                    done = self.have_multiply_confirmed_centers();
                }
            }
            i += i_skip.max(1);
        }
        debug!("QR finder scan: {} candidate centers", self.possible_centers.len());
    }

    fn handle_possible_center(&mut self, state: &[usize; 5], i: usize, j: usize) -> bool {
        let total: usize = state.iter().sum();
        let center_j = center_from_end(state, j);
        let Some(center_i) = self.cross_check_vertical(i, center_j as usize, state[2], total) else {
            return false;
        };
        let Some(center_j) = self.cross_check_horizontal(center_j as usize, center_i as usize, state[2], total) else {
            return false;
        };
        if !self.cross_check_diagonal(center_i as usize, center_j as usize) {
            return false;
        }
        let module_size = total as f32 / 7.0;
        match self.possible_centers.iter_mut().find(|c| c.about_equals(module_size, center_i, center_j)) {
            Some(c) => *c = c.combine_estimate(center_i, center_j, module_size),
            None => self.possible_centers.push(FinderPattern::new(center_j, center_i, module_size)),
        }
        true
    }

    fn cross_check_vertical(&self, start_i: usize, center_j: usize, max_count: usize, orig_total: usize) -> Option<f32> {
        let img = self.image;
        let max_i = img.height() as i64;
        let mut state = [0usize; 5];
        let get = |i: i64| img.get(center_j, i as usize);

        let mut i = start_i as i64;
        while i >= 0 && get(i) {
            state[2] += 1;
            i -= 1;
        }
        if i < 0 {
            return None;
        }
        while i >= 0 && !get(i) && state[1] <= max_count {
            state[1] += 1;
            i -= 1;
        }
        if i < 0 || state[1] > max_count {
            return None;
        }
        while i >= 0 && get(i) && state[0] <= max_count {
            state[0] += 1;
            i -= 1;
        }
        if state[0] > max_count {
            return None;
        }

        let mut i = start_i as i64 + 1;
        while i < max_i && get(i) {
            state[2] += 1;
            i += 1;
        }
        if i == max_i {
            return None;
        }
        while i < max_i && !get(i) && state[3] < max_count {
            state[3] += 1;
            i += 1;
        }
        if i == max_i || state[3] >= max_count {
            return None;
        }
        while i < max_i && get(i) && state[4] < max_count {
            state[4] += 1;
            i += 1;
        }
        if state[4] >= max_count {
            return None;
        }

        let total: usize = state.iter().sum();
        if 5 * total.abs_diff(orig_total) >= 2 * orig_total {
            return None;
        }
        found_pattern_cross(&state).then(|| center_from_end(&state, i as usize))
    }

    fn cross_check_horizontal(&self, start_j: usize, center_i: usize, max_count: usize, orig_total: usize) -> Option<f32> {
        let img = self.image;
        let max_j = img.width() as i64;
        let mut state = [0usize; 5];
        let get = |j: i64| img.get(j as usize, center_i);

        let mut j = start_j as i64;
        while j >= 0 && get(j) {
            state[2] += 1;
            j -= 1;
        }
        if j < 0 {
            return None;
        }
        while j >= 0 && !get(j) && state[1] <= max_count {
            state[1] += 1;
            j -= 1;
        }
        if j < 0 || state[1] > max_count {
            return None;
        }
        while j >= 0 && get(j) && state[0] <= max_count {
            state[0] += 1;
            j -= 1;
        }
        if state[0] > max_count {
            return None;
        }

        let mut j = start_j as i64 + 1;
        while j < max_j && get(j) {
            state[2] += 1;
            j += 1;
        }
        if j == max_j {
            return None;
        }
        while j < max_j && !get(j) && state[3] < max_count {
            state[3] += 1;
            j += 1;
        }
        if j == max_j || state[3] >= max_count {
            return None;
        }
        while j < max_j && get(j) && state[4] < max_count {
            state[4] += 1;
            j += 1;
        }
        if state[4] >= max_count {
            return None;
        }

        let total: usize = state.iter().sum();
        if 5 * total.abs_diff(orig_total) >= orig_total {
            return None;
        }
        found_pattern_cross(&state).then(|| center_from_end(&state, j as usize))
    }

    fn cross_check_diagonal(&self, center_i: usize, center_j: usize) -> bool {
        let img = self.image;
        let mut state = [0usize; 5];

        let mut i = 0;
        let up = |i: usize| img.get(center_j - i, center_i - i);
        while center_i >= i && center_j >= i && up(i) {
            state[2] += 1;
            i += 1;
        }
        if state[2] == 0 {
            return false;
        }
        while center_i >= i && center_j >= i && !up(i) {
            state[1] += 1;
            i += 1;
        }
        if state[1] == 0 {
            return false;
        }
        while center_i >= i && center_j >= i && up(i) {
            state[0] += 1;
            i += 1;
        }
        if state[0] == 0 {
            return false;
        }

        let (max_i, max_j) = (img.height(), img.width());
        let inside = |i: usize| center_i + i < max_i && center_j + i < max_j;
        let down = |i: usize| img.get(center_j + i, center_i + i);
        let mut i = 1;
        while inside(i) && down(i) {
            state[2] += 1;
            i += 1;
        }
        while inside(i) && !down(i) {
            state[3] += 1;
            i += 1;
        }
        if state[3] == 0 {
            return false;
        }
        while inside(i) && down(i) {
            state[4] += 1;
            i += 1;
        }
        if state[4] == 0 {
            return false;
        }
        found_pattern_diagonal(&state)
    }

    fn find_row_skip(&mut self) -> usize {
        if self.possible_centers.len() <= 1 {
            return 0;
        }
        let mut first: Option<FinderPattern> = None;
        for c in &self.possible_centers {
            if c.count < CENTER_QUORUM {
                continue;
            }
            match first {
                None => first = Some(*c),
                Some(f) => {
                    self.has_skipped = true;
                    let skip = ((f.x - c.x).abs() - (f.y - c.y).abs()) / 2.0;
                    return skip.max(0.0) as usize;
                }
            }
        }
        0
    }

    fn have_multiply_confirmed_centers(&self) -> bool {
        let confirmed: Vec<_> = self.possible_centers.iter().filter(|c| c.count >= CENTER_QUORUM).collect();
        if confirmed.len() < 3 {
            return false;
        }
        let total: f32 = confirmed.iter().map(|c| c.module_size).sum();
        let average = total / self.possible_centers.len() as f32;
        let deviation: f32 = self.possible_centers.iter().map(|c| (c.module_size - average).abs()).sum();
        deviation <= 0.05 * total
    }

    // Confirmed centers when there are enough of them, every candidate otherwise
    fn candidates(&self) -> Vec<FinderPattern> {
        let confirmed: Vec<_> = self.possible_centers.iter().copied().filter(|c| c.count >= CENTER_QUORUM).collect();
        let mut res = if confirmed.len() >= 3 { confirmed } else { self.possible_centers.clone() };
        res.sort_by(|a, b| a.module_size.total_cmp(&b.module_size));
        res
    }

    pub fn find(&mut self, try_harder: bool) -> ScanResult<[FinderPattern; 3]> {
        self.scan(try_harder, false);
        let cands = self.candidates();
        if cands.len() < 3 {
            return Err(ScanError::NotFound);
        }

        let mut distortion = f64::MAX;
        let mut best = None;
        for i in 0..cands.len() - 2 {
            let min_module_size = cands[i].module_size;
            for j in i + 1..cands.len() - 1 {
                let sq0 = squared_distance(&cands[i], &cands[j]);
                for k in j + 1..cands.len() {
                    if cands[k].module_size > min_module_size * 1.4 {
                        continue;
                    }
                    let mut d = [sq0, squared_distance(&cands[j], &cands[k]), squared_distance(&cands[i], &cands[k])];
                    d.sort_by(f64::total_cmp);
                    // Right isosceles: a == b and a + b == c
                    let dist = (d[2] - 2.0 * d[1]).abs() + (d[2] - 2.0 * d[0]).abs();
                    if dist < distortion {
                        distortion = dist;
                        best = Some([cands[i], cands[j], cands[k]]);
                    }
                }
            }
        }
        best.map(order_patterns).ok_or(ScanError::NotFound)
    }

    pub fn find_multi(&mut self, try_harder: bool) -> ScanResult<Vec<[FinderPattern; 3]>> {
        const DIFF_MODSIZE_CUTOFF_PERCENT: f32 = 0.05;
        const DIFF_MODSIZE_CUTOFF: f32 = 0.5;
        const MAX_MODULE_COUNT_PER_EDGE: f32 = 180.0;
        const MIN_MODULE_COUNT_PER_EDGE: f32 = 9.0;

        self.scan(try_harder, true);
        let mut cands = self.candidates();
        if cands.len() < 3 {
            return Err(ScanError::NotFound);
        }
        cands.reverse();

        let size_break = |a: &FinderPattern, b: &FinderPattern| {
            let diff = (a.module_size - b.module_size).abs();
            diff > DIFF_MODSIZE_CUTOFF && diff / a.module_size.min(b.module_size) >= DIFF_MODSIZE_CUTOFF_PERCENT
        };

        let mut res = vec![];
        for i1 in 0..cands.len() - 2 {
            for i2 in i1 + 1..cands.len() - 1 {
                if size_break(&cands[i1], &cands[i2]) {
                    break;
                }
                for i3 in i2 + 1..cands.len() {
                    if size_break(&cands[i2], &cands[i3]) {
                        break;
                    }
                    let [bl, tl, tr] = order_patterns([cands[i1], cands[i2], cands[i3]]);
                    let d_a = tl.point().distance(bl.point());
                    let d_c = tr.point().distance(bl.point());
                    let d_b = tl.point().distance(tr.point());

                    let modules = (d_a + d_b) / (cands[i1].module_size * 2.0);
                    if !(MIN_MODULE_COUNT_PER_EDGE..=MAX_MODULE_COUNT_PER_EDGE).contains(&modules) {
                        continue;
                    }
                    if ((d_a - d_b) / d_a.min(d_b)).abs() >= 0.1 {
                        continue;
                    }
                    let d_c_pyth = (d_a * d_a + d_b * d_b).sqrt();
                    if ((d_c - d_c_pyth) / d_c.min(d_c_pyth)).abs() >= 0.1 {
                        continue;
                    }
                    res.push([bl, tl, tr]);
                }
            }
        }
        debug!("QR multi finder: {} plausible triples", res.len());
        if res.is_empty() {
            return Err(ScanError::NotFound);
        }
        Ok(res)
    }
}

// Alignment pattern finder
//------------------------------------------------------------------------------

struct AlignmentPatternFinder<'a> {
    image: &'a BitMatrix,
    start_x: usize,
    start_y: usize,
    width: usize,
    height: usize,
    module_size: f32,
    possible_centers: Vec<FinderPattern>,
}

impl AlignmentPatternFinder<'_> {
    fn found_pattern_cross(&self, state: &[usize; 3]) -> bool {
        let max_variance = self.module_size / 2.0;
        state.iter().all(|&s| (self.module_size - s as f32).abs() < max_variance)
    }

    fn center_from_end(state: &[usize; 3], end: usize) -> f32 {
        (end - state[2]) as f32 - state[1] as f32 / 2.0
    }

    fn find(&mut self) -> ScanResult<FinderPattern> {
        let max_j = self.start_x + self.width;
        let middle_i = self.start_y + self.height / 2;
        for i_gen in 0..self.height {
            let offset = (i_gen + 1) / 2;
            let i = if i_gen & 1 == 0 { middle_i + offset } else { middle_i.wrapping_sub(offset) };
            if i >= self.image.height() {
                continue;
            }
            let mut state = [0usize; 3];
            let mut j = self.start_x;
            while j < max_j && !self.image.get(j, i) {
                j += 1;
            }
            let mut cur = 0;
            while j < max_j {
                if self.image.get(j, i) {
                    if cur == 1 {
                        state[1] += 1;
                    } else if cur == 2 {
                        if self.found_pattern_cross(&state) {
                            if let Some(c) = self.handle_possible_center(&state, i, j) {
                                return Ok(c);
                            }
                        }
                        state = [state[2], 1, 0];
                        cur = 1;
                    } else {
                        cur += 1;
                        state[cur] += 1;
                    }
                } else {
                    if cur == 1 {
                        cur += 1;
                    }
                    state[cur] += 1;
                }
                j += 1;
            }
            if self.found_pattern_cross(&state) {
                if let Some(c) = self.handle_possible_center(&state, i, max_j) {
                    return Ok(c);
                }
            }
        }
        self.possible_centers.first().copied().ok_or(ScanError::NotFound)
    }

    fn handle_possible_center(&mut self, state: &[usize; 3], i: usize, j: usize) -> Option<FinderPattern> {
        let total: usize = state.iter().sum();
        let center_j = Self::center_from_end(state, j);
        let center_i = self.cross_check_vertical(i, center_j as usize, 2 * state[1], total)?;
        let module_size = total as f32 / 3.0;
        for c in &self.possible_centers {
            if c.about_equals(module_size, center_i, center_j) {
                return Some(FinderPattern {
                    x: (c.x + center_j) / 2.0,
                    y: (c.y + center_i) / 2.0,
                    module_size: (c.module_size + module_size) / 2.0,
                    count: c.count + 1,
                });
            }
        }
        self.possible_centers.push(FinderPattern::new(center_j, center_i, module_size));
        None
    }

    fn cross_check_vertical(&self, start_i: usize, center_j: usize, max_count: usize, orig_total: usize) -> Option<f32> {
        let img = self.image;
        let max_i = img.height() as i64;
        let get = |i: i64| img.get(center_j, i as usize);
        let mut state = [0usize; 3];

        let mut i = start_i as i64;
        while i >= 0 && get(i) && state[1] <= max_count {
            state[1] += 1;
            i -= 1;
        }
        if i < 0 || state[1] > max_count {
            return None;
        }
        while i >= 0 && !get(i) && state[0] <= max_count {
            state[0] += 1;
            i -= 1;
        }
        if state[0] > max_count {
            return None;
        }

        let mut i = start_i as i64 + 1;
        while i < max_i && get(i) && state[1] <= max_count {
            state[1] += 1;
            i += 1;
        }
        if i == max_i || state[1] > max_count {
            return None;
        }
        while i < max_i && !get(i) && state[2] <= max_count {
            state[2] += 1;
            i += 1;
        }
        if state[2] > max_count {
            return None;
        }

        let total: usize = state.iter().sum();
        if 5 * total.abs_diff(orig_total) >= 2 * orig_total {
            return None;
        }
        self.found_pattern_cross(&state).then(|| Self::center_from_end(&state, i as usize))
    }
}

// Detector
//------------------------------------------------------------------------------

pub struct Detector<'a> {
    image: &'a BitMatrix,
}

impl<'a> Detector<'a> {
    pub fn new(image: &'a BitMatrix) -> Self {
        Self { image }
    }

    pub fn detect(&self, try_harder: bool) -> ScanResult<DetectorResult> {
        let patterns = FinderPatternFinder::new(self.image).find(try_harder)?;
        self.process_finder_patterns(patterns)
    }

    pub fn process_finder_patterns(&self, [bl, tl, tr]: [FinderPattern; 3]) -> ScanResult<DetectorResult> {
        let module_size = self.calculate_module_size(&tl, &tr, &bl);
        if module_size < 1.0 {
            return Err(ScanError::NotFound);
        }
        let dimension = compute_dimension(&tl, &tr, &bl, module_size)?;
        let provisional = Version::from_dimension(dimension).map_err(|_| ScanError::NotFound)?;
        let modules_between = (provisional.width() - 7) as f32;

        let mut alignment = None;
        if !provisional.alignment_pattern_positions().is_empty() {
            let br_x = tr.x - tl.x + bl.x;
            let br_y = tr.y - tl.y + bl.y;
            let correction = 1.0 - 3.0 / modules_between;
            let est_x = (tl.x + correction * (br_x - tl.x)) as i64;
            let est_y = (tl.y + correction * (br_y - tl.y)) as i64;
            for allowance in [4.0, 8.0, 16.0] {
                if let Ok(ap) = self.find_alignment_in_region(module_size, est_x, est_y, allowance) {
                    alignment = Some(ap);
                    break;
                }
            }
        }
        trace!("QR dimension {dimension}, module size {module_size:.2}, alignment {}", alignment.is_some());

        let h = create_transform(&tl, &tr, &bl, alignment.as_ref(), dimension)?;
        let bits = sample_grid(self.image, dimension, dimension, &h)?;
        let mut points = vec![bl.point(), tl.point(), tr.point()];
        if let Some(ap) = alignment {
            points.push(ap.point());
        }
        Ok(DetectorResult::new(bits, points))
    }

    fn calculate_module_size(&self, tl: &FinderPattern, tr: &FinderPattern, bl: &FinderPattern) -> f32 {
        (self.module_size_one_way(tl, tr) + self.module_size_one_way(tl, bl)) / 2.0
    }

    fn module_size_one_way(&self, p: &FinderPattern, other: &FinderPattern) -> f32 {
        let est1 = self.black_white_black_run_both_ways(p.x as i64, p.y as i64, other.x as i64, other.y as i64);
        let est2 = self.black_white_black_run_both_ways(other.x as i64, other.y as i64, p.x as i64, p.y as i64);
        if est1.is_nan() {
            return est2 / 7.0;
        }
        if est2.is_nan() {
            return est1 / 7.0;
        }
        (est1 + est2) / 14.0
    }

    fn black_white_black_run_both_ways(&self, from_x: i64, from_y: i64, to_x: i64, to_y: i64) -> f32 {
        let (w, h) = (self.image.width() as i64, self.image.height() as i64);
        let mut result = self.black_white_black_run(from_x, from_y, to_x, to_y);

        let mut scale = 1.0f32;
        let mut other_x = from_x - (to_x - from_x);
        if other_x < 0 {
            scale = from_x as f32 / (from_x - other_x) as f32;
            other_x = 0;
        } else if other_x >= w {
            scale = (w - 1 - from_x) as f32 / (other_x - from_x) as f32;
            other_x = w - 1;
        }
        let mut other_y = (from_y as f32 - (to_y - from_y) as f32 * scale) as i64;

        scale = 1.0;
        if other_y < 0 {
            scale = from_y as f32 / (from_y - other_y) as f32;
            other_y = 0;
        } else if other_y >= h {
            scale = (h - 1 - from_y) as f32 / (other_y - from_y) as f32;
            other_y = h - 1;
        }
        other_x = (from_x as f32 + (other_x - from_x) as f32 * scale) as i64;

        result += self.black_white_black_run(from_x, from_y, other_x, other_y);
        result - 1.0
    }

    // Bresenham walk measuring a black-white-black run, NaN if it never completes
    fn black_white_black_run(&self, mut from_x: i64, mut from_y: i64, mut to_x: i64, mut to_y: i64) -> f32 {
        let steep = (to_y - from_y).abs() > (to_x - from_x).abs();
        if steep {
            std::mem::swap(&mut from_x, &mut from_y);
            std::mem::swap(&mut to_x, &mut to_y);
        }
        let dx = (to_x - from_x).abs();
        let dy = (to_y - from_y).abs();
        let mut error = -dx / 2;
        let xstep = if from_x < to_x { 1 } else { -1 };
        let ystep = if from_y < to_y { 1 } else { -1 };
        let dist = |x: i64, y: i64| (((x - from_x).pow(2) + (y - from_y).pow(2)) as f32).sqrt();

        let mut state = 0;
        let x_limit = to_x + xstep;
        let mut x = from_x;
        let mut y = from_y;
        while x != x_limit {
            let (real_x, real_y) = if steep { (y, x) } else { (x, y) };
            let black = self.image.try_get(real_x as i32, real_y as i32).unwrap_or(false);
            if (state == 1) == black {
                if state == 2 {
                    return dist(x, y);
                }
                state += 1;
            }
            error += dy;
            if error > 0 {
                if y == to_y {
                    break;
                }
                y += ystep;
                error -= dx;
            }
            x += xstep;
        }
        if state == 2 {
            return dist(to_x + xstep, to_y);
        }
        f32::NAN
    }

    fn find_alignment_in_region(&self, module_size: f32, est_x: i64, est_y: i64, factor: f32) -> ScanResult<FinderPattern> {
        let allowance = (factor * module_size) as i64;
        let (w, h) = (self.image.width() as i64, self.image.height() as i64);
        let left = (est_x - allowance).max(0);
        let right = (est_x + allowance).min(w - 1);
        if ((right - left) as f32) < module_size * 3.0 {
            return Err(ScanError::NotFound);
        }
        let top = (est_y - allowance).max(0);
        let bottom = (est_y + allowance).min(h - 1);
        if ((bottom - top) as f32) < module_size * 3.0 {
            return Err(ScanError::NotFound);
        }
        AlignmentPatternFinder {
            image: self.image,
            start_x: left as usize,
            start_y: top as usize,
            width: (right - left) as usize,
            height: (bottom - top) as usize,
            module_size,
            possible_centers: vec![],
        }
        .find()
    }
}

fn compute_dimension(tl: &FinderPattern, tr: &FinderPattern, bl: &FinderPattern, module_size: f32) -> ScanResult<usize> {
    let tltr = (tl.point().distance(tr.point()) / module_size).round() as usize;
    let tlbl = (tl.point().distance(bl.point()) / module_size).round() as usize;
    let dimension = (tltr + tlbl) / 2 + 7;
    match dimension & 3 {
        0 => Ok(dimension + 1),
        2 => Ok(dimension - 1),
        3 => Err(ScanError::NotFound),
        _ => Ok(dimension),
    }
}

fn create_transform(
    tl: &FinderPattern,
    tr: &FinderPattern,
    bl: &FinderPattern,
    alignment: Option<&FinderPattern>,
    dimension: usize,
) -> ScanResult<Homography> {
    let dim_minus_three = dimension as f64 - 3.5;
    let (br, src_br) = match alignment {
        Some(ap) => ((ap.x as f64, ap.y as f64), dim_minus_three - 3.0),
        None => (((tr.x - tl.x + bl.x) as f64, (tr.y - tl.y + bl.y) as f64), dim_minus_three),
    };
    let src = [(3.5, 3.5), (dim_minus_three, 3.5), (src_br, src_br), (3.5, dim_minus_three)];
    let dst = [(tl.x as f64, tl.y as f64), (tr.x as f64, tr.y as f64), br, (bl.x as f64, bl.y as f64)];
    Homography::compute(src, dst)
}

pub fn extract_pure_bits(image: &BitMatrix) -> ScanResult<BitMatrix> {
    let (left, top) = image.top_left_on_bit().ok_or(ScanError::NotFound)?;
    let (mut right, bottom) = image.bottom_right_on_bit().ok_or(ScanError::NotFound)?;
    let module_size = pure_module_size(left, top, image)?;

    if left >= right || top >= bottom {
        return Err(ScanError::NotFound);
    }
    if bottom - top != right - left {
        right = left + (bottom - top);
        if right >= image.width() {
            return Err(ScanError::NotFound);
        }
    }

    let matrix_width = ((right - left + 1) as f32 / module_size).round() as usize;
    let matrix_height = ((bottom - top + 1) as f32 / module_size).round() as usize;
    if matrix_width == 0 || matrix_height == 0 || matrix_width != matrix_height {
        return Err(ScanError::NotFound);
    }

    let nudge = (module_size / 2.0) as usize;
    let (mut top, mut left) = (top + nudge, left + nudge);
    let too_far_right = (left + ((matrix_width - 1) as f32 * module_size) as usize) as i64 - right as i64;
    if too_far_right > 0 {
        if too_far_right > nudge as i64 {
            return Err(ScanError::NotFound);
        }
        left -= too_far_right as usize;
    }
    let too_far_down = (top + ((matrix_height - 1) as f32 * module_size) as usize) as i64 - bottom as i64;
    if too_far_down > 0 {
        if too_far_down > nudge as i64 {
            return Err(ScanError::NotFound);
        }
        top -= too_far_down as usize;
    }

    let mut bits = BitMatrix::new(matrix_width, matrix_height)?;
    for y in 0..matrix_height {
        let iy = top + (y as f32 * module_size) as usize;
        for x in 0..matrix_width {
            if image.get(left + (x as f32 * module_size) as usize, iy) {
                bits.set(x, y);
            }
        }
    }
    Ok(bits)
}

// Walks the diagonal from the top left corner across the finder pattern
fn pure_module_size(left: usize, top: usize, image: &BitMatrix) -> ScanResult<f32> {
    let (w, h) = (image.width(), image.height());
    let (mut x, mut y) = (left, top);
    let mut in_black = true;
    let mut transitions = 0;
    while x < w && y < h {
        if in_black != image.get(x, y) {
            transitions += 1;
            if transitions == 5 {
                break;
            }
            in_black = !in_black;
        }
        x += 1;
        y += 1;
    }
    if x == w || y == h {
        return Err(ScanError::NotFound);
    }
    Ok((x - left) as f32 / 7.0)
}
