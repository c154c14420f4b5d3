// Result point
//------------------------------------------------------------------------------

/// A located feature of a symbol in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ResultPoint {
    pub x: f32,
    pub y: f32,
}

impl ResultPoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Self) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn cross_product_z(a: Self, b: Self, c: Self) -> f32 {
        (c.x - b.x) * (a.y - b.y) - (c.y - b.y) * (a.x - b.x)
    }

    pub fn translate(self, dx: f32, dy: f32) -> Self {
        Self { x: self.x + dx, y: self.y + dy }
    }

    pub fn order_best_patterns(patterns: [Self; 3]) -> [Self; 3] {
        let d01 = patterns[0].distance(patterns[1]);
        let d12 = patterns[1].distance(patterns[2]);
        let d02 = patterns[0].distance(patterns[2]);

        let (mut a, b, mut c) = if d12 >= d01 && d12 >= d02 {
            (patterns[1], patterns[0], patterns[2])
        } else if d02 >= d12 && d02 >= d01 {
            (patterns[0], patterns[1], patterns[2])
        } else {
            (patterns[0], patterns[2], patterns[1])
        };

        if Self::cross_product_z(a, b, c) < 0.0 {
            std::mem::swap(&mut a, &mut c);
        }
        [a, b, c]
    }
}

impl From<(f32, f32)> for ResultPoint {
    fn from((x, y): (f32, f32)) -> Self {
        Self { x, y }
    }
}
