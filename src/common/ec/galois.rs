use std::sync::LazyLock;

use crate::common::{ScanError, ScanResult};

// Galois field GF(2^m)
//------------------------------------------------------------------------------

/// A binary extension field with log/exp tables built once from its primitive polynomial.
///
/// `generator_base` is the power of the generator used for the first root of the
/// Reed-Solomon generator polynomial (0 for QR Code, 1 for Aztec and MaxiCode).
#[derive(Debug)]
pub struct GaloisField {
    exp: Vec<u16>,
    log: Vec<u16>,
    size: usize,
    primitive: u32,
    generator_base: usize,
}

pub static QR_CODE_FIELD_256: LazyLock<GaloisField> =
    LazyLock::new(|| GaloisField::new(0b1_0001_1101, 256, 0));
pub static AZTEC_DATA_12: LazyLock<GaloisField> =
    LazyLock::new(|| GaloisField::new(0b1_0000_0110_1001, 4096, 1));
pub static AZTEC_DATA_10: LazyLock<GaloisField> =
    LazyLock::new(|| GaloisField::new(0b100_0000_1001, 1024, 1));
pub static AZTEC_DATA_8: LazyLock<GaloisField> =
    LazyLock::new(|| GaloisField::new(0b1_0010_1101, 256, 1));
pub static AZTEC_DATA_6: LazyLock<GaloisField> =
    LazyLock::new(|| GaloisField::new(0b100_0011, 64, 1));
pub static AZTEC_PARAM: LazyLock<GaloisField> =
    LazyLock::new(|| GaloisField::new(0b1_0011, 16, 1));
pub static MAXICODE_FIELD_64: LazyLock<GaloisField> =
    LazyLock::new(|| GaloisField::new(0b100_0011, 64, 1));

impl GaloisField {
    pub fn new(primitive: u32, size: usize, generator_base: usize) -> Self {
        debug_assert!(size.is_power_of_two() && size >= 4, "Field size must be 2^m: Size {size}");
        let mut exp = vec![0u16; size];
        let mut log = vec![0u16; size];
        let mut x = 1u32;
        for e in exp.iter_mut() {
            *e = x as u16;
            x <<= 1;
            if x >= size as u32 {
                x ^= primitive;
                x &= size as u32 - 1;
            }
        }
        for (i, &e) in exp.iter().enumerate().take(size - 1) {
            log[e as usize] = i as u16;
        }
        Self { exp, log, size, primitive, generator_base }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn primitive(&self) -> u32 {
        self.primitive
    }

    pub fn generator_base(&self) -> usize {
        self.generator_base
    }

    pub fn contains(&self, a: u16) -> bool {
        (a as usize) < self.size
    }

    pub fn exp(&self, a: usize) -> u16 {
        self.exp[a % (self.size - 1)]
    }

    pub fn log(&self, a: u16) -> ScanResult<usize> {
        if a == 0 || !self.contains(a) {
            return Err(ScanError::invalid(format!("No logarithm for field element {a}")));
        }
        Ok(self.log[a as usize] as usize)
    }

    pub fn inverse(&self, a: u16) -> ScanResult<u16> {
        if a == 0 {
            return Err(ScanError::invalid("Zero has no multiplicative inverse"));
        }
        Ok(self.exp[self.size - 1 - self.log(a)?])
    }

    #[inline]
    pub fn add(&self, a: u16, b: u16) -> u16 {
        a ^ b
    }

    pub fn mul(&self, a: u16, b: u16) -> u16 {
        if a == 0 || b == 0 {
            return 0;
        }
        self.exp[(self.log[a as usize] as usize + self.log[b as usize] as usize) % (self.size - 1)]
    }

    pub fn div(&self, a: u16, b: u16) -> ScanResult<u16> {
        Ok(self.mul(a, self.inverse(b)?))
    }
}
