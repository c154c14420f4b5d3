use super::galois::GaloisField;
use crate::common::{ScanError, ScanResult};

// Reed-Solomon encoder
//------------------------------------------------------------------------------

/// Systematic Reed-Solomon encoder. Generator polynomials
/// `g(x) = Π (x - α^(i+b))` are built on demand and kept for the life of the encoder.
#[derive(Debug, Clone)]
pub struct ReedSolomonEncoder {
    field: &'static GaloisField,
    // generators[k] has degree k, highest order coefficient first
    generators: Vec<Vec<u16>>,
}

impl ReedSolomonEncoder {
    pub fn new(field: &'static GaloisField) -> Self {
        Self { field, generators: vec![vec![1]] }
    }

    fn generator(&mut self, degree: usize) -> &[u16] {
        let b = self.field.generator_base();
        while self.generators.len() <= degree {
            let d = self.generators.len() - 1;
            let prev = &self.generators[d];
            let root = self.field.exp(d + b);
            let mut next = vec![0u16; prev.len() + 1];
            for (j, &c) in prev.iter().enumerate() {
                next[j] = self.field.add(next[j], c);
                next[j + 1] = self.field.add(next[j + 1], self.field.mul(c, root));
            }
            self.generators.push(next);
        }
        &self.generators[degree]
    }

    pub fn encode(&mut self, block: &mut [u16], ec: usize) -> ScanResult<()> {
        if ec == 0 {
            return Err(ScanError::invalid("No error correction codewords requested"));
        }
        if ec >= block.len() {
            return Err(ScanError::invalid(format!(
                "No room for data codewords: Len {}, EC {ec}",
                block.len()
            )));
        }
        if block.len() >= self.field.size() {
            return Err(ScanError::invalid(format!("Block too long for field: Len {}", block.len())));
        }
        let dlen = block.len() - ec;
        if let Some(&c) = block[..dlen].iter().find(|&&c| !self.field.contains(c)) {
            return Err(ScanError::invalid(format!("Codeword {c} is not a field element")));
        }

        let field = self.field;
        let gen = self.generator(ec).to_vec();

        // Long division of data(x) * x^ec by the generator
        let mut rem = vec![0u16; ec];
        for &d in &block[..dlen] {
            let factor = field.add(d, rem[0]);
            rem.rotate_left(1);
            rem[ec - 1] = 0;
            if factor == 0 {
                continue;
            }
            for (r, &g) in rem.iter_mut().zip(gen[1..].iter()) {
                *r = field.add(*r, field.mul(g, factor));
            }
        }
        block[dlen..].copy_from_slice(&rem);
        Ok(())
    }

    pub fn ec_codewords(&mut self, data: &[u16], ec: usize) -> ScanResult<Vec<u16>> {
        let mut block = data.to_vec();
        block.resize(data.len() + ec, 0);
        self.encode(&mut block, ec)?;
        Ok(block.split_off(data.len()))
    }
}

#[cfg(test)]
mod encoder_tests {
    use super::ReedSolomonEncoder;
    use crate::common::ec::galois::*;

    #[test]
    fn test_qr_known_block() {
        // Version 1-M "01234567"
        let data = [16, 32, 12, 86, 97, 128, 236, 17, 236, 17, 236, 17, 236, 17, 236, 17];
        let ecc = ReedSolomonEncoder::new(&QR_CODE_FIELD_256).ec_codewords(&data, 10).unwrap();
        assert_eq!(ecc, vec![165, 36, 212, 193, 237, 54, 199, 135, 44, 85]);
    }

    #[test]
    fn test_generator_roots() {
        let field = &*AZTEC_DATA_6;
        let mut enc = ReedSolomonEncoder::new(field);
        let gen = enc.generator(5).to_vec();
        assert_eq!(gen.len(), 6);
        for i in 0..5 {
            let x = field.exp(i + 1);
            let v = gen.iter().fold(0, |acc, &c| field.add(field.mul(acc, x), c));
            assert_eq!(v, 0);
        }
    }

    #[test]
    fn test_invalid() {
        let mut enc = ReedSolomonEncoder::new(&AZTEC_PARAM);
        assert!(enc.ec_codewords(&[1, 2], 0).is_err());
        assert!(enc.ec_codewords(&[16, 2], 5).is_err());
        assert!(enc.ec_codewords(&[1; 12], 5).is_err());
    }
}
