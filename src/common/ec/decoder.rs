use log::trace;

use super::galois::GaloisField;
use crate::common::{ScanError, ScanResult};

// Reed-Solomon decoder
//------------------------------------------------------------------------------

/// Counts of symbols repaired by a successful decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Correction {
    pub errors: usize,
    pub erasures: usize,
}

/// Corrects errors and erasures in codewords over any [`GaloisField`].
///
/// Codeword `i` of a block of length `n` is the coefficient of `x^(n-1-i)`, so
/// position `i` has locator `α^(n-1-i)`. A block with `ec` check symbols is
/// repaired when `2 * errors + erasures <= ec`; anything beyond that is reported
/// as [`ScanError::Checksum`] and the block is left untouched.
#[derive(Debug, Clone, Copy)]
pub struct ReedSolomonDecoder {
    field: &'static GaloisField,
}

impl ReedSolomonDecoder {
    pub fn new(field: &'static GaloisField) -> Self {
        Self { field }
    }

    pub fn field(&self) -> &'static GaloisField {
        self.field
    }

    pub fn decode(&self, received: &mut [u16], ec: usize, erasures: &[usize]) -> ScanResult<Correction> {
        let n = received.len();
        self.validate(received, ec, erasures)?;
        if ec == 0 {
            return Ok(Correction::default());
        }
        if erasures.len() > ec {
            return Err(ScanError::Checksum);
        }

        let synd = match self.syndromes(received, ec) {
            None => return Ok(Correction::default()),
            Some(s) => s,
        };

        let gamma = self.erasure_locator(n, erasures);
        let (sigma, l) = self.berlekamp_massey(&synd, gamma, erasures.len())?;
        let s = erasures.len();
        if l < s || 2 * (l - s) + s > ec || degree(&sigma) != l {
            trace!("Errata exceed bound: L {l}, Erasures {s}, EC {ec}");
            return Err(ScanError::Checksum);
        }

        let err_loc = self.chien_search(&sigma, n);
        if err_loc.len() != l {
            return Err(ScanError::Checksum);
        }

        let omega = self.omega(&synd, &sigma, ec);
        let mag = self.forney(&omega, &sigma, &err_loc, n)?;

        let mut fixed = received.to_vec();
        for (&i, &m) in err_loc.iter().zip(mag.iter()) {
            fixed[i] = self.field.add(fixed[i], m);
        }
        if self.syndromes(&fixed, ec).is_some() {
            return Err(ScanError::Checksum);
        }
        received.copy_from_slice(&fixed);

        let errors = err_loc.iter().filter(|i| !erasures.contains(i)).count();
        Ok(Correction { errors, erasures: s })
    }

    fn validate(&self, received: &[u16], ec: usize, erasures: &[usize]) -> ScanResult<()> {
        let n = received.len();
        if ec > n {
            return Err(ScanError::invalid(format!("More check symbols than codewords: EC {ec}, Len {n}")));
        }
        if n >= self.field.size() {
            return Err(ScanError::invalid(format!(
                "Block too long for field: Len {n}, Field size {}",
                self.field.size()
            )));
        }
        if let Some(&c) = received.iter().find(|&&c| !self.field.contains(c)) {
            return Err(ScanError::invalid(format!("Codeword {c} is not a field element")));
        }
        for (k, &e) in erasures.iter().enumerate() {
            if e >= n {
                return Err(ScanError::invalid(format!("Erasure out of range: Position {e}, Len {n}")));
            }
            if erasures[..k].contains(&e) {
                return Err(ScanError::invalid(format!("Duplicate erasure at {e}")));
            }
        }
        Ok(())
    }

    // S_j = r(α^(j+b)), None when every syndrome is zero
    fn syndromes(&self, received: &[u16], ec: usize) -> Option<Vec<u16>> {
        let b = self.field.generator_base();
        let synd: Vec<u16> = (0..ec)
            .map(|j| {
                let x = self.field.exp(j + b);
                received.iter().fold(0, |acc, &r| self.field.add(self.field.mul(acc, x), r))
            })
            .collect();
        synd.iter().any(|&s| s != 0).then_some(synd)
    }

    fn locator(&self, n: usize, i: usize) -> u16 {
        self.field.exp(n - 1 - i)
    }

    // Γ(x) = Π (1 + X_k x), coefficients low order first
    fn erasure_locator(&self, n: usize, erasures: &[usize]) -> Vec<u16> {
        let mut gamma = vec![1u16];
        for &e in erasures {
            let xk = self.locator(n, e);
            let mut next = vec![0u16; gamma.len() + 1];
            for (j, &g) in gamma.iter().enumerate() {
                next[j] = self.field.add(next[j], g);
                next[j + 1] = self.field.add(next[j + 1], self.field.mul(g, xk));
            }
            gamma = next;
        }
        gamma
    }

    // Errata locator seeded with the erasure locator
    fn berlekamp_massey(&self, synd: &[u16], gamma: Vec<u16>, s: usize) -> ScanResult<(Vec<u16>, usize)> {
        let ec = synd.len();
        let mut sigma = gamma.clone();
        let mut bx = gamma;
        let mut l = s;

        for r in s + 1..=ec {
            let mut d = 0u16;
            for (j, &c) in sigma.iter().enumerate().take(r) {
                d = self.field.add(d, self.field.mul(c, synd[r - 1 - j]));
            }

            if d == 0 {
                bx.insert(0, 0);
                continue;
            }

            let mut tx = sigma.clone();
            if tx.len() < bx.len() + 1 {
                tx.resize(bx.len() + 1, 0);
            }
            for (j, &c) in bx.iter().enumerate() {
                tx[j + 1] = self.field.add(tx[j + 1], self.field.mul(d, c));
            }

            if 2 * l < r + s {
                let dinv = self.field.inverse(d)?;
                bx = sigma.iter().map(|&c| self.field.mul(c, dinv)).collect();
                l = r + s - l;
            } else {
                bx.insert(0, 0);
            }
            sigma = tx;
        }
        Ok((sigma, l))
    }

    // Positions whose inverse locator is a root of sigma
    fn chien_search(&self, sigma: &[u16], n: usize) -> Vec<usize> {
        let order = self.field.size() - 1;
        (0..n)
            .filter(|&i| {
                let xinv = self.field.exp(order - (n - 1 - i) % order);
                eval_poly(self.field, sigma, xinv) == 0
            })
            .collect()
    }

    // Ω(x) = S(x) Λ(x) mod x^ec
    fn omega(&self, synd: &[u16], sigma: &[u16], ec: usize) -> Vec<u16> {
        let mut omg = vec![0u16; ec];
        for (i, &s) in synd.iter().enumerate() {
            for (j, &c) in sigma.iter().enumerate() {
                if i + j < ec {
                    omg[i + j] = self.field.add(omg[i + j], self.field.mul(s, c));
                }
            }
        }
        omg
    }

    fn forney(&self, omega: &[u16], sigma: &[u16], err_loc: &[usize], n: usize) -> ScanResult<Vec<u16>> {
        let f = self.field;
        let order = f.size() - 1;
        let b = f.generator_base() % order;

        // Formal derivative keeps the odd terms
        let dsig: Vec<u16> =
            sigma.iter().enumerate().skip(1).map(|(i, &c)| if i % 2 == 1 { c } else { 0 }).collect();

        err_loc
            .iter()
            .map(|&i| {
                let pow = (n - 1 - i) % order;
                let xinv = f.exp(order - pow);
                let num = eval_poly(f, omega, xinv);
                let den = eval_poly(f, &dsig, xinv);
                if den == 0 {
                    return Err(ScanError::Checksum);
                }
                let y = f.div(num, den)?;
                // X^(1-b)
                let scale = f.exp((pow * (1 + order - b)) % order);
                Ok(f.mul(y, scale))
            })
            .collect()
    }
}

// Evaluates a low-order-first polynomial with Horner's rule.
pub(crate) fn eval_poly(field: &GaloisField, poly: &[u16], x: u16) -> u16 {
    poly.iter().rev().fold(0, |acc, &c| field.add(field.mul(acc, x), c))
}

fn degree(poly: &[u16]) -> usize {
    poly.iter().rposition(|&c| c != 0).unwrap_or(0)
}
