use std::fmt::{Display, Formatter};

// Bit array
//------------------------------------------------------------------------------

/// A row of bits, packed into 32-bit words with bit 0 as the least significant bit of the
/// first word.
#[derive(Debug, Clone, PartialEq, Eq, Default, Hash)]
pub struct BitArray {
    bits: Vec<u32>,
    size: usize,
}

impl BitArray {
    pub fn new(size: usize) -> Self {
        Self { bits: vec![0; size.div_ceil(32)], size }
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn get(&self, i: usize) -> bool {
        assert!(i < self.size, "Bit index out of range: Index {i}, Size {}", self.size);
        (self.bits[i >> 5] >> (i & 31)) & 1 != 0
    }

    pub fn set(&mut self, i: usize) {
        assert!(i < self.size, "Bit index out of range: Index {i}, Size {}", self.size);
        self.bits[i >> 5] |= 1 << (i & 31);
    }

    pub fn set_value(&mut self, i: usize, value: bool) {
        if value {
            self.set(i);
        } else {
            assert!(i < self.size, "Bit index out of range: Index {i}, Size {}", self.size);
            self.bits[i >> 5] &= !(1 << (i & 31));
        }
    }

    pub fn flip(&mut self, i: usize) {
        assert!(i < self.size, "Bit index out of range: Index {i}, Size {}", self.size);
        self.bits[i >> 5] ^= 1 << (i & 31);
    }

    pub fn set_bulk(&mut self, i: usize, word: u32) {
        self.bits[i >> 5] = word;
    }

    pub fn words(&self) -> &[u32] {
        &self.bits
    }

    pub fn clear(&mut self) {
        self.bits.iter_mut().for_each(|w| *w = 0);
    }

    pub fn next_set(&self, from: usize) -> usize {
        self.next_with(from, false)
    }

    pub fn next_unset(&self, from: usize) -> usize {
        self.next_with(from, true)
    }

    fn next_with(&self, from: usize, invert: bool) -> usize {
        if from >= self.size {
            return self.size;
        }
        let mask = if invert { u32::MAX } else { 0 };
        let mut idx = from >> 5;
        let mut word = (self.bits[idx] ^ mask) & !((1u32 << (from & 31)) - 1);
        while word == 0 {
            idx += 1;
            if idx == self.bits.len() {
                return self.size;
            }
            word = self.bits[idx] ^ mask;
        }
        ((idx << 5) + word.trailing_zeros() as usize).min(self.size)
    }

    pub fn is_range(&self, start: usize, end: usize, value: bool) -> bool {
        assert!(start <= end && end <= self.size, "Invalid range: {start}..{end}");
        (start..end).all(|i| self.get(i) == value)
    }

    pub fn append_bit(&mut self, bit: bool) {
        if self.size == self.bits.len() << 5 {
            self.bits.push(0);
        }
        self.size += 1;
        if bit {
            self.set(self.size - 1);
        }
    }

    pub fn append_bits(&mut self, value: u32, num_bits: usize) {
        debug_assert!(num_bits <= 32, "Cannot append more than 32 bits: N {num_bits}");
        for i in (0..num_bits).rev() {
            self.append_bit((value >> i) & 1 == 1);
        }
    }

    pub fn append_bit_array(&mut self, other: &BitArray) {
        for i in 0..other.size {
            self.append_bit(other.get(i));
        }
    }

    pub fn reverse(&mut self) {
        let mut rev = vec![0u32; self.bits.len()];
        for i in 0..self.size {
            if self.get(i) {
                let j = self.size - 1 - i;
                rev[j >> 5] |= 1 << (j & 31);
            }
        }
        self.bits = rev;
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.size).map(|i| self.get(i))
    }
}

impl FromIterator<bool> for BitArray {
    fn from_iter<T: IntoIterator<Item = bool>>(iter: T) -> Self {
        let mut arr = BitArray::default();
        iter.into_iter().for_each(|b| arr.append_bit(b));
        arr
    }
}

impl Display for BitArray {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for i in 0..self.size {
            if i & 7 == 0 && i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(if self.get(i) { "X" } else { "." })?;
        }
        Ok(())
    }
}
