use std::{fmt::Display, mem};

use num_traits::PrimInt;

// Bit stream
//------------------------------------------------------------------------------

/// Big-endian bit buffer used by the encoders to build codeword streams and by the
/// decoders to walk corrected codewords.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitStream {
    data: Vec<u8>,
    // Bit length
    len: usize,
    // Pointer to take bits
    cursor: usize,
}

impl BitStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bits: usize) -> Self {
        Self { data: Vec::with_capacity(bits.div_ceil(8)), len: 0, cursor: 0 }
    }

    pub fn from_bytes(inp: &[u8]) -> Self {
        Self { data: inp.to_vec(), len: inp.len() << 3, cursor: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn available(&self) -> usize {
        self.len - self.cursor
    }

    pub fn get(&self, i: usize) -> bool {
        debug_assert!(i < self.len, "Bit index out of range: Index {i}, Len {}", self.len);
        (self.data[i >> 3] >> (7 - (i & 7))) & 1 == 1
    }

    pub fn peek_at(&self, pos: usize, n: usize) -> Option<u32> {
        if n > 32 || pos + n > self.len {
            return None;
        }
        Some((pos..pos + n).fold(0u32, |acc, i| (acc << 1) | self.get(i) as u32))
    }
}

// Push bits for bit stream
//------------------------------------------------------------------------------

impl BitStream {
    pub fn push_bits<T>(&mut self, bits: T, size: usize)
    where
        T: PrimInt + Display,
    {
        let max_bits = mem::size_of::<T>() * 8;
        debug_assert!(size <= 32, "Cannot push more than 32 bits: Size {size}");
        debug_assert!(
            size >= max_bits - bits.leading_zeros() as usize,
            "Bit count shouldn't exceed bit length: Length {size}, Bits {bits}"
        );
        let bits = bits.to_u64().unwrap_or_default();
        for i in (0..size).rev() {
            self.push((bits >> i) & 1 == 1);
        }
    }

    pub fn push(&mut self, bit: bool) {
        if self.len & 7 == 0 {
            self.data.push(0);
        }
        if bit {
            let offset = self.len & 7;
            let pos = self.len >> 3;
            self.data[pos] |= 0b1000_0000 >> offset;
        }
        self.len += 1;
    }

    pub fn extend(&mut self, arr: &[u8]) {
        arr.iter().for_each(|&b| self.push_bits(b, 8));
    }

    pub fn append(&mut self, other: &BitStream) {
        (0..other.len).for_each(|i| self.push(other.get(i)));
    }

    pub fn to_codewords(&self, width: usize) -> Vec<u16> {
        (0..self.len.div_ceil(width))
            .map(|w| {
                (0..width).fold(0u16, |acc, i| {
                    let pos = w * width + i;
                    (acc << 1) | (pos < self.len && self.get(pos)) as u16
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod bit_stream_push_tests {

    use super::BitStream;

    #[test]
    fn test_len() {
        let mut bs = BitStream::new();
        assert_eq!(bs.len(), 0);
        bs.push_bits(0, 0);
        assert_eq!(bs.len(), 0);
        bs.push_bits(0b1000, 4);
        assert_eq!(bs.len(), 4);
        bs.push_bits(0b1000, 8);
        assert_eq!(bs.len(), 12);
        bs.push_bits(0b1111111, 7);
        assert_eq!(bs.len(), 19);
        bs.push_bits(0b111111111111u16, 16);
        assert_eq!(bs.len(), 35);
        bs.push_bits(0xFFFF_FFFFu32, 32);
        assert_eq!(bs.len(), 67);
    }

    #[test]
    #[should_panic]
    fn test_invalid_len() {
        let mut bs = BitStream::new();
        bs.push_bits(256, 7);
    }

    #[test]
    fn test_push() {
        let mut bs = BitStream::new();
        bs.push(false);
        assert_eq!(bs.data(), &[0b00000000]);
        bs.push(true);
        assert_eq!(bs.data(), &[0b01000000]);
    }

    #[test]
    fn test_push_bits() {
        let exp_vec = [210u8, 52, 141, 35, 72, 210, 183, 42, 7, 219, 91, 14, 253, 68, 120, 193];
        let mut inp = BitStream::from_bytes(&exp_vec);
        let mut out = BitStream::new();
        for n in [0, 1, 2, 3, 4, 5, 6, 7, 8, 4, 8, 9, 11, 15, 16, 5, 16] {
            let bits = inp.take_bits(n).unwrap();
            out.push_bits(bits, n);
        }
        assert_eq!(out.data(), &exp_vec[..out.len() >> 3]);
    }

    #[test]
    fn test_to_codewords() {
        let mut bs = BitStream::new();
        bs.push_bits(0b101101u8, 6);
        bs.push_bits(0b11u8, 2);
        assert_eq!(bs.to_codewords(6), vec![0b101101, 0b110000]);
    }
}

// Take bits for bit stream
//------------------------------------------------------------------------------

impl BitStream {
    pub fn take_bits(&mut self, n: usize) -> Option<u32> {
        let res = self.peek_at(self.cursor, n)?;
        self.cursor += n;
        Some(res)
    }

    pub fn take_bit(&mut self) -> Option<bool> {
        if self.cursor == self.len {
            return None;
        }
        let bit = self.get(self.cursor);
        self.cursor += 1;
        Some(bit)
    }
}

#[cfg(test)]
mod bit_stream_take_tests {

    use super::BitStream;

    #[test]
    fn test_take_bits() {
        let data = [
            0b11010010, 0b00110100, 0b10001101, 0b00100011, 0b01001000, 0b11010010, 0b00110100,
            0b10001101, 0b00100011, 0b01001000, 0b11010010, 0b00110100, 0b10001100,
        ];
        let mut bs = BitStream::from_bytes(&data);
        assert_eq!(bs.take_bits(0), Some(0));
        assert_eq!(bs.take_bits(4), Some(0b1101));
        assert_eq!(bs.take_bits(4), Some(0b0010));
        assert_eq!(bs.take_bits(8), Some(0b00110100));
        assert_eq!(bs.take_bits(9), Some(0b100011010));
        assert_eq!(bs.take_bits(7), Some(0b0100011));
        assert_eq!(bs.take_bits(16), Some(0b01001000_11010010));
        assert_eq!(bs.take_bits(1), Some(0b0));
        assert_eq!(bs.take_bits(11), Some(0b01101001000));
        assert_eq!(bs.take_bits(14), Some(0b11010010001101));
        assert_eq!(bs.take_bits(16), Some(0b0010001101001000));
        assert_eq!(bs.take_bits(4), Some(0b1101));
        assert_eq!(bs.take_bits(4), Some(0b0010));
        assert_eq!(bs.available(), 6);
    }

    #[test]
    fn test_take_bits_over_capacity() {
        let mut bs = BitStream::from_bytes(&[]);
        assert_eq!(bs.take_bits(5), None);
        assert_eq!(bs.take_bit(), None);
    }
}

// Iterator for bit stream
//------------------------------------------------------------------------------

impl Iterator for BitStream {
    type Item = bool;
    fn next(&mut self) -> Option<Self::Item> {
        self.take_bit()
    }
}
