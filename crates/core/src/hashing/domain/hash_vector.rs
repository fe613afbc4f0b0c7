use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Perceptual hash family a [`HashVector`] was produced by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// Horizontal gradient signs.
    Difference,
    /// Low-frequency DCT coefficients against their median.
    Frequency,
    /// Pixels against the block mean.
    Average,
}

impl HashAlgorithm {
    pub const ALL: [HashAlgorithm; 3] = [
        HashAlgorithm::Difference,
        HashAlgorithm::Frequency,
        HashAlgorithm::Average,
    ];
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashAlgorithm::Difference => write!(f, "difference"),
            HashAlgorithm::Frequency => write!(f, "frequency"),
            HashAlgorithm::Average => write!(f, "average"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HexDecodeError {
    #[error("invalid hex digit {0:?}")]
    InvalidDigit(char),
    #[error("{digits} hex digits cannot hold {bits} bits")]
    LengthMismatch { bits: usize, digits: usize },
}

/// Fixed-length bit sequence produced by one hash algorithm.
///
/// Bits are packed MSB-first into `u64` words; bits past `len` are always zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashVector {
    algorithm: HashAlgorithm,
    words: Vec<u64>,
    len: usize,
}

impl HashVector {
    pub fn from_bits(algorithm: HashAlgorithm, bits: &[bool]) -> Self {
        let mut words = vec![0u64; bits.len().div_ceil(64)];
        for (i, &bit) in bits.iter().enumerate() {
            if bit {
                words[i / 64] |= 1u64 << (63 - (i % 64));
            }
        }
        Self {
            algorithm,
            words,
            len: bits.len(),
        }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bit(&self, i: usize) -> bool {
        i < self.len && self.words[i / 64] & (1u64 << (63 - (i % 64))) != 0
    }

    pub fn count_ones(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    /// Number of differing bits, or `None` when the vectors are not comparable
    /// (different algorithm or length).
    pub fn hamming_distance(&self, other: &HashVector) -> Option<u32> {
        if self.algorithm != other.algorithm || self.len != other.len {
            return None;
        }
        Some(
            self.words
                .iter()
                .zip(&other.words)
                .map(|(a, b)| (a ^ b).count_ones())
                .sum(),
        )
    }

    /// Hex rendering, four bits per digit, MSB first; the final digit may be partial.
    pub fn to_hex(&self) -> String {
        let digits = self.len.div_ceil(4);
        let mut out = String::with_capacity(digits);
        for d in 0..digits {
            let mut nibble = 0u32;
            for b in 0..4 {
                nibble = (nibble << 1) | self.bit(d * 4 + b) as u32;
            }
            // nibble is < 16
            out.push(char::from_digit(nibble, 16).unwrap_or('0'));
        }
        out
    }

    pub fn from_hex(algorithm: HashAlgorithm, hex: &str, len: usize) -> Result<Self, HexDecodeError> {
        let digits = hex.chars().count();
        if digits != len.div_ceil(4) {
            return Err(HexDecodeError::LengthMismatch { bits: len, digits });
        }
        let mut bits = Vec::with_capacity(digits * 4);
        for c in hex.chars() {
            let nibble = c.to_digit(16).ok_or(HexDecodeError::InvalidDigit(c))?;
            for b in (0..4).rev() {
                bits.push(nibble & (1 << b) != 0);
            }
        }
        if bits[len..].iter().any(|&b| b) {
            return Err(HexDecodeError::LengthMismatch { bits: len, digits });
        }
        bits.truncate(len);
        Ok(Self::from_bits(algorithm, &bits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn vector(pattern: &[u8]) -> HashVector {
        let bits: Vec<bool> = pattern.iter().map(|&b| b == 1).collect();
        HashVector::from_bits(HashAlgorithm::Difference, &bits)
    }

    fn pseudo_random_bits(seed: u64, len: usize) -> Vec<bool> {
        let mut state = seed;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                state >> 63 == 1
            })
            .collect()
    }

    #[test]
    fn test_distance_to_self_is_zero() {
        let bits = pseudo_random_bits(7, 256);
        let a = HashVector::from_bits(HashAlgorithm::Average, &bits);
        assert_eq!(a.hamming_distance(&a), Some(0));
    }

    #[rstest]
    #[case::seed_1(1)]
    #[case::seed_2(2)]
    #[case::seed_3(99)]
    fn test_distance_is_symmetric_and_bounded(#[case] seed: u64) {
        let a = HashVector::from_bits(HashAlgorithm::Frequency, &pseudo_random_bits(seed, 256));
        let b = HashVector::from_bits(HashAlgorithm::Frequency, &pseudo_random_bits(seed + 1000, 256));
        let ab = a.hamming_distance(&b).unwrap();
        assert_eq!(Some(ab), b.hamming_distance(&a));
        assert!(ab as usize <= a.len());
    }

    #[test]
    fn test_distance_counts_differing_bits() {
        assert_eq!(vector(&[1, 0, 1, 1]).hamming_distance(&vector(&[0, 0, 1, 0])), Some(2));
    }

    #[test]
    fn test_distance_undefined_across_lengths() {
        assert_eq!(vector(&[1, 0]).hamming_distance(&vector(&[1, 0, 0])), None);
    }

    #[test]
    fn test_distance_undefined_across_algorithms() {
        let a = HashVector::from_bits(HashAlgorithm::Difference, &[true, false]);
        let b = HashVector::from_bits(HashAlgorithm::Average, &[true, false]);
        assert_eq!(a.hamming_distance(&b), None);
    }

    #[test]
    fn test_hex_is_msb_first() {
        assert_eq!(vector(&[1, 0, 0, 0, 0, 0, 0, 1]).to_hex(), "81");
        assert_eq!(vector(&[1, 1, 1]).to_hex(), "e");
    }

    #[test]
    fn test_hex_parse_restores_bits() {
        let bits = pseudo_random_bits(42, 100);
        let a = HashVector::from_bits(HashAlgorithm::Average, &bits);
        let parsed = HashVector::from_hex(HashAlgorithm::Average, &a.to_hex(), 100).unwrap();
        assert_eq!(parsed, a);
    }

    #[rstest]
    #[case::bad_digit("zz", 8, HexDecodeError::InvalidDigit('z'))]
    #[case::too_short("f", 8, HexDecodeError::LengthMismatch { bits: 8, digits: 1 })]
    #[case::padding_bits_set("f", 3, HexDecodeError::LengthMismatch { bits: 3, digits: 1 })]
    fn test_hex_parse_rejects(#[case] hex: &str, #[case] len: usize, #[case] expected: HexDecodeError) {
        assert_eq!(HashVector::from_hex(HashAlgorithm::Average, hex, len), Err(expected));
    }
}
