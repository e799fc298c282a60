//! Packed position sets
//!
//! Positions are stored in 64-bit words with an explicit logical size. The
//! little-endian packed bytes are the identity of a set when deduplicating
//! DFA states.

use crate::runtime::models::iter_bits;

/// Fixed-size set of positions
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bitset {
    words: Vec<u64>,
    size: usize,
}

/// Number of words needed for `size` positions
pub fn word_count(size: usize) -> usize {
    (size + 63) / 64
}

impl Bitset {
    /// Empty set over `size` positions
    pub fn new(size: usize) -> Self {
        Self {
            words: vec![0; word_count(size)],
            size,
        }
    }

    /// Logical size
    pub fn size(&self) -> usize {
        self.size
    }

    /// Add a position
    pub fn insert(&mut self, pos: usize) {
        debug_assert!(pos < self.size);
        self.words[pos / 64] |= 1 << (pos % 64);
    }

    /// Whether a position is present
    pub fn contains(&self, pos: usize) -> bool {
        pos < self.size && self.words[pos / 64] & (1 << (pos % 64)) != 0
    }

    /// Add every position of `other`
    pub fn union_with(&mut self, other: &Bitset) {
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            *a |= b;
        }
    }

    /// Whether the two sets share a position
    pub fn intersects(&self, other: &Bitset) -> bool {
        self.words.iter().zip(&other.words).any(|(a, b)| a & b != 0)
    }

    /// Whether no position is present
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Number of positions present
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Positions in ascending order
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        iter_bits(&self.words)
    }

    /// Packed words
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// Canonical little-endian bytes
    pub fn key(&self) -> Vec<u8> {
        self.words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }
}
