//! FNV-1a hashing and open-addressing indices
//!
//! Every hash index in the runtime schema uses the same layout: a power of
//! two number of slots (at least twice the entry count), linear probing,
//! and a parallel array of precomputed hashes so that lookups can skip the
//! key comparison on mismatch. Slot id 0 marks an empty slot and hash value
//! 0 is reserved (rewritten to 1).

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Streaming 64-bit FNV-1a hasher
#[derive(Debug, Clone, Copy)]
pub struct Fnv64(u64);

impl Fnv64 {
    /// Create a hasher at the offset basis
    pub fn new() -> Self {
        Self(FNV_OFFSET_BASIS)
    }

    /// Feed raw bytes
    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= u64::from(b);
            self.0 = self.0.wrapping_mul(FNV_PRIME);
        }
    }

    /// Feed one byte
    pub fn write_u8(&mut self, v: u8) {
        self.write(&[v]);
    }

    /// Feed a u32, little-endian
    pub fn write_u32(&mut self, v: u32) {
        self.write(&v.to_le_bytes());
    }

    /// Feed a u64, little-endian
    pub fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    /// Current hash value
    pub fn finish(&self) -> u64 {
        self.0
    }
}

impl Default for Fnv64 {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash a byte slice with 64-bit FNV-1a
pub fn fnv1a(bytes: &[u8]) -> u64 {
    let mut h = Fnv64::new();
    h.write(bytes);
    h.finish()
}

/// Rewrite a zero hash to 1 so that 0 can mean "absent"
pub fn nonzero(hash: u64) -> u64 {
    if hash == 0 {
        1
    } else {
        hash
    }
}

/// Slot count for an index holding `count` entries
pub fn table_size(count: usize) -> usize {
    (count * 2).max(1).next_power_of_two()
}

/// Open-addressed index from precomputed hashes to dense ids
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashIndex {
    hashes: Vec<u64>,
    slots: Vec<u32>,
}

impl HashIndex {
    /// Build an index over `(id, hash)` pairs; ids must be non-zero
    pub fn build<I>(count: usize, entries: I) -> Self
    where
        I: IntoIterator<Item = (u32, u64)>,
    {
        let size = table_size(count);
        let mask = size - 1;
        let mut hashes = vec![0u64; size];
        let mut slots = vec![0u32; size];
        for (id, hash) in entries {
            let hash = nonzero(hash);
            let mut i = (hash as usize) & mask;
            while slots[i] != 0 {
                i = (i + 1) & mask;
            }
            hashes[i] = hash;
            slots[i] = id;
        }
        Self { hashes, slots }
    }

    /// Find the id whose hash matches and for which `eq` holds
    pub fn find(&self, hash: u64, mut eq: impl FnMut(u32) -> bool) -> Option<u32> {
        if self.slots.is_empty() {
            return None;
        }
        let hash = nonzero(hash);
        let mask = self.slots.len() - 1;
        let mut i = (hash as usize) & mask;
        for _ in 0..self.slots.len() {
            let id = self.slots[i];
            if id == 0 {
                return None;
            }
            if self.hashes[i] == hash && eq(id) {
                return Some(id);
            }
            i = (i + 1) & mask;
        }
        None
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Raw slot ids (0 = empty)
    pub fn slots(&self) -> &[u32] {
        &self.slots
    }

    /// Raw slot hashes (0 = empty)
    pub fn hashes(&self) -> &[u64] {
        &self.hashes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fnv_known_vectors() {
        assert_eq!(fnv1a(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a(b"a"), 0xaf63_dc4c_8601_ec8c);
        assert_eq!(fnv1a(b"foobar"), 0x8594_4171_f739_67e8);
    }

    #[test]
    fn test_table_size() {
        assert_eq!(table_size(0), 1);
        assert_eq!(table_size(1), 2);
        assert_eq!(table_size(3), 8);
        assert_eq!(table_size(4), 8);
    }

    #[test]
    fn test_index_lookup_with_collisions() {
        // Every entry shares one hash, forcing linear probing.
        let index = HashIndex::build(3, vec![(1, 7), (2, 7), (3, 7)]);
        assert_eq!(index.capacity(), 8);
        assert_eq!(index.find(7, |id| id == 3), Some(3));
        assert_eq!(index.find(7, |id| id == 4), None);
        assert_eq!(index.find(9, |_| true), None);
    }

    #[test]
    fn test_zero_hash_is_rewritten() {
        let index = HashIndex::build(1, vec![(5, 0)]);
        assert_eq!(index.find(0, |id| id == 5), Some(5));
        assert!(index.hashes().contains(&1));
    }
}
