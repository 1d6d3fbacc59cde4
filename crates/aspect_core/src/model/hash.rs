//! Content-derived hashing for schema descriptors.
//!
//! # Invariants
//! - Output depends only on the fed content, never on process state:
//!   `SeaHasher::default()` uses fixed keys.
//! - Folding is non-commutative, so feeding the same parts in a different
//!   order yields a different hash.

use seahash::SeaHasher;
use std::hash::Hasher;

const FOLD_MULTIPLIER: u64 = 0x100_0000_01b3;

/// Order-sensitive accumulator over field hashes.
#[derive(Debug, Clone, Copy)]
pub struct StructuralHasher {
    state: u64,
}

impl StructuralHasher {
    pub fn new(domain: &str) -> Self {
        let mut hasher = Self {
            state: 0xcbf2_9ce4_8422_2325,
        };
        hasher.write_str(domain);
        hasher
    }

    pub fn write_str(&mut self, value: &str) {
        self.fold(hash_bytes(value.as_bytes()));
        // length marker keeps ("ab","c") apart from ("a","bc")
        self.fold(value.len() as u64);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.fold(if value { 0x9e37_79b9 } else { 0x7f4a_7c15 });
    }

    pub fn write_u64(&mut self, value: u64) {
        self.fold(hash_bytes(&value.to_le_bytes()));
    }

    pub fn write_option_str(&mut self, value: Option<&str>) {
        match value {
            Some(text) => {
                self.write_bool(true);
                self.write_str(text);
            }
            None => self.write_bool(false),
        }
    }

    pub fn finish(&self) -> u64 {
        self.state
    }

    fn fold(&mut self, part: u64) {
        self.state = (self.state.rotate_left(5) ^ part).wrapping_mul(FOLD_MULTIPLIER);
    }
}

fn hash_bytes(bytes: &[u8]) -> u64 {
    let mut hasher = SeaHasher::default();
    hasher.write(bytes);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::StructuralHasher;

    fn hash_parts(parts: &[&str]) -> u64 {
        let mut hasher = StructuralHasher::new("test");
        for part in parts {
            hasher.write_str(part);
        }
        hasher.finish()
    }

    #[test]
    fn same_parts_same_hash() {
        assert_eq!(hash_parts(&["a", "b"]), hash_parts(&["a", "b"]));
    }

    #[test]
    fn transposed_parts_differ() {
        assert_ne!(hash_parts(&["a", "b"]), hash_parts(&["b", "a"]));
    }

    #[test]
    fn split_points_differ() {
        assert_ne!(hash_parts(&["ab", "c"]), hash_parts(&["a", "bc"]));
    }

    #[test]
    fn domain_separates_hashes() {
        let mut left = StructuralHasher::new("property_def");
        let mut right = StructuralHasher::new("aspect_def");
        left.write_str("x");
        right.write_str("x");
        assert_ne!(left.finish(), right.finish());
    }
}
