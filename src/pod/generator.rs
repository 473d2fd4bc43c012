//! Suffix generators for ephemeral pod names.

use parking_lot::Mutex;
use rand::Rng;
use std::sync::{Arc, OnceLock};

/// Length of generated pod name suffixes.
pub const SUFFIX_LEN: usize = 10;

/// Source of unique lowercase suffixes for ephemeral pod names.
pub trait NameGenerator: Send + Sync {
    /// Generate a suffix of `len` lowercase ASCII letters.
    fn generate(&self, len: usize) -> String;
}

/// Cryptographically random suffixes (thread-local ChaCha, OS seeded).
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomNameGenerator;

impl NameGenerator for RandomNameGenerator {
    fn generate(&self, len: usize) -> String {
        let mut rng = rand::rng();
        (0..len)
            .map(|_| char::from(rng.random_range(b'a'..=b'z')))
            .collect()
    }
}

/// Deterministic suffixes for reproducible fixtures.
///
/// The first call yields `aaaaaaaaaa`, the next `bbbbbbbbbb`, wrapping back
/// to `a` after `z`.
#[derive(Debug)]
pub struct SequentialNameGenerator {
    current: Mutex<u8>,
}

impl SequentialNameGenerator {
    pub fn new() -> Self {
        Self::starting_at('a')
    }

    /// Start the sequence at `first`. Non-lowercase input starts at `a`.
    pub fn starting_at(first: char) -> Self {
        let first = if first.is_ascii_lowercase() { first as u8 } else { b'a' };
        Self {
            current: Mutex::new(first),
        }
    }
}

impl Default for SequentialNameGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl NameGenerator for SequentialNameGenerator {
    fn generate(&self, len: usize) -> String {
        let mut current = self.current.lock();
        let suffix = char::from(*current).to_string().repeat(len);
        *current = if *current == b'z' { b'a' } else { *current + 1 };
        suffix
    }
}

static DEFAULT_GENERATOR: OnceLock<Arc<dyn NameGenerator>> = OnceLock::new();

/// Process-wide random generator shared by contexts built without an
/// explicit one.
pub fn default_generator() -> Arc<dyn NameGenerator> {
    DEFAULT_GENERATOR
        .get_or_init(|| Arc::new(RandomNameGenerator))
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_generator_shape() {
        let suffix = RandomNameGenerator.generate(SUFFIX_LEN);
        assert_eq!(suffix.len(), SUFFIX_LEN);
        assert!(suffix.chars().all(|c| c.is_ascii_lowercase()));
    }

    #[test]
    fn test_random_generator_varies() {
        let a = RandomNameGenerator.generate(32);
        let b = RandomNameGenerator.generate(32);
        assert_ne!(a, b);
    }

    #[test]
    fn test_sequential_generator() {
        let generator = SequentialNameGenerator::new();
        assert_eq!(generator.generate(SUFFIX_LEN), "aaaaaaaaaa");
        assert_eq!(generator.generate(SUFFIX_LEN), "bbbbbbbbbb");
        assert_eq!(generator.generate(3), "ccc");
    }

    #[test]
    fn test_sequential_generator_wraps() {
        let generator = SequentialNameGenerator::starting_at('z');
        assert_eq!(generator.generate(2), "zz");
        assert_eq!(generator.generate(2), "aa");
    }

    #[test]
    fn test_default_generator_is_shared() {
        let a = default_generator();
        let b = default_generator();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.generate(SUFFIX_LEN).len(), SUFFIX_LEN);
    }
}
