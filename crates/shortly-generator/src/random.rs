use crate::Generator;
use jiff::Timestamp;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shortly_core::shortcode::DEFAULT_LENGTH;
use shortly_core::ShortCode;
use std::sync::atomic::{AtomicU64, Ordering};
use typed_builder::TypedBuilder;

/// The 62 characters a generated code is drawn from.
pub const ALPHABET: &[u8; 62] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generates fixed-length codes with every character drawn uniformly from
/// [`ALPHABET`].
///
/// The RNG is reseeded on every call from the current time in nanoseconds.
/// A per-instance call counter is mixed into the seed so two calls landing on
/// the same clock tick still diverge. Nothing here checks the output against
/// codes that are already stored.
#[derive(Debug, TypedBuilder)]
pub struct RandomGenerator {
    #[builder(default = DEFAULT_LENGTH)]
    length: usize,
    #[builder(default, setter(skip))]
    calls: AtomicU64,
}

impl RandomGenerator {
    /// Creates a generator producing codes of [`DEFAULT_LENGTH`] characters.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a generator producing codes of `length` characters.
    pub fn with_length(length: usize) -> Self {
        Self::builder().length(length).build()
    }

    pub fn length(&self) -> usize {
        self.length
    }

    fn seed(&self) -> u64 {
        let nanos = Timestamp::now().as_nanosecond() as u64;
        let call = self.calls.fetch_add(1, Ordering::Relaxed);
        nanos ^ call.wrapping_mul(0x9E37_79B9_7F4A_7C15)
    }
}

impl Default for RandomGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator for RandomGenerator {
    type Output = ShortCode;

    fn generate(&self) -> Self::Output {
        let mut rng = StdRng::seed_from_u64(self.seed());
        let code: String = (0..self.length)
            .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
            .collect();
        ShortCode::new_unchecked(code)
    }
}
