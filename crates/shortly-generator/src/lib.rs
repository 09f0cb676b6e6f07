pub mod random;

pub use random::RandomGenerator;

use shortly_core::ShortCode;

/// Trait for generating short codes.
///
/// Implementations are pure generators that don't interact with storage, so
/// they cannot promise that a code is not already taken.
pub trait Generator: Send + Sync + 'static {
    type Output: Into<ShortCode>;

    /// Generates a fresh short code.
    fn generate(&self) -> Self::Output;
}
