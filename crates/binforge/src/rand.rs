use crate::{Error, Result};
use ::rand::{Rng, TryRngCore, rng, rngs::OsRng};

/// A source of uniformly distributed small integers.
///
/// The [`Synthesizer`](crate::Synthesizer) draws every digit, month, year
/// offset, and security code through this trait, which lets tests plug in a
/// scripted sequence.
pub trait RandSource {
    /// Returns a value uniformly distributed in `0..bound`.
    ///
    /// `bound` is always greater than zero.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RandomnessUnavailable`] if the underlying generator
    /// cannot produce output.
    fn try_below(&self, bound: u32) -> Result<u32>;
}

impl<R: RandSource + ?Sized> RandSource for &R {
    fn try_below(&self, bound: u32) -> Result<u32> {
        (**self).try_below(bound)
    }
}

/// A `RandSource` that uses the thread-local RNG (`rand::rng()`).
///
/// Fast, automatically reseeded, and never fails. Each OS thread has its own
/// generator; this type only holds a handle-free marker so it is `Send` and
/// `Sync` and can be shared across tasks.
#[derive(Default, Clone, Copy, Debug)]
pub struct ThreadRandom;

impl RandSource for ThreadRandom {
    fn try_below(&self, bound: u32) -> Result<u32> {
        Ok(rng().random_range(0..bound))
    }
}

/// A `RandSource` that reads the operating system's entropy source directly.
///
/// Slower than [`ThreadRandom`], but an entropy failure is reported as an
/// error instead of a panic.
#[derive(Default, Clone, Copy, Debug)]
pub struct OsRandom;

impl RandSource for OsRandom {
    fn try_below(&self, bound: u32) -> Result<u32> {
        // Reject the biased tail so every residue is equally likely.
        let zone = u32::MAX - (u32::MAX % bound);
        loop {
            let v = OsRng
                .try_next_u32()
                .map_err(|e| Error::RandomnessUnavailable(e.to_string()))?;
            if v < zone {
                return Ok(v % bound);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_random_stays_in_bounds() {
        for bound in [1, 2, 10, 12, 1000] {
            for _ in 0..500 {
                assert!(ThreadRandom.try_below(bound).unwrap() < bound);
            }
        }
    }

    #[test]
    fn os_random_stays_in_bounds() {
        for bound in [1, 10, 12] {
            for _ in 0..100 {
                assert!(OsRandom.try_below(bound).unwrap() < bound);
            }
        }
    }

    #[test]
    fn thread_random_covers_every_digit() {
        let mut seen = [false; 10];
        for _ in 0..2000 {
            seen[ThreadRandom.try_below(10).unwrap() as usize] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }
}
