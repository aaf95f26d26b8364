//! Seedable random sources for tree construction.
//!
//! Builds must be reproducible bit for bit, so the forest never touches
//! `thread_rng`. Every tree gets its own generator derived from the index
//! seed. The KISS generators here are George Marsaglia's "keep it simple
//! stupid" combination of a linear congruential generator, a xorshift and a
//! multiply-with-carry. They are fast, have tiny state, and implement
//! [`rand::RngCore`] so the rest of the `rand` ecosystem can drive them.

use crate::constants::random::DEFAULT_SEED;
use rand::{Rng, RngCore, SeedableRng};
use std::fmt;

/// Random source used by the forest builder.
pub trait Random: RngCore + Clone + Send + Sync + fmt::Debug + 'static {
    /// Create a generator in the state defined by `seed`.
    fn from_seed_value(seed: u64) -> Self;

    /// Reset the generator to the state defined by `seed`.
    fn seed(&mut self, seed: u64) {
        *self = Self::from_seed_value(seed);
    }

    /// Uniform integer in `[0, n)`. `n` must be non-zero.
    fn index(&mut self, n: usize) -> usize {
        debug_assert!(n > 0);
        (self.next_u64() % n as u64) as usize
    }

    /// Unbiased coin flip.
    fn flip(&mut self) -> bool {
        self.next_u32() & 1 == 1
    }

    /// Standard normal sample (Box-Muller).
    fn gaussian(&mut self) -> f64 {
        // gen::<f64>() is in [0, 1); shift to (0, 1] so ln never sees zero.
        let u1 = 1.0 - self.gen::<f64>();
        let u2 = self.gen::<f64>();
        (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
    }
}

/// KISS generator with 32-bit state words.
#[derive(Clone, PartialEq, Eq)]
pub struct Kiss32Random {
    x: u32,
    y: u32,
    z: u32,
    c: u32,
}

impl Kiss32Random {
    /// Create a generator seeded with `seed` (truncated to 32 bits).
    pub fn new(seed: u64) -> Self {
        Self {
            x: seed as u32,
            y: 362_436_000,
            z: 521_288_629,
            c: 7_654_321,
        }
    }

    #[inline]
    fn kiss(&mut self) -> u32 {
        // Linear congruence
        self.x = self.x.wrapping_mul(69_069).wrapping_add(12_345);

        // Xorshift
        self.y ^= self.y << 5;
        self.y ^= self.y >> 7;
        self.y ^= self.y << 22;

        // Multiply-with-carry
        let t = 698_769_069u64
            .wrapping_mul(u64::from(self.z))
            .wrapping_add(u64::from(self.c));
        self.c = (t >> 32) as u32;
        self.z = t as u32;

        self.x.wrapping_add(self.y).wrapping_add(self.z)
    }
}

impl Default for Kiss32Random {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

impl fmt::Debug for Kiss32Random {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kiss32Random").finish_non_exhaustive()
    }
}

impl RngCore for Kiss32Random {
    #[inline]
    fn next_u32(&mut self) -> u32 {
        self.kiss()
    }

    #[inline]
    fn next_u64(&mut self) -> u64 {
        let high = u64::from(self.kiss());
        let low = u64::from(self.kiss());
        (high << 32) | low
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        fill_from_u32(self, dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl SeedableRng for Kiss32Random {
    type Seed = [u8; 8];

    fn from_seed(seed: Self::Seed) -> Self {
        Self::new(u64::from_le_bytes(seed))
    }

    fn seed_from_u64(state: u64) -> Self {
        Self::new(state)
    }
}

impl Random for Kiss32Random {
    fn from_seed_value(seed: u64) -> Self {
        Self::new(seed)
    }

    #[inline]
    fn index(&mut self, n: usize) -> usize {
        debug_assert!(n > 0);
        if n <= u32::MAX as usize {
            (self.kiss() % n as u32) as usize
        } else {
            (self.next_u64() % n as u64) as usize
        }
    }
}

/// KISS generator with 64-bit state words, for item sets beyond 2^32.
#[derive(Clone, PartialEq, Eq)]
pub struct Kiss64Random {
    x: u64,
    y: u64,
    z: u64,
    c: u64,
}

impl Kiss64Random {
    /// Create a generator seeded with `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            x: seed,
            y: 362_436_362_436_362_436,
            z: 1_066_149_217_761_810,
            c: 123_456_123_456_123_456,
        }
    }

    #[inline]
    fn kiss(&mut self) -> u64 {
        // Linear congruence
        self.z = self
            .z
            .wrapping_mul(6_906_969_069)
            .wrapping_add(1_234_567);

        // Xorshift
        self.y ^= self.y << 13;
        self.y ^= self.y >> 17;
        self.y ^= self.y << 43;

        // Multiply-with-carry, (2^58 + 1) * x + c
        let t = (self.x << 58).wrapping_add(self.c);
        self.c = self.x >> 6;
        self.x = self.x.wrapping_add(t);
        self.c = self.c.wrapping_add(u64::from(self.x < t));

        self.x.wrapping_add(self.y).wrapping_add(self.z)
    }
}

impl Default for Kiss64Random {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

impl fmt::Debug for Kiss64Random {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kiss64Random").finish_non_exhaustive()
    }
}

impl RngCore for Kiss64Random {
    #[inline]
    fn next_u32(&mut self) -> u32 {
        self.kiss() as u32
    }

    #[inline]
    fn next_u64(&mut self) -> u64 {
        self.kiss()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        fill_from_u32(self, dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl SeedableRng for Kiss64Random {
    type Seed = [u8; 8];

    fn from_seed(seed: Self::Seed) -> Self {
        Self::new(u64::from_le_bytes(seed))
    }

    fn seed_from_u64(state: u64) -> Self {
        Self::new(state)
    }
}

impl Random for Kiss64Random {
    fn from_seed_value(seed: u64) -> Self {
        Self::new(seed)
    }
}

fn fill_from_u32<R: RngCore>(rng: &mut R, dest: &mut [u8]) {
    for chunk in dest.chunks_mut(4) {
        let bytes = rng.next_u32().to_le_bytes();
        chunk.copy_from_slice(&bytes[..chunk.len()]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = Kiss32Random::new(42);
        let mut b = Kiss32Random::new(42);
        for _ in 0..1000 {
            assert_eq!(a.next_u32(), b.next_u32());
        }

        let mut a = Kiss64Random::new(42);
        let mut b = Kiss64Random::new(42);
        for _ in 0..1000 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn test_seed_resets_state() {
        let mut rng = Kiss32Random::new(7);
        let first: Vec<u32> = (0..10).map(|_| rng.next_u32()).collect();
        rng.seed(7);
        let again: Vec<u32> = (0..10).map(|_| rng.next_u32()).collect();
        assert_eq!(first, again);
    }

    #[test]
    fn test_different_seeds_diverge() {
        let mut a = Kiss32Random::new(1);
        let mut b = Kiss32Random::new(2);
        let same = (0..100).filter(|_| a.next_u32() == b.next_u32()).count();
        assert!(same < 5);
    }

    #[test]
    fn test_index_in_range() {
        let mut rng = Kiss64Random::default();
        let mut seen = [false; 7];
        for _ in 0..1000 {
            let i = rng.index(7);
            assert!(i < 7);
            seen[i] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_flip_is_roughly_fair() {
        let mut rng = Kiss32Random::default();
        let heads = (0..10_000).filter(|_| rng.flip()).count();
        assert!((4_500..5_500).contains(&heads), "heads = {}", heads);
    }

    #[test]
    fn test_gaussian_moments() {
        let mut rng = Kiss32Random::new(99);
        let n = 20_000;
        let samples: Vec<f64> = (0..n).map(|_| rng.gaussian()).collect();
        let mean = samples.iter().sum::<f64>() / n as f64;
        let var = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
        assert!(mean.abs() < 0.05, "mean = {}", mean);
        assert!((var - 1.0).abs() < 0.1, "var = {}", var);
        assert!(samples.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn test_seedable_rng_interop() {
        let mut a = Kiss32Random::seed_from_u64(5);
        let mut b = Kiss32Random::from_seed(5u64.to_le_bytes());
        assert_eq!(a.next_u64(), b.next_u64());

        let mut bytes = [0u8; 7];
        a.fill_bytes(&mut bytes);
        let x: f32 = a.gen_range(-1.0..1.0);
        assert!((-1.0..1.0).contains(&x));
    }
}
