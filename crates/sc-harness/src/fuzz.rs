//! Bit-flip fuzz injection
//!
//! Corrupts encoded blocks on their way into a channel. The "period" is the
//! average distance in bytes between corrupted bytes; the actual number of
//! hits for a block is drawn from the binomial distribution of `length`
//! independent byte trials at probability `1/period`. Each hit toggles between
//! one and eight bits of a random byte, and always leaves the byte changed.
//!
//! The generator state is saved before and restored after every injection, so
//! the audio produced for a test case does not depend on whether fuzzing is
//! enabled. Only the transported bytes differ.

use crate::random::{Random, SharedRandom};
use crate::{HarnessError, Result};

/// Smallest accepted fuzz period in bytes
pub const MIN_FUZZ_PERIOD: u32 = 10;

/// Largest accepted fuzz period in bytes
pub const MAX_FUZZ_PERIOD: u32 = 1_000_000;

/// Check a period against the accepted range
pub fn validate_period(period: u32) -> Result<u32> {
    if (MIN_FUZZ_PERIOD..=MAX_FUZZ_PERIOD).contains(&period) {
        Ok(period)
    } else {
        Err(HarnessError::InvalidFuzzPeriod(period))
    }
}

/// Probability of exactly `hits` corrupted bytes in `length` bytes at an
/// average period of `period` bytes.
///
/// Evaluated as a sum of logarithms so long buffers do not underflow.
pub fn hit_probability(period: u32, length: usize, hits: usize) -> f64 {
    if hits > length || period == 0 {
        return 0.0;
    }

    let p = period as f64;
    let mut log_probability = (length - hits) as f64 * ((p - 1.0) / p).ln();

    for i in 0..hits {
        log_probability += ((length - i) as f64).ln() - (p * (i + 1) as f64).ln();
    }

    log_probability.exp()
}

/// Upper bound on hits for one buffer, so a pathological draw cannot hang
pub fn hit_limit(length: usize) -> usize {
    (length + 1) / 2
}

/// Pick the number of hits for a buffer given a uniform draw in `[0, 1)`.
///
/// Walks the cumulative distribution until it exceeds `draw`. Successive terms
/// are derived from each other, which is equivalent to calling
/// [`hit_probability`] for every count.
pub fn count_hits(period: u32, length: usize, draw: f64) -> usize {
    if length == 0 || period <= 1 {
        return 0;
    }

    let p = period as f64;
    let keep = ((p - 1.0) / p).ln();
    let limit = hit_limit(length);

    let mut log_term = length as f64 * keep;
    let mut accumulated = 0.0;
    let mut hits = 0;

    loop {
        accumulated += log_term.exp();
        if accumulated >= draw {
            break;
        }

        log_term += ((length - hits) as f64).ln() - (p * (hits + 1) as f64).ln() - keep;
        hits += 1;

        if hits == limit {
            break;
        }
    }

    hits
}

/// Apply `hits` corruptions to `data`, drawing positions and bits from `rng`
pub fn corrupt(data: &mut [u8], hits: usize, rng: &mut Random) {
    if data.is_empty() {
        return;
    }

    let length = data.len();

    for _ in 0..hits {
        let index = ((rng.draw() * length as f64).floor() as usize).min(length - 1);
        let mut toggles = (rng.draw() * 8.0).ceil() as u32;
        let initial = data[index];

        while toggles > 0 || data[index] == initial {
            let bit = (rng.draw() * 8.0).floor() as u32;
            data[index] ^= 1 << bit.min(7);
            toggles = toggles.saturating_sub(1);
        }

        log::trace!("fuzz hit at byte {} ({:#04x} -> {:#04x})", index, initial, data[index]);
    }
}

/// Fuzzer attached to a channel
#[derive(Debug, Clone)]
pub struct FuzzInjector {
    period: u32,
    rng: SharedRandom,
}

impl FuzzInjector {
    pub fn new(period: u32, rng: SharedRandom) -> Result<Self> {
        Ok(Self {
            period: validate_period(period)?,
            rng,
        })
    }

    pub fn period(&self) -> u32 {
        self.period
    }

    /// Corrupt `data` in place and return the number of hits applied.
    ///
    /// The generator is left exactly as it was found.
    pub fn inject(&self, data: &mut [u8]) -> usize {
        let mut rng = self.rng.lock();
        let saved = rng.seed();

        let hits = count_hits(self.period, data.len(), rng.draw());
        corrupt(data, hits, &mut rng);

        rng.set_seed(saved);
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_range() {
        assert!(validate_period(9).is_err());
        assert!(validate_period(10).is_ok());
        assert!(validate_period(1_000_000).is_ok());
        assert!(validate_period(1_000_001).is_err());
    }

    #[test]
    fn test_hit_probability_sums_to_one() {
        let total: f64 = (0..=200).map(|k| hit_probability(50, 200, k)).sum();
        approx::assert_abs_diff_eq!(total, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_hit_probability_matches_closed_form() {
        // one hit in two bytes at period 2: 2 * 1/2 * 1/2
        approx::assert_abs_diff_eq!(hit_probability(2, 2, 1), 0.5, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(hit_probability(2, 2, 0), 0.25, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(hit_probability(10, 1, 1), 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_long_buffers_do_not_underflow() {
        let p = hit_probability(10, 100_000, 10_000);
        assert!(p > 0.0 && p < 1.0);
    }

    #[test]
    fn test_count_hits_follows_cdf() {
        let (period, length) = (100, 1000);
        for draw in [0.0, 0.01, 0.2, 0.5, 0.8, 0.999] {
            let hits = count_hits(period, length, draw);
            let below: f64 = (0..hits).map(|k| hit_probability(period, length, k)).sum();
            let through = below + hit_probability(period, length, hits);
            assert!(below < draw || hits == 0, "draw {} hits {}", draw, hits);
            assert!(through >= draw - 1e-9, "draw {} hits {}", draw, hits);
        }
    }

    #[test]
    fn test_mean_hits_converge_to_length_over_period() {
        let (period, length) = (100, 5000);
        let mut rng = Random::new(0x5eed);
        let draws = 20_000;

        let total: usize = (0..draws).map(|_| count_hits(period, length, rng.draw())).sum();
        let mean = total as f64 / draws as f64;

        approx::assert_relative_eq!(mean, 50.0, max_relative = 0.02);
    }

    #[test]
    fn test_count_hits_bounded() {
        for length in [1usize, 2, 3, 10, 101] {
            assert!(count_hits(10, length, 0.999_999_999) <= hit_limit(length));
        }
        assert_eq!(count_hits(10, 0, 0.5), 0);
    }

    #[test]
    fn test_corrupt_always_changes_byte() {
        let mut rng = Random::new(3);
        for _ in 0..1000 {
            let mut data = [0x5Au8];
            corrupt(&mut data, 1, &mut rng);
            assert_ne!(data[0], 0x5A);
        }
    }

    #[test]
    fn test_inject_restores_seed() {
        let rng = SharedRandom::new(1234);
        let injector = FuzzInjector::new(10, rng.clone()).unwrap();
        let before = rng.seed();

        let mut data = vec![0u8; 4096];
        let hits = injector.inject(&mut data);

        assert_eq!(rng.seed(), before);
        assert!(hits > 0);
        assert!(data.iter().any(|&b| b != 0));
    }

    #[test]
    fn test_inject_is_reproducible() {
        let a = FuzzInjector::new(50, SharedRandom::new(77)).unwrap();
        let b = FuzzInjector::new(50, SharedRandom::new(77)).unwrap();
        let mut da = vec![0xAAu8; 2000];
        let mut db = vec![0xAAu8; 2000];
        assert_eq!(a.inject(&mut da), b.inject(&mut db));
        assert_eq!(da, db);
    }
}
