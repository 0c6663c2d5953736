//! Jittered TTL policy.
//!
//! Entries written in the same burst get expirations spread over
//! `base ± base × fraction`, so they do not all expire in the same instant.

use std::time::Duration;

use rand::Rng;

/// Shortest TTL the policy hands out when jitter would push below it.
const MIN_TTL: Duration = Duration::from_secs(1);

/// Randomizes TTLs around a base duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JitterPolicy {
    fraction: f64,
}

impl JitterPolicy {
    /// Creates a policy with the given jitter fraction, clamped to `[0, 1)`.
    pub fn new(fraction: f64) -> Self {
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 0.99)
        } else {
            0.0
        };
        Self { fraction }
    }

    /// A policy that returns the base TTL unchanged.
    pub fn none() -> Self {
        Self { fraction: 0.0 }
    }

    /// The configured jitter fraction.
    pub fn fraction(&self) -> f64 {
        self.fraction
    }

    /// Applies jitter using the thread-local RNG.
    pub fn apply(&self, base: Duration) -> Duration {
        self.apply_with(base, &mut rand::rng())
    }

    /// Applies jitter using the given RNG.
    ///
    /// The result lies in `[base - base·fraction, base + base·fraction]` and
    /// never drops below one second unless `base` itself is shorter.
    pub fn apply_with<R: Rng + ?Sized>(&self, base: Duration, rng: &mut R) -> Duration {
        if self.fraction == 0.0 || base.is_zero() {
            return base;
        }

        let base_secs = base.as_secs_f64();
        let range = base_secs * self.fraction;
        let offset = rng.random_range(-range..=range);

        let floor = base.min(MIN_TTL);
        Duration::try_from_secs_f64(base_secs + offset)
            .unwrap_or(base)
            .max(floor)
    }

    /// Bounds `(min, max)` of what [`apply`](Self::apply) can return for `base`.
    pub fn bounds(&self, base: Duration) -> (Duration, Duration) {
        let range = base.mul_f64(self.fraction);
        let floor = base.min(MIN_TTL);
        (base.saturating_sub(range).max(floor), base.saturating_add(range))
    }
}

impl Default for JitterPolicy {
    fn default() -> Self {
        Self::new(0.2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = JitterPolicy::new(0.2);
        let base = Duration::from_secs(600);
        let (min, max) = policy.bounds(base);

        let slack = Duration::from_millis(1);
        assert!(min.abs_diff(Duration::from_secs(480)) < slack);
        assert!(max.abs_diff(Duration::from_secs(720)) < slack);

        for _ in 0..1_000 {
            let ttl = policy.apply(base);
            assert!(
                ttl + slack >= min && ttl <= max + slack,
                "ttl {:?} out of bounds",
                ttl
            );
        }
    }

    #[test]
    fn test_burst_of_writes_spreads_expirations() {
        let policy = JitterPolicy::new(0.2);
        let base = Duration::from_secs(600);
        let mut rng = StdRng::seed_from_u64(7);

        let ttls: Vec<Duration> = (0..500).map(|_| policy.apply_with(base, &mut rng)).collect();
        let min = ttls.iter().min().unwrap();
        let max = ttls.iter().max().unwrap();

        // Full window is 240s; a burst of 500 should cover most of it.
        let spread = *max - *min;
        assert!(spread > Duration::from_secs(180), "spread only {:?}", spread);
    }

    #[test]
    fn test_zero_fraction_is_identity() {
        let policy = JitterPolicy::none();
        let base = Duration::from_secs(60);
        assert_eq!(policy.apply(base), base);
    }

    #[test]
    fn test_fraction_is_clamped() {
        assert_eq!(JitterPolicy::new(-1.0).fraction(), 0.0);
        assert_eq!(JitterPolicy::new(5.0).fraction(), 0.99);
        assert_eq!(JitterPolicy::new(f64::NAN).fraction(), 0.0);
    }

    #[test]
    fn test_huge_base_does_not_overflow() {
        let policy = JitterPolicy::new(0.2);
        let base = Duration::from_secs(u64::MAX);

        let (min, max) = policy.bounds(base);
        assert!(min < base);
        assert_eq!(max, Duration::MAX);

        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            assert!(policy.apply_with(base, &mut rng) > Duration::from_secs(1));
        }
    }

    #[test]
    fn test_short_ttl_never_below_floor() {
        let policy = JitterPolicy::new(0.9);
        let base = Duration::from_secs(2);
        for _ in 0..200 {
            assert!(policy.apply(base) >= Duration::from_secs(1));
        }

        let tiny = Duration::from_millis(200);
        for _ in 0..200 {
            assert!(policy.apply(tiny) >= tiny);
        }
    }
}
