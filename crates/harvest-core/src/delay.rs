//! Inter-request delay policy.
//!
//! A randomized pause before each fetch breaks up the request-timing
//! signature. Injected as a capability so tests can substitute
//! [`NoDelay`] and run deterministically.

use std::time::Duration;

/// Produces the pause applied before each fetch attempt.
pub trait DelayPolicy: Send + Sync {
    fn next_delay(&self) -> Duration;
}

/// Uniform random delay in `[min, max]`.
#[derive(Debug, Clone)]
pub struct UniformDelay {
    pub min: Duration,
    pub max: Duration,
}

impl UniformDelay {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }
}

impl Default for UniformDelay {
    /// 2–5 seconds between requests.
    fn default() -> Self {
        Self {
            min: Duration::from_secs(2),
            max: Duration::from_secs(5),
        }
    }
}

impl DelayPolicy for UniformDelay {
    fn next_delay(&self) -> Duration {
        let span_ms = self.max.saturating_sub(self.min).as_millis() as u64;
        if span_ms == 0 {
            return self.min;
        }
        self.min + Duration::from_millis(rand_ms(span_ms + 1))
    }
}

/// Zero delay, for tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

impl DelayPolicy for NoDelay {
    fn next_delay(&self) -> Duration {
        Duration::ZERO
    }
}

// Seed from the high-resolution clock and run xorshift64 — good enough
// for request jitter, not crypto, and avoids pulling in the `rand` crate.
fn rand_ms(bound: u64) -> u64 {
    let mut x = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    x % bound
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_delay_is_bounded() {
        let policy = UniformDelay::new(Duration::from_millis(100), Duration::from_millis(200));
        for _ in 0..100 {
            let d = policy.next_delay();
            assert!(d >= Duration::from_millis(100));
            assert!(d <= Duration::from_millis(200));
        }
    }

    #[test]
    fn test_degenerate_range_returns_min() {
        let policy = UniformDelay::new(Duration::from_secs(3), Duration::from_secs(3));
        assert_eq!(policy.next_delay(), Duration::from_secs(3));
    }

    #[test]
    fn test_default_range_is_two_to_five_seconds() {
        let policy = UniformDelay::default();
        assert_eq!(policy.min, Duration::from_secs(2));
        assert_eq!(policy.max, Duration::from_secs(5));
    }

    #[test]
    fn test_no_delay_is_zero() {
        assert_eq!(NoDelay.next_delay(), Duration::ZERO);
    }
}
