//! Polite pacing between requests.
//!
//! Each worker sleeps a random interval between its own consecutive
//! fetches; there is no global throttle.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Inclusive millisecond range a random delay is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min: u64,
    pub max: u64,
}

impl DelayRange {
    pub const fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }

    /// No delay at all. Used by tests and local fixtures.
    pub const fn none() -> Self {
        Self { min: 0, max: 0 }
    }

    pub fn is_valid(&self) -> bool {
        self.min <= self.max
    }

    /// Draw one delay from the range.
    pub fn sample(&self) -> Duration {
        random_delay(self.min, self.max)
    }
}

impl Default for DelayRange {
    /// 300-800ms between requests.
    fn default() -> Self {
        Self::new(300, 800)
    }
}

/// Generate a random delay between min_ms and max_ms.
pub fn random_delay(min_ms: u64, max_ms: u64) -> Duration {
    if max_ms <= min_ms {
        return Duration::from_millis(min_ms);
    }
    let mut rng = rand::thread_rng();
    let ms = rng.gen_range(min_ms..=max_ms);
    Duration::from_millis(ms)
}

/// Sleep for a random delay drawn from `range`.
pub async fn sleep_polite(range: DelayRange) {
    let delay = range.sample();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_delay_within_bounds() {
        for _ in 0..200 {
            let d = random_delay(300, 800);
            assert!(d >= Duration::from_millis(300));
            assert!(d <= Duration::from_millis(800));
        }
    }

    #[test]
    fn test_degenerate_range() {
        assert_eq!(random_delay(5, 5), Duration::from_millis(5));
        assert_eq!(DelayRange::none().sample(), Duration::ZERO);
        assert!(!DelayRange::new(10, 1).is_valid());
    }
}
