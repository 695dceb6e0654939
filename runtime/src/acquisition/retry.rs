//! Bounded retry with jittered exponential backoff.

use crate::stealth::behavior::DelayRange;
use std::future::Future;
use std::time::Duration;

/// How many attempts a fetch gets and how long to wait between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Randomized base delay before the first retry.
    pub base_delay: DelayRange,
    /// Growth factor applied per additional retry.
    pub multiplier: u32,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, base_delay: DelayRange, multiplier: u32) -> Self {
        Self {
            max_attempts,
            base_delay,
            multiplier,
        }
    }

    /// Retry without sleeping. Used against local fixtures.
    pub const fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, DelayRange::none(), 1)
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = self
            .multiplier
            .max(1)
            .saturating_pow(attempt.saturating_sub(1));
        self.base_delay.sample().saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    /// Three attempts, 0.3-0.8s base delay, doubling.
    fn default() -> Self {
        Self::new(3, DelayRange::default(), 2)
    }
}

/// What to do with an attempt's error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    Retry,
    Abort,
}

/// The last error once retries are exhausted or aborted.
#[derive(Debug)]
pub struct RetryFailure<E> {
    pub error: E,
    pub attempts: u32,
}

/// Run `operation` until it succeeds, the error is classified as
/// [`RetryDisposition::Abort`], or `policy.max_attempts` is reached.
///
/// `on_retry(attempt, backoff, &error)` fires before each sleep. On success
/// the number of attempts used is returned alongside the value.
pub async fn retry_with_backoff<T, E, F, Fut, L, C>(
    policy: RetryPolicy,
    mut operation: F,
    mut on_retry: L,
    mut classify_error: C,
) -> Result<(T, u32), RetryFailure<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    L: FnMut(u32, Duration, &E),
    C: FnMut(&E) -> RetryDisposition,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation(attempt).await {
            Ok(value) => return Ok((value, attempt)),
            Err(error) => {
                let exhausted = attempt >= max_attempts;
                if exhausted || classify_error(&error) == RetryDisposition::Abort {
                    return Err(RetryFailure {
                        error,
                        attempts: attempt,
                    });
                }
                let backoff = policy.backoff(attempt);
                on_retry(attempt, backoff, &error);
                if !backoff.is_zero() {
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_succeeds_on_third_attempt() {
        let calls = AtomicU32::new(0);
        let mut retries = Vec::new();

        let result = retry_with_backoff(
            RetryPolicy::immediate(3),
            |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 3 {
                        Err(format!("boom {n}"))
                    } else {
                        Ok("body")
                    }
                }
            },
            |attempt, _, err: &String| retries.push((attempt, err.clone())),
            |_| RetryDisposition::Retry,
        )
        .await;

        let (value, attempts) = result.unwrap();
        assert_eq!(value, "body");
        assert_eq!(attempts, 3);
        assert_eq!(retries, vec![(1, "boom 1".to_string()), (2, "boom 2".to_string())]);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<((), u32), _> = retry_with_backoff(
            RetryPolicy::immediate(3),
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>("down") }
            },
            |_, _, _| {},
            |_| RetryDisposition::Retry,
        )
        .await;

        let failure = result.unwrap_err();
        assert_eq!(failure.attempts, 3);
        assert_eq!(failure.error, "down");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_abort_skips_remaining_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<((), u32), _> = retry_with_backoff(
            RetryPolicy::immediate(3),
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>("404") }
            },
            |_, _, _| panic!("must not retry"),
            |_| RetryDisposition::Abort,
        )
        .await;

        assert_eq!(result.unwrap_err().attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_grows_exponentially() {
        let policy = RetryPolicy::new(3, DelayRange::new(300, 800), 2);
        let first = policy.backoff(1);
        let second = policy.backoff(2);
        assert!(first >= Duration::from_millis(300) && first <= Duration::from_millis(800));
        assert!(second >= Duration::from_millis(600) && second <= Duration::from_millis(1600));
    }
}
