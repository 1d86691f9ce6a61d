use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Linear backoff: after failed attempt `n` (1-based) wait `backoff * n`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(800),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self { attempts, backoff }
    }

    /// Saturates instead of overflowing on absurd configured backoffs.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff.checked_mul(attempt).unwrap_or(Duration::MAX)
    }
}

/// Runs `op` until it succeeds or `policy.attempts` are used up, returning the
/// last error. No jitter.
pub async fn with_retry<T, E, F, Fut>(policy: RetryPolicy, label: &str, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                debug!("{} failed (attempt {}/{}): {}", label, attempt, attempts, e);
                if attempt >= attempts {
                    return Err(e);
                }
                sleep(policy.delay_after(attempt)).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let started = tokio::time::Instant::now();

        let result: Result<u32, String> = with_retry(RetryPolicy::default(), "flaky", || {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(format!("boom {}", n))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 800ms after the first failure, 1600ms after the second
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(2400), "waited {:?}", waited);
        assert!(waited < Duration::from_millis(2500), "waited {:?}", waited);
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), String> =
            with_retry(RetryPolicy::new(3, Duration::from_millis(10)), "dead", || {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    Err(format!("failure {}", n))
                }
            })
            .await;

        assert_eq!(result, Err("failure 3".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_attempts_still_runs_once() {
        let result: Result<u8, String> =
            with_retry(RetryPolicy::new(0, Duration::from_millis(10)), "once", || async { Ok(1) }).await;
        assert_eq!(result, Ok(1));
    }

    #[test]
    fn test_linear_delay() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1000));
        assert_eq!(policy.delay_after(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_after(3), Duration::from_millis(3000));
    }

    #[test]
    fn test_huge_backoff_saturates() {
        let policy = RetryPolicy::new(3, Duration::from_secs(u64::MAX / 2));
        assert_eq!(policy.delay_after(1), Duration::from_secs(u64::MAX / 2));
        assert_eq!(policy.delay_after(3), Duration::MAX);
    }
}
