//! Bounded exponential-backoff retry around the outbound model call.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use rand::Rng;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// Invoke `call` until it succeeds, retrying up to `policy.max_attempts`
/// total attempts with exponential backoff and jitter. `on_error` fires once
/// per failed attempt; after the final attempt the last error is returned
/// unmodified.
pub async fn call_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    mut call: F,
    mut on_error: impl FnMut(&anyhow::Error),
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);

    let mut attempt = 0;
    loop {
        attempt += 1;
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                on_error(&err);
                if attempt >= max_attempts {
                    return Err(err);
                }
                let backoff =
                    policy.base_delay.as_secs_f64() * 2f64.powi(attempt as i32 - 1);
                let jitter: f64 = rand::thread_rng().gen_range(0.0..0.5);
                let delay = Duration::from_secs_f64(backoff + jitter);
                warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "model call failed, backing off: {err:#}"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt_does_not_sleep() {
        let start = tokio::time::Instant::now();
        let result = call_with_retry(
            &RetryPolicy::default(),
            || async { Ok::<_, anyhow::Error>(42) },
            |_| {},
        )
        .await
        .unwrap();
        assert_eq!(result, 42);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_error() {
        let calls = AtomicU32::new(0);
        let mut errors_seen = 0;
        let result: Result<()> = call_with_retry(
            &RetryPolicy {
                max_attempts: 5,
                base_delay: Duration::from_secs(1),
            },
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Err(anyhow!("boom {n}")) }
            },
            |_| errors_seen += 1,
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(errors_seen, 5);
        assert_eq!(result.unwrap_err().to_string(), "boom 5");
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = call_with_retry(
            &RetryPolicy::default(),
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 3 {
                        Err(anyhow!("transient"))
                    } else {
                        Ok("ok")
                    }
                }
            },
            |_| {},
        )
        .await
        .unwrap();

        assert_eq!(result, "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_delays_are_at_least_exponential() {
        let start = tokio::time::Instant::now();
        let result: Result<()> = call_with_retry(
            &RetryPolicy {
                max_attempts: 4,
                base_delay: Duration::from_secs(1),
            },
            || async { Err(anyhow!("down")) },
            |_| {},
        )
        .await;
        assert!(result.is_err());

        // Three sleeps of 1, 2, and 4 seconds plus up to 0.5s jitter each.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(7), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs_f64(8.5), "elapsed {elapsed:?}");
    }
}
