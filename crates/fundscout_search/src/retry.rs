//! Transient-fault retry for adapter calls.

use crate::error::SearchError;
use fundscout_protocol::defaults::{ADAPTER_BACKOFF_BASE_MS, ADAPTER_BACKOFF_JITTER_PCT};
use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::warn;

/// Run `attempt_fn` up to `max_attempts` times, backing off between
/// transient failures. Terminal failures (4xx, parse, unsupported engine)
/// return immediately.
pub async fn with_retries<T, F, Fut>(max_attempts: u32, mut attempt_fn: F) -> Result<T, SearchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SearchError>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match attempt_fn().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < max_attempts => {
                let delay = backoff_with_jitter(attempt);
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient engine failure, backing off"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Exponential backoff: base 200 ms, factor 2, jitter up to +/-25 %.
/// Jitter entropy comes from the sub-second clock; no rand dependency.
pub fn backoff_with_jitter(attempt: u32) -> Duration {
    let base = ADAPTER_BACKOFF_BASE_MS.saturating_mul(1u64 << (attempt.saturating_sub(1)).min(16));
    let jitter_span = base * ADAPTER_BACKOFF_JITTER_PCT / 100;
    let entropy = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0);
    let jitter = if jitter_span == 0 {
        0
    } else {
        entropy % (2 * jitter_span + 1)
    };
    Duration::from_millis(base - jitter_span + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn backoff_grows_and_stays_near_schedule() {
        for attempt in 1..=3u32 {
            let base = 200u64 * (1 << (attempt - 1));
            let d = backoff_with_jitter(attempt).as_millis() as u64;
            assert!(d >= base - base / 4, "attempt {attempt}: {d} too small");
            assert!(d <= base + base / 4, "attempt {attempt}: {d} too large");
        }
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_retries(3, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(SearchError::Http5xx { status: 503 })
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn terminal_failures_do_not_retry() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retries(3, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(SearchError::Http4xx { status: 403 }) }
        })
        .await;
        assert!(matches!(result, Err(SearchError::Http4xx { status: 403 })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn attempts_exhaust_with_the_last_error() {
        let result: Result<(), _> =
            with_retries(2, || async { Err(SearchError::Network("reset".into())) }).await;
        assert!(matches!(result, Err(SearchError::Network(_))));
    }
}
