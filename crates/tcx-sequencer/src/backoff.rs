//! Shared exponential-backoff retry helper (§4.2 `retry_with_backoff`):
//! delays 0.5s, 1.0s, 2.0s, surfacing the last error on exhaustion.

use std::time::Duration;

use tcx_fill::Sleeper;

/// Delays between retries, in order (§4.2).
pub const BACKOFF_DELAYS_MS: &[u64] = &[500, 1_000, 2_000];

/// Runs `op` up to `max_retries + 1` times (the initial attempt plus up to
/// `max_retries` retries), sleeping `BACKOFF_DELAYS_MS[attempt]` between
/// attempts (clamped to the last entry once retries exceed the table).
/// Returns the first `Ok`, or the last `Err` once retries are exhausted.
pub async fn retry_with_backoff<T, E, F, Fut>(
    sleeper: &dyn Sleeper,
    max_retries: u32,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= max_retries {
                    return Err(err);
                }
                let delay_ms = BACKOFF_DELAYS_MS
                    .get(attempt as usize)
                    .copied()
                    .unwrap_or_else(|| *BACKOFF_DELAYS_MS.last().unwrap());
                sleeper.sleep(Duration::from_millis(delay_ms)).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tcx_fill::InstantSleeper;

    #[tokio::test]
    async fn succeeds_immediately_without_retrying() {
        let calls = AtomicU32::new(0);
        let sleeper = InstantSleeper;
        let result: Result<u32, &str> = retry_with_backoff(&sleeper, 3, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(7) }
        })
        .await;
        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_until_success_within_budget() {
        let calls = AtomicU32::new(0);
        let sleeper = InstantSleeper;
        let result: Result<u32, &str> = retry_with_backoff(&sleeper, 3, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { if n < 2 { Err("transient") } else { Ok(42) } }
        })
        .await;
        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn surfaces_last_error_on_exhaustion() {
        let calls = AtomicU32::new(0);
        let sleeper = InstantSleeper;
        let result: Result<u32, &str> = retry_with_backoff(&sleeper, 2, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("still failing") }
        })
        .await;
        assert_eq!(result, Err("still failing"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
