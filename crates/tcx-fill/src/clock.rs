//! Sleep abstraction so the monitor loop's adaptive polling can be driven
//! by a real clock in production and a near-instant double in tests —
//! takes an explicit clock/time input rather than reading the wall clock
//! internally, so polling cadence is deterministic under test.

use std::time::Duration;

use async_trait::async_trait;

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper — backs onto `tokio::time::sleep`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Test double: yields once to the executor but never actually waits, so
/// scenario tests exercising dozens of poll iterations run instantly.
#[derive(Clone, Copy, Debug, Default)]
pub struct InstantSleeper;

#[async_trait]
impl Sleeper for InstantSleeper {
    async fn sleep(&self, _duration: Duration) {
        tokio::task::yield_now().await;
    }
}
