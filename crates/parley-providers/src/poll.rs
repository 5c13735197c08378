//! Bounded submit-then-poll primitive.
//!
//! Used by providers that hand back a job id instead of a result. The loop
//! makes at most `max_attempts` checks, sleeps a fixed `interval` between
//! them, and fails with [`ProviderError::PollExhausted`] once attempts run
//! out. Only the calling task waits.

use std::future::Future;
use std::time::Duration;

use parley_core::config::PollConfig;
use tracing::trace;

use crate::ProviderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl PollPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }
}

impl From<PollConfig> for PollPolicy {
    fn from(config: PollConfig) -> Self {
        Self::new(config.max_attempts, config.interval())
    }
}

/// Outcome of a single poll check.
#[derive(Debug)]
pub enum PollStatus<T> {
    Ready(T),
    Pending,
}

/// Run `step` until it reports `Ready`, errors, or attempts are exhausted.
///
/// `step` receives the 1-based attempt number. Errors from `step` end the
/// loop immediately.
pub async fn poll_bounded<T, F, Fut>(policy: PollPolicy, mut step: F) -> Result<T, ProviderError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<PollStatus<T>, ProviderError>>,
{
    for attempt in 1..=policy.max_attempts {
        match step(attempt).await? {
            PollStatus::Ready(value) => return Ok(value),
            PollStatus::Pending => {
                trace!(attempt, max = policy.max_attempts, "Job still pending");
                if attempt < policy.max_attempts {
                    tokio::time::sleep(policy.interval).await;
                }
            }
        }
    }
    Err(ProviderError::PollExhausted {
        attempts: policy.max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_attempts: u32) -> PollPolicy {
        PollPolicy::new(max_attempts, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_ready_on_third_attempt() {
        let result = poll_bounded(fast(5), |attempt| async move {
            if attempt == 3 {
                Ok(PollStatus::Ready(attempt))
            } else {
                Ok(PollStatus::Pending)
            }
        })
        .await
        .unwrap();
        assert_eq!(result, 3);
    }

    #[tokio::test]
    async fn test_exhaustion_is_explicit() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let err = poll_bounded::<(), _, _>(fast(4), move |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(PollStatus::Pending)
            }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ProviderError::PollExhausted { attempts: 4 }));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_error_stops_polling() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let err = poll_bounded::<(), _, _>(fast(10), move |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::Rejected("bad audio".into()))
            }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ProviderError::Rejected(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_from_config() {
        let policy = PollPolicy::from(PollConfig {
            max_attempts: 60,
            interval_ms: 1000,
        });
        assert_eq!(policy.max_attempts, 60);
        assert_eq!(policy.interval, Duration::from_secs(1));
    }
}
