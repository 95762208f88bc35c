//! Bounded retry with linear, capped backoff for one transfer item

use log::{info, warn};
use std::future::Future;
use std::time::Duration;

use super::control::TransferController;
use crate::config::RetrySettings;
use crate::error::{TransferError, TransferResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts in total, including the first one
    pub max_attempts: u32,
    pub backoff_step: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            backoff_step: settings.backoff_step(),
            max_backoff: settings.max_backoff(),
        }
    }
}

impl RetryPolicy {
    /// Sleep after failed attempt number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff_step
            .saturating_mul(attempt)
            .min(self.max_backoff)
    }

    /// Run `operation` until it succeeds, fails with `Stopped`, or runs out
    /// of attempts. `on_retry(attempt, max_attempts, error)` fires before each
    /// backoff sleep. The last error is returned as is.
    pub async fn run<T, F, Fut, R>(
        &self,
        controller: &TransferController,
        mut on_retry: R,
        mut operation: F,
    ) -> TransferResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = TransferResult<T>>,
        R: FnMut(u32, u32, &TransferError),
    {
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        info!("retry_succeeded: attempt={}", attempt);
                    }
                    return Ok(value);
                }
                Err(err) if err.is_stopped() => return Err(err),
                Err(err) if attempt >= self.max_attempts => {
                    warn!(
                        "retry_exhausted: attempts={} error={}",
                        self.max_attempts, err
                    );
                    return Err(err);
                }
                Err(err) => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        "retry_scheduled: attempt={}/{} delay_secs={} error={}",
                        attempt,
                        self.max_attempts,
                        delay.as_secs(),
                        err
                    );
                    on_retry(attempt, self.max_attempts, &err);
                    tokio::time::sleep(delay).await;
                    if controller.is_stopped() {
                        return Err(TransferError::Stopped);
                    }
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn failing(calls: &Arc<AtomicU32>) -> impl FnMut(u32) -> futures_util::future::Ready<TransferResult<()>> {
        let calls = calls.clone();
        move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            futures_util::future::ready(Err(TransferError::Upload {
                status: 503,
                message: "service_unavailable".into(),
            }))
        }
    }

    #[test]
    fn delay_grows_linearly_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(5));
        assert_eq!(policy.delay_for(10), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_three_attempts_with_original_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut retries = Vec::new();

        let result = RetryPolicy::default()
            .run(
                &TransferController::new(),
                |attempt, max, _| retries.push((attempt, max)),
                failing(&calls),
            )
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(retries, vec![(1, 3), (2, 3)]);
        match result {
            Err(TransferError::Upload { status, message }) => {
                assert_eq!(status, 503);
                assert_eq!(message, "service_unavailable");
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[tokio::test]
    async fn succeeds_on_a_later_attempt() {
        let policy = RetryPolicy::from(&RetrySettings::immediate(3));
        let value = policy
            .run(&TransferController::new(), |_, _, _| {}, |attempt| async move {
                if attempt < 2 {
                    Err(TransferError::Api {
                        status: 500,
                        message: "boom".into(),
                    })
                } else {
                    Ok(attempt)
                }
            })
            .await
            .unwrap();
        assert_eq!(value, 2);
    }

    #[tokio::test]
    async fn stopped_is_never_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: TransferResult<()> = RetryPolicy::from(&RetrySettings::immediate(3))
            .run(&TransferController::new(), |_, _, _| {}, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(TransferError::Stopped) }
            })
            .await;

        assert!(matches!(result, Err(TransferError::Stopped)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_during_backoff_ends_the_item() {
        let controller = TransferController::new();
        let calls = Arc::new(AtomicU32::new(0));
        let stopper = controller.clone();

        let result = RetryPolicy::from(&RetrySettings::immediate(3))
            .run(&controller, move |_, _, _| stopper.stop(), failing(&calls))
            .await;

        assert!(matches!(result, Err(TransferError::Stopped)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
