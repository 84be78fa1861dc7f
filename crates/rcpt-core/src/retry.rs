//! Bounded exponential backoff for rate-limited provider calls.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::ExtractionError;
use crate::extract::ExtractionClient;
use crate::models::config::RetryConfig;
use crate::models::receipt::ExtractedRecord;

/// Terminal outcome of [`RetryScheduler::call_with_retry`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RetryError {
    /// A failure that is not retried (auth, malformed, transport, upstream).
    #[error(transparent)]
    Extraction(ExtractionError),

    /// Every attempt was rate limited.
    #[error("still rate limited after {attempts} attempts")]
    MaxRetriesExceeded { attempts: u32 },

    /// A stop was requested before or during a backoff wait.
    #[error("cancelled")]
    Cancelled,
}

/// Cooperative cancellation flag shared between a controller and a worker.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop. Takes effect at the next poll, never mid-request.
    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Clear a previous stop so the handle can drive another run.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Sleep for `duration`, checking `stop` every `poll`.
///
/// Returns `false` if the wait was cut short by a stop request.
pub async fn cancellable_sleep(duration: Duration, poll: Duration, stop: &StopHandle) -> bool {
    let poll = if poll.is_zero() { duration } else { poll };
    let deadline = tokio::time::Instant::now() + duration;

    loop {
        if stop.is_stopped() {
            return false;
        }
        let now = tokio::time::Instant::now();
        if now >= deadline {
            return true;
        }
        tokio::time::sleep(poll.min(deadline - now)).await;
    }
}

/// Backoff and pacing parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub poll_interval: Duration,
    pub pacing_delay: Duration,
    pub retry_malformed: bool,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            pacing_delay: Duration::from_millis(config.pacing_delay_ms),
            retry_malformed: config.retry_malformed,
        }
    }

    /// Number of attempts per call. At least one.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    /// Wait after the given (1-based) failed attempt: `initial * 2^(attempt-1)`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.initial_delay.saturating_mul(factor)
    }

    /// Total wait allowed for one call: `initial * (2^max_attempts - 1)`.
    pub fn backoff_budget(&self) -> Duration {
        (1..=self.max_attempts())
            .map(|attempt| self.backoff_delay(attempt))
            .fold(Duration::ZERO, Duration::saturating_add)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Details passed to the rate-limit observer before each backoff wait.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitNotice {
    pub attempt: u32,
    pub max_attempts: u32,
    pub delay: Duration,
}

/// Wraps provider calls with backoff, cancellation and pacing.
#[derive(Debug, Clone)]
pub struct RetryScheduler {
    policy: RetryPolicy,
    stop: StopHandle,
}

impl RetryScheduler {
    pub fn new(policy: RetryPolicy, stop: StopHandle) -> Self {
        Self { policy, stop }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn stop_handle(&self) -> &StopHandle {
        &self.stop
    }

    /// Call `client.extract`, retrying rate limits with exponential backoff.
    ///
    /// Every rate-limited attempt is followed by its backoff wait, including
    /// the last, so sustained limiting costs exactly
    /// `initial * (2^max_attempts - 1)` before giving up. A provider
    /// `Retry-After` longer than the computed delay replaces it, but waits
    /// never add up to more than [`RetryPolicy::backoff_budget`].
    pub async fn call_with_retry<F>(
        &self,
        client: &dyn ExtractionClient,
        bytes: &[u8],
        mime_type: &str,
        mut on_rate_limit: F,
    ) -> Result<ExtractedRecord, RetryError>
    where
        F: FnMut(RateLimitNotice),
    {
        let max_attempts = self.policy.max_attempts();
        let budget = self.policy.backoff_budget();
        let mut waited = Duration::ZERO;

        for attempt in 1..=max_attempts {
            if self.stop.is_stopped() {
                return Err(RetryError::Cancelled);
            }

            debug!("{} attempt {}/{}", client.name(), attempt, max_attempts);

            let err = match client.extract(bytes, mime_type).await {
                Ok(record) => {
                    if attempt > 1 {
                        info!("{} succeeded on attempt {}", client.name(), attempt);
                    }
                    return Ok(record);
                }
                Err(err) => err,
            };

            if !err.is_retryable(self.policy.retry_malformed) {
                warn!("{} failed without retry: {}", client.name(), err);
                return Err(RetryError::Extraction(err));
            }

            let mut delay = self.policy.backoff_delay(attempt);
            if let ExtractionError::RateLimited { retry_after: Some(hint) } = &err {
                delay = delay.max(*hint);
            }
            let delay = delay.min(budget.saturating_sub(waited));
            waited += delay;

            warn!(
                "{} attempt {}/{} failed ({}), waiting {:.1}s",
                client.name(),
                attempt,
                max_attempts,
                err,
                delay.as_secs_f64()
            );
            on_rate_limit(RateLimitNotice {
                attempt,
                max_attempts,
                delay,
            });

            if !cancellable_sleep(delay, self.policy.poll_interval, &self.stop).await {
                info!("stop requested during backoff");
                return Err(RetryError::Cancelled);
            }
        }

        Err(RetryError::MaxRetriesExceeded {
            attempts: max_attempts,
        })
    }

    /// Inter-file pacing wait. Returns `false` if cut short by a stop request.
    pub async fn pace(&self) -> bool {
        cancellable_sleep(self.policy.pacing_delay, self.policy.poll_interval, &self.stop).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ScriptedClient;
    use pretty_assertions::assert_eq;
    use tokio::time::Instant;

    fn limited() -> Result<ExtractedRecord, ExtractionError> {
        Err(ExtractionError::RateLimited { retry_after: None })
    }

    fn scheduler(max_retries: u32) -> RetryScheduler {
        let policy = RetryPolicy {
            max_retries,
            ..RetryPolicy::default()
        };
        RetryScheduler::new(policy, StopHandle::new())
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_delay(1), Duration::from_secs(2));
        assert_eq!(policy.backoff_delay(2), Duration::from_secs(4));
        assert_eq!(policy.backoff_delay(5), Duration::from_secs(32));
        assert!(policy.backoff_delay(200) >= policy.backoff_delay(31));
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_rate_limits_then_success() {
        let mut record = ExtractedRecord::empty();
        record.place = Some("Cafe".into());
        let client = ScriptedClient::new().with_results([limited(), limited(), Ok(record)]);

        let mut notices = Vec::new();
        let start = Instant::now();
        let result = scheduler(5)
            .call_with_retry(&client, b"doc", "application/pdf", |n| notices.push(n.delay))
            .await;

        assert_eq!(result.unwrap().place.as_deref(), Some("Cafe"));
        assert_eq!(client.calls(), 3);
        assert_eq!(notices, vec![Duration::from_secs(2), Duration::from_secs(4)]);
        assert_eq!(start.elapsed().as_secs(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sustained_rate_limit_is_bounded() {
        for max in 1..=5u32 {
            let client = ScriptedClient::new().repeat(limited());
            let start = Instant::now();
            let result = scheduler(max)
                .call_with_retry(&client, b"doc", "application/pdf", |_| {})
                .await;

            assert_eq!(result, Err(RetryError::MaxRetriesExceeded { attempts: max }));
            assert_eq!(client.calls(), max as usize);

            let expected = Duration::from_secs(2) * ((1u32 << max) - 1);
            let elapsed = start.elapsed();
            assert!(elapsed >= expected, "max={} elapsed={:?}", max, elapsed);
            assert!(elapsed < expected + Duration::from_millis(100));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_is_not_retried() {
        let client = ScriptedClient::new().repeat(Err(ExtractionError::Auth("403".into())));
        let start = Instant::now();
        let result = scheduler(5)
            .call_with_retry(&client, b"doc", "application/pdf", |_| {})
            .await;

        assert!(matches!(result, Err(RetryError::Extraction(ExtractionError::Auth(_)))));
        assert_eq!(client.calls(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_retry_is_opt_in() {
        let malformed = || Err(ExtractionError::MalformedResponse("prose".into()));

        let client = ScriptedClient::new().repeat(malformed());
        let result = scheduler(3).call_with_retry(&client, b"", "application/pdf", |_| {}).await;
        assert!(matches!(result, Err(RetryError::Extraction(_))));
        assert_eq!(client.calls(), 1);

        let policy = RetryPolicy {
            max_retries: 3,
            retry_malformed: true,
            ..RetryPolicy::default()
        };
        let client = ScriptedClient::new().with_results([malformed()]).repeat(Ok(ExtractedRecord::empty()));
        let result = RetryScheduler::new(policy, StopHandle::new())
            .call_with_retry(&client, b"", "application/pdf", |_| {})
            .await;
        assert!(result.is_ok());
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_hint_extends_wait() {
        let client = ScriptedClient::new()
            .with_results([Err(ExtractionError::RateLimited {
                retry_after: Some(Duration::from_secs(10)),
            })])
            .repeat(Ok(ExtractedRecord::empty()));

        let start = Instant::now();
        scheduler(5)
            .call_with_retry(&client, b"", "application/pdf", |_| {})
            .await
            .unwrap();
        assert_eq!(start.elapsed().as_secs(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_retry_after_stays_within_budget() {
        let client = ScriptedClient::new().repeat(Err(ExtractionError::RateLimited {
            retry_after: Some(Duration::from_secs(86_400)),
        }));

        let mut notices = Vec::new();
        let start = Instant::now();
        let result = scheduler(2)
            .call_with_retry(&client, b"", "application/pdf", |n| notices.push(n.delay))
            .await;

        assert_eq!(result, Err(RetryError::MaxRetriesExceeded { attempts: 2 }));
        assert_eq!(client.calls(), 2);
        assert_eq!(notices, vec![Duration::from_secs(6), Duration::ZERO]);
        assert_eq!(start.elapsed(), Duration::from_secs(6));
    }

    #[test]
    fn test_backoff_budget() {
        let policy = RetryPolicy {
            max_retries: 5,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.backoff_budget(), Duration::from_secs(62));

        let single = RetryPolicy {
            max_retries: 0,
            ..RetryPolicy::default()
        };
        assert_eq!(single.backoff_budget(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_interrupts_backoff() {
        let client = ScriptedClient::new().repeat(limited());
        let scheduler = scheduler(5);
        let stop = scheduler.stop_handle().clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            stop.stop();
        });

        let start = Instant::now();
        let result = scheduler
            .call_with_retry(&client, b"", "application/pdf", |_| {})
            .await;

        assert_eq!(result, Err(RetryError::Cancelled));
        assert_eq!(client.calls(), 2);
        assert!(start.elapsed() <= Duration::from_millis(2600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_before_start() {
        let client = ScriptedClient::new();
        let scheduler = scheduler(5);
        scheduler.stop_handle().stop();

        let result = scheduler.call_with_retry(&client, b"", "application/pdf", |_| {}).await;
        assert_eq!(result, Err(RetryError::Cancelled));
        assert_eq!(client.calls(), 0);
        assert!(!scheduler.pace().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacing_delay() {
        let start = Instant::now();
        assert!(scheduler(1).pace().await);
        assert_eq!(start.elapsed(), Duration::from_secs(1));
    }
}
