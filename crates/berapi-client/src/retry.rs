//! Retry and backoff.
//!
//! [`RetryPolicy::decide`] is a pure function from the outcome of one
//! attempt to a [`RetryDecision`]; [`execute`] runs the attempt loop around
//! it. Delays are exact (`backoff_factor * 2^(k-1)` before attempt `k`),
//! with no jitter. The overall deadline is checked before every attempt and
//! bounds each attempt's transport timeout.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use berapi_config::Settings;
use berapi_core::{
    BerapiError, BerapiResult, LastAttempt, RequestContext, ResponseContext, Transport,
};
use berapi_middleware::Pipeline;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

/// What one attempt produced, as seen by the policy.
#[derive(Debug, Clone, Copy)]
pub enum AttemptOutcome<'a> {
    /// The attempt produced a response with this status.
    Status(u16),
    /// The attempt failed.
    Failed(&'a BerapiError),
}

/// Why the retry loop stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GiveUpReason {
    /// Retries are disabled; the outcome stands.
    Disabled,
    /// The outcome is final: a non-retry status or a non-retryable error.
    NotRetryable,
    /// Every permitted retry was used.
    Exhausted,
    /// The next attempt would start at or past the deadline.
    Deadline,
}

impl fmt::Display for GiveUpReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::Disabled => "retries disabled",
            Self::NotRetryable => "not retryable",
            Self::Exhausted => "retries exhausted",
            Self::Deadline => "deadline reached",
        };
        f.write_str(reason)
    }
}

/// The decision taken after an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait `delay`, then make another attempt.
    Retry {
        /// Backoff before the next attempt.
        delay: Duration,
    },
    /// Stop.
    GiveUp(GiveUpReason),
}

/// Retry behaviour derived from [`Settings`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    enabled: bool,
    max_retries: u32,
    backoff_factor: Duration,
    retry_statuses: BTreeSet<u16>,
    timeout: Duration,
    deadline: Duration,
}

impl RetryPolicy {
    /// Builds the policy from the client settings.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        let retry = settings.retry();
        Self {
            enabled: retry.enabled(),
            max_retries: retry.max_retries(),
            backoff_factor: retry.backoff_factor(),
            retry_statuses: retry.retry_statuses().clone(),
            timeout: settings.timeout(),
            deadline: settings.max_response_time(),
        }
    }

    /// Returns true if retries are enabled.
    pub const fn enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the number of retries after the original attempt.
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Returns the per-attempt transport timeout.
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the overall deadline of a call.
    pub const fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Returns the backoff before attempt `attempt` (0 is the original
    /// attempt and has none).
    ///
    /// # Example
    ///
    /// ```
    /// use berapi_client::RetryPolicy;
    /// use berapi_config::Settings;
    /// use std::time::Duration;
    ///
    /// let settings = Settings::builder()
    ///     .without_env()
    ///     .backoff_factor(Duration::from_millis(500))
    ///     .build()
    ///     .unwrap();
    /// let policy = RetryPolicy::from_settings(&settings);
    ///
    /// assert_eq!(policy.backoff_delay(1), Duration::from_millis(500));
    /// assert_eq!(policy.backoff_delay(3), Duration::from_secs(2));
    /// ```
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let multiplier = 2u32.saturating_pow(attempt - 1);
        self.backoff_factor.saturating_mul(multiplier)
    }

    /// Decides what follows attempt `attempt` (0-based) given its outcome
    /// and the time spent on the call so far.
    pub fn decide(
        &self,
        attempt: u32,
        outcome: AttemptOutcome<'_>,
        elapsed: Duration,
    ) -> RetryDecision {
        if !self.enabled {
            return RetryDecision::GiveUp(GiveUpReason::Disabled);
        }

        let eligible = match outcome {
            AttemptOutcome::Status(status) => self.retry_statuses.contains(&status),
            AttemptOutcome::Failed(error) => error.is_retryable(),
        };
        if !eligible {
            return RetryDecision::GiveUp(GiveUpReason::NotRetryable);
        }

        if attempt >= self.max_retries {
            return RetryDecision::GiveUp(GiveUpReason::Exhausted);
        }

        let delay = self.backoff_delay(attempt + 1);
        if elapsed.saturating_add(delay) >= self.deadline {
            return RetryDecision::GiveUp(GiveUpReason::Deadline);
        }

        RetryDecision::Retry { delay }
    }
}

/// Runs one logical call: attempts through the pipeline until the policy
/// gives up.
///
/// Every attempt carries the same request ID and its own attempt number.
pub async fn execute<T>(
    policy: &RetryPolicy,
    pipeline: &Pipeline,
    transport: &T,
    request: RequestContext,
) -> BerapiResult<ResponseContext>
where
    T: Transport + ?Sized,
{
    let started = Instant::now();
    let mut attempt: u32 = 0;

    loop {
        let elapsed = started.elapsed();
        if elapsed >= policy.deadline {
            return Err(deadline_exceeded(policy, elapsed, attempt));
        }
        let attempt_timeout = policy.timeout.min(policy.deadline - elapsed);

        let result = pipeline
            .dispatch(request.clone().with_attempt(attempt), transport, attempt_timeout)
            .await;

        let outcome = match &result {
            Ok(response) => AttemptOutcome::Status(response.status().as_u16()),
            Err(error) => AttemptOutcome::Failed(error),
        };
        let elapsed = started.elapsed();

        match policy.decide(attempt, outcome, elapsed) {
            RetryDecision::Retry { delay } => {
                warn!(
                    request_id = %request.request_id(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    outcome = %describe(&result),
                    "retrying request"
                );
                sleep(delay).await;
                attempt += 1;
            }
            RetryDecision::GiveUp(reason) => {
                let attempts = attempt + 1;
                debug!(
                    request_id = %request.request_id(),
                    attempts,
                    reason = %reason,
                    "call finished"
                );
                return match reason {
                    GiveUpReason::Disabled | GiveUpReason::NotRetryable => result,
                    GiveUpReason::Deadline => Err(deadline_exceeded(policy, elapsed, attempts)),
                    GiveUpReason::Exhausted => Err(exhausted(result, attempts)?),
                };
            }
        }
    }
}

fn deadline_exceeded(policy: &RetryPolicy, elapsed: Duration, attempts: u32) -> BerapiError {
    BerapiError::Timeout {
        deadline: policy.deadline,
        elapsed,
        attempts,
    }
}

// Only transport errors and responses are retry-eligible; anything else is
// passed through unchanged.
fn exhausted(result: BerapiResult<ResponseContext>, attempts: u32) -> BerapiResult<BerapiError> {
    let last = match result {
        Ok(response) => LastAttempt::Response(Box::new(response)),
        Err(BerapiError::Transport(error)) => LastAttempt::Error(error),
        Err(other) => return Err(other),
    };
    Ok(BerapiError::RetryExhausted { attempts, last })
}

fn describe(result: &BerapiResult<ResponseContext>) -> String {
    match result {
        Ok(response) => format!("status {}", response.status()),
        Err(error) => error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockReply, MockTransport};
    use berapi_core::TransportError;
    use berapi_middleware::{RequestTracker, TrackingMiddleware};
    use http::{Method, StatusCode};
    use proptest::prelude::*;
    use std::sync::Arc;

    fn settings(enabled: bool, max_retries: u32, backoff_ms: u64) -> Settings {
        Settings::builder()
            .without_env()
            .retry_enabled(enabled)
            .max_retries(max_retries)
            .backoff_factor(Duration::from_millis(backoff_ms))
            .timeout(Duration::from_secs(3))
            .max_response_time(Duration::from_secs(60))
            .build()
            .unwrap()
    }

    fn policy(enabled: bool, max_retries: u32, backoff_ms: u64) -> RetryPolicy {
        RetryPolicy::from_settings(&settings(enabled, max_retries, backoff_ms))
    }

    fn request() -> RequestContext {
        RequestContext::new(Method::GET, "https://api.example.com/flaky").unwrap()
    }

    #[test]
    fn test_backoff_schedule() {
        let policy = policy(true, 5, 500);
        assert_eq!(policy.backoff_delay(0), Duration::ZERO);
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(500));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(1000));
        assert_eq!(policy.backoff_delay(3), Duration::from_millis(2000));
    }

    proptest! {
        #[test]
        fn test_backoff_doubles(factor_ms in 0u64..10_000, attempt in 1u32..16) {
            let policy = policy(true, 20, factor_ms);
            prop_assert_eq!(
                policy.backoff_delay(attempt + 1),
                policy.backoff_delay(attempt) * 2
            );
        }
    }

    #[test]
    fn test_decide_disabled() {
        let policy = policy(false, 3, 100);
        assert_eq!(
            policy.decide(0, AttemptOutcome::Status(503), Duration::ZERO),
            RetryDecision::GiveUp(GiveUpReason::Disabled)
        );
    }

    #[test]
    fn test_decide_on_status() {
        let policy = policy(true, 3, 100);
        assert_eq!(
            policy.decide(0, AttemptOutcome::Status(503), Duration::ZERO),
            RetryDecision::Retry {
                delay: Duration::from_millis(100)
            }
        );
        assert_eq!(
            policy.decide(1, AttemptOutcome::Status(429), Duration::ZERO),
            RetryDecision::Retry {
                delay: Duration::from_millis(200)
            }
        );
        assert_eq!(
            policy.decide(0, AttemptOutcome::Status(404), Duration::ZERO),
            RetryDecision::GiveUp(GiveUpReason::NotRetryable)
        );
        assert_eq!(
            policy.decide(3, AttemptOutcome::Status(503), Duration::ZERO),
            RetryDecision::GiveUp(GiveUpReason::Exhausted)
        );
    }

    #[test]
    fn test_decide_on_error() {
        let policy = policy(true, 3, 100);
        let connect = BerapiError::from(TransportError::connect("refused"));
        let body = BerapiError::from(TransportError::body("truncated"));
        let middleware = BerapiError::middleware("auth", "no token");

        assert!(matches!(
            policy.decide(0, AttemptOutcome::Failed(&connect), Duration::ZERO),
            RetryDecision::Retry { .. }
        ));
        assert_eq!(
            policy.decide(0, AttemptOutcome::Failed(&body), Duration::ZERO),
            RetryDecision::GiveUp(GiveUpReason::NotRetryable)
        );
        assert_eq!(
            policy.decide(0, AttemptOutcome::Failed(&middleware), Duration::ZERO),
            RetryDecision::GiveUp(GiveUpReason::NotRetryable)
        );
    }

    #[test]
    fn test_decide_deadline() {
        let policy = policy(true, 3, 1000);
        assert_eq!(
            policy.decide(0, AttemptOutcome::Status(503), Duration::from_secs(59)),
            RetryDecision::GiveUp(GiveUpReason::Deadline)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_counts_every_attempt() {
        let policy = policy(true, 3, 100);
        let transport = MockTransport::new().reply(MockReply::new(503));

        let err = execute(&policy, &Pipeline::default(), &transport, request())
            .await
            .unwrap_err();

        assert_eq!(transport.call_count(), 4);
        match err {
            BerapiError::RetryExhausted { attempts, last } => {
                assert_eq!(attempts, 4);
                assert_eq!(last.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_waits_are_exact() {
        let policy = policy(true, 3, 500);
        let transport = MockTransport::new().fail(TransportError::connect("refused"));
        let started = Instant::now();

        let err = execute(&policy, &Pipeline::default(), &transport, request())
            .await
            .unwrap_err();

        // 500 + 1000 + 2000
        assert_eq!(started.elapsed(), Duration::from_millis(3500));
        assert!(matches!(
            err,
            BerapiError::RetryExhausted {
                attempts: 4,
                last: LastAttempt::Error(TransportError::Connect { .. })
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_failures() {
        let policy = policy(true, 3, 100);
        let transport = MockTransport::new()
            .fail(TransportError::connect("refused"))
            .reply(MockReply::new(502))
            .reply(MockReply::new(200).body("ok"));

        let response = execute(&policy, &Pipeline::default(), &transport, request())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.attempt(), 2);

        let calls = transport.calls();
        assert_eq!(calls.len(), 3);
        let attempts: Vec<u32> = calls.iter().map(|c| c.request.attempt()).collect();
        assert_eq!(attempts, vec![0, 1, 2]);
        assert!(calls
            .iter()
            .all(|c| c.request.request_id() == calls[0].request.request_id()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_returns_retry_status_as_response() {
        let policy = policy(false, 3, 100);
        let transport = MockTransport::new().reply(MockReply::new(503));

        let response = execute(&policy, &Pipeline::default(), &transport, request())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_propagates_raw_error() {
        let policy = policy(false, 3, 100);
        let transport = MockTransport::new().fail(TransportError::connect("refused"));

        let err = execute(&policy, &Pipeline::default(), &transport, request())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            BerapiError::Transport(TransportError::Connect { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_beats_remaining_retries() {
        let settings = Settings::builder()
            .without_env()
            .retry_enabled(true)
            .max_retries(10)
            .backoff_factor(Duration::from_secs(1))
            .timeout(Duration::from_secs(3))
            .max_response_time(Duration::from_secs(5))
            .build()
            .unwrap();
        let policy = RetryPolicy::from_settings(&settings);
        let transport = MockTransport::new().reply(MockReply::new(503));

        let err = execute(&policy, &Pipeline::default(), &transport, request())
            .await
            .unwrap_err();

        // attempts at t=0, 1s and 3s; the next backoff (4s) would pass 5s
        assert_eq!(transport.call_count(), 3);
        match err {
            BerapiError::Timeout {
                deadline, attempts, ..
            } => {
                assert_eq!(deadline, Duration::from_secs(5));
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_timeout_bounded_by_deadline() {
        let settings = Settings::builder()
            .without_env()
            .retry_enabled(true)
            .max_retries(3)
            .backoff_factor(Duration::from_secs(1))
            .timeout(Duration::from_secs(3))
            .max_response_time(Duration::from_secs(5))
            .build()
            .unwrap();
        let policy = RetryPolicy::from_settings(&settings);
        let transport = MockTransport::new().reply(MockReply::new(200).delay(Duration::from_secs(10)));

        let err = execute(&policy, &Pipeline::default(), &transport, request())
            .await
            .unwrap_err();

        let timeouts: Vec<Duration> = transport.calls().iter().map(|c| c.timeout).collect();
        // 3s timeout, 1s backoff, then only 1s of the deadline is left
        assert_eq!(timeouts, vec![Duration::from_secs(3), Duration::from_secs(1)]);
        assert!(err.is_timeout());
        assert_eq!(err.attempts(), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tracker_sees_every_attempt() {
        let policy = policy(true, 2, 10);
        let tracker = Arc::new(RequestTracker::new());
        let pipeline = Pipeline::builder()
            .add(TrackingMiddleware::new(Arc::clone(&tracker)))
            .build();
        let transport = MockTransport::new()
            .reply(MockReply::new(500))
            .reply(MockReply::new(200));

        execute(&policy, &pipeline, &transport, request())
            .await
            .unwrap();

        let entries = tracker.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].attempt, 0);
        assert_eq!(entries[0].status, Some(500));
        assert_eq!(entries[1].attempt, 1);
        assert_eq!(entries[1].status, Some(200));
    }
}
