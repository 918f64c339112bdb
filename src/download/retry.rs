//! Backoff controller: capped exponential retry around the transfer engine.
//!
//! Failures are split in two by [`classify_error`]:
//! - [`FailureType::Permanent`] - the asset is gone; never retried
//! - [`FailureType::Transient`] - anything else; retried after a delay
//!
//! The delay starts at [`BackoffPolicy::initial_delay`] and doubles after each
//! transient failure, capped at [`BackoffPolicy::max_delay`]. When the delay
//! about to be applied reaches the ceiling the controller gives up instead of
//! sleeping, which aborts the whole run. There is no other attempt limit.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use fandom_core::download::{BackoffPolicy, FailureType, RetryDecision};
//!
//! let policy = BackoffPolicy::new(Duration::from_secs(5), Duration::from_secs(20));
//! let mut schedule = policy.schedule();
//!
//! assert_eq!(
//!     schedule.on_failure(FailureType::Transient),
//!     RetryDecision::Retry { delay: Duration::from_secs(5), attempt: 2 }
//! );
//! assert_eq!(
//!     schedule.on_failure(FailureType::Transient),
//!     RetryDecision::Retry { delay: Duration::from_secs(10), attempt: 3 }
//! );
//! assert!(matches!(
//!     schedule.on_failure(FailureType::Transient),
//!     RetryDecision::CeilingReached { attempts: 3, .. }
//! ));
//! ```

use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, instrument, warn};

use super::DownloadError;
use super::client::Transfer;
use crate::config::{FetchConfig, INITIAL_BACKOFF, MAX_BACKOFF};

/// Classification of a transfer failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Will never succeed: the remote says the asset does not exist.
    Permanent,
    /// May succeed after a delay: timeouts, resets, 5xx, local IO, bad URLs.
    Transient,
}

/// What the schedule decided after a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for `delay`, then make attempt number `attempt`.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// The attempt about to be made (first retry is attempt 2).
        attempt: u32,
    },

    /// Do not retry; the failure is permanent.
    Permanent,

    /// The next delay would reach the ceiling; abort the run.
    CeilingReached {
        /// Attempts made so far.
        attempts: u32,
        /// The delay that would have been applied.
        delay: Duration,
    },
}

/// Delay bounds for the backoff controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    initial_delay: Duration,
    max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: INITIAL_BACKOFF,
            max_delay: MAX_BACKOFF,
        }
    }
}

impl BackoffPolicy {
    /// Creates a policy with custom bounds.
    #[must_use]
    pub fn new(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay,
        }
    }

    /// Takes the backoff bounds from a run configuration.
    #[must_use]
    pub fn from_config(config: &FetchConfig) -> Self {
        Self::new(config.initial_backoff, config.max_backoff)
    }

    /// First delay after a transient failure.
    #[must_use]
    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    /// The ceiling; a delay at or above it aborts.
    #[must_use]
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Starts a fresh schedule for one asset.
    #[must_use]
    pub fn schedule(&self) -> BackoffSchedule {
        BackoffSchedule {
            next_delay: self.initial_delay,
            max_delay: self.max_delay,
            attempt: 1,
        }
    }
}

/// Per-asset backoff state.
#[derive(Debug, Clone)]
pub struct BackoffSchedule {
    next_delay: Duration,
    max_delay: Duration,
    attempt: u32,
}

impl BackoffSchedule {
    /// The attempt currently in flight (1-indexed).
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Records a failed attempt and decides what happens next.
    pub fn on_failure(&mut self, failure_type: FailureType) -> RetryDecision {
        if failure_type == FailureType::Permanent {
            return RetryDecision::Permanent;
        }

        let delay = self.next_delay;
        if delay >= self.max_delay {
            debug!(attempt = self.attempt, delay_secs = delay.as_secs(), "backoff ceiling reached");
            return RetryDecision::CeilingReached {
                attempts: self.attempt,
                delay,
            };
        }

        self.next_delay = delay.saturating_mul(2).min(self.max_delay);
        self.attempt += 1;
        RetryDecision::Retry {
            delay,
            attempt: self.attempt,
        }
    }
}

/// Classifies a transfer error.
///
/// Only not-found is permanent; everything else is worth another try.
#[must_use]
pub fn classify_error(error: &DownloadError) -> FailureType {
    match error {
        DownloadError::NotFound { .. } => FailureType::Permanent,
        DownloadError::HttpStatus { .. }
        | DownloadError::Network { .. }
        | DownloadError::Timeout { .. }
        | DownloadError::Io { .. }
        | DownloadError::InvalidUrl { .. } => FailureType::Transient,
    }
}

/// Outcome of [`fetch_with_retry`] when no bytes were stored.
#[derive(Debug, Error)]
pub enum RetryError {
    /// Permanent failure; the caller records it in the manifest.
    #[error("asset not found: {url}")]
    NotFound {
        /// The missing asset's URL.
        url: String,
    },

    /// The backoff ceiling was reached; the run must stop.
    #[error(
        "backoff reached {ceiling_secs}s between attempts after {attempts} attempts; aborting downloads (last error: {last_error})"
    )]
    BackoffExceeded {
        /// The URL being retried.
        url: String,
        /// Attempts made.
        attempts: u32,
        /// The configured ceiling in seconds.
        ceiling_secs: u64,
        /// The failure that triggered the abort.
        #[source]
        last_error: DownloadError,
    },
}

/// Runs `transfer` until it succeeds, fails permanently, or backoff is exhausted.
///
/// Every transient failure is logged with its attempt number and the delay
/// about to be applied.
///
/// # Errors
///
/// [`RetryError::NotFound`] on a permanent failure (no retry is made) and
/// [`RetryError::BackoffExceeded`] when the next delay would reach the ceiling.
#[instrument(skip(transfer, policy), fields(url = %url))]
pub async fn fetch_with_retry(
    transfer: &dyn Transfer,
    url: &str,
    destination: &Path,
    policy: &BackoffPolicy,
) -> Result<u64, RetryError> {
    let mut schedule = policy.schedule();
    loop {
        let error = match transfer.fetch(url, destination).await {
            Ok(bytes) => return Ok(bytes),
            Err(error) => error,
        };

        let attempt = schedule.attempt();
        match schedule.on_failure(classify_error(&error)) {
            RetryDecision::Permanent => {
                return Err(RetryError::NotFound {
                    url: url.to_string(),
                });
            }
            RetryDecision::CeilingReached { attempts, delay } => {
                warn!(
                    attempt,
                    delay_secs = delay.as_secs(),
                    error = %error,
                    "download failed; backoff ceiling reached"
                );
                return Err(RetryError::BackoffExceeded {
                    url: url.to_string(),
                    attempts,
                    ceiling_secs: policy.max_delay().as_secs(),
                    last_error: error,
                });
            }
            RetryDecision::Retry { delay, .. } => {
                warn!(
                    attempt,
                    next_retry_secs = delay.as_secs_f64(),
                    error = %error,
                    "download failed; retrying after backoff"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    /// Replays a scripted sequence of outcomes and counts calls.
    struct ScriptedTransfer {
        outcomes: Mutex<VecDeque<Result<u64, DownloadError>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedTransfer {
        fn new(outcomes: Vec<Result<u64, DownloadError>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl Transfer for ScriptedTransfer {
        async fn fetch(&self, url: &str, _destination: &Path) -> Result<u64, DownloadError> {
            *self.calls.lock().unwrap() += 1;
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(DownloadError::http_status(url, 500)))
        }
    }

    fn fast_policy() -> BackoffPolicy {
        BackoffPolicy::new(Duration::from_millis(5), Duration::from_millis(40))
    }

    #[test]
    fn test_policy_defaults() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.initial_delay(), Duration::from_secs(5));
        assert_eq!(policy.max_delay(), Duration::from_secs(7200));
    }

    #[test]
    fn test_default_schedule_doubles_from_five_seconds_until_ceiling() {
        let mut schedule = BackoffPolicy::default().schedule();
        let mut delays = Vec::new();
        loop {
            match schedule.on_failure(FailureType::Transient) {
                RetryDecision::Retry { delay, .. } => delays.push(delay.as_secs()),
                RetryDecision::CeilingReached { attempts, delay } => {
                    assert_eq!(delay, Duration::from_secs(7200));
                    assert_eq!(attempts, 12);
                    break;
                }
                RetryDecision::Permanent => panic!("transient failure treated as permanent"),
            }
        }
        assert_eq!(
            delays,
            vec![5, 10, 20, 40, 80, 160, 320, 640, 1280, 2560, 5120]
        );
    }

    #[test]
    fn test_schedule_delays_non_decreasing_and_below_ceiling() {
        let policy = BackoffPolicy::new(Duration::from_secs(3), Duration::from_secs(100));
        let mut schedule = policy.schedule();
        let mut previous = Duration::ZERO;
        while let RetryDecision::Retry { delay, .. } = schedule.on_failure(FailureType::Transient)
        {
            assert!(delay >= previous);
            assert!(delay < policy.max_delay());
            previous = delay;
        }
    }

    #[test]
    fn test_schedule_permanent_never_retries() {
        let mut schedule = BackoffPolicy::default().schedule();
        assert_eq!(
            schedule.on_failure(FailureType::Permanent),
            RetryDecision::Permanent
        );
        assert_eq!(schedule.attempt(), 1);
    }

    #[test]
    fn test_schedule_initial_at_ceiling_aborts_immediately() {
        let policy = BackoffPolicy::new(Duration::from_secs(60), Duration::from_secs(60));
        let mut schedule = policy.schedule();
        assert!(matches!(
            schedule.on_failure(FailureType::Transient),
            RetryDecision::CeilingReached { attempts: 1, .. }
        ));
    }

    #[test]
    fn test_classify_not_found_permanent() {
        let error = DownloadError::not_found("https://x/a");
        assert_eq!(classify_error(&error), FailureType::Permanent);
    }

    #[test]
    fn test_classify_everything_else_transient() {
        let io_err = std::io::Error::new(std::io::ErrorKind::StorageFull, "full");
        for error in [
            DownloadError::http_status("https://x/a", 500),
            DownloadError::http_status("https://x/a", 403),
            DownloadError::timeout("https://x/a"),
            DownloadError::invalid_url("nope"),
            DownloadError::io("/tmp/a.part", io_err),
        ] {
            assert_eq!(classify_error(&error), FailureType::Transient, "{error}");
        }
    }

    #[tokio::test]
    async fn test_fetch_with_retry_succeeds_after_transient_failures() {
        let transfer = ScriptedTransfer::new(vec![
            Err(DownloadError::http_status("u", 502)),
            Err(DownloadError::timeout("u")),
            Ok(42),
        ]);
        let bytes = fetch_with_retry(&transfer, "u", Path::new("/tmp/x"), &fast_policy())
            .await
            .unwrap();
        assert_eq!(bytes, 42);
        assert_eq!(transfer.calls(), 3);
    }

    #[tokio::test]
    async fn test_fetch_with_retry_not_found_makes_one_attempt() {
        let transfer = ScriptedTransfer::new(vec![Err(DownloadError::not_found("u")), Ok(1)]);
        let result = fetch_with_retry(&transfer, "u", Path::new("/tmp/x"), &fast_policy()).await;
        assert!(matches!(result, Err(RetryError::NotFound { .. })));
        assert_eq!(transfer.calls(), 1);
    }

    #[tokio::test]
    async fn test_fetch_with_retry_aborts_at_ceiling() {
        // delays 5ms, 10ms, 20ms, then 40ms == ceiling -> abort on the 4th failure
        let transfer = ScriptedTransfer::new(Vec::new());
        let result = fetch_with_retry(&transfer, "u", Path::new("/tmp/x"), &fast_policy()).await;
        match result {
            Err(RetryError::BackoffExceeded { attempts, .. }) => assert_eq!(attempts, 4),
            other => panic!("Expected BackoffExceeded, got: {other:?}"),
        }
        assert_eq!(transfer.calls(), 4);
    }

    #[test]
    fn test_backoff_exceeded_message_mentions_abort() {
        let error = RetryError::BackoffExceeded {
            url: "u".to_string(),
            attempts: 12,
            ceiling_secs: 7200,
            last_error: DownloadError::timeout("u"),
        };
        let msg = error.to_string();
        assert!(msg.contains("aborting downloads"), "{msg}");
        assert!(msg.contains("7200"), "{msg}");
    }
}
