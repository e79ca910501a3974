//! Bounded retry around engine actions.
//!
//! Transient and auth failures are retried with a paced backoff; permanent
//! failures skip the item immediately; fatal failures abort.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use tagscout_core::RetrySettings;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::error::{CrawlError, ErrorKind};
use crate::pacing::{ActionKind, PacingController};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub retryable: HashSet<ErrorKind>,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            retryable: HashSet::from([ErrorKind::Transient, ErrorKind::Auth]),
        }
    }

    #[must_use]
    pub fn is_retryable(&self, err: &CrawlError) -> bool {
        self.retryable.contains(&err.kind())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetrySettings::default().max_attempts)
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self::new(settings.max_attempts)
    }
}

/// A successful action and how many attempts it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempted<T> {
    pub value: T,
    pub attempts: u32,
}

impl<T> Attempted<T> {
    /// Succeeded, but only after at least one retry.
    #[must_use]
    pub fn recovered(&self) -> bool {
        self.attempts > 1
    }
}

#[derive(Debug, Error)]
pub enum ActionFailure {
    /// Not retryable; the item is dropped and counted as skipped.
    #[error("skipped: {0}")]
    Skipped(CrawlError),

    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: CrawlError },

    /// Cancellation or a fatal session error; the worker should stop.
    #[error("aborted: {0}")]
    Aborted(CrawlError),
}

/// Sleep for `delay` unless `cancel` fires first.
///
/// # Errors
///
/// Returns [`CrawlError::Cancelled`] when interrupted.
pub async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> Result<(), CrawlError> {
    if delay.is_zero() {
        return if cancel.is_cancelled() {
            Err(CrawlError::Cancelled)
        } else {
            Ok(())
        };
    }
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(CrawlError::Cancelled),
        () = tokio::time::sleep(delay) => Ok(()),
    }
}

/// Worker-scoped retry driver; owns the worker's pacing state.
#[derive(Debug)]
pub struct RetryCoordinator {
    pacing: PacingController,
    cancel: CancellationToken,
}

impl RetryCoordinator {
    #[must_use]
    pub fn new(pacing: PacingController, cancel: CancellationToken) -> Self {
        Self { pacing, cancel }
    }

    /// Wait the human-like delay that precedes a `kind` action.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::Cancelled`] when interrupted.
    pub async fn pace(&mut self, kind: ActionKind) -> Result<Duration, CrawlError> {
        let delay = self.pacing.delay_for(kind);
        sleep_or_cancel(delay, &self.cancel).await?;
        Ok(delay)
    }

    /// Run `action` until it succeeds, fails permanently, or runs out of
    /// attempts under `policy`.
    ///
    /// # Errors
    ///
    /// See [`ActionFailure`].
    pub async fn execute<T, F, Fut>(
        &mut self,
        kind: ActionKind,
        policy: &RetryPolicy,
        mut action: F,
    ) -> Result<Attempted<T>, ActionFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CrawlError>>,
    {
        let mut attempt = 0u32;
        loop {
            if self.cancel.is_cancelled() {
                return Err(ActionFailure::Aborted(CrawlError::Cancelled));
            }
            attempt += 1;

            let err = match action().await {
                Ok(value) => {
                    self.pacing.record_success();
                    return Ok(Attempted {
                        value,
                        attempts: attempt,
                    });
                }
                Err(err) => err,
            };

            if err.kind() == ErrorKind::Fatal {
                return Err(ActionFailure::Aborted(err));
            }
            if !policy.is_retryable(&err) {
                return Err(ActionFailure::Skipped(err));
            }

            self.pacing.record_failure();
            if attempt >= policy.max_attempts {
                return Err(ActionFailure::Exhausted {
                    attempts: attempt,
                    last: err,
                });
            }

            let mut delay = self.pacing.delay_for(kind);
            if let Some(hint) = err.retry_after() {
                delay = delay.max(hint);
            }
            tracing::warn!(
                %kind,
                attempt,
                max_attempts = policy.max_attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %err,
                "transient crawl error, retrying after backoff"
            );
            sleep_or_cancel(delay, &self.cancel)
                .await
                .map_err(ActionFailure::Aborted)?;
        }
    }
}
