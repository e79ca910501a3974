//! Per-stage circuit breaker.
//!
//! Closed until `failure_threshold` consecutive permanent failures land
//! inside `window`; then open for `cooldown`; then half-open, admitting a
//! single trial action whose outcome closes or re-opens it.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use tagscout_core::BreakerSettings;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::CrawlError;
use crate::stages::Stage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerPhase {
    Closed,
    Open { until: Instant },
    HalfOpen { probing: bool },
}

#[derive(Debug)]
struct Inner {
    phase: BreakerPhase,
    failures: VecDeque<Instant>,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    stage: Stage,
    settings: BreakerSettings,
    inner: Mutex<Inner>,
    trial_settled: Notify,
    pauses: AtomicU32,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(stage: Stage, settings: BreakerSettings) -> Self {
        Self {
            stage,
            settings,
            inner: Mutex::new(Inner {
                phase: BreakerPhase::Closed,
                failures: VecDeque::new(),
            }),
            trial_settled: Notify::new(),
            pauses: AtomicU32::new(0),
        }
    }

    #[must_use]
    pub fn phase(&self) -> BreakerPhase {
        self.lock().phase
    }

    /// How many times this breaker has opened.
    #[must_use]
    pub fn pauses(&self) -> u32 {
        self.pauses.load(Ordering::Relaxed)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Non-blocking admission check.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::StageAbort`] while open or while another
    /// worker's half-open trial is in flight.
    pub fn try_admit(&self) -> Result<(), CrawlError> {
        let mut inner = self.lock();
        let now = Instant::now();
        match inner.phase {
            BreakerPhase::Closed => Ok(()),
            BreakerPhase::Open { until } if now >= until => {
                inner.phase = BreakerPhase::HalfOpen { probing: true };
                tracing::info!(stage = %self.stage, "breaker half-open, admitting trial action");
                Ok(())
            }
            BreakerPhase::HalfOpen { probing: false } => {
                inner.phase = BreakerPhase::HalfOpen { probing: true };
                Ok(())
            }
            BreakerPhase::Open { until } => Err(CrawlError::StageAbort {
                stage: self.stage,
                resume_in: until - now,
            }),
            BreakerPhase::HalfOpen { probing: true } => Err(CrawlError::StageAbort {
                stage: self.stage,
                resume_in: std::time::Duration::ZERO,
            }),
        }
    }

    /// Wait until an action may run.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::Cancelled`] if `cancel` fires while waiting.
    pub async fn admit(&self, cancel: &CancellationToken) -> Result<(), CrawlError> {
        loop {
            let settled = self.trial_settled.notified();
            tokio::pin!(settled);
            settled.as_mut().enable();

            match self.try_admit() {
                Ok(()) => return Ok(()),
                Err(CrawlError::StageAbort { resume_in, .. }) if !resume_in.is_zero() => {
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => return Err(CrawlError::Cancelled),
                        () = tokio::time::sleep(resume_in) => {}
                    }
                }
                Err(_) => {
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => return Err(CrawlError::Cancelled),
                        () = &mut settled => {}
                    }
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        inner.failures.clear();
        if matches!(inner.phase, BreakerPhase::HalfOpen { .. }) {
            inner.phase = BreakerPhase::Closed;
            tracing::info!(stage = %self.stage, "trial action succeeded, stage resumed");
            drop(inner);
            self.trial_settled.notify_waiters();
        }
    }

    /// Count one permanent failure (skipped or retries exhausted).
    pub fn record_failure(&self) {
        let mut inner = self.lock();
        let now = Instant::now();
        match inner.phase {
            BreakerPhase::Open { .. } => {}
            BreakerPhase::HalfOpen { .. } => {
                self.open(&mut inner, now);
                drop(inner);
                self.trial_settled.notify_waiters();
            }
            BreakerPhase::Closed => {
                let window = self.settings.window;
                inner.failures.push_back(now);
                while inner
                    .failures
                    .front()
                    .is_some_and(|&first| now.duration_since(first) > window)
                {
                    inner.failures.pop_front();
                }
                let threshold = usize::try_from(self.settings.failure_threshold).unwrap_or(usize::MAX);
                if inner.failures.len() >= threshold {
                    self.open(&mut inner, now);
                }
            }
        }
    }

    /// Release a half-open trial slot without a verdict (e.g. cancellation).
    pub fn record_aborted(&self) {
        let mut inner = self.lock();
        if inner.phase == (BreakerPhase::HalfOpen { probing: true }) {
            inner.phase = BreakerPhase::HalfOpen { probing: false };
            drop(inner);
            self.trial_settled.notify_waiters();
        }
    }

    fn open(&self, inner: &mut Inner, now: Instant) {
        let consecutive = inner.failures.len();
        inner.failures.clear();
        inner.phase = BreakerPhase::Open {
            until: now + self.settings.cooldown,
        };
        self.pauses.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(
            stage = %self.stage,
            consecutive_failures = consecutive,
            cooldown_secs = self.settings.cooldown.as_secs(),
            "stage paused"
        );
    }
}
