//! Human-like delay computation.
//!
//! Pure arithmetic over a seedable RNG; callers do the sleeping. Each stage
//! worker owns one controller so failure streaks stay worker-local.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tagscout_core::{DelayRange, PacingSettings};

/// What an engine action looks like to a human observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Search,
    ProfileVisit,
    Scroll,
    CommentRead,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Search => "search",
            Self::ProfileVisit => "profile_visit",
            Self::Scroll => "scroll",
            Self::CommentRead => "comment_read",
        })
    }
}

#[derive(Debug)]
pub struct PacingController {
    settings: PacingSettings,
    rng: StdRng,
    recent_failures: u32,
    consecutive_successes: u32,
}

impl PacingController {
    #[must_use]
    pub fn new(settings: PacingSettings) -> Self {
        Self::with_rng(settings, StdRng::from_os_rng())
    }

    /// Deterministic controller for tests and reproducible runs.
    #[must_use]
    pub fn with_seed(settings: PacingSettings, seed: u64) -> Self {
        Self::with_rng(settings, StdRng::seed_from_u64(seed))
    }

    fn with_rng(settings: PacingSettings, rng: StdRng) -> Self {
        Self {
            settings,
            rng,
            recent_failures: 0,
            consecutive_successes: 0,
        }
    }

    #[must_use]
    pub fn range(&self, kind: ActionKind) -> DelayRange {
        match kind {
            ActionKind::Search => self.settings.search,
            ActionKind::ProfileVisit => self.settings.profile_visit,
            ActionKind::Scroll => self.settings.scroll,
            ActionKind::CommentRead => self.settings.comment_read,
        }
    }

    /// Delay before the next `kind` action given `recent_failures`.
    ///
    /// The base is uniform in `[min, max]` (or exactly `min` with
    /// human-like delays off), multiplied by
    /// `min(multiplier ^ recent_failures, ceiling)`, then clamped to
    /// `[min, max * ceiling]`.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn next_delay(&mut self, kind: ActionKind, recent_failures: u32) -> Duration {
        let range = self.range(kind);
        let ceiling = self.settings.backoff_ceiling;

        let base_ms = if self.settings.human_like_delays && range.max_ms > range.min_ms {
            self.rng.random_range(range.min_ms..=range.max_ms)
        } else {
            range.min_ms
        };

        let exponent = i32::try_from(recent_failures).unwrap_or(i32::MAX);
        let multiplier = self
            .settings
            .backoff_multiplier
            .powi(exponent)
            .min(ceiling);

        let upper_ms = range.max_ms as f64 * ceiling;
        let delay_ms = (base_ms as f64 * multiplier).clamp(range.min_ms as f64, upper_ms);
        // Truncation keeps the result inside the clamped interval.
        Duration::from_millis(delay_ms as u64)
    }

    /// Delay for `kind` using this controller's own failure streak.
    pub fn delay_for(&mut self, kind: ActionKind) -> Duration {
        self.next_delay(kind, self.recent_failures)
    }

    pub fn record_success(&mut self) {
        if self.recent_failures == 0 {
            return;
        }
        self.consecutive_successes += 1;
        if self.consecutive_successes >= self.settings.reset_after_successes {
            tracing::debug!(
                recent_failures = self.recent_failures,
                "pacing backoff reset to baseline"
            );
            self.recent_failures = 0;
            self.consecutive_successes = 0;
        }
    }

    pub fn record_failure(&mut self) {
        self.recent_failures = self.recent_failures.saturating_add(1);
        self.consecutive_successes = 0;
    }

    #[must_use]
    pub fn recent_failures(&self) -> u32 {
        self.recent_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> PacingSettings {
        PacingSettings {
            human_like_delays: true,
            search: DelayRange::new(1_000, 2_000),
            profile_visit: DelayRange::new(3_000, 3_000),
            scroll: DelayRange::new(200, 400),
            comment_read: DelayRange::new(500, 900),
            backoff_multiplier: 2.0,
            backoff_ceiling: 4.0,
            reset_after_successes: 2,
        }
    }

    #[test]
    fn delay_stays_within_bounds_for_any_failure_count() {
        let mut pacing = PacingController::with_seed(settings(), 7);
        for kind in [
            ActionKind::Search,
            ActionKind::ProfileVisit,
            ActionKind::Scroll,
            ActionKind::CommentRead,
        ] {
            let range = pacing.range(kind);
            for failures in [0, 1, 2, 3, 10, 100, u32::MAX] {
                for _ in 0..50 {
                    let ms = u64::try_from(pacing.next_delay(kind, failures).as_millis()).unwrap();
                    assert!(ms >= range.min_ms, "{kind}: {ms} < {}", range.min_ms);
                    assert!(ms <= range.max_ms * 4, "{kind}: {ms} > {}", range.max_ms * 4);
                }
            }
        }
    }

    #[test]
    fn fixed_min_when_human_like_delays_disabled() {
        let mut s = settings();
        s.human_like_delays = false;
        let mut pacing = PacingController::with_seed(s, 1);
        assert_eq!(
            pacing.next_delay(ActionKind::Search, 0),
            Duration::from_millis(1_000)
        );
        // backoff still applies on top of the fixed base
        assert_eq!(
            pacing.next_delay(ActionKind::Search, 1),
            Duration::from_millis(2_000)
        );
        assert_eq!(
            pacing.next_delay(ActionKind::Search, 9),
            Duration::from_millis(4_000)
        );
    }

    #[test]
    fn same_seed_same_sequence() {
        let mut a = PacingController::with_seed(settings(), 42);
        let mut b = PacingController::with_seed(settings(), 42);
        for _ in 0..20 {
            assert_eq!(
                a.next_delay(ActionKind::CommentRead, 1),
                b.next_delay(ActionKind::CommentRead, 1)
            );
        }
    }

    #[test]
    fn successes_reset_failure_streak() {
        let mut pacing = PacingController::with_seed(settings(), 3);
        pacing.record_failure();
        pacing.record_failure();
        assert_eq!(pacing.recent_failures(), 2);

        pacing.record_success();
        assert_eq!(pacing.recent_failures(), 2);
        pacing.record_success();
        assert_eq!(pacing.recent_failures(), 0);
    }

    #[test]
    fn failure_interrupts_success_run() {
        let mut pacing = PacingController::with_seed(settings(), 3);
        pacing.record_failure();
        pacing.record_success();
        pacing.record_failure();
        pacing.record_success();
        assert_eq!(pacing.recent_failures(), 2);
    }
}
