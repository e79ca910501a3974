//! Typed crawl, pacing, retry, and scoring settings.
//!
//! Every field has a documented default via [`Default`]; the env loader in
//! [`crate::config`] only overrides what is set.

use std::time::Duration;

use crate::ConfigError;

/// Inclusive millisecond range a paced delay is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    #[must_use]
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    /// Parse `"<min>-<max>"` (milliseconds), e.g. `"2000-4000"`.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the value is malformed or
    /// `min > max`.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let (lo, hi) = raw
            .split_once('-')
            .ok_or_else(|| format!("expected \"<min>-<max>\", got \"{raw}\""))?;
        let min_ms = lo.trim().parse::<u64>().map_err(|e| e.to_string())?;
        let max_ms = hi.trim().parse::<u64>().map_err(|e| e.to_string())?;
        if min_ms > max_ms {
            return Err(format!("min {min_ms} is greater than max {max_ms}"));
        }
        Ok(Self { min_ms, max_ms })
    }
}

/// Delay ranges per action kind plus the backoff shape.
#[derive(Debug, Clone, PartialEq)]
pub struct PacingSettings {
    pub human_like_delays: bool,
    pub search: DelayRange,
    pub profile_visit: DelayRange,
    pub scroll: DelayRange,
    pub comment_read: DelayRange,
    /// Each recent failure multiplies the delay by this factor.
    pub backoff_multiplier: f64,
    /// Upper bound on the accumulated multiplier.
    pub backoff_ceiling: f64,
    /// Consecutive successes that reset the failure counter.
    pub reset_after_successes: u32,
}

impl Default for PacingSettings {
    fn default() -> Self {
        Self {
            human_like_delays: true,
            search: DelayRange::new(8_000, 15_000),
            profile_visit: DelayRange::new(10_000, 15_000),
            scroll: DelayRange::new(2_000, 4_000),
            comment_read: DelayRange::new(2_000, 5_000),
            backoff_multiplier: 2.0,
            backoff_ceiling: 8.0,
            reset_after_successes: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrySettings {
    /// Total attempts per action, including the first.
    pub max_attempts: u32,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerSettings {
    /// Consecutive permanent failures that open the breaker.
    pub failure_threshold: u32,
    pub window: Duration,
    pub cooldown: Duration,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            window: Duration::from_secs(300),
            cooldown: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Hard timeout for a single engine action.
    pub action_timeout: Duration,
    /// Validate the session every N actions; `0` disables periodic checks.
    pub validate_every: u32,
    /// How long a failed account sits out before it can be used again.
    pub account_cooldown: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            action_timeout: Duration::from_secs(45),
            validate_every: 25,
            account_cooldown: Duration::from_secs(30 * 60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePoolSizes {
    pub discovery: usize,
    pub profiles: usize,
    pub content: usize,
    pub comments: usize,
}

impl Default for StagePoolSizes {
    fn default() -> Self {
        Self {
            discovery: 1,
            profiles: 2,
            content: 2,
            comments: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    pub engagement: f64,
    pub audience_quality: f64,
    pub consistency: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            engagement: 0.5,
            audience_quality: 0.3,
            consistency: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    pub weights: ScoringWeights,
    /// Minimum trimmed character count for a comment to count as substantive.
    pub substantive_min_chars: usize,
    /// Follower count at which an account moves from micro to mid tier.
    pub mid_tier_followers: u64,
    /// Follower count at which an account moves from mid to macro tier.
    pub macro_tier_followers: u64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            substantive_min_chars: 12,
            mid_tier_followers: 100_000,
            macro_tier_followers: 1_000_000,
        }
    }
}

/// Everything the crawl pipeline needs to run.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlConfig {
    pub max_profiles_per_hashtag: usize,
    pub max_posts_per_profile: usize,
    pub max_comments_per_post: usize,
    /// Only this many of each profile's most recent posts reach Comment Collection.
    pub max_comment_posts_per_profile: usize,
    pub collect_comments: bool,
    pub max_search_scrolls: u32,
    pub max_content_scrolls: u32,
    pub max_comment_scrolls: u32,
    pub queue_capacity: usize,
    pub workers: StagePoolSizes,
    pub pacing: PacingSettings,
    pub retry: RetrySettings,
    pub breaker: BreakerSettings,
    pub session: SessionSettings,
    pub max_run_duration: Option<Duration>,
    pub scoring: ScoringConfig,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_profiles_per_hashtag: 50,
            max_posts_per_profile: 50,
            max_comments_per_post: 100,
            max_comment_posts_per_profile: 5,
            collect_comments: true,
            max_search_scrolls: 10,
            max_content_scrolls: 25,
            max_comment_scrolls: 20,
            queue_capacity: 64,
            workers: StagePoolSizes::default(),
            pacing: PacingSettings::default(),
            retry: RetrySettings::default(),
            breaker: BreakerSettings::default(),
            session: SessionSettings::default(),
            max_run_duration: None,
            scoring: ScoringConfig::default(),
        }
    }
}

impl CrawlConfig {
    /// Check cross-field constraints the env parser cannot express per field.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] naming the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Validation(msg.to_string()));

        let pools = &self.workers;
        if pools.discovery == 0 || pools.profiles == 0 || pools.content == 0 || pools.comments == 0
        {
            return invalid("every stage worker pool needs at least one worker");
        }
        if self.queue_capacity == 0 {
            return invalid("queue capacity must be at least 1");
        }
        if self.retry.max_attempts == 0 {
            return invalid("retry max attempts must be at least 1");
        }
        if self.breaker.failure_threshold == 0 {
            return invalid("breaker threshold must be at least 1");
        }
        let at_least_one = |v: f64| v.is_finite() && v >= 1.0;
        if !at_least_one(self.pacing.backoff_multiplier) || !at_least_one(self.pacing.backoff_ceiling)
        {
            return invalid("backoff multiplier and ceiling must both be finite and >= 1.0");
        }
        for range in [
            self.pacing.search,
            self.pacing.profile_visit,
            self.pacing.scroll,
            self.pacing.comment_read,
        ] {
            if range.min_ms > range.max_ms {
                return invalid("pacing delay range has min greater than max");
            }
        }

        let w = self.scoring.weights;
        if [w.engagement, w.audience_quality, w.consistency]
            .iter()
            .any(|v| !v.is_finite() || *v < 0.0)
        {
            return invalid("scoring weights must be finite and non-negative");
        }
        if w.engagement + w.audience_quality + w.consistency <= 0.0 {
            return invalid("scoring weights must sum to a positive value");
        }
        if self.scoring.mid_tier_followers >= self.scoring.macro_tier_followers {
            return invalid("mid tier threshold must be below macro tier threshold");
        }
        Ok(())
    }
}
