//! Per-profile sub-scores and the weighted composite.
//!
//! Every sub-score is `None` when its inputs cannot define it; `None`
//! dimensions are left out of the composite and the remaining weights are
//! renormalized, so missing data never reads as a zero.

use serde::Serialize;
use tagscout_core::{CommentSample, InfluencerProfile, Post, ScoringConfig, ScoringWeights};

use crate::classifier::CommentClassifier;
use crate::error::ScoringError;

/// Posts needed before posting-interval consistency is meaningful.
pub const MIN_POSTS_FOR_CONSISTENCY: usize = 3;

/// Follower-count band. Reported alongside the score for filtering; never
/// part of the composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReachTier {
    Micro,
    Mid,
    Macro,
}

impl ReachTier {
    #[must_use]
    pub fn from_followers(followers: u64, mid_at: u64, macro_at: u64) -> Self {
        if followers >= macro_at {
            Self::Macro
        } else if followers >= mid_at {
            Self::Mid
        } else {
            Self::Micro
        }
    }
}

impl std::fmt::Display for ReachTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Micro => "micro",
            Self::Mid => "mid",
            Self::Macro => "macro",
        })
    }
}

/// Qualification score for one profile plus the records it was built from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreResult {
    pub handle: String,
    /// Weighted mean of the defined sub-scores.
    pub composite: Option<f64>,
    /// Mean of `(likes + comments + shares) / views` over posts with views.
    pub engagement: Option<f64>,
    /// Share of sampled comments classified as substantive.
    pub audience_quality: Option<f64>,
    /// `1 / (1 + CoV)` of the intervals between posts.
    pub consistency: Option<f64>,
    pub tier: ReachTier,
    pub follower_count: u64,
    pub comments_sampled: usize,
    pub comments_substantive: usize,
    pub post_ids: Vec<String>,
    pub comment_ids: Vec<String>,
}

/// Summed in ascending order, so any ordering of the same posts gives the
/// same bits.
#[must_use]
pub fn engagement_rate(posts: &[&Post]) -> Option<f64> {
    let mut rates: Vec<f64> = posts
        .iter()
        .filter(|p| p.view_count > 0)
        .map(|p| {
            let interactions = p
                .like_count
                .saturating_add(p.comment_count)
                .saturating_add(p.share_count);
            as_f64(interactions) / as_f64(p.view_count)
        })
        .collect();
    rates.sort_by(f64::total_cmp);
    mean(&rates)
}

/// Returns `(score, substantive count)`; the score is `None` with no
/// comments sampled.
#[must_use]
pub fn audience_quality(
    comments: &[&CommentSample],
    classifier: &CommentClassifier,
) -> (Option<f64>, usize) {
    if comments.is_empty() {
        return (None, 0);
    }
    let substantive = comments
        .iter()
        .filter(|c| classifier.is_substantive(&c.text))
        .count();
    (Some(as_f64(substantive) / as_f64(comments.len())), substantive)
}

/// Regularity of posting: `1 / (1 + σ/μ)` over the gaps between
/// consecutive posts. Needs [`MIN_POSTS_FOR_CONSISTENCY`] posts and a
/// non-zero mean gap.
#[must_use]
pub fn consistency(posts: &[&Post]) -> Option<f64> {
    if posts.len() < MIN_POSTS_FOR_CONSISTENCY {
        return None;
    }
    let mut times: Vec<i64> = posts.iter().map(|p| p.published_at.timestamp()).collect();
    times.sort_unstable();
    #[allow(clippy::cast_precision_loss)]
    let gaps: Vec<f64> = times.windows(2).map(|w| (w[1] - w[0]) as f64).collect();

    let mu = mean(&gaps)?;
    if mu <= 0.0 {
        return None;
    }
    let variance = gaps.iter().map(|g| (g - mu).powi(2)).sum::<f64>() / as_f64(gaps.len());
    let cov = variance.sqrt() / mu;
    Some(1.0 / (1.0 + cov))
}

/// Weighted mean over the sub-scores that are defined.
#[must_use]
pub fn composite(
    weights: &ScoringWeights,
    engagement: Option<f64>,
    audience_quality: Option<f64>,
    consistency: Option<f64>,
) -> Option<f64> {
    let parts = [
        (weights.engagement, engagement),
        (weights.audience_quality, audience_quality),
        (weights.consistency, consistency),
    ];
    let (weighted, total) = parts
        .iter()
        .filter_map(|(w, s)| s.map(|s| (w * s, *w)))
        .fold((0.0, 0.0), |(acc, sum), (ws, w)| (acc + ws, sum + w));
    (total > 0.0).then(|| weighted / total)
}

/// Validate `config` for scoring.
///
/// # Errors
///
/// Returns [`ScoringError`] for negative or non-finite weights, an all-zero
/// weight set, or tier thresholds out of order.
pub fn check_config(config: &ScoringConfig) -> Result<(), ScoringError> {
    let w = config.weights;
    for (name, value) in [
        ("engagement", w.engagement),
        ("audience_quality", w.audience_quality),
        ("consistency", w.consistency),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(ScoringError::InvalidWeight { name, value });
        }
    }
    if w.engagement + w.audience_quality + w.consistency <= 0.0 {
        return Err(ScoringError::ZeroWeightSum);
    }
    if config.mid_tier_followers >= config.macro_tier_followers {
        return Err(ScoringError::InvalidTiers {
            mid: config.mid_tier_followers,
            macro_tier: config.macro_tier_followers,
        });
    }
    Ok(())
}

/// Score one profile from its accepted posts and comment samples.
///
/// Pure: the same inputs always produce the same result.
#[must_use]
pub fn score(
    config: &ScoringConfig,
    classifier: &CommentClassifier,
    profile: &InfluencerProfile,
    posts: &[&Post],
    comments: &[&CommentSample],
) -> ScoreResult {
    let engagement = engagement_rate(posts);
    let (audience_quality, comments_substantive) = audience_quality(comments, classifier);
    let consistency = consistency(posts);

    let mut post_ids: Vec<String> = posts.iter().map(|p| p.post_id.clone()).collect();
    post_ids.sort();
    let mut comment_ids: Vec<String> = comments
        .iter()
        .filter_map(|c| c.comment_id.clone())
        .collect();
    comment_ids.sort();

    ScoreResult {
        handle: profile.handle.clone(),
        composite: composite(&config.weights, engagement, audience_quality, consistency),
        engagement,
        audience_quality,
        consistency,
        tier: ReachTier::from_followers(
            profile.follower_count,
            config.mid_tier_followers,
            config.macro_tier_followers,
        ),
        follower_count: profile.follower_count,
        comments_sampled: comments.len(),
        comments_substantive,
        post_ids,
        comment_ids,
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / as_f64(values.len()))
}

#[allow(clippy::cast_precision_loss)]
fn as_f64<N: TryInto<u64>>(n: N) -> f64 {
    n.try_into().map_or(f64::MAX, |n: u64| n as f64)
}

#[cfg(test)]
#[path = "score_test.rs"]
mod tests;
