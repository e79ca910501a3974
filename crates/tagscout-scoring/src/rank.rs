use std::cmp::Ordering;
use std::collections::HashMap;

use tagscout_core::{CommentSample, InfluencerProfile, Post, ScoringConfig};

use crate::classifier::CommentClassifier;
use crate::error::ScoringError;
use crate::score::{check_config, score, ScoreResult};

/// Order results best first: composite descending, then engagement
/// descending, then handle ascending. Undefined scores sort last.
pub fn rank(results: &mut [ScoreResult]) {
    results.sort_by(|a, b| {
        desc_defined_first(a.composite, b.composite)
            .then_with(|| desc_defined_first(a.engagement, b.engagement))
            .then_with(|| a.handle.cmp(&b.handle))
    });
}

fn desc_defined_first(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Scores whole crawl outputs with one validated configuration.
#[derive(Debug, Clone)]
pub struct Scorer {
    config: ScoringConfig,
    classifier: CommentClassifier,
}

impl Scorer {
    /// # Errors
    ///
    /// Returns [`ScoringError`] when the weights or tier thresholds are invalid.
    pub fn new(config: ScoringConfig) -> Result<Self, ScoringError> {
        check_config(&config)?;
        let classifier = CommentClassifier::new(config.substantive_min_chars);
        Ok(Self { config, classifier })
    }

    #[must_use]
    pub fn score(
        &self,
        profile: &InfluencerProfile,
        posts: &[&Post],
        comments: &[&CommentSample],
    ) -> ScoreResult {
        score(&self.config, &self.classifier, profile, posts, comments)
    }

    /// Score every profile against its own posts and their comments, then
    /// [`rank`] the results.
    ///
    /// Posts and comments whose parent is not in the input are ignored.
    #[must_use]
    pub fn score_all(
        &self,
        profiles: &[InfluencerProfile],
        posts: &[Post],
        comments: &[CommentSample],
    ) -> Vec<ScoreResult> {
        let mut posts_by_handle: HashMap<&str, Vec<&Post>> = HashMap::new();
        for post in posts {
            posts_by_handle
                .entry(post.profile_handle.as_str())
                .or_default()
                .push(post);
        }
        let mut comments_by_post: HashMap<&str, Vec<&CommentSample>> = HashMap::new();
        for comment in comments {
            comments_by_post
                .entry(comment.post_id.as_str())
                .or_default()
                .push(comment);
        }

        let mut results: Vec<ScoreResult> = profiles
            .iter()
            .map(|profile| {
                let own_posts = posts_by_handle
                    .get(profile.handle.as_str())
                    .cloned()
                    .unwrap_or_default();
                let own_comments: Vec<&CommentSample> = own_posts
                    .iter()
                    .filter_map(|p| comments_by_post.get(p.post_id.as_str()))
                    .flatten()
                    .copied()
                    .collect();
                let result = self.score(profile, &own_posts, &own_comments);
                tracing::debug!(
                    handle = %result.handle,
                    composite = ?result.composite,
                    tier = %result.tier,
                    "profile scored"
                );
                result
            })
            .collect();

        rank(&mut results);
        tracing::info!(scored = results.len(), "scoring complete");
        results
    }
}
