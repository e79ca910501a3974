//! Cleaned record types shared by the crawler and the scorer.
//!
//! These are the post-validation shapes: counts are non-negative integers,
//! timestamps are UTC, handles are lowercase without `@`, and hashtags are
//! lowercase without `#`. Raw payload shapes live in the crawler crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A creator handle surfaced by hashtag Discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub handle: String,
    /// Platform-internal user id, when the search payload exposes it.
    pub user_id: Option<String>,
    /// The first hashtag this handle was discovered under.
    pub source_hashtag: String,
    pub discovered_at: DateTime<Utc>,
}

/// A candidate that Profile Collection resolved and cleaning accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfluencerProfile {
    pub handle: String,
    pub user_id: Option<String>,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub follower_count: u64,
    pub following_count: u64,
    pub total_likes: u64,
    pub video_count: u64,
    pub is_verified: bool,
    pub is_private: bool,
    /// Days since account creation; `None` when the payload has no creation time.
    pub account_age_days: Option<u32>,
    pub source_hashtag: String,
    pub discovered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub post_id: String,
    /// Handle of the owning [`InfluencerProfile`].
    pub profile_handle: String,
    pub description: String,
    pub duration_secs: Option<u32>,
    pub view_count: u64,
    pub like_count: u64,
    pub comment_count: u64,
    pub share_count: u64,
    pub save_count: u64,
    pub published_at: DateTime<Utc>,
    /// Lowercase hashtags without `#`, in first-seen order, deduplicated.
    pub hashtags: Vec<String>,
    pub is_ad: bool,
    pub is_pinned: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentSample {
    pub comment_id: Option<String>,
    /// Id of the owning [`Post`].
    pub post_id: String,
    /// Set on inline replies: the top-level comment they answer.
    #[serde(default)]
    pub parent_id: Option<String>,
    pub author_handle: Option<String>,
    pub text: String,
    pub like_count: u64,
    /// Replies the platform reports for a top-level comment, loaded or not.
    #[serde(default)]
    pub reply_count: u64,
    pub created_at: DateTime<Utc>,
}

impl CommentSample {
    /// Natural key used for duplicate suppression: text, author, and post.
    #[must_use]
    pub fn natural_key(&self) -> (String, String, String) {
        (
            self.text.clone(),
            self.author_handle.clone().unwrap_or_default(),
            self.post_id.clone(),
        )
    }
}

/// Why cleaning refused a record. Never fatal; rejected records are counted
/// and excluded from scoring.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum RejectReason {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("field `{field}` out of range: {value}")]
    OutOfRange { field: &'static str, value: String },

    #[error("field `{field}` is not a number: {value}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("field `{field}` is not a recognizable timestamp")]
    InvalidTimestamp { field: &'static str },

    #[error("duplicate of an already accepted record ({key})")]
    Duplicate { key: String },

    #[error("parent record `{parent}` was not accepted")]
    OrphanRecord { parent: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ValidationOutcome {
    Accepted,
    Rejected(RejectReason),
}

/// The result of cleaning one raw record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanedRecord<T> {
    Accepted(T),
    Rejected {
        /// Best-effort identifier of the raw record, for logging.
        key: Option<String>,
        reason: RejectReason,
    },
}

impl<T> CleanedRecord<T> {
    pub fn rejected(key: Option<String>, reason: RejectReason) -> Self {
        Self::Rejected { key, reason }
    }

    #[must_use]
    pub fn outcome(&self) -> ValidationOutcome {
        match self {
            Self::Accepted(_) => ValidationOutcome::Accepted,
            Self::Rejected { reason, .. } => ValidationOutcome::Rejected(reason.clone()),
        }
    }

    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    pub fn accepted(self) -> Option<T> {
        match self {
            Self::Accepted(record) => Some(record),
            Self::Rejected { .. } => None,
        }
    }

    pub fn as_accepted(&self) -> Option<&T> {
        match self {
            Self::Accepted(record) => Some(record),
            Self::Rejected { .. } => None,
        }
    }
}
