//! Normalization, validation, and deduplication of raw records.
//!
//! The `clean_*` functions are pure and idempotent: cleaning the raw
//! projection of an accepted record yields that record again. Cross-record
//! rules (duplicates, orphans) live in [`RecordCleaner`].

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use sha2::{Digest, Sha256};
use tagscout_core::{
    CandidateProfile, CleanedRecord, CommentSample, InfluencerProfile, Post, RejectReason,
};

use crate::types::{RawCandidate, RawComment, RawCount, RawPost, RawProfile, RawTimestamp};

/// Longest accepted video, in seconds.
pub const MAX_DURATION_SECS: u64 = 600;

/// Integer timestamps at or above this are milliseconds.
const MILLIS_THRESHOLD: i64 = 100_000_000_000;

static DESCRIPTION_HASHTAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#([\p{L}\p{N}_]+)").expect("valid hashtag regex"));

/// Strip control characters, collapse whitespace runs to one space, trim.
#[must_use]
pub fn normalize_text(raw: &str) -> String {
    raw.split(|c: char| c.is_whitespace() || c.is_control())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn normalize_optional_text(raw: Option<&str>) -> Option<String> {
    raw.map(normalize_text).filter(|s| !s.is_empty())
}

fn normalize_id(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Lowercase, without a leading `@`. `None` when empty or containing
/// whitespace.
#[must_use]
pub fn normalize_handle(raw: &str) -> Option<String> {
    let body = raw.trim().trim_start_matches('@');
    if body.is_empty() || body.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return None;
    }
    Some(body.to_lowercase())
}

/// Lowercase, without a leading `#`.
#[must_use]
pub fn normalize_post_hashtag(raw: &str) -> Option<String> {
    let body = raw.trim().trim_start_matches('#');
    if body.is_empty() || body.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return None;
    }
    Some(body.to_lowercase())
}

/// Parse a platform count: integers, floats, `"1,234"`, `"12.5K"`, `"1.2M"`.
///
/// # Errors
///
/// [`RejectReason::OutOfRange`] for negatives, [`RejectReason::InvalidNumber`]
/// for anything unparseable.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn parse_count(field: &'static str, raw: &RawCount) -> Result<u64, RejectReason> {
    let invalid = |value: String| RejectReason::InvalidNumber { field, value };
    let out_of_range = |value: String| RejectReason::OutOfRange { field, value };

    let from_float = |value: f64, shown: String| {
        if !value.is_finite() {
            return Err(invalid(shown));
        }
        if value < 0.0 {
            return Err(out_of_range(shown));
        }
        let rounded = value.round();
        if rounded > u64::MAX as f64 {
            return Err(out_of_range(shown));
        }
        Ok(rounded as u64)
    };

    match raw {
        RawCount::Int(n) => u64::try_from(*n).map_err(|_| out_of_range(n.to_string())),
        RawCount::Float(f) => from_float(*f, f.to_string()),
        RawCount::Text(text) => {
            let compact: String = text
                .chars()
                .filter(|c| *c != ',' && !c.is_whitespace())
                .collect();
            if compact.starts_with('-') {
                return Err(out_of_range(text.clone()));
            }
            if !compact.is_empty() && compact.bytes().all(|b| b.is_ascii_digit()) {
                return compact.parse::<u64>().map_err(|_| invalid(text.clone()));
            }

            let (number, scale) = match compact.char_indices().last() {
                Some((idx, 'k' | 'K')) => (&compact[..idx], 1e3),
                Some((idx, 'm' | 'M')) => (&compact[..idx], 1e6),
                Some((idx, 'b' | 'B')) => (&compact[..idx], 1e9),
                _ => (compact.as_str(), 1.0),
            };
            let value = number
                .parse::<f64>()
                .map_err(|_| invalid(text.clone()))?;
            from_float(value * scale, text.clone())
        }
    }
}

fn required_count(field: &'static str, raw: Option<&RawCount>) -> Result<u64, RejectReason> {
    raw.map_or(Err(RejectReason::MissingField(field)), |c| parse_count(field, c))
}

fn count_or_zero(field: &'static str, raw: Option<&RawCount>) -> Result<u64, RejectReason> {
    raw.map_or(Ok(0), |c| parse_count(field, c))
}

fn from_epoch(field: &'static str, n: i64) -> Result<DateTime<Utc>, RejectReason> {
    if n <= 0 {
        return Err(RejectReason::OutOfRange {
            field,
            value: n.to_string(),
        });
    }
    let parsed = if n >= MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(n)
    } else {
        DateTime::from_timestamp(n, 0)
    };
    parsed.ok_or(RejectReason::InvalidTimestamp { field })
}

/// Parse Unix seconds, Unix milliseconds, or RFC 3339 into UTC.
///
/// # Errors
///
/// [`RejectReason::InvalidTimestamp`] for unrecognized input and
/// [`RejectReason::OutOfRange`] for non-positive epochs.
pub fn parse_timestamp(
    field: &'static str,
    raw: &RawTimestamp,
) -> Result<DateTime<Utc>, RejectReason> {
    match raw {
        RawTimestamp::Int(n) => from_epoch(field, *n),
        RawTimestamp::Text(text) => {
            let text = text.trim();
            if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
                let n = text
                    .parse::<i64>()
                    .map_err(|_| RejectReason::InvalidTimestamp { field })?;
                return from_epoch(field, n);
            }
            DateTime::parse_from_rfc3339(text)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| RejectReason::InvalidTimestamp { field })
        }
    }
}

fn required_timestamp(
    field: &'static str,
    raw: Option<&RawTimestamp>,
) -> Result<DateTime<Utc>, RejectReason> {
    raw.map_or(Err(RejectReason::MissingField(field)), |t| {
        parse_timestamp(field, t)
    })
}

/// Explicit and description hashtags, normalized, first-seen order.
fn merge_hashtags(explicit: &[String], description: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    explicit
        .iter()
        .map(String::as_str)
        .chain(
            DESCRIPTION_HASHTAG
                .captures_iter(description)
                .filter_map(|c| c.get(1).map(|m| m.as_str())),
        )
        .filter_map(normalize_post_hashtag)
        .filter(|tag| seen.insert(tag.clone()))
        .collect()
}

macro_rules! try_clean {
    ($key:expr, $result:expr) => {
        match $result {
            Ok(value) => value,
            Err(reason) => return CleanedRecord::rejected($key, reason),
        }
    };
}

#[must_use]
pub fn clean_candidate(
    raw: &RawCandidate,
    source_hashtag: &str,
    discovered_at: DateTime<Utc>,
) -> CleanedRecord<CandidateProfile> {
    let Some(handle) = raw.handle.as_deref().and_then(normalize_handle) else {
        return CleanedRecord::rejected(
            raw.user_id.clone(),
            RejectReason::MissingField("handle"),
        );
    };
    CleanedRecord::Accepted(CandidateProfile {
        handle,
        user_id: normalize_id(raw.user_id.as_deref()),
        source_hashtag: source_hashtag.to_string(),
        discovered_at,
    })
}

#[must_use]
pub fn clean_profile(raw: &RawProfile) -> CleanedRecord<InfluencerProfile> {
    let Some(handle) = raw.handle.as_deref().and_then(normalize_handle) else {
        return CleanedRecord::rejected(
            raw.user_id.clone(),
            RejectReason::MissingField("handle"),
        );
    };
    let key = Some(handle.clone());

    let follower_count = try_clean!(
        key,
        required_count("follower_count", raw.follower_count.as_ref())
    );
    let following_count = try_clean!(
        key,
        count_or_zero("following_count", raw.following_count.as_ref())
    );
    let total_likes = try_clean!(key, count_or_zero("total_likes", raw.total_likes.as_ref()));
    let video_count = try_clean!(key, count_or_zero("video_count", raw.video_count.as_ref()));

    let account_age_days = match &raw.created_at {
        None => None,
        Some(created) => {
            let created = try_clean!(key, parse_timestamp("created_at", created));
            let days = (raw.discovered_at - created).num_days().max(0);
            Some(u32::try_from(days).unwrap_or(u32::MAX))
        }
    };

    CleanedRecord::Accepted(InfluencerProfile {
        handle,
        user_id: normalize_id(raw.user_id.as_deref()),
        display_name: normalize_optional_text(raw.display_name.as_deref()),
        bio: normalize_optional_text(raw.bio.as_deref()),
        follower_count,
        following_count,
        total_likes,
        video_count,
        is_verified: raw.is_verified.unwrap_or(false),
        is_private: raw.is_private.unwrap_or(false),
        account_age_days,
        source_hashtag: raw.source_hashtag.clone(),
        discovered_at: raw.discovered_at,
    })
}

#[must_use]
pub fn clean_post(raw: &RawPost) -> CleanedRecord<Post> {
    let Some(post_id) = normalize_id(raw.post_id.as_deref()) else {
        return CleanedRecord::rejected(None, RejectReason::MissingField("post_id"));
    };
    let key = Some(post_id.clone());

    let Some(profile_handle) = normalize_handle(&raw.profile_handle) else {
        return CleanedRecord::rejected(key, RejectReason::MissingField("profile_handle"));
    };

    let view_count = try_clean!(key, required_count("view_count", raw.view_count.as_ref()));
    let like_count = try_clean!(key, required_count("like_count", raw.like_count.as_ref()));
    let comment_count = try_clean!(
        key,
        required_count("comment_count", raw.comment_count.as_ref())
    );
    let share_count = try_clean!(key, required_count("share_count", raw.share_count.as_ref()));
    let save_count = try_clean!(key, count_or_zero("save_count", raw.save_count.as_ref()));
    let published_at = try_clean!(
        key,
        required_timestamp("published_at", raw.published_at.as_ref())
    );

    // Photo posts report a zero duration.
    let duration_secs = match &raw.duration_secs {
        None => None,
        Some(d) => match try_clean!(key, parse_count("duration_secs", d)) {
            0 => None,
            secs if secs > MAX_DURATION_SECS => {
                return CleanedRecord::rejected(
                    key,
                    RejectReason::OutOfRange {
                        field: "duration_secs",
                        value: secs.to_string(),
                    },
                );
            }
            secs => u32::try_from(secs).ok(),
        },
    };

    let description = raw
        .description
        .as_deref()
        .map(normalize_text)
        .unwrap_or_default();
    let hashtags = merge_hashtags(&raw.hashtags, &description);

    CleanedRecord::Accepted(Post {
        post_id,
        profile_handle,
        description,
        duration_secs,
        view_count,
        like_count,
        comment_count,
        share_count,
        save_count,
        published_at,
        hashtags,
        is_ad: raw.is_ad,
        is_pinned: raw.is_pinned,
    })
}

#[must_use]
pub fn clean_comment(raw: &RawComment) -> CleanedRecord<CommentSample> {
    let key = normalize_id(raw.comment_id.as_deref());
    let Some(post_id) = normalize_id(Some(&raw.post_id)) else {
        return CleanedRecord::rejected(key, RejectReason::MissingField("post_id"));
    };
    let Some(text) = normalize_optional_text(raw.text.as_deref()) else {
        return CleanedRecord::rejected(key, RejectReason::MissingField("text"));
    };
    let like_count = try_clean!(key, count_or_zero("like_count", raw.like_count.as_ref()));
    let reply_count = try_clean!(key, count_or_zero("reply_count", raw.reply_count.as_ref()));
    let created_at = try_clean!(
        key,
        required_timestamp("created_at", raw.created_at.as_ref())
    );

    CleanedRecord::Accepted(CommentSample {
        comment_id: key,
        post_id,
        parent_id: normalize_id(raw.parent_id.as_deref()),
        author_handle: raw.author_handle.as_deref().and_then(normalize_handle),
        text,
        like_count,
        reply_count,
        created_at,
    })
}

fn count_projection(n: u64) -> RawCount {
    i64::try_from(n).map_or_else(|_| RawCount::Text(n.to_string()), RawCount::Int)
}

fn timestamp_projection(at: DateTime<Utc>) -> RawTimestamp {
    RawTimestamp::Text(at.to_rfc3339())
}

impl From<&InfluencerProfile> for RawProfile {
    fn from(p: &InfluencerProfile) -> Self {
        Self {
            handle: Some(p.handle.clone()),
            user_id: p.user_id.clone(),
            display_name: p.display_name.clone(),
            bio: p.bio.clone(),
            follower_count: Some(count_projection(p.follower_count)),
            following_count: Some(count_projection(p.following_count)),
            total_likes: Some(count_projection(p.total_likes)),
            video_count: Some(count_projection(p.video_count)),
            is_verified: Some(p.is_verified),
            is_private: Some(p.is_private),
            created_at: p
                .account_age_days
                .map(|days| timestamp_projection(p.discovered_at - Duration::days(i64::from(days)))),
            source_hashtag: p.source_hashtag.clone(),
            discovered_at: p.discovered_at,
        }
    }
}

impl From<&Post> for RawPost {
    fn from(p: &Post) -> Self {
        Self {
            post_id: Some(p.post_id.clone()),
            profile_handle: p.profile_handle.clone(),
            description: Some(p.description.clone()),
            duration_secs: p.duration_secs.map(|d| RawCount::Int(i64::from(d))),
            view_count: Some(count_projection(p.view_count)),
            like_count: Some(count_projection(p.like_count)),
            comment_count: Some(count_projection(p.comment_count)),
            share_count: Some(count_projection(p.share_count)),
            save_count: Some(count_projection(p.save_count)),
            published_at: Some(timestamp_projection(p.published_at)),
            hashtags: p.hashtags.clone(),
            is_ad: p.is_ad,
            is_pinned: p.is_pinned,
        }
    }
}

impl From<&CommentSample> for RawComment {
    fn from(c: &CommentSample) -> Self {
        Self {
            comment_id: c.comment_id.clone(),
            post_id: c.post_id.clone(),
            parent_id: c.parent_id.clone(),
            author_handle: c.author_handle.clone(),
            text: Some(c.text.clone()),
            like_count: Some(count_projection(c.like_count)),
            reply_count: Some(count_projection(c.reply_count)),
            created_at: Some(timestamp_projection(c.created_at)),
        }
    }
}

/// Digest of a comment's natural key: text, author, and post id.
fn comment_key(comment: &CommentSample) -> [u8; 32] {
    let (text, author, post_id) = comment.natural_key();
    let mut hasher = Sha256::new();
    for part in [text, author, post_id] {
        hasher.update(part.as_bytes());
        hasher.update([0x1f]);
    }
    hasher.finalize().into()
}

/// Cross-record cleaning state for one run.
///
/// First accepted wins for every key; children are only accepted under
/// accepted parents.
#[derive(Debug, Default)]
pub struct RecordCleaner {
    candidates: HashSet<String>,
    profiles: HashSet<String>,
    posts: HashSet<String>,
    comments: HashSet<[u8; 32]>,
}

impl RecordCleaner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn candidate(
        &mut self,
        raw: &RawCandidate,
        source_hashtag: &str,
        discovered_at: DateTime<Utc>,
    ) -> CleanedRecord<CandidateProfile> {
        match clean_candidate(raw, source_hashtag, discovered_at) {
            CleanedRecord::Accepted(c) if !self.candidates.insert(c.handle.clone()) => {
                CleanedRecord::rejected(
                    Some(c.handle.clone()),
                    RejectReason::Duplicate { key: c.handle },
                )
            }
            other => other,
        }
    }

    pub fn profile(&mut self, raw: &RawProfile) -> CleanedRecord<InfluencerProfile> {
        match clean_profile(raw) {
            CleanedRecord::Accepted(p) if !self.profiles.insert(p.handle.clone()) => {
                CleanedRecord::rejected(
                    Some(p.handle.clone()),
                    RejectReason::Duplicate { key: p.handle },
                )
            }
            other => other,
        }
    }

    /// Register an already cleaned post.
    pub fn admit_post(&mut self, post: Post) -> CleanedRecord<Post> {
        if !self.profiles.contains(&post.profile_handle) {
            return CleanedRecord::rejected(
                Some(post.post_id),
                RejectReason::OrphanRecord {
                    parent: post.profile_handle,
                },
            );
        }
        if !self.posts.insert(post.post_id.clone()) {
            return CleanedRecord::rejected(
                Some(post.post_id.clone()),
                RejectReason::Duplicate { key: post.post_id },
            );
        }
        CleanedRecord::Accepted(post)
    }

    pub fn post(&mut self, raw: &RawPost) -> CleanedRecord<Post> {
        match clean_post(raw) {
            CleanedRecord::Accepted(p) => self.admit_post(p),
            rejected => rejected,
        }
    }

    pub fn comment(&mut self, raw: &RawComment) -> CleanedRecord<CommentSample> {
        let comment = match clean_comment(raw) {
            CleanedRecord::Accepted(c) => c,
            rejected => return rejected,
        };
        if !self.posts.contains(&comment.post_id) {
            return CleanedRecord::rejected(
                comment.comment_id,
                RejectReason::OrphanRecord {
                    parent: comment.post_id,
                },
            );
        }
        if !self.comments.insert(comment_key(&comment)) {
            let key = format!("{}:{}", comment.post_id, comment.text);
            return CleanedRecord::rejected(comment.comment_id, RejectReason::Duplicate { key });
        }
        CleanedRecord::Accepted(comment)
    }
}

#[cfg(test)]
#[path = "clean_test.rs"]
mod tests;
