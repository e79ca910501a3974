//! Intercepted platform payload types and the raw records built from them.
//!
//! ## Observed payload shapes
//!
//! ### Counts
//! Statistics arrive as JSON integers on the web API (`"playCount": 1034`),
//! occasionally as floats (`1.0e3`), and as display strings when read from
//! hydrated page state (`"1,234"`, `"12.5K"`, `"1.2M"`). [`RawCount`] keeps
//! whichever shape arrived; cleaning converts it.
//!
//! ### Timestamps
//! `createTime` / `create_time` are Unix seconds, sometimes serialized as a
//! string (`"1700000000"`). A few endpoints use milliseconds. Hydrated state
//! may carry RFC 3339 strings. [`RawTimestamp`] keeps the raw value.
//!
//! ### Search results
//! `GET /api/search/general/full` returns `data[]`, where video hits carry
//! `item.author` and user hits carry `user_info`. Entries with neither are
//! ads or topic cards and are ignored.
//!
//! ### User detail
//! `GET /api/user/detail` returns `userInfo.user` plus `userInfo.stats`.
//! Deleted or banned accounts come back with HTTP 200, no `userInfo`, and a
//! non-zero `statusCode`.
//!
//! ### Comments
//! The comment endpoint is snake_case (`create_time`, `digg_count`,
//! `user.unique_id`) unlike the camelCase video endpoints. Inline replies
//! ride along in `reply_comment`, which is a list, a single object, or null,
//! and `reply_comment_total` counts all replies including unloaded ones.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawCount {
    Int(i64),
    Float(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Int(i64),
    Text(String),
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub data: Vec<SearchEntry>,
}

#[derive(Debug, Deserialize)]
pub struct SearchEntry {
    #[serde(default)]
    pub item: Option<SearchItem>,
    #[serde(default)]
    pub user_info: Option<SearchUserInfo>,
}

#[derive(Debug, Deserialize)]
pub struct SearchItem {
    #[serde(default)]
    pub author: Option<AuthorRef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub unique_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchUserInfo {
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub unique_id: Option<String>,
}

// ---------------------------------------------------------------------------
// User detail
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetailResponse {
    #[serde(default)]
    pub status_code: Option<i64>,
    #[serde(default)]
    pub user_info: Option<UserInfo>,
}

#[derive(Debug, Deserialize)]
pub struct UserInfo {
    pub user: UserEntity,
    #[serde(default)]
    pub stats: Option<UserStats>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEntity {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub unique_id: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub verified: Option<bool>,
    #[serde(default)]
    pub private_account: Option<bool>,
    #[serde(default)]
    pub create_time: Option<RawTimestamp>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    #[serde(default)]
    pub follower_count: Option<RawCount>,
    #[serde(default)]
    pub following_count: Option<RawCount>,
    #[serde(default)]
    pub heart_count: Option<RawCount>,
    #[serde(default)]
    pub video_count: Option<RawCount>,
}

// ---------------------------------------------------------------------------
// Post list
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemListResponse {
    #[serde(default)]
    pub item_list: Vec<ItemEntry>,
    #[serde(default)]
    pub has_more: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub create_time: Option<RawTimestamp>,
    #[serde(default)]
    pub video: Option<ItemVideo>,
    #[serde(default)]
    pub stats: Option<ItemStats>,
    #[serde(default)]
    pub text_extra: Vec<TextExtra>,
    #[serde(default)]
    pub is_ad: Option<bool>,
    #[serde(default)]
    pub is_pinned_item: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ItemVideo {
    #[serde(default)]
    pub duration: Option<RawCount>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemStats {
    #[serde(default)]
    pub play_count: Option<RawCount>,
    #[serde(default)]
    pub digg_count: Option<RawCount>,
    #[serde(default)]
    pub comment_count: Option<RawCount>,
    #[serde(default)]
    pub share_count: Option<RawCount>,
    #[serde(default)]
    pub collect_count: Option<RawCount>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextExtra {
    #[serde(default)]
    pub hashtag_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Comments
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CommentListResponse {
    #[serde(default)]
    pub comments: Option<Vec<CommentEntry>>,
    #[serde(default)]
    pub has_more: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CommentEntry {
    #[serde(default)]
    pub cid: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub create_time: Option<RawTimestamp>,
    #[serde(default)]
    pub digg_count: Option<RawCount>,
    #[serde(default)]
    pub user: Option<CommentUser>,
    #[serde(default)]
    pub reply_comment: Option<ReplyList>,
    #[serde(default)]
    pub reply_comment_total: Option<RawCount>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ReplyList {
    Many(Vec<CommentEntry>),
    One(Box<CommentEntry>),
}

impl ReplyList {
    #[must_use]
    pub fn into_vec(self) -> Vec<CommentEntry> {
        match self {
            Self::Many(entries) => entries,
            Self::One(entry) => vec![*entry],
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CommentUser {
    #[serde(default)]
    pub unique_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Raw records (pre-cleaning)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCandidate {
    pub handle: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawProfile {
    pub handle: Option<String>,
    pub user_id: Option<String>,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub follower_count: Option<RawCount>,
    pub following_count: Option<RawCount>,
    pub total_likes: Option<RawCount>,
    pub video_count: Option<RawCount>,
    pub is_verified: Option<bool>,
    pub is_private: Option<bool>,
    pub created_at: Option<RawTimestamp>,
    pub source_hashtag: String,
    pub discovered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawPost {
    pub post_id: Option<String>,
    pub profile_handle: String,
    pub description: Option<String>,
    pub duration_secs: Option<RawCount>,
    pub view_count: Option<RawCount>,
    pub like_count: Option<RawCount>,
    pub comment_count: Option<RawCount>,
    pub share_count: Option<RawCount>,
    pub save_count: Option<RawCount>,
    pub published_at: Option<RawTimestamp>,
    pub hashtags: Vec<String>,
    pub is_ad: bool,
    pub is_pinned: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawComment {
    pub comment_id: Option<String>,
    pub post_id: String,
    /// Id of the top-level comment this one replies to.
    pub parent_id: Option<String>,
    pub reply_count: Option<RawCount>,
    pub author_handle: Option<String>,
    pub text: Option<String>,
    pub like_count: Option<RawCount>,
    pub created_at: Option<RawTimestamp>,
}
