//! Intercepted payloads to raw records.
//!
//! Parsers are strict about shape (a payload that does not deserialize is a
//! [`CrawlError::Payload`]) and lenient about content: missing fields stay
//! `None` for cleaning to judge.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::engine::InterceptedResponse;
use crate::error::CrawlError;
use crate::types::{
    CommentListResponse, ItemListResponse, RawCandidate, RawComment, RawPost, RawProfile,
    ReplyList, SearchResponse, UserDetailResponse,
};

pub const SEARCH_ENDPOINT: &str = "/api/search/";
pub const USER_DETAIL_ENDPOINT: &str = "/api/user/detail";
pub const ITEM_LIST_ENDPOINT: &str = "/api/post/item_list";
pub const COMMENT_LIST_ENDPOINT: &str = "/api/comment/list";

/// Platform status codes for accounts that no longer resolve.
const USER_GONE_STATUS_CODES: [i64; 3] = [10_202, 10_221, 10_222];

fn decode<'a, T: Deserialize<'a>>(body: &'a Value, context: &str) -> Result<T, CrawlError> {
    T::deserialize(body).map_err(|e| CrawlError::payload(context, e))
}

/// Parse every successful response whose URL contains `endpoint`.
///
/// Individually malformed payloads are logged and skipped; the call fails
/// only when matching payloads existed and none of them parsed.
///
/// # Errors
///
/// Returns the first [`CrawlError::Payload`] when every matching payload
/// was malformed.
pub fn collect_payloads<T>(
    responses: &[InterceptedResponse],
    endpoint: &str,
    parse: impl Fn(&Value) -> Result<Vec<T>, CrawlError>,
) -> Result<Vec<T>, CrawlError> {
    let mut out = Vec::new();
    let mut matched = 0usize;
    let mut first_err = None;

    for response in responses
        .iter()
        .filter(|r| r.url.contains(endpoint) && r.is_success())
    {
        matched += 1;
        match parse(&response.body) {
            Ok(records) => out.extend(records),
            Err(e) => {
                tracing::warn!(url = %response.url, error = %e, "skipping malformed payload");
                first_err.get_or_insert(e);
            }
        }
    }

    match first_err {
        Some(e) if out.is_empty() && matched > 0 => Err(e),
        _ => Ok(out),
    }
}

/// Authors found in a search payload, in result order.
///
/// # Errors
///
/// Returns [`CrawlError::Payload`] when the body is not a search response.
pub fn parse_search(body: &Value) -> Result<Vec<RawCandidate>, CrawlError> {
    let response: SearchResponse = decode(body, "search")?;
    Ok(response
        .data
        .into_iter()
        .filter_map(|entry| {
            if let Some(author) = entry.item.and_then(|item| item.author) {
                return Some(RawCandidate {
                    handle: author.unique_id,
                    user_id: author.id,
                });
            }
            entry.user_info.map(|user| RawCandidate {
                handle: user.unique_id,
                user_id: user.uid,
            })
        })
        .collect())
}

/// Build a raw profile from a user-detail payload.
///
/// `source_hashtag` and `discovered_at` carry over from the candidate.
///
/// # Errors
///
/// - [`CrawlError::NotFound`] when the platform reports the account gone.
/// - [`CrawlError::PrivateAccount`] when the account is private.
/// - [`CrawlError::Payload`] for anything unrecognizable.
pub fn parse_user_detail(
    body: &Value,
    handle: &str,
    source_hashtag: &str,
    discovered_at: DateTime<Utc>,
) -> Result<RawProfile, CrawlError> {
    let response: UserDetailResponse = decode(body, "user detail")?;

    let Some(info) = response.user_info else {
        return match response.status_code {
            Some(code) if USER_GONE_STATUS_CODES.contains(&code) => {
                Err(CrawlError::NotFound(format!("@{handle}")))
            }
            Some(code) => Err(CrawlError::payload(
                "user detail",
                format!("no userInfo (statusCode {code})"),
            )),
            None => Err(CrawlError::payload("user detail", "no userInfo")),
        };
    };

    let user = info.user;
    if user.private_account == Some(true) {
        return Err(CrawlError::PrivateAccount(format!("@{handle}")));
    }

    let stats = info.stats;
    Ok(RawProfile {
        handle: user.unique_id,
        user_id: user.id,
        display_name: user.nickname,
        bio: user.signature,
        follower_count: stats.as_ref().and_then(|s| s.follower_count.clone()),
        following_count: stats.as_ref().and_then(|s| s.following_count.clone()),
        total_likes: stats.as_ref().and_then(|s| s.heart_count.clone()),
        video_count: stats.as_ref().and_then(|s| s.video_count.clone()),
        is_verified: user.verified,
        is_private: user.private_account,
        created_at: user.create_time,
        source_hashtag: source_hashtag.to_string(),
        discovered_at,
    })
}

/// Posts from one page of a profile's item list.
///
/// # Errors
///
/// Returns [`CrawlError::Payload`] when the body is not an item list.
pub fn parse_item_list(body: &Value, profile_handle: &str) -> Result<Vec<RawPost>, CrawlError> {
    let response: ItemListResponse = decode(body, "item list")?;
    Ok(response
        .item_list
        .into_iter()
        .map(|item| {
            let stats = item.stats;
            RawPost {
                post_id: item.id,
                profile_handle: profile_handle.to_string(),
                description: item.desc,
                duration_secs: item.video.and_then(|v| v.duration),
                view_count: stats.as_ref().and_then(|s| s.play_count.clone()),
                like_count: stats.as_ref().and_then(|s| s.digg_count.clone()),
                comment_count: stats.as_ref().and_then(|s| s.comment_count.clone()),
                share_count: stats.as_ref().and_then(|s| s.share_count.clone()),
                save_count: stats.as_ref().and_then(|s| s.collect_count.clone()),
                published_at: item.create_time,
                hashtags: item
                    .text_extra
                    .into_iter()
                    .filter_map(|t| t.hashtag_name)
                    .collect(),
                is_ad: item.is_ad.unwrap_or(false),
                is_pinned: item.is_pinned_item.unwrap_or(false),
            }
        })
        .collect())
}

/// Comments from one page of a post's comment list, in source order.
///
/// A `null` comment list (comments disabled) yields no records.
///
/// # Errors
///
/// Returns [`CrawlError::Payload`] when the body is not a comment list.
pub fn parse_comment_list(body: &Value, post_id: &str) -> Result<Vec<RawComment>, CrawlError> {
    let response: CommentListResponse = decode(body, "comment list")?;
    let mut comments = Vec::new();
    for entry in response.comments.unwrap_or_default() {
        let replies = entry.reply_comment.map(ReplyList::into_vec).unwrap_or_default();
        let parent = RawComment {
            comment_id: entry.cid,
            post_id: post_id.to_string(),
            parent_id: None,
            author_handle: entry.user.and_then(|u| u.unique_id),
            text: entry.text,
            like_count: entry.digg_count,
            reply_count: entry.reply_comment_total,
            created_at: entry.create_time,
        };
        // Inline replies often omit create_time; they are no older than the parent.
        let reply_rows: Vec<RawComment> = replies
            .into_iter()
            .map(|r| RawComment {
                comment_id: r.cid,
                post_id: post_id.to_string(),
                parent_id: parent.comment_id.clone(),
                author_handle: r.user.and_then(|u| u.unique_id),
                text: r.text,
                like_count: r.digg_count,
                reply_count: None,
                created_at: r.create_time.or_else(|| parent.created_at.clone()),
            })
            .collect();
        comments.push(parent);
        comments.extend(reply_rows);
    }
    Ok(comments)
}

#[cfg(test)]
#[path = "parse_test.rs"]
mod tests;
