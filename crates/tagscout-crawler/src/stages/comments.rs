use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tagscout_core::{CleanedRecord, Post};

use super::{open_page, post_url, StageContext, StageHandler, StageWorker};
use crate::pacing::ActionKind;
use crate::parse::{parse_comment_list, COMMENT_LIST_ENDPOINT};
use crate::retry::{ActionFailure, Attempted};
use crate::types::RawComment;

/// Samples comments under a post, in the order the platform serves them.
#[derive(Clone)]
pub(crate) struct CommentStage {
    ctx: Arc<StageContext>,
}

impl CommentStage {
    pub fn new(ctx: Arc<StageContext>) -> Self {
        Self { ctx }
    }
}

/// Append the comments of `page` not already gathered. Comments without an
/// id are kept; the cleaner dedupes them on content.
fn extend_unseen(page: Vec<RawComment>, seen: &mut HashSet<String>, raw: &mut Vec<RawComment>) -> usize {
    let before = raw.len();
    raw.extend(page.into_iter().filter(|c| match &c.comment_id {
        Some(id) => seen.insert(id.clone()),
        None => true,
    }));
    raw.len() - before
}

#[async_trait]
impl StageHandler for CommentStage {
    type Input = Post;

    async fn handle(&self, worker: &mut StageWorker, post: Post) -> Result<(), ActionFailure> {
        let config = &self.ctx.config;
        if post.comment_count == 0 {
            tracing::debug!(post_id = %post.post_id, "no comments to read");
            return Ok(());
        }

        let url = post_url(&self.ctx.origin, &post.profile_handle, &post.post_id);
        let parse = {
            let post_id = post.post_id.clone();
            move |body: &serde_json::Value| parse_comment_list(body, &post_id)
        };
        let first: Attempted<Vec<RawComment>> = worker
            .act(
                &self.ctx.session,
                ActionKind::CommentRead,
                open_page(url, COMMENT_LIST_ENDPOINT, parse.clone()),
            )
            .await?;

        let mut seen = HashSet::new();
        let mut raw = Vec::new();
        extend_unseen(first.value, &mut seen, &mut raw);

        let mut scrolls = 0u32;
        while raw.len() < config.max_comments_per_post && scrolls < config.max_comment_scrolls {
            scrolls += 1;
            let Some(page) = worker
                .scroll(&self.ctx.session, COMMENT_LIST_ENDPOINT, parse.clone())
                .await?
            else {
                break;
            };
            if extend_unseen(page, &mut seen, &mut raw) == 0 {
                break;
            }
        }

        let mut accepted = Vec::new();
        {
            let mut cleaner = self.ctx.cleaner();
            for comment in &raw {
                if accepted.len() >= config.max_comments_per_post {
                    break;
                }
                match cleaner.comment(comment) {
                    CleanedRecord::Accepted(sample) => accepted.push(sample),
                    CleanedRecord::Rejected { key, reason } => {
                        worker.counters.rejected();
                        tracing::debug!(post_id = %post.post_id, ?key, %reason, "comment rejected");
                    }
                }
            }
        }
        worker.counters.collected_many(accepted.len());
        tracing::debug!(post_id = %post.post_id, comments = accepted.len(), scrolls, "comments sampled");

        self.ctx.collected().comments.extend(accepted);
        Ok(())
    }
}
