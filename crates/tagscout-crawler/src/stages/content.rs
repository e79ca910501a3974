use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tagscout_core::{CleanedRecord, InfluencerProfile, Post};
use tokio::sync::mpsc;

use super::{open_page, profile_url, StageContext, StageHandler, StageWorker};
use crate::clean::clean_post;
use crate::pacing::ActionKind;
use crate::parse::{parse_item_list, ITEM_LIST_ENDPOINT};
use crate::retry::{ActionFailure, Attempted};
use crate::types::RawPost;

/// Expands profiles into their most recent posts.
#[derive(Clone)]
pub(crate) struct ContentStage {
    ctx: Arc<StageContext>,
    /// `None` when comment collection is disabled.
    next: Option<mpsc::Sender<Post>>,
}

impl ContentStage {
    pub fn new(ctx: Arc<StageContext>, next: Option<mpsc::Sender<Post>>) -> Self {
        Self { ctx, next }
    }

    /// Clean a page of raw posts, dropping ids already gathered for this
    /// profile. Returns how many new posts the page added.
    fn absorb(
        worker: &StageWorker,
        handle: &str,
        page: &[RawPost],
        seen: &mut HashSet<String>,
        posts: &mut Vec<Post>,
    ) -> usize {
        let mut fresh = 0;
        for raw in page {
            if raw.post_id.as_ref().is_some_and(|id| seen.contains(id)) {
                continue;
            }
            match clean_post(raw) {
                CleanedRecord::Accepted(post) => {
                    seen.insert(post.post_id.clone());
                    posts.push(post);
                    fresh += 1;
                }
                CleanedRecord::Rejected { key, reason } => {
                    worker.counters.rejected();
                    tracing::debug!(%handle, ?key, %reason, "post rejected");
                }
            }
        }
        fresh
    }
}

#[async_trait]
impl StageHandler for ContentStage {
    type Input = InfluencerProfile;

    async fn handle(
        &self,
        worker: &mut StageWorker,
        profile: InfluencerProfile,
    ) -> Result<(), ActionFailure> {
        let config = &self.ctx.config;
        let handle = profile.handle.clone();
        let url = profile_url(&self.ctx.origin, &handle);

        let parse = {
            let handle = handle.clone();
            move |body: &serde_json::Value| parse_item_list(body, &handle)
        };
        let first: Attempted<Vec<RawPost>> = worker
            .act(
                &self.ctx.session,
                ActionKind::ProfileVisit,
                open_page(url, ITEM_LIST_ENDPOINT, parse.clone()),
            )
            .await?;

        let mut seen = HashSet::new();
        let mut posts = Vec::new();
        Self::absorb(worker, &handle, &first.value, &mut seen, &mut posts);

        let mut scrolls = 0u32;
        while posts.len() < config.max_posts_per_profile && scrolls < config.max_content_scrolls {
            scrolls += 1;
            let Some(page) = worker
                .scroll(&self.ctx.session, ITEM_LIST_ENDPOINT, parse.clone())
                .await?
            else {
                break;
            };
            if Self::absorb(worker, &handle, &page, &mut seen, &mut posts) == 0 {
                break;
            }
        }

        posts.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        posts.truncate(config.max_posts_per_profile);

        let mut accepted = Vec::with_capacity(posts.len());
        {
            let mut cleaner = self.ctx.cleaner();
            for post in posts {
                match cleaner.admit_post(post) {
                    CleanedRecord::Accepted(post) => accepted.push(post),
                    CleanedRecord::Rejected { key, reason } => {
                        worker.counters.rejected();
                        tracing::debug!(%handle, ?key, %reason, "post rejected");
                    }
                }
            }
        }
        worker.counters.collected_many(accepted.len());
        tracing::debug!(%handle, posts = accepted.len(), scrolls, "content collected");

        self.ctx.collected().posts.extend(accepted.iter().cloned());
        if let Some(next) = &self.next {
            for post in accepted.into_iter().take(config.max_comment_posts_per_profile) {
                worker.forward(next, post).await?;
            }
        }
        Ok(())
    }
}
