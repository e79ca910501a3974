use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tagscout_core::{CandidateProfile, CleanedRecord, Hashtag};
use tokio::sync::mpsc;

use super::{open_page, search_url, StageContext, StageHandler, StageWorker};
use crate::pacing::ActionKind;
use crate::parse::{parse_search, SEARCH_ENDPOINT};
use crate::retry::{ActionFailure, Attempted};
use crate::types::RawCandidate;

/// Hashtag search: turns each seed into up to `quota` new candidates.
#[derive(Clone)]
pub(crate) struct DiscoveryStage {
    ctx: Arc<StageContext>,
    next: mpsc::Sender<CandidateProfile>,
}

impl DiscoveryStage {
    pub fn new(ctx: Arc<StageContext>, next: mpsc::Sender<CandidateProfile>) -> Self {
        Self { ctx, next }
    }

    /// Clean one page of search hits, stopping once `remaining` candidates
    /// were accepted.
    fn admit_page(
        &self,
        worker: &StageWorker,
        hashtag: &Hashtag,
        page: &[RawCandidate],
        remaining: usize,
    ) -> Vec<CandidateProfile> {
        let mut accepted = Vec::new();
        let now = Utc::now();
        let mut cleaner = self.ctx.cleaner();
        for raw in page {
            if accepted.len() >= remaining {
                break;
            }
            match cleaner.candidate(raw, &hashtag.tag, now) {
                CleanedRecord::Accepted(candidate) => {
                    worker.counters.collected();
                    accepted.push(candidate);
                }
                CleanedRecord::Rejected { key, reason } => {
                    worker.counters.rejected();
                    tracing::debug!(hashtag = %hashtag, ?key, %reason, "candidate rejected");
                }
            }
        }
        accepted
    }
}

#[async_trait]
impl StageHandler for DiscoveryStage {
    type Input = Hashtag;

    async fn handle(&self, worker: &mut StageWorker, hashtag: Hashtag) -> Result<(), ActionFailure> {
        tracing::info!(hashtag = %hashtag, quota = hashtag.quota, "searching hashtag");
        let url = search_url(&self.ctx.origin, hashtag.term());
        let first: Attempted<Vec<RawCandidate>> = worker
            .act(
                &self.ctx.session,
                ActionKind::Search,
                open_page(url, SEARCH_ENDPOINT, parse_search),
            )
            .await?;

        let mut found = 0usize;
        let mut page = first.value;
        let mut scrolls = 0u32;
        loop {
            let accepted = self.admit_page(worker, &hashtag, &page, hashtag.quota.saturating_sub(found));
            let fresh = accepted.len();
            found += fresh;
            for candidate in accepted {
                worker.forward(&self.next, candidate).await?;
            }

            if found >= hashtag.quota || scrolls >= self.ctx.config.max_search_scrolls {
                break;
            }
            // only scroll pages end the search by adding nothing new
            if fresh == 0 && scrolls > 0 {
                break;
            }
            scrolls += 1;
            match worker
                .scroll(&self.ctx.session, SEARCH_ENDPOINT, parse_search)
                .await?
            {
                Some(next) => page = next,
                None => break,
            }
        }

        tracing::info!(hashtag = %hashtag, found, scrolls, "hashtag discovery finished");
        Ok(())
    }
}
