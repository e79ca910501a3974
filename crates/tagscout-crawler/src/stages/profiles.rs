use std::sync::Arc;

use async_trait::async_trait;
use tagscout_core::{CandidateProfile, CleanedRecord, InfluencerProfile};
use tokio::sync::mpsc;

use super::{profile_url, StageContext, StageHandler, StageWorker};
use crate::engine::PROFILE_STATE_QUERY;
use crate::pacing::ActionKind;
use crate::parse::{parse_user_detail, USER_DETAIL_ENDPOINT};
use crate::retry::{ActionFailure, Attempted};
use crate::types::RawProfile;

/// Resolves candidates into full profiles.
#[derive(Clone)]
pub(crate) struct ProfileStage {
    ctx: Arc<StageContext>,
    next: mpsc::Sender<InfluencerProfile>,
}

impl ProfileStage {
    pub fn new(ctx: Arc<StageContext>, next: mpsc::Sender<InfluencerProfile>) -> Self {
        Self { ctx, next }
    }
}

#[async_trait]
impl StageHandler for ProfileStage {
    type Input = CandidateProfile;

    async fn handle(
        &self,
        worker: &mut StageWorker,
        candidate: CandidateProfile,
    ) -> Result<(), ActionFailure> {
        let url = profile_url(&self.ctx.origin, &candidate.handle);
        let handle = candidate.handle.clone();
        let source = candidate.source_hashtag.clone();
        let discovered_at = candidate.discovered_at;

        let fetched: Attempted<RawProfile> = worker
            .act(&self.ctx.session, ActionKind::ProfileVisit, move |engine| {
                let url = url.clone();
                let handle = handle.clone();
                let source = source.clone();
                Box::pin(async move {
                    engine.intercepted_responses().await?;
                    engine.navigate(&url).await?;
                    let detail = engine
                        .intercepted_responses()
                        .await?
                        .into_iter()
                        .find(|r| r.is_success() && r.url.contains(USER_DETAIL_ENDPOINT));
                    let body = match detail {
                        Some(response) => response.body,
                        None => engine.extract(PROFILE_STATE_QUERY).await?,
                    };
                    parse_user_detail(&body, &handle, &source, discovered_at)
                })
            })
            .await?;

        let mut raw = fetched.value;
        if raw.handle.is_none() {
            raw.handle = Some(candidate.handle.clone());
        }
        if raw.user_id.is_none() {
            raw.user_id.clone_from(&candidate.user_id);
        }

        let cleaned = self.ctx.cleaner().profile(&raw);
        match cleaned {
            CleanedRecord::Accepted(profile) => {
                worker.counters.collected();
                tracing::debug!(
                    handle = %profile.handle,
                    followers = profile.follower_count,
                    "profile collected"
                );
                self.ctx.collected().profiles.push(profile.clone());
                worker.forward(&self.next, profile).await?;
            }
            CleanedRecord::Rejected { key, reason } => {
                worker.counters.rejected();
                tracing::warn!(handle = %candidate.handle, ?key, %reason, "profile rejected");
            }
        }
        Ok(())
    }
}
