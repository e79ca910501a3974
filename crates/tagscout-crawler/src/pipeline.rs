//! Wires the four stages together and runs one crawl.
//!
//! ```text
//! hashtags ─▶ Discovery ─▶ Profile Collection ─▶ Content Collection ─▶ Comment Collection
//!              (pool)          (pool)                 (pool)               (pool, optional)
//! ```
//!
//! Stages are joined by bounded channels. A stage's queue closes once every
//! worker of the stage before it has finished, so the pipeline drains from
//! the front on both normal completion and cancellation.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tagscout_core::{CommentSample, CrawlConfig, Hashtag, InfluencerProfile, Post};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::breaker::CircuitBreaker;
use crate::clean::RecordCleaner;
use crate::pacing::PacingController;
use crate::retry::{RetryCoordinator, RetryPolicy};
use crate::session::SessionManager;
use crate::stages::{
    run_worker, Collected, CommentStage, ContentStage, DiscoveryStage, ProfileStage, Stage,
    StageContext, StageHandler, StageWorker,
};
use crate::summary::{RunSummary, StageCounters, StageSummary};

pub const DEFAULT_ORIGIN: &str = "https://www.tiktok.com";

/// Hashtag usage per profile: `handle -> hashtag -> posts using it`.
pub type HashtagFrequency = BTreeMap<String, BTreeMap<String, u64>>;

/// Everything one crawl produced. Only accepted records appear here.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlOutput {
    pub profiles: Vec<InfluencerProfile>,
    pub posts: Vec<Post>,
    pub comments: Vec<CommentSample>,
    pub hashtag_frequency: HashtagFrequency,
    pub summary: RunSummary,
}

#[must_use]
pub fn hashtag_frequency(profiles: &[InfluencerProfile], posts: &[Post]) -> HashtagFrequency {
    let mut freq: HashtagFrequency = profiles
        .iter()
        .map(|p| (p.handle.clone(), BTreeMap::new()))
        .collect();
    for post in posts {
        let counts = freq.entry(post.profile_handle.clone()).or_default();
        for tag in &post.hashtags {
            *counts.entry(tag.clone()).or_insert(0) += 1;
        }
    }
    freq
}

/// Breaker and counters shared by every worker of one stage.
struct StageRuntime {
    stage: Stage,
    counters: Arc<StageCounters>,
    breaker: Arc<CircuitBreaker>,
}

impl StageRuntime {
    fn new(stage: Stage, config: &CrawlConfig) -> Self {
        Self {
            stage,
            counters: Arc::new(StageCounters::default()),
            breaker: Arc::new(CircuitBreaker::new(stage, config.breaker.clone())),
        }
    }

    fn summary(&self) -> StageSummary {
        self.counters.snapshot(self.breaker.pauses())
    }
}

pub struct CrawlPipeline {
    config: Arc<CrawlConfig>,
    session: Arc<SessionManager>,
    origin: String,
    pacing_seed: Option<u64>,
}

impl CrawlPipeline {
    #[must_use]
    pub fn new(config: CrawlConfig, session: Arc<SessionManager>) -> Self {
        Self {
            config: Arc::new(config),
            session,
            origin: DEFAULT_ORIGIN.to_string(),
            pacing_seed: None,
        }
    }

    /// Site root the stage URLs are built on.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Seed every worker's pacing RNG deterministically.
    #[must_use]
    pub fn with_pacing_seed(mut self, seed: u64) -> Self {
        self.pacing_seed = Some(seed);
        self
    }

    fn worker(&self, runtime: &StageRuntime, id: usize, cancel: &CancellationToken) -> StageWorker {
        let pacing = match self.pacing_seed {
            Some(seed) => {
                let offset = Stage::ALL
                    .iter()
                    .position(|s| *s == runtime.stage)
                    .unwrap_or_default();
                PacingController::with_seed(
                    self.config.pacing.clone(),
                    seed.wrapping_add(u64::try_from(offset * 1_000 + id).unwrap_or_default()),
                )
            }
            None => PacingController::new(self.config.pacing.clone()),
        };
        StageWorker::new(
            runtime.stage,
            Arc::clone(&runtime.counters),
            Arc::clone(&runtime.breaker),
            RetryCoordinator::new(pacing, cancel.clone()),
            RetryPolicy::from(&self.config.retry),
            cancel.clone(),
        )
    }

    /// Start `size` workers for one stage. The returned task finishes when
    /// all of them have; `handler` (and any sender it owns) is dropped by
    /// then.
    fn spawn_stage<H: StageHandler>(
        &self,
        runtime: &StageRuntime,
        handler: H,
        queue: mpsc::Receiver<H::Input>,
        size: usize,
        cancel: &CancellationToken,
    ) -> JoinHandle<()> {
        let queue = Arc::new(tokio::sync::Mutex::new(queue));
        let mut workers = JoinSet::new();
        for id in 0..size.max(1) {
            workers.spawn(run_worker(
                handler.clone(),
                self.worker(runtime, id, cancel),
                Arc::clone(&queue),
                id,
            ));
        }
        drop(handler);

        let stage = runtime.stage;
        tokio::spawn(async move {
            while let Some(joined) = workers.join_next().await {
                if let Err(e) = joined {
                    tracing::error!(%stage, error = %e, "stage worker failed");
                }
            }
            tracing::info!(%stage, "stage drained");
        })
    }

    /// Run the full crawl over `hashtags`.
    ///
    /// Never fails: item-level failures are counted in the summary, and an
    /// early end (operator cancel, fatal session, time budget) is recorded
    /// as the summary's abort reason with everything cleaned so far kept.
    pub async fn run(&self, hashtags: Vec<Hashtag>) -> CrawlOutput {
        let started_at = Utc::now();
        let config = &self.config;
        let cancel = self.session.cancellation_token();
        tracing::info!(
            hashtags = hashtags.len(),
            collect_comments = config.collect_comments,
            "crawl started"
        );

        let ctx = Arc::new(StageContext {
            session: Arc::clone(&self.session),
            config: Arc::clone(config),
            cleaner: Mutex::new(RecordCleaner::new()),
            collected: Mutex::new(Collected::default()),
            origin: self.origin.clone(),
        });
        let runtimes = Stage::ALL.map(|stage| StageRuntime::new(stage, config));
        let [discovery_rt, profile_rt, content_rt, comment_rt] = &runtimes;

        let capacity = config.queue_capacity.max(1);
        let (hashtag_tx, hashtag_rx) = mpsc::channel::<Hashtag>(capacity);
        let (candidate_tx, candidate_rx) = mpsc::channel(capacity);
        let (profile_tx, profile_rx) = mpsc::channel(capacity);

        let mut stages = Vec::with_capacity(4);
        stages.push(self.spawn_stage(
            discovery_rt,
            DiscoveryStage::new(Arc::clone(&ctx), candidate_tx),
            hashtag_rx,
            config.workers.discovery,
            &cancel,
        ));
        stages.push(self.spawn_stage(
            profile_rt,
            ProfileStage::new(Arc::clone(&ctx), profile_tx),
            candidate_rx,
            config.workers.profiles,
            &cancel,
        ));
        if config.collect_comments {
            let (post_tx, post_rx) = mpsc::channel(capacity);
            stages.push(self.spawn_stage(
                content_rt,
                ContentStage::new(Arc::clone(&ctx), Some(post_tx)),
                profile_rx,
                config.workers.content,
                &cancel,
            ));
            stages.push(self.spawn_stage(
                comment_rt,
                CommentStage::new(Arc::clone(&ctx)),
                post_rx,
                config.workers.comments,
                &cancel,
            ));
        } else {
            tracing::info!("comment collection disabled");
            stages.push(self.spawn_stage(
                content_rt,
                ContentStage::new(Arc::clone(&ctx), None),
                profile_rx,
                config.workers.content,
                &cancel,
            ));
        }

        let feeder = tokio::spawn(feed(hashtags, hashtag_tx, cancel.clone()));
        let budget_hit = Arc::new(AtomicBool::new(false));
        let watchdog = config
            .max_run_duration
            .map(|budget| tokio::spawn(watch_budget(budget, Arc::clone(&budget_hit), cancel.clone())));

        for stage in stages {
            if let Err(e) = stage.await {
                tracing::error!(error = %e, "stage supervisor failed");
            }
        }
        feeder.abort();
        if let Some(watchdog) = watchdog {
            watchdog.abort();
        }
        self.session.close().await;

        let aborted = self.abort_reason(&cancel, &budget_hit);
        let Collected {
            mut profiles,
            mut posts,
            mut comments,
        } = std::mem::take(&mut *ctx.collected());
        profiles.sort_by(|a, b| a.handle.cmp(&b.handle));
        posts.sort_by(|a, b| {
            a.profile_handle
                .cmp(&b.profile_handle)
                .then_with(|| b.published_at.cmp(&a.published_at))
        });
        // stable: comments keep source order within a post
        comments.sort_by(|a, b| a.post_id.cmp(&b.post_id));

        let summary = RunSummary {
            started_at,
            finished_at: Utc::now(),
            discovery: discovery_rt.summary(),
            profile_collection: profile_rt.summary(),
            content_collection: content_rt.summary(),
            comment_collection: comment_rt.summary(),
            aborted,
        };
        match &summary.aborted {
            Some(reason) => tracing::warn!(%reason, "crawl aborted"),
            None => tracing::info!(
                profiles = profiles.len(),
                posts = posts.len(),
                comments = comments.len(),
                "crawl finished"
            ),
        }

        CrawlOutput {
            hashtag_frequency: hashtag_frequency(&profiles, &posts),
            profiles,
            posts,
            comments,
            summary,
        }
    }

    fn abort_reason(&self, cancel: &CancellationToken, budget_hit: &AtomicBool) -> Option<String> {
        if let Some(reason) = self.session.fatal_reason() {
            return Some(reason);
        }
        if budget_hit.load(Ordering::Relaxed) {
            let secs = self.config.max_run_duration.unwrap_or_default().as_secs();
            return Some(format!("run time budget of {secs}s elapsed"));
        }
        cancel
            .is_cancelled()
            .then(|| "cancelled by operator".to_string())
    }
}

async fn feed(hashtags: Vec<Hashtag>, tx: mpsc::Sender<Hashtag>, cancel: CancellationToken) {
    for hashtag in hashtags {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            sent = tx.send(hashtag) => if sent.is_err() { return },
        }
    }
}

async fn watch_budget(budget: Duration, hit: Arc<AtomicBool>, cancel: CancellationToken) {
    tokio::select! {
        () = cancel.cancelled() => {}
        () = tokio::time::sleep(budget) => {
            hit.store(true, Ordering::Relaxed);
            tracing::warn!(budget_secs = budget.as_secs(), "run time budget elapsed, stopping crawl");
            cancel.cancel();
        }
    }
}
