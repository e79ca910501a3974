//! The four collection stages and the worker machinery they share.

mod comments;
mod content;
mod discovery;
mod profiles;

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use futures::future::BoxFuture;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::Serialize;
use serde_json::Value;
use tagscout_core::{CommentSample, CrawlConfig, InfluencerProfile, Post};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::breaker::CircuitBreaker;
use crate::clean::RecordCleaner;
use crate::engine::{BrowsingEngine, SCROLL_QUERY};
use crate::error::CrawlError;
use crate::pacing::ActionKind;
use crate::parse::collect_payloads;
use crate::retry::{ActionFailure, Attempted, RetryCoordinator, RetryPolicy};
use crate::session::SessionManager;
use crate::summary::StageCounters;

pub(crate) use comments::CommentStage;
pub(crate) use content::ContentStage;
pub(crate) use discovery::DiscoveryStage;
pub(crate) use profiles::ProfileStage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Discovery,
    ProfileCollection,
    ContentCollection,
    CommentCollection,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Discovery,
        Stage::ProfileCollection,
        Stage::ContentCollection,
        Stage::CommentCollection,
    ];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Discovery => "discovery",
            Self::ProfileCollection => "profile_collection",
            Self::ContentCollection => "content_collection",
            Self::CommentCollection => "comment_collection",
        })
    }
}

#[must_use]
pub fn search_url(origin: &str, term: &str) -> String {
    format!(
        "{}/search?q={}",
        origin.trim_end_matches('/'),
        utf8_percent_encode(term, NON_ALPHANUMERIC)
    )
}

#[must_use]
pub fn profile_url(origin: &str, handle: &str) -> String {
    format!("{}/@{handle}", origin.trim_end_matches('/'))
}

#[must_use]
pub fn post_url(origin: &str, handle: &str, post_id: &str) -> String {
    format!("{}/@{handle}/video/{post_id}", origin.trim_end_matches('/'))
}

/// Navigate to `url` and parse the `endpoint` payloads the page load
/// triggered. Responses left over from the previous page are discarded.
pub(crate) fn open_page<T, P>(
    url: String,
    endpoint: &'static str,
    parse: P,
) -> impl for<'e> Fn(&'e dyn BrowsingEngine) -> BoxFuture<'e, Result<Vec<T>, CrawlError>> + Send + Sync
where
    T: Send + 'static,
    P: Fn(&Value) -> Result<Vec<T>, CrawlError> + Clone + Send + Sync + 'static,
{
    move |engine| {
        let url = url.clone();
        let parse = parse.clone();
        Box::pin(async move {
            engine.intercepted_responses().await?;
            engine.navigate(&url).await?;
            let responses = engine.intercepted_responses().await?;
            collect_payloads(&responses, endpoint, parse)
        })
    }
}

/// Scroll the current page one viewport and parse the `endpoint`
/// payloads that loaded.
pub(crate) fn scroll_page<T, P>(
    endpoint: &'static str,
    parse: P,
) -> impl for<'e> Fn(&'e dyn BrowsingEngine) -> BoxFuture<'e, Result<Vec<T>, CrawlError>> + Send + Sync
where
    T: Send + 'static,
    P: Fn(&Value) -> Result<Vec<T>, CrawlError> + Clone + Send + Sync + 'static,
{
    move |engine| {
        let parse = parse.clone();
        Box::pin(async move {
            engine.extract(SCROLL_QUERY).await?;
            let responses = engine.intercepted_responses().await?;
            collect_payloads(&responses, endpoint, parse)
        })
    }
}

/// Accepted records gathered across all stages.
#[derive(Debug, Default)]
pub(crate) struct Collected {
    pub profiles: Vec<InfluencerProfile>,
    pub posts: Vec<Post>,
    pub comments: Vec<CommentSample>,
}

/// Run-wide state every stage handler reads.
pub(crate) struct StageContext {
    pub session: Arc<SessionManager>,
    pub config: Arc<CrawlConfig>,
    pub cleaner: Mutex<RecordCleaner>,
    pub collected: Mutex<Collected>,
    pub origin: String,
}

impl StageContext {
    pub fn cleaner(&self) -> MutexGuard<'_, RecordCleaner> {
        self.cleaner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn collected(&self) -> MutexGuard<'_, Collected> {
        self.collected
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// One worker of a stage pool: its own pacing and retry state plus the
/// stage's shared breaker and counters.
pub(crate) struct StageWorker {
    pub stage: Stage,
    pub counters: Arc<StageCounters>,
    breaker: Arc<CircuitBreaker>,
    retry: RetryCoordinator,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl StageWorker {
    pub fn new(
        stage: Stage,
        counters: Arc<StageCounters>,
        breaker: Arc<CircuitBreaker>,
        retry: RetryCoordinator,
        policy: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            stage,
            counters,
            breaker,
            retry,
            policy,
            cancel,
        }
    }

    /// Breaker admission, pacing delay, then the retried session action.
    pub async fn act<T, F>(
        &mut self,
        session: &SessionManager,
        kind: ActionKind,
        action: F,
    ) -> Result<Attempted<T>, ActionFailure>
    where
        F: for<'e> Fn(&'e dyn BrowsingEngine) -> BoxFuture<'e, Result<T, CrawlError>> + Send + Sync,
        T: Send,
    {
        self.breaker
            .admit(&self.cancel)
            .await
            .map_err(ActionFailure::Aborted)?;
        if let Err(e) = self.retry.pace(kind).await {
            self.breaker.record_aborted();
            return Err(ActionFailure::Aborted(e));
        }

        let outcome = self
            .retry
            .execute(kind, &self.policy, || session.run(kind, &action))
            .await;

        match &outcome {
            Ok(attempted) => {
                if attempted.recovered() {
                    self.counters.recovered();
                }
                self.breaker.record_success();
            }
            Err(ActionFailure::Skipped(_)) => self.breaker.record_failure(),
            Err(ActionFailure::Exhausted { attempts, last }) => {
                tracing::warn!(
                    stage = %self.stage,
                    %kind,
                    attempts,
                    error = %last,
                    "retries exhausted"
                );
                if kind != ActionKind::Scroll {
                    self.counters.exhausted();
                }
                self.breaker.record_failure();
            }
            Err(ActionFailure::Aborted(_)) => self.breaker.record_aborted(),
        }
        outcome
    }

    /// One follow-up scroll on the current page.
    ///
    /// A failed scroll ends pagination for the item (`Ok(None)`) and keeps
    /// what was already gathered; only an abort propagates. The failure is
    /// counted under `scrolls_abandoned` and still feeds the breaker.
    pub async fn scroll<T, P>(
        &mut self,
        session: &SessionManager,
        endpoint: &'static str,
        parse: P,
    ) -> Result<Option<Vec<T>>, ActionFailure>
    where
        T: Send + 'static,
        P: Fn(&Value) -> Result<Vec<T>, CrawlError> + Clone + Send + Sync + 'static,
    {
        match self
            .act(session, ActionKind::Scroll, scroll_page(endpoint, parse))
            .await
        {
            Ok(page) => Ok(Some(page.value)),
            Err(ActionFailure::Aborted(e)) => Err(ActionFailure::Aborted(e)),
            Err(e) => {
                self.counters.scroll_abandoned();
                tracing::debug!(stage = %self.stage, error = %e, "scroll failed, ending pagination");
                Ok(None)
            }
        }
    }

    /// Push `item` to the next stage, waiting for queue space.
    pub async fn forward<T: Send>(
        &self,
        tx: &mpsc::Sender<T>,
        item: T,
    ) -> Result<(), ActionFailure> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(ActionFailure::Aborted(CrawlError::Cancelled)),
            sent = tx.send(item) => sent.map_err(|_| ActionFailure::Aborted(CrawlError::Cancelled)),
        }
    }
}

/// Per-item work of one stage.
#[async_trait]
pub(crate) trait StageHandler: Clone + Send + Sync + 'static {
    type Input: Send + 'static;

    async fn handle(&self, worker: &mut StageWorker, input: Self::Input)
        -> Result<(), ActionFailure>;
}

pub(crate) type SharedReceiver<T> = Arc<tokio::sync::Mutex<mpsc::Receiver<T>>>;

/// Drain the stage queue until it closes or the run is cancelled.
pub(crate) async fn run_worker<H: StageHandler>(
    handler: H,
    mut worker: StageWorker,
    queue: SharedReceiver<H::Input>,
    id: usize,
) {
    let stage = worker.stage;
    tracing::debug!(%stage, worker = id, "worker started");
    loop {
        let next = {
            let mut rx = tokio::select! {
                biased;
                () = worker.cancel.cancelled() => break,
                rx = queue.lock() => rx,
            };
            tokio::select! {
                biased;
                () = worker.cancel.cancelled() => None,
                item = rx.recv() => item,
            }
        };
        let Some(input) = next else {
            break;
        };

        match handler.handle(&mut worker, input).await {
            Ok(()) | Err(ActionFailure::Exhausted { .. }) => {}
            Err(ActionFailure::Skipped(e)) => {
                worker.counters.skipped();
                tracing::debug!(%stage, error = %e, "item skipped");
            }
            Err(ActionFailure::Aborted(e)) => {
                tracing::debug!(%stage, worker = id, error = %e, "worker stopping");
                break;
            }
        }
    }
    tracing::debug!(%stage, worker = id, "worker finished");
}
