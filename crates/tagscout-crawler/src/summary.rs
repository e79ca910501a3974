//! Per-stage accounting and the end-of-run summary.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::stages::Stage;

/// Live counters shared by a stage's workers.
#[derive(Debug, Default)]
pub struct StageCounters {
    collected: AtomicU64,
    skipped_permanent: AtomicU64,
    rejected_validation: AtomicU64,
    retried_recovered: AtomicU64,
    retried_exhausted: AtomicU64,
    scrolls_abandoned: AtomicU64,
}

impl StageCounters {
    pub fn collected(&self) {
        self.collected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn collected_many(&self, n: usize) {
        self.collected
            .fetch_add(u64::try_from(n).unwrap_or(u64::MAX), Ordering::Relaxed);
    }

    pub fn skipped(&self) {
        self.skipped_permanent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn rejected(&self) {
        self.rejected_validation.fetch_add(1, Ordering::Relaxed);
    }

    pub fn recovered(&self) {
        self.retried_recovered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn exhausted(&self) {
        self.retried_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn scroll_abandoned(&self) {
        self.scrolls_abandoned.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self, paused: u32) -> StageSummary {
        StageSummary {
            collected: self.collected.load(Ordering::Relaxed),
            skipped_permanent: self.skipped_permanent.load(Ordering::Relaxed),
            rejected_validation: self.rejected_validation.load(Ordering::Relaxed),
            retried_recovered: self.retried_recovered.load(Ordering::Relaxed),
            retried_exhausted: self.retried_exhausted.load(Ordering::Relaxed),
            scrolls_abandoned: self.scrolls_abandoned.load(Ordering::Relaxed),
            paused,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StageSummary {
    /// Records this stage accepted and passed on.
    pub collected: u64,
    /// Items dropped on a non-retryable failure.
    pub skipped_permanent: u64,
    /// Records cleaning refused, duplicates included.
    pub rejected_validation: u64,
    /// Actions that failed at least once and then succeeded.
    pub retried_recovered: u64,
    /// Item-level actions that failed on every allowed attempt. Follow-up
    /// scrolls are not included; see `scrolls_abandoned`.
    pub retried_exhausted: u64,
    /// Follow-up scrolls that failed and ended an item's pagination early.
    /// The item keeps what earlier pages gathered. These failures still
    /// count toward the stage's circuit breaker.
    pub scrolls_abandoned: u64,
    /// Times the stage's circuit breaker opened.
    pub paused: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub discovery: StageSummary,
    pub profile_collection: StageSummary,
    pub content_collection: StageSummary,
    pub comment_collection: StageSummary,
    /// Why the run ended early, if it did.
    pub aborted: Option<String>,
}

impl RunSummary {
    #[must_use]
    pub fn stage(&self, stage: Stage) -> &StageSummary {
        match stage {
            Stage::Discovery => &self.discovery,
            Stage::ProfileCollection => &self.profile_collection,
            Stage::ContentCollection => &self.content_collection,
            Stage::CommentCollection => &self.comment_collection,
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.aborted.is_none()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<20} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9} {:>7}",
            "stage", "collected", "skipped", "rejected", "recovered", "exhausted", "cut short", "paused"
        )?;
        for stage in Stage::ALL {
            let s = self.stage(stage);
            writeln!(
                f,
                "{:<20} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9} {:>7}",
                stage.to_string(),
                s.collected,
                s.skipped_permanent,
                s.rejected_validation,
                s.retried_recovered,
                s.retried_exhausted,
                s.scrolls_abandoned,
                s.paused
            )?;
        }
        let elapsed = (self.finished_at - self.started_at).num_seconds();
        match &self.aborted {
            Some(reason) => write!(f, "run aborted after {elapsed}s: {reason}"),
            None => write!(f, "run completed in {elapsed}s"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reads_counters() {
        let counters = StageCounters::default();
        counters.collected();
        counters.collected();
        counters.skipped();
        counters.recovered();
        counters.scroll_abandoned();
        let summary = counters.snapshot(1);
        assert_eq!(
            summary,
            StageSummary {
                collected: 2,
                skipped_permanent: 1,
                rejected_validation: 0,
                retried_recovered: 1,
                retried_exhausted: 0,
                scrolls_abandoned: 1,
                paused: 1,
            }
        );
    }

    #[test]
    fn display_lists_every_stage_and_abort_reason() {
        let now = Utc::now();
        let summary = RunSummary {
            started_at: now,
            finished_at: now,
            discovery: StageSummary::default(),
            profile_collection: StageSummary {
                collected: 1,
                skipped_permanent: 1,
                ..StageSummary::default()
            },
            content_collection: StageSummary::default(),
            comment_collection: StageSummary::default(),
            aborted: Some("cancelled by operator".to_string()),
        };
        let rendered = summary.to_string();
        for name in [
            "discovery",
            "profile_collection",
            "content_collection",
            "comment_collection",
        ] {
            assert!(rendered.contains(name), "missing {name} in:\n{rendered}");
        }
        assert!(rendered.ends_with("cancelled by operator"));
        assert!(!summary.is_complete());
    }
}
