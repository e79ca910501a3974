use std::time::Duration;

use thiserror::Error;

use crate::stages::Stage;

/// Coarse classification that drives retry, skip, and abort decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Worth retrying after a delay.
    Transient,
    /// Retrying returns the same answer; the item is skipped.
    Permanent,
    /// The session may be stale; validate, renew, then retry.
    Auth,
    /// The stage's circuit breaker is open.
    StageAbort,
    /// The run cannot continue.
    Fatal,
}

#[derive(Debug, Clone, Error)]
pub enum CrawlError {
    #[error("action timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("network error: {0}")]
    Network(String),

    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("account is private: {0}")]
    PrivateAccount(String),

    #[error("malformed payload for {context}: {reason}")]
    Payload { context: String, reason: String },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("{stage} paused for {resume_in:?}")]
    StageAbort { stage: Stage, resume_in: Duration },

    #[error("session unrecoverable: {0}")]
    SessionFatal(String),

    #[error("run cancelled")]
    Cancelled,

    #[error("engine error: {0}")]
    Engine(String),
}

impl CrawlError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout { .. } | Self::Network(_) | Self::RateLimited { .. } => {
                ErrorKind::Transient
            }
            Self::NotFound(_) | Self::PrivateAccount(_) | Self::Payload { .. } | Self::Engine(_) => {
                ErrorKind::Permanent
            }
            Self::Auth(_) => ErrorKind::Auth,
            Self::StageAbort { .. } => ErrorKind::StageAbort,
            Self::SessionFatal(_) | Self::Cancelled => ErrorKind::Fatal,
        }
    }

    /// Server-provided minimum wait before the next attempt, if any.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    pub(crate) fn payload(context: impl Into<String>, reason: impl ToString) -> Self {
        Self::Payload {
            context: context.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_error_taxonomy() {
        assert_eq!(CrawlError::Timeout { timeout_ms: 1 }.kind(), ErrorKind::Transient);
        assert_eq!(
            CrawlError::RateLimited { retry_after: None }.kind(),
            ErrorKind::Transient
        );
        assert_eq!(CrawlError::NotFound("@a".into()).kind(), ErrorKind::Permanent);
        assert_eq!(
            CrawlError::PrivateAccount("@a".into()).kind(),
            ErrorKind::Permanent
        );
        assert_eq!(CrawlError::Engine("boom".into()).kind(), ErrorKind::Permanent);
        assert_eq!(CrawlError::Auth("expired".into()).kind(), ErrorKind::Auth);
        assert_eq!(CrawlError::Cancelled.kind(), ErrorKind::Fatal);
        assert_eq!(
            CrawlError::SessionFatal("invalid".into()).kind(),
            ErrorKind::Fatal
        );
    }

    #[test]
    fn retry_after_only_for_rate_limit() {
        let hint = Duration::from_secs(7);
        assert_eq!(
            CrawlError::RateLimited {
                retry_after: Some(hint)
            }
            .retry_after(),
            Some(hint)
        );
        assert_eq!(CrawlError::Network("reset".into()).retry_after(), None);
    }
}
