//! Single-session ownership: acquire, validate, renew, close, and the
//! mediated `run` every stage action goes through.

use std::sync::{Arc, Mutex as StdMutex};

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;
use tagscout_core::{Account, SessionSettings};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::engine::{BrowsingEngine, SessionLauncher, LOGIN_STATE_QUERY};
use crate::error::{CrawlError, ErrorKind};
use crate::pacing::ActionKind;

/// Consecutive `Invalid` validations that end the run.
pub const MAX_CONSECUTIVE_INVALID: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionHealth {
    Healthy,
    Degraded,
    Invalid,
}

/// Descriptive view of the live browsing context.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub health: SessionHealth,
    /// Username the context was opened with; `None` for anonymous sessions.
    pub account: Option<String>,
}

impl Session {
    fn new(account: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            token: Uuid::new_v4(),
            created_at: now,
            last_activity: now,
            health: SessionHealth::Healthy,
            account,
        }
    }
}

/// Map a login-state extraction onto a health reading.
///
/// Anonymous sessions are never logged in, so only the challenge flag
/// matters for them.
#[must_use]
pub fn health_from_login_state(state: &Value, authenticated: bool) -> SessionHealth {
    let logged_in = state
        .get("logged_in")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let challenge = state
        .get("challenge")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    match (authenticated && !logged_in, challenge) {
        (true, _) => SessionHealth::Invalid,
        (false, true) => SessionHealth::Degraded,
        (false, false) => SessionHealth::Healthy,
    }
}

/// Accounts available for login, with a cool-down after failures.
#[derive(Debug)]
pub struct AccountPool {
    entries: Vec<(Account, Option<Instant>)>,
    cooldown: std::time::Duration,
}

impl AccountPool {
    #[must_use]
    pub fn new(accounts: Vec<Account>, cooldown: std::time::Duration) -> Self {
        Self {
            entries: accounts.into_iter().map(|a| (a, None)).collect(),
            cooldown,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First account that is not cooling down at `now`.
    #[must_use]
    pub fn next_available(&self, now: Instant) -> Option<Account> {
        self.entries
            .iter()
            .find(|(_, failed_at)| failed_at.is_none_or(|at| now >= at + self.cooldown))
            .map(|(account, _)| account.clone())
    }

    pub fn mark_failed(&mut self, username: &str, now: Instant) {
        if let Some(entry) = self.entries.iter_mut().find(|(a, _)| a.username == username) {
            entry.1 = Some(now);
        }
    }
}

struct Live {
    session: Session,
    engine: Box<dyn BrowsingEngine>,
}

struct State {
    live: Option<Live>,
    accounts: AccountPool,
    renew_pending: bool,
    actions_since_validation: u32,
    consecutive_invalid: u32,
}

/// Owns the one browsing context of a run.
///
/// The inner mutex is held for exactly one action, so two actions never
/// share the engine concurrently.
pub struct SessionManager {
    launcher: Arc<dyn SessionLauncher>,
    settings: SessionSettings,
    state: Mutex<State>,
    cancel: CancellationToken,
    fatal_reason: StdMutex<Option<String>>,
}

impl SessionManager {
    pub fn new(
        launcher: Arc<dyn SessionLauncher>,
        accounts: Vec<Account>,
        settings: SessionSettings,
        cancel: CancellationToken,
    ) -> Self {
        let accounts = AccountPool::new(accounts, settings.account_cooldown);
        Self {
            launcher,
            settings,
            state: Mutex::new(State {
                live: None,
                accounts,
                renew_pending: false,
                actions_since_validation: 0,
                consecutive_invalid: 0,
            }),
            cancel,
            fatal_reason: StdMutex::new(None),
        }
    }

    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Why the session escalated to a run abort, if it did.
    #[must_use]
    pub fn fatal_reason(&self) -> Option<String> {
        self.fatal_reason
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Open the session if none is live and return its description.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::Auth`] when no account can log in, or any
    /// launcher error.
    pub async fn acquire(&self) -> Result<Session, CrawlError> {
        let mut state = self.state.lock().await;
        if let Some(live) = &state.live {
            return Ok(live.session.clone());
        }
        self.launch_locked(&mut state).await
    }

    /// Read the session's health and apply the escalation policy.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::SessionFatal`] once the session has read
    /// `Invalid` [`MAX_CONSECUTIVE_INVALID`] times in a row.
    pub async fn validate(&self) -> Result<SessionHealth, CrawlError> {
        let mut state = self.state.lock().await;
        self.validate_locked(&mut state).await
    }

    /// Replace the live context with a fresh one.
    ///
    /// # Errors
    ///
    /// Same as [`SessionManager::acquire`].
    pub async fn renew(&self) -> Result<Session, CrawlError> {
        let mut state = self.state.lock().await;
        self.renew_locked(&mut state).await
    }

    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        if let Some(live) = state.live.take() {
            if let Err(e) = live.engine.close().await {
                tracing::warn!(token = %live.session.token, error = %e, "failed to close session");
            } else {
                tracing::info!(token = %live.session.token, "session closed");
            }
        }
    }

    /// Snapshot of the live session, if one is open.
    pub async fn current(&self) -> Option<Session> {
        self.state
            .lock()
            .await
            .live
            .as_ref()
            .map(|l| l.session.clone())
    }

    /// Execute one engine action under the session lock and the action timeout.
    ///
    /// Pending renewals and periodic validations run first. An `Auth`
    /// failure from the action triggers a validation before the error is
    /// returned to the caller.
    ///
    /// # Errors
    ///
    /// Returns the action's error, [`CrawlError::Timeout`] when it overruns,
    /// [`CrawlError::Cancelled`] after cancellation, or session lifecycle errors.
    pub async fn run<T, F>(&self, kind: ActionKind, action: &F) -> Result<T, CrawlError>
    where
        F: for<'e> Fn(&'e dyn BrowsingEngine) -> BoxFuture<'e, Result<T, CrawlError>> + Sync,
        T: Send,
    {
        let mut guard = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(CrawlError::Cancelled),
            guard = self.state.lock() => guard,
        };
        let state = &mut *guard;
        if self.cancel.is_cancelled() {
            return Err(CrawlError::Cancelled);
        }

        if state.live.is_none() {
            self.launch_locked(state).await?;
        } else if state.renew_pending {
            self.renew_locked(state).await?;
        }

        let validate_every = self.settings.validate_every;
        if validate_every > 0 && state.actions_since_validation >= validate_every {
            self.validate_locked(state).await?;
            if state.renew_pending {
                self.renew_locked(state).await?;
            }
        }

        let Some(live) = state.live.as_ref() else {
            return Err(CrawlError::Engine("no live session".to_string()));
        };
        let timeout = self.settings.action_timeout;
        let result = tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(CrawlError::Cancelled),
            outcome = tokio::time::timeout(timeout, action(live.engine.as_ref())) => {
                outcome.unwrap_or_else(|_| Err(CrawlError::Timeout {
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                }))
            }
        };

        state.actions_since_validation = state.actions_since_validation.saturating_add(1);
        match &result {
            Ok(_) => {
                if let Some(live) = state.live.as_mut() {
                    live.session.last_activity = Utc::now();
                }
            }
            Err(e) if e.kind() == ErrorKind::Auth => {
                tracing::warn!(%kind, error = %e, "auth failure, validating session");
                self.validate_locked(state).await?;
            }
            Err(_) => {}
        }
        result
    }

    async fn validate_locked(&self, state: &mut State) -> Result<SessionHealth, CrawlError> {
        let Some(live) = state.live.as_mut() else {
            return Ok(SessionHealth::Invalid);
        };

        let reading = tokio::time::timeout(
            self.settings.action_timeout,
            live.engine.extract(LOGIN_STATE_QUERY),
        )
        .await;
        let health = match reading {
            Ok(Ok(value)) => health_from_login_state(&value, live.session.account.is_some()),
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "login state extraction failed");
                SessionHealth::Degraded
            }
            Err(_) => SessionHealth::Degraded,
        };

        live.session.health = health;
        let token = live.session.token;
        state.actions_since_validation = 0;

        match health {
            SessionHealth::Healthy => state.consecutive_invalid = 0,
            SessionHealth::Degraded => {
                state.consecutive_invalid = 0;
                state.renew_pending = true;
                tracing::warn!(%token, "session degraded, renewal scheduled");
            }
            SessionHealth::Invalid => {
                tracing::warn!(%token, "session invalid");
                self.note_invalid(state, "validation read logged out")?;
            }
        }
        Ok(health)
    }

    /// Count one `Invalid` reading; a failed login counts as one too.
    /// Aborts the run on the [`MAX_CONSECUTIVE_INVALID`]th in a row.
    fn note_invalid(&self, state: &mut State, cause: &str) -> Result<(), CrawlError> {
        state.consecutive_invalid += 1;
        state.renew_pending = true;
        tracing::debug!(consecutive_invalid = state.consecutive_invalid, cause, "invalid reading");
        if state.consecutive_invalid < MAX_CONSECUTIVE_INVALID {
            return Ok(());
        }
        let reason = format!(
            "session invalid {} consecutive times (last: {cause})",
            state.consecutive_invalid
        );
        tracing::error!(reason = %reason, "aborting run");
        if let Ok(mut slot) = self.fatal_reason.lock() {
            slot.get_or_insert_with(|| reason.clone());
        }
        self.cancel.cancel();
        Err(CrawlError::SessionFatal(reason))
    }

    async fn renew_locked(&self, state: &mut State) -> Result<Session, CrawlError> {
        if let Some(old) = state.live.take() {
            tracing::warn!(token = %old.session.token, health = ?old.session.health, "renewing session");
            if let Err(e) = old.engine.close().await {
                tracing::debug!(error = %e, "closing stale session failed");
            }
        }
        self.launch_locked(state).await
    }

    async fn launch_locked(&self, state: &mut State) -> Result<Session, CrawlError> {
        match self.open_session(state).await {
            Err(e) if e.kind() == ErrorKind::Auth => {
                self.note_invalid(state, &e.to_string())?;
                Err(e)
            }
            other => other,
        }
    }

    async fn open_session(&self, state: &mut State) -> Result<Session, CrawlError> {
        loop {
            let account = if state.accounts.is_empty() {
                None
            } else {
                let Some(account) = state.accounts.next_available(Instant::now()) else {
                    return Err(CrawlError::Auth(
                        "every account is cooling down".to_string(),
                    ));
                };
                Some(account)
            };

            let launched = tokio::time::timeout(
                self.settings.action_timeout,
                self.launcher.launch(account.as_ref()),
            )
            .await
            .unwrap_or_else(|_| {
                Err(CrawlError::Timeout {
                    timeout_ms: u64::try_from(self.settings.action_timeout.as_millis())
                        .unwrap_or(u64::MAX),
                })
            });

            match launched {
                Ok(engine) => {
                    let session = Session::new(account.map(|a| a.username));
                    tracing::info!(
                        token = %session.token,
                        account = session.account.as_deref().unwrap_or("anonymous"),
                        "session opened"
                    );
                    state.live = Some(Live {
                        session: session.clone(),
                        engine,
                    });
                    state.renew_pending = false;
                    state.actions_since_validation = 0;
                    return Ok(session);
                }
                Err(e) if e.kind() == ErrorKind::Auth => {
                    let Some(account) = account else {
                        return Err(e);
                    };
                    tracing::warn!(
                        account = %account.username,
                        error = %e,
                        "login failed, account cooling down"
                    );
                    state.accounts.mark_failed(&account.username, Instant::now());
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
