use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use super::*;
use crate::engine::InterceptedResponse;

#[derive(Clone)]
struct FakeEngine {
    login_state: Value,
    navigate_error: Option<CrawlError>,
    navigate_delay: Duration,
    extract_calls: Arc<AtomicU32>,
    in_flight: Arc<AtomicU32>,
    max_in_flight: Arc<AtomicU32>,
}

#[async_trait]
impl BrowsingEngine for FakeEngine {
    async fn navigate(&self, _url: &str) -> Result<(), CrawlError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.navigate_delay.is_zero() {
            tokio::time::sleep(self.navigate_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        match &self.navigate_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    async fn extract(&self, query: &str) -> Result<Value, CrawlError> {
        assert_eq!(query, LOGIN_STATE_QUERY);
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.login_state.clone())
    }

    async fn intercepted_responses(&self) -> Result<Vec<InterceptedResponse>, CrawlError> {
        Ok(Vec::new())
    }

    async fn close(&self) -> Result<(), CrawlError> {
        Ok(())
    }
}

struct FakeLauncher {
    engine: FakeEngine,
    rejected_users: Vec<&'static str>,
    launches: Arc<AtomicU32>,
}

#[async_trait]
impl SessionLauncher for FakeLauncher {
    async fn launch(
        &self,
        account: Option<&Account>,
    ) -> Result<Box<dyn BrowsingEngine>, CrawlError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if let Some(a) = account {
            if self.rejected_users.contains(&a.username.as_str()) {
                return Err(CrawlError::Auth(format!("bad password for {}", a.username)));
            }
        }
        Ok(Box::new(self.engine.clone()))
    }
}

fn engine(login_state: Value) -> FakeEngine {
    FakeEngine {
        login_state,
        navigate_error: None,
        navigate_delay: Duration::ZERO,
        extract_calls: Arc::new(AtomicU32::new(0)),
        in_flight: Arc::new(AtomicU32::new(0)),
        max_in_flight: Arc::new(AtomicU32::new(0)),
    }
}

/// Refuses every login, as a platform login wall would.
struct LoginWall;

#[async_trait]
impl SessionLauncher for LoginWall {
    async fn launch(
        &self,
        _account: Option<&Account>,
    ) -> Result<Box<dyn BrowsingEngine>, CrawlError> {
        Err(CrawlError::Auth("login wall".into()))
    }
}

fn account(name: &str) -> Account {
    Account {
        username: name.to_string(),
        password: "pw".to_string(),
    }
}

fn manager(
    engine: FakeEngine,
    accounts: Vec<Account>,
    rejected_users: Vec<&'static str>,
    settings: SessionSettings,
) -> (SessionManager, Arc<AtomicU32>) {
    let launches = Arc::new(AtomicU32::new(0));
    let launcher = FakeLauncher {
        engine,
        rejected_users,
        launches: Arc::clone(&launches),
    };
    let mgr = SessionManager::new(
        Arc::new(launcher),
        accounts,
        settings,
        CancellationToken::new(),
    );
    (mgr, launches)
}

fn no_periodic_checks() -> SessionSettings {
    SessionSettings {
        validate_every: 0,
        ..SessionSettings::default()
    }
}

async fn visit(mgr: &SessionManager) -> Result<(), CrawlError> {
    mgr.run(ActionKind::ProfileVisit, &|engine: &dyn BrowsingEngine| {
        Box::pin(async move { engine.navigate("https://example.test/@a").await })
    })
    .await
}

#[test]
fn login_state_mapping() {
    let healthy = json!({"logged_in": true, "challenge": false});
    let challenged = json!({"logged_in": true, "challenge": true});
    let logged_out = json!({"logged_in": false, "challenge": false});

    assert_eq!(health_from_login_state(&healthy, true), SessionHealth::Healthy);
    assert_eq!(
        health_from_login_state(&challenged, true),
        SessionHealth::Degraded
    );
    assert_eq!(
        health_from_login_state(&logged_out, true),
        SessionHealth::Invalid
    );
    // anonymous sessions only care about challenges
    assert_eq!(
        health_from_login_state(&logged_out, false),
        SessionHealth::Healthy
    );
    assert_eq!(
        health_from_login_state(&json!({"challenge": true}), false),
        SessionHealth::Degraded
    );
}

#[tokio::test]
async fn acquire_reuses_live_session() {
    let (mgr, launches) = manager(
        engine(json!({"logged_in": true})),
        vec![],
        vec![],
        no_periodic_checks(),
    );
    let first = mgr.acquire().await.unwrap();
    let second = mgr.acquire().await.unwrap();
    assert_eq!(first.token, second.token);
    assert_eq!(launches.load(Ordering::SeqCst), 1);
    assert!(first.account.is_none());
}

#[tokio::test]
async fn run_launches_lazily_and_touches_last_activity() {
    let (mgr, launches) = manager(
        engine(json!({"logged_in": true})),
        vec![],
        vec![],
        no_periodic_checks(),
    );
    assert!(mgr.current().await.is_none());
    visit(&mgr).await.unwrap();
    assert_eq!(launches.load(Ordering::SeqCst), 1);

    let session = mgr.current().await.unwrap();
    assert!(session.last_activity >= session.created_at);
}

#[tokio::test]
async fn renew_replaces_token() {
    let (mgr, launches) = manager(
        engine(json!({"logged_in": true})),
        vec![],
        vec![],
        no_periodic_checks(),
    );
    let first = mgr.acquire().await.unwrap();
    let renewed = mgr.renew().await.unwrap();
    assert_ne!(first.token, renewed.token);
    assert_eq!(launches.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn three_invalid_validations_abort_the_run() {
    let mut eng = engine(json!({"logged_in": false, "challenge": false}));
    eng.navigate_error = Some(CrawlError::Auth("session expired".into()));
    let (mgr, launches) = manager(eng, vec![account("scout")], vec![], no_periodic_checks());
    let cancel = mgr.cancellation_token();

    assert!(matches!(visit(&mgr).await, Err(CrawlError::Auth(_))));
    assert!(matches!(visit(&mgr).await, Err(CrawlError::Auth(_))));
    assert!(!cancel.is_cancelled());

    let third = visit(&mgr).await;
    assert!(
        matches!(third, Err(CrawlError::SessionFatal(_))),
        "expected SessionFatal, got: {third:?}"
    );
    assert!(cancel.is_cancelled());
    assert!(mgr.fatal_reason().is_some());
    // each invalid reading renewed the session before the next action
    assert_eq!(launches.load(Ordering::SeqCst), 3);

    assert!(matches!(visit(&mgr).await, Err(CrawlError::Cancelled)));
}

#[tokio::test]
async fn degraded_reading_schedules_renewal() {
    let (mgr, launches) = manager(
        engine(json!({"logged_in": true, "challenge": true})),
        vec![account("scout")],
        vec![],
        no_periodic_checks(),
    );
    let first = mgr.acquire().await.unwrap();
    assert_eq!(mgr.validate().await.unwrap(), SessionHealth::Degraded);

    visit(&mgr).await.unwrap();
    let current = mgr.current().await.unwrap();
    assert_ne!(current.token, first.token);
    assert_eq!(launches.load(Ordering::SeqCst), 2);
    assert!(!mgr.cancellation_token().is_cancelled());
}

#[tokio::test]
async fn periodic_validation_runs_every_n_actions() {
    let eng = engine(json!({"logged_in": true, "challenge": false}));
    let extract_calls = Arc::clone(&eng.extract_calls);
    let settings = SessionSettings {
        validate_every: 2,
        ..SessionSettings::default()
    };
    let (mgr, _) = manager(eng, vec![account("scout")], vec![], settings);

    for _ in 0..5 {
        visit(&mgr).await.unwrap();
    }
    // checks happen before the 3rd and 5th actions
    assert_eq!(extract_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn rotates_past_accounts_that_fail_login() {
    let (mgr, launches) = manager(
        engine(json!({"logged_in": true})),
        vec![account("first"), account("second")],
        vec!["first"],
        no_periodic_checks(),
    );
    let session = mgr.acquire().await.unwrap();
    assert_eq!(session.account.as_deref(), Some("second"));
    assert_eq!(launches.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn all_accounts_cooling_down_is_auth_error() {
    let (mgr, _) = manager(
        engine(json!({"logged_in": true})),
        vec![account("first"), account("second")],
        vec!["first", "second"],
        no_periodic_checks(),
    );
    let err = mgr.acquire().await.unwrap_err();
    assert!(
        matches!(err, CrawlError::Auth(ref msg) if msg.contains("cooling down")),
        "unexpected error: {err:?}"
    );
}

#[test]
fn cooled_down_account_becomes_available_again() {
    let start = Instant::now();
    let mut pool = AccountPool::new(vec![account("only")], Duration::from_secs(60));
    pool.mark_failed("only", start);
    assert!(pool.next_available(start + Duration::from_secs(59)).is_none());
    assert_eq!(
        pool.next_available(start + Duration::from_secs(60))
            .map(|a| a.username),
        Some("only".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn slow_action_times_out() {
    let mut eng = engine(json!({"logged_in": true}));
    eng.navigate_delay = Duration::from_secs(120);
    let settings = SessionSettings {
        action_timeout: Duration::from_secs(5),
        validate_every: 0,
        ..SessionSettings::default()
    };
    let (mgr, _) = manager(eng, vec![], vec![], settings);
    let result = visit(&mgr).await;
    assert!(
        matches!(result, Err(CrawlError::Timeout { timeout_ms: 5_000 })),
        "expected Timeout, got: {result:?}"
    );
}

#[tokio::test]
async fn cancelled_token_short_circuits_run() {
    let (mgr, launches) = manager(
        engine(json!({"logged_in": true})),
        vec![],
        vec![],
        no_periodic_checks(),
    );
    mgr.cancellation_token().cancel();
    assert!(matches!(visit(&mgr).await, Err(CrawlError::Cancelled)));
    assert_eq!(launches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn repeated_login_failures_abort_the_run() {
    let mgr = SessionManager::new(
        Arc::new(LoginWall),
        vec![],
        no_periodic_checks(),
        CancellationToken::new(),
    );
    let cancel = mgr.cancellation_token();

    assert!(matches!(visit(&mgr).await, Err(CrawlError::Auth(_))));
    assert!(matches!(visit(&mgr).await, Err(CrawlError::Auth(_))));
    assert!(!cancel.is_cancelled());

    let third = visit(&mgr).await;
    assert!(
        matches!(third, Err(CrawlError::SessionFatal(_))),
        "expected SessionFatal, got: {third:?}"
    );
    assert!(cancel.is_cancelled());
    assert!(mgr
        .fatal_reason()
        .is_some_and(|reason| reason.contains("login wall")));
    assert!(matches!(visit(&mgr).await, Err(CrawlError::Cancelled)));
}

#[tokio::test]
async fn accounts_all_cooling_down_escalate_like_failed_logins() {
    let (mgr, _) = manager(
        engine(json!({"logged_in": true})),
        vec![account("only")],
        vec!["only"],
        no_periodic_checks(),
    );
    for _ in 0..2 {
        assert!(matches!(visit(&mgr).await, Err(CrawlError::Auth(_))));
    }
    assert!(matches!(
        visit(&mgr).await,
        Err(CrawlError::SessionFatal(_))
    ));
    assert!(mgr.cancellation_token().is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn concurrent_actions_never_share_the_engine() {
    let mut eng = engine(json!({"logged_in": true}));
    eng.navigate_delay = Duration::from_secs(1);
    let max_in_flight = Arc::clone(&eng.max_in_flight);
    let (mgr, launches) = manager(eng, vec![], vec![], no_periodic_checks());

    let started = Instant::now();
    let (a, b, c) = tokio::join!(visit(&mgr), visit(&mgr), visit(&mgr));
    a.unwrap();
    b.unwrap();
    c.unwrap();

    assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
    assert!(started.elapsed() >= Duration::from_secs(3));
    assert_eq!(launches.load(Ordering::SeqCst), 1);
}
