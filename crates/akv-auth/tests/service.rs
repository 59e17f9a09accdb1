use akv_auth::{
    AuthError, AuthProvider, AuthResult, AuthService, AuthState, AuthStateChanged, MockAuth,
    Session,
};
use akv_config_and_utils::AuthStrategy;
use akv_storage::{AuthTokens, MemoryStorage, SessionStore, UserInfo};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Notify};

#[derive(Clone, Copy)]
enum Outcome {
    Valid,
    Invalid,
    Transient,
    Fatal,
}

struct StubProvider {
    login_fails: bool,
    login_gate: Option<Arc<Notify>>,
    initial_lifetime_secs: i64,
    refreshed_lifetime_secs: i64,
    validate: Mutex<Outcome>,
    refresh: Mutex<Outcome>,
    check_interval: Duration,
    logouts: AtomicUsize,
    refreshes: AtomicUsize,
}

impl Default for StubProvider {
    fn default() -> Self {
        Self {
            login_fails: false,
            login_gate: None,
            initial_lifetime_secs: 3600,
            refreshed_lifetime_secs: 3600,
            validate: Mutex::new(Outcome::Valid),
            refresh: Mutex::new(Outcome::Valid),
            check_interval: Duration::from_secs(3600),
            logouts: AtomicUsize::new(0),
            refreshes: AtomicUsize::new(0),
        }
    }
}

fn user() -> UserInfo {
    UserInfo {
        id: "user-1".into(),
        email: "user@contoso.com".into(),
        name: "User One".into(),
        tenant_id: Some("tenant-1".into()),
        roles: vec![],
        last_login: Utc::now(),
    }
}

fn outcome_error(outcome: Outcome) -> AuthError {
    match outcome {
        Outcome::Transient => AuthError::NetworkUnavailable,
        _ => AuthError::OAuth("invalid_grant".into()),
    }
}

#[async_trait]
impl AuthProvider for StubProvider {
    fn strategy(&self) -> AuthStrategy {
        AuthStrategy::OAuth
    }

    async fn probe(&self, _store: &SessionStore) -> AuthResult<Option<Session>> {
        Ok(None)
    }

    async fn login(&self) -> AuthResult<Session> {
        if let Some(gate) = &self.login_gate {
            gate.notified().await;
        }
        if self.login_fails {
            return Err(AuthError::OAuth("access_denied: user cancelled".into()));
        }
        let tokens = AuthTokens::expiring_in(
            "initial",
            Some("refresh".into()),
            self.initial_lifetime_secs,
            vec![],
        );
        Ok(Session::new(user(), Some(tokens)))
    }

    async fn logout(&self, _session: Option<&Session>) -> AuthResult<()> {
        self.logouts.fetch_add(1, Ordering::SeqCst);
        Err(AuthError::NetworkUnavailable)
    }

    async fn validate(&self, _session: &Session) -> AuthResult<bool> {
        match *self.validate.lock() {
            Outcome::Valid => Ok(true),
            Outcome::Invalid => Ok(false),
            other => Err(outcome_error(other)),
        }
    }

    async fn refresh(&self, session: &Session) -> AuthResult<Session> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        let outcome = *self.refresh.lock();
        match outcome {
            Outcome::Valid | Outcome::Invalid => {
                let tokens = AuthTokens::expiring_in(
                    "refreshed",
                    Some("refresh".into()),
                    self.refreshed_lifetime_secs,
                    vec![],
                );
                Ok(Session::new(session.user.clone(), Some(tokens)))
            }
            other => Err(outcome_error(other)),
        }
    }

    fn supports_refresh(&self) -> bool {
        true
    }

    fn session_check_interval(&self) -> Duration {
        self.check_interval
    }
}

fn store() -> (Arc<MemoryStorage>, SessionStore) {
    let storage = Arc::new(MemoryStorage::new());
    let store = SessionStore::new(storage.clone()).unwrap();
    (storage, store)
}

async fn next_event(rx: &mut broadcast::Receiver<AuthStateChanged>) -> AuthStateChanged {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("event within timeout")
        .expect("event stream open")
}

async fn signed_in(provider: Arc<StubProvider>) -> (Arc<AuthService>, SessionStore) {
    let (_, store) = store();
    let service = AuthService::start(provider, store.clone()).await;
    service.login().await.unwrap();
    (service, store)
}

#[tokio::test]
async fn initialize_without_session_is_unauthenticated() {
    let (_, store) = store();
    let service = AuthService::new(Arc::new(MockAuth::new()), store);
    assert_eq!(service.state(), AuthState::Initial);

    let mut events = service.subscribe();
    assert_eq!(service.initialize().await.unwrap(), AuthState::Unauthenticated);
    assert_eq!(next_event(&mut events).await.state, AuthState::Loading);
    assert_eq!(next_event(&mut events).await.state, AuthState::Unauthenticated);
    assert!(service.current_user().is_none());
}

#[tokio::test]
async fn mock_session_survives_restart() {
    let (storage, store) = store();
    let first = AuthService::start(Arc::new(MockAuth::new()), store).await;
    let session = first.login().await.unwrap();
    first.dispose();

    let store = SessionStore::new(storage).unwrap();
    let second = AuthService::start(Arc::new(MockAuth::new()), store).await;
    assert_eq!(second.state(), AuthState::Authenticated);
    assert_eq!(second.current_user().unwrap().id, session.user.id);
    assert_eq!(
        second.current_tokens().unwrap().access_token,
        session.tokens.unwrap().access_token
    );
}

#[tokio::test]
async fn logout_clears_everything_even_when_revocation_fails() {
    let provider = Arc::new(StubProvider::default());
    let (_, store) = store();
    let service = AuthService::start(provider.clone(), store.clone()).await;
    let mut events = service.subscribe();

    service.login().await.unwrap();
    assert!(store.load_user().unwrap().is_some());
    service.logout().await.unwrap();

    let states: Vec<AuthState> = [
        next_event(&mut events).await,
        next_event(&mut events).await,
        next_event(&mut events).await,
        next_event(&mut events).await,
    ]
    .into_iter()
    .map(|e| e.state)
    .collect();
    assert_eq!(
        states,
        vec![
            AuthState::Loading,
            AuthState::Authenticated,
            AuthState::Loading,
            AuthState::Unauthenticated
        ]
    );

    assert_eq!(provider.logouts.load(Ordering::SeqCst), 1);
    assert!(store.load_user().unwrap().is_none());
    assert!(service.current_session().is_none());
}

#[tokio::test]
async fn failed_login_reports_error_then_clears() {
    let provider = Arc::new(StubProvider {
        login_fails: true,
        ..StubProvider::default()
    });
    let (_, store) = store();
    let service = AuthService::start(provider, store).await;
    let mut events = service.subscribe();

    let err = service.login().await.unwrap_err();
    assert!(matches!(err, AuthError::OAuth(_)));
    assert_eq!(service.state(), AuthState::Error);

    assert_eq!(next_event(&mut events).await.state, AuthState::Loading);
    let failed = next_event(&mut events).await;
    assert_eq!(failed.state, AuthState::Error);
    assert!(failed.message.unwrap().contains("access_denied"));

    service.logout().await.unwrap();
    assert_eq!(next_event(&mut events).await.state, AuthState::Unauthenticated);
}

#[tokio::test]
async fn invalid_session_expires() {
    let provider = Arc::new(StubProvider::default());
    let (service, store) = signed_in(provider.clone()).await;
    let mut events = service.subscribe();

    *provider.validate.lock() = Outcome::Invalid;
    assert!(!service.check_session().await.unwrap());

    let expired = next_event(&mut events).await;
    assert_eq!(expired.state, AuthState::SessionExpired);
    assert!(expired.message.is_some());
    assert!(service.current_user().is_none());
    assert!(store.load_user().unwrap().is_none());

    service.logout().await.unwrap();
    assert_eq!(service.state(), AuthState::Unauthenticated);
}

#[tokio::test]
async fn transient_check_failure_keeps_session() {
    let provider = Arc::new(StubProvider::default());
    let (service, _) = signed_in(provider.clone()).await;

    *provider.validate.lock() = Outcome::Transient;
    assert!(service.check_session().await.unwrap());
    assert_eq!(service.state(), AuthState::Authenticated);

    *provider.validate.lock() = Outcome::Fatal;
    assert!(!service.check_session().await.unwrap());
    assert_eq!(service.state(), AuthState::SessionExpired);
}

#[tokio::test]
async fn expired_tokens_are_refreshed_by_session_check() {
    let provider = Arc::new(StubProvider {
        initial_lifetime_secs: -60,
        ..StubProvider::default()
    });
    let (service, store) = signed_in(provider.clone()).await;

    assert!(service.check_session().await.unwrap());
    assert_eq!(service.state(), AuthState::Authenticated);
    assert_eq!(service.current_tokens().unwrap().access_token, "refreshed");
    assert_eq!(store.load_tokens().unwrap().unwrap().access_token, "refreshed");
    assert!(provider.refreshes.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn short_lived_tokens_do_not_refresh_in_a_loop() {
    let provider = Arc::new(StubProvider {
        initial_lifetime_secs: 120,
        refreshed_lifetime_secs: 120,
        ..StubProvider::default()
    });
    let (service, _store) = signed_in(provider.clone()).await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(provider.refreshes.load(Ordering::SeqCst), 0);
    assert_eq!(service.state(), AuthState::Authenticated);
    service.dispose();
}

#[tokio::test]
async fn manual_refresh_goes_through_loading() {
    let provider = Arc::new(StubProvider::default());
    let (service, _) = signed_in(provider.clone()).await;
    let mut events = service.subscribe();

    let refreshed = service.refresh().await.unwrap();
    assert_eq!(refreshed.tokens.unwrap().access_token, "refreshed");
    assert_eq!(next_event(&mut events).await.state, AuthState::Loading);
    assert_eq!(next_event(&mut events).await.state, AuthState::Authenticated);
}

#[tokio::test]
async fn failed_manual_refresh_forces_logout() {
    let provider = Arc::new(StubProvider::default());
    let (service, store) = signed_in(provider.clone()).await;
    let mut events = service.subscribe();

    *provider.refresh.lock() = Outcome::Fatal;
    assert!(service.refresh().await.is_err());

    assert_eq!(next_event(&mut events).await.state, AuthState::Loading);
    let out = next_event(&mut events).await;
    assert_eq!(out.state, AuthState::Unauthenticated);
    assert!(out.message.is_some());
    assert!(store.load_user().unwrap().is_none());

    assert!(matches!(service.refresh().await, Err(AuthError::NotLoggedIn)));
}

#[tokio::test]
async fn logout_during_login_is_an_invalid_transition() {
    let gate = Arc::new(Notify::new());
    let provider = Arc::new(StubProvider {
        login_gate: Some(gate.clone()),
        ..StubProvider::default()
    });
    let (_, store) = store();
    let service = AuthService::start(provider, store).await;

    let login = tokio::spawn({
        let service = service.clone();
        async move { service.login().await }
    });
    while service.state() != AuthState::Loading {
        tokio::task::yield_now().await;
    }

    let err = service.logout().await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidStateTransition(_)));

    gate.notify_one();
    login.await.unwrap().unwrap();
    assert_eq!(service.state(), AuthState::Authenticated);
}

#[tokio::test]
async fn session_check_timer_expires_invalid_sessions() {
    let provider = Arc::new(StubProvider {
        check_interval: Duration::from_millis(20),
        ..StubProvider::default()
    });
    *provider.validate.lock() = Outcome::Invalid;
    let (service, _) = signed_in(provider).await;
    let mut events = service.subscribe();

    let expired = next_event(&mut events).await;
    assert_eq!(expired.state, AuthState::SessionExpired);
    assert!(!service.is_authenticated());
}

#[tokio::test]
async fn dispose_closes_the_stream_and_rejects_work() {
    let (service, _) = signed_in(Arc::new(StubProvider::default())).await;
    let mut events = service.subscribe();

    service.dispose();
    assert!(matches!(
        events.recv().await,
        Err(broadcast::error::RecvError::Closed)
    ));
    assert!(matches!(
        service.subscribe().recv().await,
        Err(broadcast::error::RecvError::Closed)
    ));
    assert!(matches!(service.logout().await, Err(AuthError::Disposed)));
    assert!(matches!(service.login().await, Err(AuthError::Disposed)));
}
