//! Owned authentication state: FSM, current session, timers, and the
//! state-change broadcast.

use crate::fsm::{AuthMachine, AuthMachineInput, AuthState, AuthStateChanged};
use crate::{AuthError, AuthProvider, AuthResult, Session};
use akv_config_and_utils::AuthStrategy;
use akv_storage::{AuthTokens, SessionStore, UserInfo};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 64;

/// Shortest wait before a silent refresh.
const MIN_REFRESH_DELAY: Duration = Duration::from_secs(30);

/// Time until the silent refresh. Tokens already inside the expiry lookahead
/// wait half their remaining lifetime, and never less than
/// [`MIN_REFRESH_DELAY`].
fn refresh_delay(tokens: &AuthTokens, now: DateTime<Utc>) -> Duration {
    match (tokens.refresh_due_at() - now).to_std() {
        Ok(delay) if !delay.is_zero() => delay,
        _ => {
            let remaining = (tokens.expires_at - now).to_std().unwrap_or_default();
            (remaining / 2).max(MIN_REFRESH_DELAY)
        }
    }
}

struct Inner {
    fsm: AuthMachine,
    session: Option<Session>,
    check_timer: Option<JoinHandle<()>>,
    refresh_timer: Option<JoinHandle<()>>,
    disposed: bool,
}

impl Inner {
    fn cancel_timers(&mut self) {
        for timer in [self.check_timer.take(), self.refresh_timer.take()]
            .into_iter()
            .flatten()
        {
            timer.abort();
        }
    }
}

enum SessionUpdate {
    Keep,
    Set(Session),
    Clear,
}

/// Authentication state container.
///
/// Every state change goes through the FSM; impossible transitions fail with
/// [`AuthError::InvalidStateTransition`]. Events are broadcast while the
/// state lock is held, so subscribers see them in transition order.
pub struct AuthService {
    provider: Arc<dyn AuthProvider>,
    store: SessionStore,
    inner: Mutex<Inner>,
    events: Mutex<Option<broadcast::Sender<AuthStateChanged>>>,
    weak_self: Weak<AuthService>,
}

impl AuthService {
    pub fn new(provider: Arc<dyn AuthProvider>, store: SessionStore) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new_cyclic(|weak_self| Self {
            provider,
            store,
            inner: Mutex::new(Inner {
                fsm: AuthMachine::new(),
                session: None,
                check_timer: None,
                refresh_timer: None,
                disposed: false,
            }),
            events: Mutex::new(Some(events)),
            weak_self: weak_self.clone(),
        })
    }

    /// Construct and run [`AuthService::initialize`].
    pub async fn start(provider: Arc<dyn AuthProvider>, store: SessionStore) -> Arc<Self> {
        let service = Self::new(provider, store);
        if let Err(err) = service.initialize().await {
            warn!(error = %err, "auth initialization failed");
        }
        service
    }

    pub fn strategy(&self) -> AuthStrategy {
        self.provider.strategy()
    }

    pub fn state(&self) -> AuthState {
        AuthState::from(self.inner.lock().fsm.state())
    }

    pub fn is_authenticated(&self) -> bool {
        self.state().is_authenticated()
    }

    pub fn current_session(&self) -> Option<Session> {
        self.inner.lock().session.clone()
    }

    pub fn current_user(&self) -> Option<UserInfo> {
        self.inner.lock().session.as_ref().map(|s| s.user.clone())
    }

    pub fn current_tokens(&self) -> Option<AuthTokens> {
        self.inner
            .lock()
            .session
            .as_ref()
            .and_then(|s| s.tokens.clone())
    }

    /// Receive future state changes. Closed once the service is disposed.
    pub fn subscribe(&self) -> broadcast::Receiver<AuthStateChanged> {
        match self.events.lock().as_ref() {
            Some(tx) => tx.subscribe(),
            None => broadcast::channel(1).1,
        }
    }

    /// Resolve any session left by an earlier run.
    pub async fn initialize(&self) -> AuthResult<AuthState> {
        self.transition(&AuthMachineInput::Start, SessionUpdate::Keep, None)?;

        match self.provider.probe(&self.store).await {
            Ok(Some(session)) => {
                info!(user_id = %session.user.id, strategy = %self.provider.strategy(), "session restored");
                self.persist(&session);
                let state = self.transition(
                    &AuthMachineInput::Resolved,
                    SessionUpdate::Set(session.clone()),
                    None,
                )?;
                self.start_timers(&session);
                Ok(state)
            }
            Ok(None) => {
                debug!("no existing session");
                self.transition(&AuthMachineInput::NoSession, SessionUpdate::Clear, None)
            }
            Err(err) => {
                warn!(error = %err, "session probe failed");
                self.transition(
                    &AuthMachineInput::Failed,
                    SessionUpdate::Clear,
                    Some(err.to_string()),
                )
            }
        }
    }

    /// Run the provider's interactive flow.
    pub async fn login(&self) -> AuthResult<Session> {
        self.transition(&AuthMachineInput::Start, SessionUpdate::Keep, None)?;
        self.inner.lock().cancel_timers();
        info!(strategy = %self.provider.strategy(), "login started");

        match self.provider.login().await {
            Ok(session) => {
                self.persist(&session);
                self.transition(
                    &AuthMachineInput::Resolved,
                    SessionUpdate::Set(session.clone()),
                    None,
                )?;
                self.start_timers(&session);
                info!(user_id = %session.user.id, "login completed");
                Ok(session)
            }
            Err(err) => {
                warn!(error = %err, "login failed");
                if let Err(transition_err) = self.transition(
                    &AuthMachineInput::Failed,
                    SessionUpdate::Clear,
                    Some(err.to_string()),
                ) {
                    debug!(error = %transition_err, "login failure not recorded");
                }
                Err(err)
            }
        }
    }

    /// Sign out. Revocation is best effort; local state is always cleared.
    pub async fn logout(&self) -> AuthResult<()> {
        let (state, session) = {
            let inner = self.inner.lock();
            (AuthState::from(inner.fsm.state()), inner.session.clone())
        };

        if matches!(state, AuthState::Error | AuthState::SessionExpired) {
            self.inner.lock().cancel_timers();
            self.clear_store();
            self.transition(&AuthMachineInput::Clear, SessionUpdate::Clear, None)?;
            return Ok(());
        }

        self.transition(&AuthMachineInput::Start, SessionUpdate::Keep, None)?;
        self.inner.lock().cancel_timers();

        if let Err(err) = self.provider.logout(session.as_ref()).await {
            warn!(error = %err, "provider logout failed, clearing local session anyway");
        }
        self.clear_store();
        self.transition(&AuthMachineInput::NoSession, SessionUpdate::Clear, None)?;
        info!("logged out");
        Ok(())
    }

    /// Re-validate the current session, refreshing expired tokens when the
    /// provider can. Returns whether the session is still usable; transient
    /// failures leave it in place.
    pub async fn check_session(&self) -> AuthResult<bool> {
        let Some(session) = self.authenticated_session() else {
            return Ok(false);
        };

        let can_refresh = self.provider.supports_refresh() && session.refresh_token().is_some();
        let outcome = if session.is_expired() && can_refresh {
            match self.provider.refresh(&session).await {
                Ok(refreshed) => {
                    self.replace_session(refreshed);
                    return Ok(true);
                }
                Err(err) => Err(err),
            }
        } else {
            self.provider.validate(&session).await
        };

        match outcome {
            Ok(true) => {
                debug!("session check passed");
                Ok(true)
            }
            Ok(false) => {
                self.expire("Session is no longer valid".to_string());
                Ok(false)
            }
            Err(err) if err.is_transient() => {
                warn!(error = %err, "session check skipped after transient failure");
                Ok(true)
            }
            Err(err) => {
                self.expire(err.to_string());
                Ok(false)
            }
        }
    }

    /// Replace the session through the provider. A failed refresh signs the
    /// user out.
    pub async fn refresh(&self) -> AuthResult<Session> {
        let session = self.authenticated_session().ok_or(AuthError::NotLoggedIn)?;
        self.transition(&AuthMachineInput::Start, SessionUpdate::Keep, None)?;

        match self.provider.refresh(&session).await {
            Ok(refreshed) => {
                self.persist(&refreshed);
                self.transition(
                    &AuthMachineInput::Resolved,
                    SessionUpdate::Set(refreshed.clone()),
                    None,
                )?;
                self.start_timers(&refreshed);
                Ok(refreshed)
            }
            Err(err) => {
                warn!(error = %err, "refresh failed, signing out");
                self.inner.lock().cancel_timers();
                self.clear_store();
                if let Err(transition_err) = self.transition(
                    &AuthMachineInput::NoSession,
                    SessionUpdate::Clear,
                    Some(err.to_string()),
                ) {
                    debug!(error = %transition_err, "forced logout not recorded");
                }
                Err(err)
            }
        }
    }

    /// Cancel every timer and close the event stream. Further transitions
    /// fail with [`AuthError::Disposed`].
    pub fn dispose(&self) {
        {
            let mut inner = self.inner.lock();
            inner.disposed = true;
            inner.cancel_timers();
        }
        self.events.lock().take();
        debug!("auth service disposed");
    }

    fn authenticated_session(&self) -> Option<Session> {
        let inner = self.inner.lock();
        match AuthState::from(inner.fsm.state()) {
            AuthState::Authenticated => inner.session.clone(),
            _ => None,
        }
    }

    fn transition(
        &self,
        input: &AuthMachineInput,
        update: SessionUpdate,
        message: Option<String>,
    ) -> AuthResult<AuthState> {
        let mut inner = self.inner.lock();
        if inner.disposed {
            return Err(AuthError::Disposed);
        }

        let old_state = AuthState::from(inner.fsm.state());
        inner.fsm.consume(input).map_err(|_| {
            AuthError::InvalidStateTransition(format!(
                "Cannot apply {:?} in state {:?}",
                input,
                inner.fsm.state()
            ))
        })?;

        match update {
            SessionUpdate::Keep => {}
            SessionUpdate::Set(session) => inner.session = Some(session),
            SessionUpdate::Clear => inner.session = None,
        }

        let new_state = AuthState::from(inner.fsm.state());
        debug!(
            old_state = ?old_state,
            new_state = ?new_state,
            "Auth state transition"
        );

        let event = AuthStateChanged {
            state: new_state,
            user_id: inner.session.as_ref().map(|s| s.user.id.clone()),
            email: inner.session.as_ref().map(|s| s.user.email.clone()),
            message,
        };
        if let Some(tx) = self.events.lock().as_ref() {
            // No subscribers is not an error.
            let _ = tx.send(event);
        }

        Ok(new_state)
    }

    /// Swap in refreshed credentials without a state change.
    fn replace_session(&self, session: Session) {
        {
            let mut inner = self.inner.lock();
            if AuthState::from(inner.fsm.state()) != AuthState::Authenticated {
                debug!("dropping refreshed session, no longer authenticated");
                return;
            }
            inner.session = Some(session.clone());
        }
        self.persist(&session);
        self.schedule_refresh(&session);
        debug!(user_id = %session.user.id, "session refreshed silently");
    }

    fn expire(&self, message: String) {
        warn!(reason = %message, "session expired");
        self.inner.lock().cancel_timers();
        self.clear_store();
        if let Err(err) = self.transition(
            &AuthMachineInput::Expire,
            SessionUpdate::Clear,
            Some(message),
        ) {
            debug!(error = %err, "expiry not recorded");
        }
    }

    async fn silent_refresh(&self) {
        let Some(session) = self.authenticated_session() else {
            return;
        };
        match self.provider.refresh(&session).await {
            Ok(refreshed) => self.replace_session(refreshed),
            Err(err) if err.is_transient() => {
                warn!(error = %err, "silent refresh failed, will retry at next session check");
            }
            Err(err) => self.expire(err.to_string()),
        }
    }

    fn persist(&self, session: &Session) {
        if let Err(err) = self.store.save_session(&session.user, session.tokens.as_ref()) {
            warn!(error = %err, "failed to persist session");
        }
    }

    fn clear_store(&self) {
        if let Err(err) = self.store.clear() {
            warn!(error = %err, "failed to clear stored session");
        }
    }

    fn start_timers(&self, session: &Session) {
        let interval = self
            .provider
            .session_check_interval()
            .max(Duration::from_millis(10));
        let weak = self.weak_self.clone();
        let check = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(service) = weak.upgrade() else {
                    break;
                };
                if let Err(err) = service.check_session().await {
                    warn!(error = %err, "session check failed");
                }
                if !service.is_authenticated() {
                    break;
                }
            }
        });

        {
            let mut inner = self.inner.lock();
            if inner.disposed {
                check.abort();
                return;
            }
            if let Some(previous) = inner.check_timer.replace(check) {
                previous.abort();
            }
        }
        self.schedule_refresh(session);
    }

    fn schedule_refresh(&self, session: &Session) {
        let delay = match &session.tokens {
            Some(tokens) if self.provider.supports_refresh() && tokens.refresh_token.is_some() => {
                refresh_delay(tokens, Utc::now())
            }
            _ => return,
        };
        debug!(delay_secs = delay.as_secs(), "silent refresh scheduled");

        let weak = self.weak_self.clone();
        let refresh = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(service) = weak.upgrade() {
                service.silent_refresh().await;
            }
        });

        let mut inner = self.inner.lock();
        if inner.disposed {
            refresh.abort();
            return;
        }
        if let Some(previous) = inner.refresh_timer.replace(refresh) {
            previous.abort();
        }
    }
}

impl Drop for AuthService {
    fn drop(&mut self) {
        self.inner.get_mut().cancel_timers();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn tokens_expiring_at(expires_at: DateTime<Utc>) -> AuthTokens {
        AuthTokens {
            access_token: "at".into(),
            refresh_token: Some("rt".into()),
            expires_at,
            token_type: "Bearer".into(),
            scopes: vec![],
        }
    }

    #[test]
    fn refresh_waits_until_lookahead_window() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let tokens = tokens_expiring_at(now + chrono::Duration::hours(1));
        assert_eq!(refresh_delay(&tokens, now), Duration::from_secs(55 * 60));
    }

    #[test]
    fn short_lived_tokens_wait_half_their_lifetime() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let tokens = tokens_expiring_at(now + chrono::Duration::seconds(200));
        assert_eq!(refresh_delay(&tokens, now), Duration::from_secs(100));
    }

    #[test]
    fn nearly_expired_tokens_never_refresh_immediately() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let soon = tokens_expiring_at(now + chrono::Duration::seconds(10));
        assert_eq!(refresh_delay(&soon, now), MIN_REFRESH_DELAY);

        let expired = tokens_expiring_at(now - chrono::Duration::seconds(60));
        assert_eq!(refresh_delay(&expired, now), MIN_REFRESH_DELAY);
    }
}
