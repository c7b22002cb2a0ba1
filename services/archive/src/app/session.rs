//! services/archive/src/app/session.rs
//!
//! Owns the signed-in user. The manager subscribes to auth-state changes for
//! as long as it is started, and enforces the soft session expiry: an explicit
//! check before every privileged action, plus one scheduled sign-out at the
//! deadline. The deadline is always derived from the start timestamp kept in
//! storage, so a process that was dormant recomputes it on `refresh`.

use book_archive_core::domain::{AuthSession, SessionUser};
use book_archive_core::ports::{AuthService, KeyValueStorage};
use chrono::{DateTime, Duration, Utc};
use futures::StreamExt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};

/// Storage key holding the RFC 3339 time the current session started.
pub const SESSION_STARTED_KEY: &str = "session-started-at";

//=========================================================================================
// Shared State
//=========================================================================================

struct SessionInner {
    auth: Option<Arc<dyn AuthService>>,
    storage: Arc<dyn KeyValueStorage>,
    ttl: Option<Duration>,
    user: watch::Sender<Option<SessionUser>>,
}

impl SessionInner {
    fn auth(&self) -> AppResult<&Arc<dyn AuthService>> {
        self.auth.as_ref().ok_or(AppError::Unconfigured)
    }

    fn started_at(&self) -> Option<DateTime<Utc>> {
        let raw = match self.storage.get(SESSION_STARTED_KEY) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!("Could not read session start: {}", e);
                return None;
            }
        };
        match DateTime::parse_from_rfc3339(&raw) {
            Ok(started) => Some(started.with_timezone(&Utc)),
            Err(e) => {
                warn!("Ignoring malformed session start '{}': {}", raw, e);
                None
            }
        }
    }

    fn record_start(&self, at: DateTime<Utc>) -> AppResult<()> {
        self.storage.set(SESSION_STARTED_KEY, &at.to_rfc3339())?;
        Ok(())
    }

    fn deadline(&self) -> Option<DateTime<Utc>> {
        Some(self.started_at()? + self.ttl?)
    }

    fn apply(&self, session: Option<AuthSession>) {
        self.user.send_replace(session.map(|session| session.user));
    }

    async fn sign_out(&self) -> AppResult<()> {
        if let Some(auth) = &self.auth {
            auth.sign_out().await?;
        }
        self.storage.remove(SESSION_STARTED_KEY)?;
        self.user.send_replace(None);
        Ok(())
    }
}

//=========================================================================================
// SessionManager
//=========================================================================================

pub struct SessionManager {
    inner: Arc<SessionInner>,
    listener: Mutex<Option<CancellationToken>>,
    expiry_timer: Mutex<Option<JoinHandle<()>>>,
}

impl SessionManager {
    /// `auth` is `None` when the archive is unconfigured; every sign-in then
    /// fails with `AppError::Unconfigured`. `ttl` of `None` disables soft expiry.
    pub fn new(
        auth: Option<Arc<dyn AuthService>>,
        storage: Arc<dyn KeyValueStorage>,
        ttl: Option<Duration>,
    ) -> Self {
        let (user, _) = watch::channel(None);
        Self {
            inner: Arc::new(SessionInner {
                auth,
                storage,
                ttl,
                user,
            }),
            listener: Mutex::new(None),
            expiry_timer: Mutex::new(None),
        }
    }

    /// Subscribes to auth-state changes and loads the current session.
    pub async fn start(&self) -> AppResult<()> {
        let Some(auth) = self.inner.auth.clone() else {
            debug!("No auth service configured; session manager stays signed out");
            return Ok(());
        };

        let token = CancellationToken::new();
        if let Some(previous) = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(token.clone())
        {
            previous.cancel();
        }

        let mut events = auth.subscribe();
        let inner = self.inner.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    event = events.next() => match event {
                        Some(session) => {
                            debug!("Auth state changed (signed in: {})", session.is_some());
                            inner.apply(session);
                        }
                        None => break,
                    },
                }
            }
            debug!("Auth listener stopped");
        });

        self.refresh().await.map(|_| ())
    }

    /// Unsubscribes and cancels the expiry timer.
    pub fn stop(&self) {
        if let Some(token) = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            token.cancel();
        }
        self.cancel_timer();
    }

    pub fn current_user(&self) -> Option<SessionUser> {
        self.inner.user.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Option<SessionUser>> {
        self.inner.user.subscribe()
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> AppResult<SessionUser> {
        let session = self.inner.auth()?.sign_up(email, password).await?;
        self.begin(session)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> AppResult<SessionUser> {
        let session = self
            .inner
            .auth()?
            .sign_in_with_password(email, password)
            .await?;
        self.begin(session)
    }

    pub async fn sign_out(&self) -> AppResult<()> {
        self.cancel_timer();
        self.inner.sign_out().await?;
        info!("Signed out");
        Ok(())
    }

    /// Re-reads the session from the auth service and re-evaluates expiry from
    /// the stored start time. Call on startup and whenever the app regains focus.
    pub async fn refresh(&self) -> AppResult<Option<SessionUser>> {
        let auth = self.inner.auth()?;
        let session = auth.current_session().await?;
        let signed_in = session.is_some();
        self.inner.apply(session);

        if !signed_in {
            self.cancel_timer();
            return Ok(None);
        }
        if self.inner.started_at().is_none() {
            self.inner.record_start(Utc::now())?;
        }

        let user = self.ensure_active().await?;
        if user.is_some() {
            self.schedule_expiry(Utc::now());
        }
        Ok(user)
    }

    pub async fn ensure_active(&self) -> AppResult<Option<SessionUser>> {
        self.ensure_active_at(Utc::now()).await
    }

    /// Signs out if the soft expiry has passed at `now`; returns the user
    /// that is still signed in.
    pub async fn ensure_active_at(&self, now: DateTime<Utc>) -> AppResult<Option<SessionUser>> {
        let Some(user) = self.current_user() else {
            return Ok(None);
        };
        match self.inner.deadline() {
            Some(deadline) if now >= deadline => {
                info!("Session for {} expired at {}", user.display_name, deadline);
                self.sign_out().await?;
                Ok(None)
            }
            _ => Ok(Some(user)),
        }
    }

    fn begin(&self, session: AuthSession) -> AppResult<SessionUser> {
        let user = session.user.clone();
        let now = Utc::now();
        self.inner.record_start(now)?;
        self.inner.apply(Some(session));
        self.schedule_expiry(now);
        info!("Signed in as {} ({})", user.display_name, user.role);
        Ok(user)
    }

    fn schedule_expiry(&self, now: DateTime<Utc>) {
        self.cancel_timer();
        let Some(deadline) = self.inner.deadline() else {
            return;
        };
        let remaining = (deadline - now).to_std().unwrap_or_default();

        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(remaining).await;
            info!("Soft session expiry reached; signing out");
            if let Err(e) = inner.sign_out().await {
                warn!("Sign-out at session expiry failed: {}", e);
            }
        });
        *self
            .expiry_timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    fn cancel_timer(&self) {
        if let Some(handle) = self
            .expiry_timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::MemoryStorage;
    use crate::testing::MemoryAuthService;
    use book_archive_core::domain::Role;

    fn manager(
        auth: Arc<MemoryAuthService>,
        ttl: Option<Duration>,
    ) -> (SessionManager, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let manager = SessionManager::new(Some(auth), storage.clone(), ttl);
        (manager, storage)
    }

    #[tokio::test]
    async fn sign_in_records_the_start_and_the_user() {
        let auth = Arc::new(MemoryAuthService::new());
        auth.add_user("ada@example.com", "pw", Role::Author);
        let (manager, storage) = manager(auth, Some(Duration::minutes(60)));

        let user = manager.sign_in("ada@example.com", "pw").await.unwrap();

        assert_eq!(user.display_name, "ada");
        assert_eq!(manager.current_user(), Some(user));
        assert!(storage.get(SESSION_STARTED_KEY).unwrap().is_some());
    }

    #[tokio::test]
    async fn wrong_password_is_a_port_error() {
        let auth = Arc::new(MemoryAuthService::new());
        auth.add_user("ada@example.com", "pw", Role::Author);
        let (manager, _) = manager(auth, None);

        let err = manager.sign_in("ada@example.com", "nope").await.unwrap_err();
        assert!(matches!(err, AppError::Port(_)));
        assert_eq!(manager.current_user(), None);
    }

    #[tokio::test]
    async fn expiry_check_signs_out_after_the_ttl() {
        let auth = Arc::new(MemoryAuthService::new());
        auth.add_user("ada@example.com", "pw", Role::Member);
        let (manager, storage) = manager(auth.clone(), Some(Duration::minutes(30)));
        manager.sign_in("ada@example.com", "pw").await.unwrap();

        let soon = Utc::now() + Duration::minutes(29);
        assert!(manager.ensure_active_at(soon).await.unwrap().is_some());

        let later = Utc::now() + Duration::minutes(31);
        assert!(manager.ensure_active_at(later).await.unwrap().is_none());
        assert_eq!(manager.current_user(), None);
        assert_eq!(storage.get(SESSION_STARTED_KEY).unwrap(), None);
        assert!(auth.current().is_none());
    }

    #[tokio::test]
    async fn refresh_after_dormancy_uses_the_stored_start() {
        let auth = Arc::new(MemoryAuthService::new());
        auth.add_user("ada@example.com", "pw", Role::Member);
        let (manager, storage) = manager(auth.clone(), Some(Duration::minutes(30)));
        manager.sign_in("ada@example.com", "pw").await.unwrap();

        // Pretend the session began long ago while the process slept.
        let long_ago = Utc::now() - Duration::hours(2);
        storage
            .set(SESSION_STARTED_KEY, &long_ago.to_rfc3339())
            .unwrap();

        assert_eq!(manager.refresh().await.unwrap(), None);
        assert!(auth.current().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn scheduled_timer_signs_out_at_the_deadline() {
        let auth = Arc::new(MemoryAuthService::new());
        auth.add_user("ada@example.com", "pw", Role::Member);
        let (manager, _) = manager(auth, Some(Duration::seconds(5)));
        manager.sign_in("ada@example.com", "pw").await.unwrap();

        tokio::time::sleep(std::time::Duration::from_secs(3)).await;
        assert!(manager.current_user().is_some());

        tokio::time::sleep(std::time::Duration::from_secs(3)).await;
        assert_eq!(manager.current_user(), None);
    }

    #[tokio::test]
    async fn listener_follows_auth_events_until_stopped() {
        let auth = Arc::new(MemoryAuthService::new());
        auth.add_user("ada@example.com", "pw", Role::Member);
        let (manager, _) = manager(auth.clone(), None);
        manager.start().await.unwrap();
        let mut changes = manager.watch();

        // Another tab signs in through the same auth service.
        auth.sign_in_with_password("ada@example.com", "pw").await.unwrap();
        changes.changed().await.unwrap();
        assert!(manager.current_user().is_some());

        manager.stop();
        tokio::task::yield_now().await;
        auth.sign_out().await.unwrap();
        tokio::task::yield_now().await;
        assert!(manager.current_user().is_some());
    }

    #[tokio::test]
    async fn unconfigured_manager_refuses_sign_in() {
        let manager = SessionManager::new(None, Arc::new(MemoryStorage::new()), None);
        manager.start().await.unwrap();
        assert!(matches!(
            manager.sign_in("a@b.c", "pw").await,
            Err(AppError::Unconfigured)
        ));
        assert_eq!(manager.ensure_active().await.unwrap(), None);
    }
}
