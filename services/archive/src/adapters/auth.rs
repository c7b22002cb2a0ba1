//! services/archive/src/adapters/auth.rs
//!
//! Password authentication backed by the `users` and `auth_sessions` tables.
//! Implements the `AuthService` port: sign-up, sign-in, sign-out, the current
//! session, and a broadcast of every auth-state change to subscribers.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use book_archive_core::domain::{AuthSession, Role, SessionUser};
use book_archive_core::ports::{
    AuthService, AuthStateStream, KeyValueStorage, PortError, PortResult,
};
use chrono::{DateTime, Duration, Utc};
use sqlx::{FromRow, PgPool};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::adapters::db::port_error;

/// Storage key holding the id of the signed-in session.
pub const SESSION_KEY: &str = "auth-session";

/// Lifetime of a session on the backend side, independent of the soft expiry.
const SESSION_LIFETIME_DAYS: i64 = 30;

//=========================================================================================
// Records
//=========================================================================================

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
    role: String,
}

#[derive(FromRow)]
struct SessionRecord {
    id: String,
    user_id: Uuid,
    email: String,
    role: String,
    created_at: DateTime<Utc>,
}
impl SessionRecord {
    fn to_domain(self) -> AuthSession {
        AuthSession {
            id: self.id,
            user: SessionUser::new(self.user_id, self.email, Role::from_name(&self.role)),
            issued_at: self.created_at,
        }
    }
}

//=========================================================================================
// The Adapter
//=========================================================================================

pub struct PgAuthService {
    pool: PgPool,
    storage: Arc<dyn KeyValueStorage>,
    events: broadcast::Sender<Option<AuthSession>>,
}

impl PgAuthService {
    pub fn new(pool: PgPool, storage: Arc<dyn KeyValueStorage>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            pool,
            storage,
            events,
        }
    }

    fn stored_session_id(&self) -> PortResult<Option<String>> {
        self.storage
            .get(SESSION_KEY)
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }

    fn forget_session(&self) -> PortResult<()> {
        self.storage
            .remove(SESSION_KEY)
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }

    fn announce(&self, session: Option<AuthSession>) {
        // No subscribers is not an error.
        let _ = self.events.send(session);
    }

    async fn open_session(&self, user: SessionUser) -> PortResult<AuthSession> {
        let session_id = Uuid::new_v4().to_string();
        let issued_at = Utc::now();
        let expires_at = issued_at + Duration::days(SESSION_LIFETIME_DAYS);

        sqlx::query(
            "INSERT INTO auth_sessions (id, user_id, created_at, expires_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(&session_id)
        .bind(user.id)
        .bind(issued_at)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| port_error(e, || "session".to_string()))?;

        self.storage
            .set(SESSION_KEY, &session_id)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let session = AuthSession {
            id: session_id,
            user,
            issued_at,
        };
        self.announce(Some(session.clone()));
        Ok(session)
    }
}

fn invalid_credentials() -> PortError {
    PortError::Rejected {
        message: "Invalid email or password".to_string(),
        status: Some(400),
    }
}

#[async_trait]
impl AuthService for PgAuthService {
    async fn sign_up(&self, email: &str, password: &str) -> PortResult<AuthSession> {
        let email = email.trim().to_lowercase();
        if email.is_empty() || password.is_empty() {
            return Err(PortError::rejected("Email and password are required"));
        }

        // 1. Hash the password
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| {
                error!("Failed to hash password: {:?}", e);
                PortError::Unexpected("Failed to hash password".to_string())
            })?
            .to_string();

        // 2. Create the user
        let user_id = Uuid::new_v4();
        let role: String = sqlx::query_scalar(
            "INSERT INTO users (user_id, email, hashed_password) VALUES ($1, $2, $3) RETURNING role",
        )
        .bind(user_id)
        .bind(&email)
        .bind(&password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| port_error(e, || "user".to_string()))?;

        info!("Registered user {}", user_id);

        // 3. Open a session for them
        self.open_session(SessionUser::new(user_id, email, Role::from_name(&role)))
            .await
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> PortResult<AuthSession> {
        let email = email.trim().to_lowercase();
        let credentials = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, email, hashed_password, role FROM users WHERE email = $1",
        )
        .bind(&email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => invalid_credentials(),
            other => port_error(other, || "user".to_string()),
        })?;

        let parsed_hash = PasswordHash::new(&credentials.hashed_password).map_err(|e| {
            error!("Failed to parse password hash: {:?}", e);
            PortError::Unexpected("Authentication error".to_string())
        })?;

        let valid = Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok();
        if !valid {
            return Err(invalid_credentials());
        }

        info!("User {} signed in", credentials.user_id);
        let user = SessionUser::new(
            credentials.user_id,
            credentials.email,
            Role::from_name(&credentials.role),
        );
        self.open_session(user).await
    }

    async fn sign_out(&self) -> PortResult<()> {
        if let Some(session_id) = self.stored_session_id()? {
            sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
                .bind(&session_id)
                .execute(&self.pool)
                .await
                .map_err(|e| port_error(e, || "session".to_string()))?;
        }
        self.forget_session()?;
        self.announce(None);
        Ok(())
    }

    async fn current_session(&self) -> PortResult<Option<AuthSession>> {
        let Some(session_id) = self.stored_session_id()? else {
            return Ok(None);
        };

        let record = sqlx::query_as::<_, SessionRecord>(
            "SELECT s.id, s.user_id, u.email, u.role, s.created_at \
             FROM auth_sessions s JOIN users u ON u.user_id = s.user_id \
             WHERE s.id = $1 AND s.expires_at > now()",
        )
        .bind(&session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| port_error(e, || "session".to_string()))?;

        match record {
            Some(record) => Ok(Some(record.to_domain())),
            None => {
                warn!("Stored session is no longer valid; forgetting it");
                self.forget_session()?;
                Ok(None)
            }
        }
    }

    fn subscribe(&self) -> AuthStateStream {
        let receiver = self.events.subscribe();
        Box::pin(futures::stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => return Some((event, receiver)),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Auth subscriber lagged; skipped {} events", skipped);
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        }))
    }
}
