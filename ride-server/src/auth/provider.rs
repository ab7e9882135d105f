//! Process-wide session store.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use moka::future::Cache as MokaCache;

use crate::backend::{Backend, BackendError, SignUp};

use super::session::{Session, UserRole};

/// Configuration for the session store.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Idle sessions are forgotten after this long.
    pub idle_ttl: Duration,

    /// Maximum number of live sessions.
    pub max_sessions: u64,
}

impl SessionConfig {
    pub fn with_idle_ttl(mut self, ttl: Duration) -> Self {
        self.idle_ttl = ttl;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_ttl: Duration::from_secs(12 * 60 * 60),
            max_sessions: 10_000,
        }
    }
}

/// Outcome of [`SessionProvider::sign_up`].
#[derive(Debug, Clone)]
pub enum Registration {
    SignedIn { token: String, session: Arc<Session> },
    ConfirmationRequired { email: String },
}

/// Owns every signed-in session, keyed by an opaque token handed to the
/// browser. Handlers look sessions up here and pass them explicitly to
/// backend writes.
pub struct SessionProvider<B> {
    backend: Arc<B>,
    sessions: MokaCache<String, Arc<Session>>,
}

impl<B: Backend> SessionProvider<B> {
    pub fn new(backend: Arc<B>, config: &SessionConfig) -> Self {
        let sessions = MokaCache::builder()
            .time_to_idle(config.idle_ttl)
            .max_capacity(config.max_sessions)
            .build();
        Self { backend, sessions }
    }

    async fn store(&self, session: Session) -> (String, Arc<Session>) {
        let token = uuid::Uuid::new_v4().simple().to_string();
        let session = Arc::new(session);
        self.sessions.insert(token.clone(), Arc::clone(&session)).await;
        (token, session)
    }

    /// Authenticate and start a session. Returns the session token.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(String, Arc<Session>), BackendError> {
        let session = self.backend.sign_in(email.trim(), password).await?;
        Ok(self.store(session).await)
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        role: UserRole,
    ) -> Result<Registration, BackendError> {
        match self.backend.sign_up(email.trim(), password, role).await? {
            SignUp::SignedIn(session) => {
                let (token, session) = self.store(session).await;
                Ok(Registration::SignedIn { token, session })
            }
            SignUp::ConfirmationRequired { email } => Ok(Registration::ConfirmationRequired { email }),
        }
    }

    /// Look up a live session. Expired sessions are dropped.
    pub async fn get(&self, token: &str) -> Option<Arc<Session>> {
        let session = self.sessions.get(token).await?;
        if session.is_expired(Utc::now()) {
            tracing::debug!(user = %session.user_id, "session expired");
            self.sessions.invalidate(token).await;
            return None;
        }
        Some(session)
    }

    /// Like [`get`](Self::get), but a missing session is
    /// [`BackendError::AuthRequired`].
    pub async fn require(&self, token: Option<&str>) -> Result<Arc<Session>, BackendError> {
        match token {
            Some(token) => self.get(token).await.ok_or(BackendError::AuthRequired),
            None => Err(BackendError::AuthRequired),
        }
    }

    /// End a session. The local session is cleared even if the backend
    /// call fails.
    pub async fn sign_out(&self, token: &str) -> Result<(), BackendError> {
        let Some(session) = self.sessions.remove(token).await else {
            return Ok(());
        };
        if let Err(e) = self.backend.sign_out(&session).await {
            tracing::warn!(error = %e, user = %session.user_id, "backend sign-out failed");
            return Err(e);
        }
        tracing::info!(user = %session.user_id, "signed out");
        Ok(())
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }
}
