//! # Session Management
//!
//! Sessions for the relational mirror. A login with the configured
//! credentials creates a session that is valid for one day; every data
//! operation checks the session first.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::common::{GatewayError, GatewayResult};

use super::errors::{SessionError, SessionResult};

/// Session model
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    /// Session identifier handed to the caller
    pub id: Uuid,

    /// User the session was created for
    pub username: String,

    pub created_at: DateTime<Utc>,

    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    pub fn remaining_minutes(&self) -> f64 {
        (self.expires_at - Utc::now()).num_seconds() as f64 / 60.0
    }
}

/// Session manager configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub session_ttl: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_ttl: Duration::days(1),
        }
    }
}

/// Session repository trait
pub trait SessionRepository: Send + Sync {
    fn create(&self, session: &Session) -> SessionResult<()>;

    fn find_by_id(&self, id: Uuid) -> SessionResult<Option<Session>>;

    /// Move a session's expiry time
    fn extend(&self, id: Uuid, expires_at: DateTime<Utc>) -> SessionResult<()>;

    fn delete(&self, id: Uuid) -> SessionResult<()>;

    /// Delete expired sessions (cleanup)
    fn delete_expired(&self) -> SessionResult<usize>;
}

/// In-memory session repository
#[derive(Debug, Default)]
pub struct InMemorySessionRepository {
    sessions: std::sync::RwLock<Vec<Session>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> SessionError {
    SessionError::StorageError("Lock poisoned".to_string())
}

impl SessionRepository for InMemorySessionRepository {
    fn create(&self, session: &Session) -> SessionResult<()> {
        self.sessions.write().map_err(poisoned)?.push(session.clone());
        Ok(())
    }

    fn find_by_id(&self, id: Uuid) -> SessionResult<Option<Session>> {
        let sessions = self.sessions.read().map_err(poisoned)?;
        Ok(sessions.iter().find(|s| s.id == id).cloned())
    }

    fn extend(&self, id: Uuid, expires_at: DateTime<Utc>) -> SessionResult<()> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        match sessions.iter_mut().find(|s| s.id == id) {
            Some(session) => {
                session.expires_at = expires_at;
                Ok(())
            }
            None => Err(SessionError::SessionInvalid),
        }
    }

    fn delete(&self, id: Uuid) -> SessionResult<()> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        let len_before = sessions.len();
        sessions.retain(|s| s.id != id);
        if sessions.len() == len_before {
            return Err(SessionError::SessionInvalid);
        }
        Ok(())
    }

    fn delete_expired(&self) -> SessionResult<usize> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        let now = Utc::now();
        let len_before = sessions.len();
        sessions.retain(|s| s.expires_at > now);
        Ok(len_before - sessions.len())
    }
}

/// Session manager handles login, validation and logout
pub struct SessionManager<R: SessionRepository> {
    config: SessionConfig,
    repository: R,
    username: String,
    password: String,
}

impl<R: SessionRepository> SessionManager<R> {
    pub fn new(config: SessionConfig, repository: R, username: &str, password: &str) -> Self {
        Self {
            config,
            repository,
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    /// Check credentials and start a session
    pub fn login(&self, username: &str, password: &str) -> SessionResult<Session> {
        if username != self.username || password != self.password {
            return Err(SessionError::InvalidCredentials);
        }

        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4(),
            username: username.to_string(),
            created_at: now,
            expires_at: now + self.config.session_ttl,
        };
        self.repository.create(&session)?;
        Ok(session)
    }

    /// Look up a session that has not expired
    pub fn validate(&self, session_id: &str) -> SessionResult<Session> {
        let id = Uuid::parse_str(session_id).map_err(|_| SessionError::SessionInvalid)?;
        let session = self
            .repository
            .find_by_id(id)?
            .ok_or(SessionError::SessionInvalid)?;
        if session.is_expired() {
            return Err(SessionError::SessionExpired);
        }
        Ok(session)
    }

    /// Push the session's expiry a full lifetime from now
    pub fn refresh(&self, session_id: &str) -> SessionResult<Session> {
        let mut session = self.validate(session_id)?;
        session.expires_at = Utc::now() + self.config.session_ttl;
        self.repository.extend(session.id, session.expires_at)?;
        Ok(session)
    }

    pub fn logout(&self, session_id: &str) -> SessionResult<()> {
        let session = self.validate(session_id)?;
        self.repository.delete(session.id)?;
        self.repository.delete_expired()?;
        Ok(())
    }
}

/// Run `op` with the session named by `session_id`, if it is live
pub fn requires_valid_session<R, T, F>(
    sessions: &SessionManager<R>,
    session_id: &str,
    op: F,
) -> GatewayResult<T>
where
    R: SessionRepository,
    F: FnOnce(&Session) -> GatewayResult<T>,
{
    let session = sessions.validate(session_id).map_err(GatewayError::from)?;
    op(&session)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_manager() -> SessionManager<InMemorySessionRepository> {
        SessionManager::new(
            SessionConfig::default(),
            InMemorySessionRepository::new(),
            "user",
            "password",
        )
    }

    #[test]
    fn test_login_creates_day_long_session() {
        let manager = create_manager();
        let session = manager.login("user", "password").unwrap();
        let lifetime = session.expires_at - session.created_at;
        assert_eq!(lifetime, Duration::days(1));
        assert!(manager.validate(&session.id.to_string()).is_ok());
    }

    #[test]
    fn test_bad_credentials_rejected() {
        let manager = create_manager();
        assert!(matches!(
            manager.login("user", "guess"),
            Err(SessionError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_logout_invalidates_immediately() {
        let manager = create_manager();
        let session = manager.login("user", "password").unwrap();
        let id = session.id.to_string();

        manager.logout(&id).unwrap();
        assert!(matches!(manager.validate(&id), Err(SessionError::SessionInvalid)));
        assert!(matches!(
            manager.validate("not-a-uuid"),
            Err(SessionError::SessionInvalid)
        ));
    }

    #[test]
    fn test_expired_session_rejected() {
        let manager = SessionManager::new(
            SessionConfig {
                session_ttl: Duration::minutes(-1),
            },
            InMemorySessionRepository::new(),
            "user",
            "password",
        );
        let session = manager.login("user", "password").unwrap();
        let result = requires_valid_session(&manager, &session.id.to_string(), |_| Ok(()));
        assert_eq!(result, Err(GatewayError::forbidden()));
    }
}
