//! Session Management
//!
//! Authentication itself belongs to the hosted identity provider; this module
//! only answers "which account does this bearer token belong to".

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use crate::account::UserId;
use crate::error::Result;

/// Default lifetime of locally issued sessions
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24;

/// Opaque session token
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn generate() -> Self {
        Self(format!(
            "{}{}",
            Uuid::new_v4().simple(),
            Uuid::new_v4().simple()
        ))
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A signed-in session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub token: SessionToken,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: UserId, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            token: SessionToken::generate(),
            user_id,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Resolves a bearer token to the account it authenticates
#[async_trait]
pub trait SessionResolver: Send + Sync {
    /// `None` for unknown, expired or revoked tokens
    async fn resolve(&self, token: &str) -> Result<Option<UserId>>;
}

/// In-memory session store (for development/testing)
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionToken, Session>>,
    ttl: Duration,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::with_ttl(Duration::hours(DEFAULT_SESSION_TTL_HOURS))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Issue a new session for an account
    pub fn issue(&self, user_id: UserId) -> Result<Session> {
        let session = Session::new(user_id, self.ttl);
        let mut sessions = self.sessions.write()?;
        sessions.insert(session.token.clone(), session.clone());
        Ok(session)
    }

    /// Revoke a session (sign out)
    pub fn revoke(&self, token: &SessionToken) -> Result<()> {
        let mut sessions = self.sessions.write()?;
        sessions.remove(token);
        Ok(())
    }
}

#[async_trait]
impl SessionResolver for MemorySessionStore {
    async fn resolve(&self, token: &str) -> Result<Option<UserId>> {
        let sessions = self.sessions.read()?;
        Ok(sessions
            .get(&SessionToken::from_string(token))
            .filter(|s| s.is_valid_at(Utc::now()))
            .map(|s| s.user_id.clone()))
    }
}
