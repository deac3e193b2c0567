//! Identity Provider
//!
//! Email/password sign-up and sign-in. The hosted provider owns credentials
//! and issues the access token that later travels as the session; the
//! in-memory provider below stands in for it during development and tests.

use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::account::UserId;
use crate::error::{CoreError, Result};
use crate::session::{MemorySessionStore, SessionResolver, SessionToken};

/// Shortest password accepted at sign-up
pub const MIN_PASSWORD_LEN: usize = 6;

/// Email and password as typed by the member
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl Credentials {
    pub fn new(email: &str, password: impl Into<String>) -> Result<Self> {
        let email = email.trim().to_lowercase();
        if !email.contains('@') {
            return Err(CoreError::InvalidInput(format!("invalid email: {email}")));
        }
        let password = password.into();
        if password.is_empty() {
            return Err(CoreError::InvalidInput("password is required".into()));
        }
        Ok(Self { email, password })
    }

    /// Extra rules for new accounts
    pub fn validate_new(&self) -> Result<()> {
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(CoreError::InvalidInput(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters long"
            )));
        }
        Ok(())
    }
}

/// A signed-in identity and the token that proves it
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: UserId,
    pub email: String,
    #[serde(skip)]
    pub access_token: SessionToken,
}

/// Outcome of a sign-up
#[derive(Clone, Debug)]
pub enum SignUp {
    /// Signed in straight away
    Session(Identity),
    /// The provider mailed a confirmation link pointing at the callback page
    ConfirmationSent,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Register new credentials; `confirm_redirect` is where the confirmation
    /// link lands
    async fn sign_up(&self, credentials: &Credentials, confirm_redirect: &str) -> Result<SignUp>;

    /// `None` for unknown email or wrong password
    async fn sign_in(&self, credentials: &Credentials) -> Result<Option<Identity>>;

    /// Identity behind an access token handed back by the provider's redirect
    async fn identity(&self, access_token: &str) -> Result<Option<Identity>>;

    /// End a session; hosted tokens simply expire
    async fn sign_out(&self, _access_token: &str) -> Result<()> {
        Ok(())
    }
}

struct LocalUser {
    id: UserId,
    salt: String,
    digest: String,
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Credentials in process memory, sessions in a [`MemorySessionStore`]
pub struct MemoryIdentityProvider {
    users: RwLock<HashMap<String, LocalUser>>,
    sessions: Arc<MemorySessionStore>,
}

impl MemoryIdentityProvider {
    pub fn new(sessions: Arc<MemorySessionStore>) -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            sessions,
        }
    }

    fn issue(&self, id: UserId, email: String) -> Result<Identity> {
        let session = self.sessions.issue(id.clone())?;
        Ok(Identity {
            user_id: id,
            email,
            access_token: session.token,
        })
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn sign_up(&self, credentials: &Credentials, _confirm_redirect: &str) -> Result<SignUp> {
        credentials.validate_new()?;

        let id = {
            let mut users = self.users.write()?;
            if users.contains_key(&credentials.email) {
                return Err(CoreError::InvalidInput("user already registered".into()));
            }
            let id = UserId::parse(Uuid::new_v4().to_string())?;
            let salt = Uuid::new_v4().simple().to_string();
            users.insert(
                credentials.email.clone(),
                LocalUser {
                    id: id.clone(),
                    digest: digest(&salt, &credentials.password),
                    salt,
                },
            );
            id
        };

        tracing::info!(user_id = %id, "Registered local identity");
        Ok(SignUp::Session(self.issue(id, credentials.email.clone())?))
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<Option<Identity>> {
        let id = {
            let users = self.users.read()?;
            users
                .get(&credentials.email)
                .filter(|u| u.digest == digest(&u.salt, &credentials.password))
                .map(|u| u.id.clone())
        };

        id.map(|id| self.issue(id, credentials.email.clone()))
            .transpose()
    }

    async fn identity(&self, access_token: &str) -> Result<Option<Identity>> {
        let Some(user_id) = self.sessions.resolve(access_token).await? else {
            return Ok(None);
        };

        let users = self.users.read()?;
        Ok(users
            .iter()
            .find(|(_, u)| u.id == user_id)
            .map(|(email, _)| Identity {
                user_id: user_id.clone(),
                email: email.clone(),
                access_token: SessionToken::from_string(access_token),
            }))
    }

    async fn sign_out(&self, access_token: &str) -> Result<()> {
        self.sessions.revoke(&SessionToken::from_string(access_token))
    }
}
