//! Access Gate
//!
//! Decides, per request, whether a caller may enter the paid area.
//! Nothing is cached: every call re-reads the session and the paid flag.

use std::sync::Arc;

use crate::account::{Account, AccountStore};
use crate::error::Result;
use crate::session::SessionResolver;

/// Where unauthenticated callers are sent
pub const LOGIN_PATH: &str = "/login";

/// Where authenticated but unpaid callers are sent
pub const CHECKOUT_PATH: &str = "/checkout";

/// Landing page of the paid area
pub const DASHBOARD_PATH: &str = "/dashboard";

/// Outcome of an authorization check
#[derive(Clone, Debug)]
pub enum Decision {
    /// Session valid and account paid
    Allow(Account),
    /// Send the caller elsewhere
    RedirectTo(&'static str),
}

impl Decision {
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow(_))
    }
}

/// Guard in front of every paid-only route
#[derive(Clone)]
pub struct AccessGate {
    sessions: Arc<dyn SessionResolver>,
    accounts: Arc<dyn AccountStore>,
}

impl AccessGate {
    pub fn new(sessions: Arc<dyn SessionResolver>, accounts: Arc<dyn AccountStore>) -> Self {
        Self { sessions, accounts }
    }

    /// Authorize a request carrying an optional session token
    pub async fn authorize(&self, token: Option<&str>) -> Result<Decision> {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return Ok(Decision::RedirectTo(LOGIN_PATH));
        };

        let Some(user_id) = self.sessions.resolve(token).await? else {
            tracing::debug!("Rejected unknown or expired session");
            return Ok(Decision::RedirectTo(LOGIN_PATH));
        };

        // The account row is created right after sign-in; a session without
        // one has not finished signing up.
        let Some(account) = self.accounts.get(&user_id).await? else {
            tracing::warn!(user_id = %user_id, "Session for account without record");
            return Ok(Decision::RedirectTo(LOGIN_PATH));
        };

        if account.paid {
            Ok(Decision::Allow(account))
        } else {
            tracing::debug!(user_id = %user_id, "Unpaid account sent to checkout");
            Ok(Decision::RedirectTo(CHECKOUT_PATH))
        }
    }
}
