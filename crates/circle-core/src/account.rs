//! Accounts
//!
//! One record per member. The `paid` flag is the only piece of mutable state
//! shared between the webhook receiver, the status endpoint, the access gate
//! and the poller. It only ever moves from `false` to `true`: the store trait
//! has no operation that clears it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{CoreError, Result};

/// Opaque, non-empty account identifier (issued by the identity provider)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Parse an identifier, rejecting empty or whitespace-only input
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CoreError::InvalidInput("user id must not be empty".into()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A member account
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: UserId,
    pub email: String,
    pub paid: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create an unpaid account
    pub fn new(id: UserId, email: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            email: email.into(),
            paid: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the paid flag. Returns `false` when the account was already paid,
    /// in which case nothing (including `updated_at`) changes.
    pub fn mark_paid(&mut self, now: DateTime<Utc>) -> bool {
        if self.paid {
            return false;
        }
        self.paid = true;
        self.updated_at = now;
        true
    }

    pub fn payment_status(&self) -> PaymentStatus {
        PaymentStatus {
            user_id: self.id.clone(),
            paid: self.paid,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Signup payload
#[derive(Clone, Debug, Deserialize)]
pub struct NewAccount {
    pub id: UserId,
    pub email: String,
}

impl NewAccount {
    pub fn new(id: UserId, email: impl Into<String>) -> Result<Self> {
        let email = email.into().trim().to_lowercase();
        if !email.contains('@') {
            return Err(CoreError::InvalidInput(format!("invalid email: {email}")));
        }
        Ok(Self { id, email })
    }
}

/// Result of a status read
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatus {
    pub user_id: UserId,
    #[serde(rename = "hasPaid")]
    pub paid: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of marking an account paid
#[derive(Clone, Debug)]
pub struct PaidUpdate {
    pub account: Account,
    /// `false` when the account had already been paid (duplicate delivery)
    pub changed: bool,
}

/// Account storage trait
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert an account, or return the existing one if the id is taken
    async fn create(&self, account: NewAccount) -> Result<Account>;

    /// Get account by id
    async fn get(&self, id: &UserId) -> Result<Option<Account>>;

    /// Atomically set `paid = true`. `None` if the account does not exist.
    async fn mark_paid(&self, id: &UserId) -> Result<Option<PaidUpdate>>;

    /// The single status read used by the gate, the status endpoint and the poller
    async fn payment_status(&self, id: &UserId) -> Result<Option<PaymentStatus>> {
        Ok(self.get(id).await?.map(|account| account.payment_status()))
    }
}

/// In-memory account store (for development and tests)
pub struct MemoryAccountStore {
    accounts: RwLock<HashMap<UserId, Account>>,
}

impl Default for MemoryAccountStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.accounts.read().map(|a| a.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn create(&self, account: NewAccount) -> Result<Account> {
        let mut accounts = self.accounts.write()?;
        let entry = accounts
            .entry(account.id.clone())
            .or_insert_with(|| Account::new(account.id, account.email));
        Ok(entry.clone())
    }

    async fn get(&self, id: &UserId) -> Result<Option<Account>> {
        let accounts = self.accounts.read()?;
        Ok(accounts.get(id).cloned())
    }

    async fn mark_paid(&self, id: &UserId) -> Result<Option<PaidUpdate>> {
        let mut accounts = self.accounts.write()?;

        Ok(accounts.get_mut(id).map(|account| {
            let changed = account.mark_paid(Utc::now());
            PaidUpdate {
                account: account.clone(),
                changed,
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn uid(s: &str) -> UserId {
        UserId::parse(s).unwrap()
    }

    #[test]
    fn test_user_id_rejects_blank() {
        assert!(UserId::parse("").is_err());
        assert!(UserId::parse("   ").is_err());
        assert_eq!(UserId::parse(" u1 ").unwrap().as_str(), "u1");
    }

    #[test]
    fn test_new_account_normalizes_email() {
        let new = NewAccount::new(uid("u1"), " Someone@Example.COM ").unwrap();
        assert_eq!(new.email, "someone@example.com");
        assert!(NewAccount::new(uid("u1"), "not-an-email").is_err());
    }

    #[test]
    fn test_mark_paid_is_monotonic() {
        let mut account = Account::new(uid("u1"), "u1@example.com");
        let first = Utc::now();
        assert!(account.mark_paid(first));
        assert_eq!(account.updated_at, first);

        let later = first + chrono::Duration::seconds(30);
        assert!(!account.mark_paid(later));
        assert!(account.paid);
        assert_eq!(account.updated_at, first);
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let store = MemoryAccountStore::new();
        let a = store
            .create(NewAccount::new(uid("u1"), "a@example.com").unwrap())
            .await
            .unwrap();
        let b = store
            .create(NewAccount::new(uid("u1"), "other@example.com").unwrap())
            .await
            .unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(a.email, b.email);
    }

    #[tokio::test]
    async fn test_mark_paid_unknown_account() {
        let store = MemoryAccountStore::new();
        assert!(store.mark_paid(&uid("ghost")).await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_mark_paid_changes_once() {
        let store = Arc::new(MemoryAccountStore::new());
        store
            .create(NewAccount::new(uid("u1"), "u1@example.com").unwrap())
            .await
            .unwrap();

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store.mark_paid(&uid("u1")).await.unwrap().unwrap().changed
            }));
        }

        let mut changed = 0;
        for task in tasks {
            if task.await.unwrap() {
                changed += 1;
            }
        }

        assert_eq!(changed, 1);
        let status = store.payment_status(&uid("u1")).await.unwrap().unwrap();
        assert!(status.paid);
    }

    #[test]
    fn test_status_serializes_wire_names() {
        let account = Account::new(uid("u1"), "u1@example.com");
        let json = serde_json::to_value(account.payment_status()).unwrap();
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["hasPaid"], false);
        assert!(json.get("updatedAt").is_some());
    }
}
