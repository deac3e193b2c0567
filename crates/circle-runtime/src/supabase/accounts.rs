use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use circle_core::{Account, AccountStore, CoreError, NewAccount, PaidUpdate, Result, UserId};

use super::{Rest, SupabaseConfig};

const USERS_TABLE: &str = "users";

/// Row shape of `public.users`
#[derive(Debug, Deserialize)]
struct UserRow {
    id: String,
    email: String,
    #[serde(default)]
    has_paid: bool,
    created_at: DateTime<Utc>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<UserRow> for Account {
    type Error = CoreError;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(Self {
            id: UserId::parse(row.id)?,
            email: row.email,
            paid: row.has_paid,
            created_at: row.created_at,
            updated_at: row.updated_at.unwrap_or(row.created_at),
        })
    }
}

fn first(rows: Vec<UserRow>) -> Result<Option<Account>> {
    rows.into_iter().next().map(Account::try_from).transpose()
}

/// Accounts in the PostgREST `users` table
pub struct PostgrestAccountStore {
    rest: Rest,
}

impl PostgrestAccountStore {
    pub fn new(config: SupabaseConfig) -> Result<Self> {
        Ok(Self {
            rest: Rest::new(config)?,
        })
    }
}

#[async_trait]
impl AccountStore for PostgrestAccountStore {
    async fn create(&self, account: NewAccount) -> Result<Account> {
        let builder = self
            .rest
            .post(USERS_TABLE)
            .query(&[("on_conflict", "id")])
            .header("Prefer", "resolution=ignore-duplicates,return=representation")
            .json(&json!({
                "id": account.id.as_str(),
                "email": account.email,
                "has_paid": false,
            }));

        // Ignored duplicates come back empty; read the existing row instead
        if let Some(created) = first(self.rest.rows(builder, "insert user").await?)? {
            tracing::info!(user_id = %created.id, "Created account row");
            return Ok(created);
        }

        self.get(&account.id)
            .await?
            .ok_or_else(|| CoreError::Storage(format!("user {} neither inserted nor found", account.id)))
    }

    async fn get(&self, id: &UserId) -> Result<Option<Account>> {
        let builder = self
            .rest
            .get(USERS_TABLE)
            .query(&[("id", format!("eq.{id}")), ("select", "*".to_string())]);

        first(self.rest.rows(builder, "select user").await?)
    }

    async fn mark_paid(&self, id: &UserId) -> Result<Option<PaidUpdate>> {
        // Filtering on has_paid=false makes the single-row update the
        // arbiter of which delivery flipped the flag
        let builder = self
            .rest
            .patch(USERS_TABLE)
            .query(&[("id", format!("eq.{id}")), ("has_paid", "is.false".to_string())])
            .header("Prefer", "return=representation")
            .json(&json!({
                "has_paid": true,
                "updated_at": Utc::now(),
            }));

        if let Some(account) = first(self.rest.rows(builder, "mark user paid").await?)? {
            return Ok(Some(PaidUpdate {
                account,
                changed: true,
            }));
        }

        Ok(self.get(id).await?.map(|account| PaidUpdate {
            account,
            changed: false,
        }))
    }
}
