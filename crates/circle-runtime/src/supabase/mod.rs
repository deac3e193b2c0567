//! Supabase Backend
//!
//! Stores over the PostgREST tables (`users`, `visa_updates`,
//! `update_reactions`, `user_profiles`) and the auth service for sessions
//! and sign-in. Everything talks plain HTTP with the service-role key.

mod accounts;
mod auth;
mod feed;
mod profiles;

#[cfg(test)]
mod mock;

pub use accounts::PostgrestAccountStore;
pub use auth::SupabaseAuth;
pub use feed::PostgrestFeedStore;
pub use profiles::PostgrestProfileStore;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

use circle_core::{CoreError, Result};

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Supabase project configuration
#[derive(Clone)]
pub struct SupabaseConfig {
    /// Project URL, without trailing slash
    pub url: String,
    pub service_role_key: String,
}

impl std::fmt::Debug for SupabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl SupabaseConfig {
    pub fn new(url: impl Into<String>, service_role_key: impl Into<String>) -> Self {
        Self {
            url: url.into().trim().trim_end_matches('/').to_string(),
            service_role_key: service_role_key.into(),
        }
    }

    /// `None` unless both `SUPABASE_URL` and `SUPABASE_SERVICE_ROLE_KEY` are set
    pub fn from_env() -> Option<Self> {
        let url = std::env::var("SUPABASE_URL").ok().filter(|v| !v.trim().is_empty())?;
        let key = std::env::var("SUPABASE_SERVICE_ROLE_KEY")
            .ok()
            .filter(|v| !v.trim().is_empty())?;
        Some(Self::new(url, key))
    }

    pub fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.url)
    }

    pub fn auth_url(&self, endpoint: &str) -> String {
        format!("{}/auth/v1/{endpoint}", self.url)
    }

    fn client(&self) -> Result<Client> {
        Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| CoreError::Config(format!("failed to build HTTP client: {e}")))
    }
}

/// Map a non-success status to a store error
fn status_error(status: StatusCode, context: &str) -> CoreError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            CoreError::Config(format!("{context}: service role key rejected ({status})"))
        }
        StatusCode::TOO_MANY_REQUESTS => CoreError::Unavailable(format!("{context}: {status}")),
        s if s.is_server_error() => CoreError::Unavailable(format!("{context}: {status}")),
        _ => CoreError::Storage(format!("{context}: unexpected status {status}")),
    }
}

fn transport_error(err: &reqwest::Error, context: &str) -> CoreError {
    CoreError::Storage(format!("{context}: {err}"))
}

/// PostgREST client shared by the table stores
#[derive(Clone)]
struct Rest {
    client: Client,
    config: SupabaseConfig,
}

impl Rest {
    fn new(config: SupabaseConfig) -> Result<Self> {
        Ok(Self {
            client: config.client()?,
            config,
        })
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.config.service_role_key)
            .bearer_auth(&self.config.service_role_key)
    }

    fn get(&self, table: &str) -> RequestBuilder {
        self.authed(self.client.get(self.config.rest_url(table)))
    }

    fn post(&self, table: &str) -> RequestBuilder {
        self.authed(self.client.post(self.config.rest_url(table)))
    }

    fn patch(&self, table: &str) -> RequestBuilder {
        self.authed(self.client.patch(self.config.rest_url(table)))
    }

    fn delete(&self, table: &str) -> RequestBuilder {
        self.authed(self.client.delete(self.config.rest_url(table)))
    }

    /// Send and decode the returned rows
    async fn rows<T: DeserializeOwned>(&self, builder: RequestBuilder, context: &str) -> Result<Vec<T>> {
        let response = builder
            .send()
            .await
            .map_err(|e| transport_error(&e, context))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, context));
        }

        response
            .json::<Vec<T>>()
            .await
            .map_err(|e| CoreError::Storage(format!("{context}: invalid response body: {e}")))
    }

    /// Send and discard the body
    async fn execute(&self, builder: RequestBuilder, context: &str) -> Result<()> {
        let response = builder
            .send()
            .await
            .map_err(|e| transport_error(&e, context))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(status_error(status, context))
        }
    }
}
