//! API Client

use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use circle_core::{
    Account, FeedEntry, PaymentStatus, Profile, ReactionCounts, ReactionKind, UserId,
};

use crate::nav::with_query;

/// Failure talking to the backend
#[derive(Clone, Debug, Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("{message}")]
    Status {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Worth retrying on the poller's schedule
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::Decode(_) => false,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Status { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

/// Result of calling a paid-only endpoint
#[derive(Clone, Debug)]
pub enum Gated<T> {
    Allowed(T),
    /// The server's access gate redirected to this path
    Redirect(String),
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutLink {
    pub url: String,
    pub session_id: String,
    pub environment: String,
}

/// The signed-in member and the page they belong on
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub user_id: UserId,
    pub email: String,
    pub has_paid: bool,
    pub next: String,
}

/// Result of a sign-up
#[derive(Clone, Debug)]
pub enum SignUpOutcome {
    SignedIn(SessionInfo),
    /// A confirmation link was mailed; the callback page finishes sign-in
    ConfirmationRequired,
}

/// Feed filters as typed in the dashboard; blank means any
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FeedFilter {
    pub corridor: String,
    pub visa_type: String,
    pub milestone: String,
}

impl FeedFilter {
    fn path(&self) -> String {
        with_query(
            "/api/updates",
            &[
                ("corridor", self.corridor.as_str()),
                ("visaType", self.visa_type.as_str()),
                ("milestone", self.milestone.as_str()),
            ],
        )
    }
}

/// Milestone post from the composer
#[derive(Clone, Debug, Default)]
pub struct Draft {
    pub corridor: String,
    pub visa_type: String,
    pub milestone: String,
    pub date_of_event: String,
    pub note: String,
}

fn api_url(path: &str) -> String {
    let origin = web_sys::window()
        .and_then(|w| w.location().origin().ok())
        .unwrap_or_else(|| "http://localhost:3000".into());
    format!("{origin}{path}")
}

fn network(e: &reqwest::Error) -> ApiError {
    ApiError::Network(e.to_string())
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    if status.is_success() {
        return response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()));
    }

    let data: serde_json::Value = response.json().await.unwrap_or_default();
    Err(ApiError::Status {
        status: status.as_u16(),
        code: data["code"].as_str().map(String::from),
        message: data["error"].as_str().unwrap_or("Request failed").to_string(),
    })
}

/// Decode a gated response; fetch follows the gate's redirect, so a final
/// URL other than the requested one means access was refused
async fn decode_gated<T: DeserializeOwned>(
    response: reqwest::Response,
    path: &str,
) -> Result<Gated<T>, ApiError> {
    let final_path = response.url().path().to_string();
    if final_path != path {
        return Ok(Gated::Redirect(final_path));
    }
    decode(response).await.map(Gated::Allowed)
}

/// Create a Stripe checkout session for a member
pub async fn create_checkout(user_id: &str) -> Result<CheckoutLink, ApiError> {
    let response = reqwest::Client::new()
        .post(api_url("/api/checkout"))
        .json(&serde_json::json!({ "userId": user_id }))
        .send()
        .await
        .map_err(|e| network(&e))?;

    decode(response).await
}

/// Status Read used by the confirmation page
pub async fn payment_status(user_id: &UserId) -> Result<PaymentStatus, ApiError> {
    let response = reqwest::Client::new()
        .post(api_url("/api/payment-status"))
        .json(&serde_json::json!({ "userId": user_id }))
        .send()
        .await
        .map_err(|e| network(&e))?;

    decode(response).await
}

pub async fn current_member() -> Result<Gated<Account>, ApiError> {
    let path = "/api/me";
    let response = reqwest::get(api_url(path)).await.map_err(|e| network(&e))?;
    decode_gated(response, path).await
}

pub async fn list_updates(filter: &FeedFilter) -> Result<Gated<Vec<FeedEntry>>, ApiError> {
    let response = reqwest::get(api_url(&filter.path()))
        .await
        .map_err(|e| network(&e))?;
    decode_gated(response, "/api/updates").await
}

pub async fn post_update(draft: &Draft) -> Result<(), ApiError> {
    let response = reqwest::Client::new()
        .post(api_url("/api/updates"))
        .json(&serde_json::json!({
            "corridor": draft.corridor,
            "visaType": draft.visa_type,
            "milestone": draft.milestone,
            "dateOfEvent": draft.date_of_event,
            "note": draft.note,
        }))
        .send()
        .await
        .map_err(|e| network(&e))?;

    decode::<serde_json::Value>(response).await.map(|_| ())
}

pub async fn react(update_id: &str, kind: ReactionKind) -> Result<ReactionCounts, ApiError> {
    let response = reqwest::Client::new()
        .post(api_url(&format!("/api/updates/{update_id}/reactions")))
        .json(&serde_json::json!({ "reaction": kind }))
        .send()
        .await
        .map_err(|e| network(&e))?;

    decode(response).await
}

async fn post_credentials(path: &str, email: &str, password: &str) -> Result<reqwest::Response, ApiError> {
    reqwest::Client::new()
        .post(api_url(path))
        .json(&serde_json::json!({ "email": email, "password": password }))
        .send()
        .await
        .map_err(|e| network(&e))
}

/// Register; the server sets the session cookie when sign-in is immediate
pub async fn sign_up(email: &str, password: &str) -> Result<SignUpOutcome, ApiError> {
    let response = post_credentials("/api/auth/signup", email, password).await?;
    if response.status() == reqwest::StatusCode::ACCEPTED {
        return Ok(SignUpOutcome::ConfirmationRequired);
    }
    decode(response).await.map(SignUpOutcome::SignedIn)
}

pub async fn sign_in(email: &str, password: &str) -> Result<SessionInfo, ApiError> {
    let response = post_credentials("/api/auth/login", email, password).await?;
    decode(response).await
}

/// Exchange the token from a confirmation link for a session cookie
pub async fn complete_sign_in(access_token: &str) -> Result<SessionInfo, ApiError> {
    let response = reqwest::Client::new()
        .post(api_url("/api/auth/callback"))
        .json(&serde_json::json!({ "accessToken": access_token }))
        .send()
        .await
        .map_err(|e| network(&e))?;

    decode(response).await
}

/// `None` when nobody is signed in
pub async fn current_session() -> Result<Option<SessionInfo>, ApiError> {
    let response = reqwest::get(api_url("/api/session"))
        .await
        .map_err(|e| network(&e))?;
    if response.status() == reqwest::StatusCode::UNAUTHORIZED {
        return Ok(None);
    }
    decode(response).await.map(Some)
}

pub async fn sign_out() -> Result<(), ApiError> {
    let response = reqwest::Client::new()
        .post(api_url("/api/auth/logout"))
        .send()
        .await
        .map_err(|e| network(&e))?;
    if response.status().is_success() {
        Ok(())
    } else {
        decode::<serde_json::Value>(response).await.map(|_| ())
    }
}

pub async fn get_profile() -> Result<Gated<Profile>, ApiError> {
    let path = "/api/profile";
    let response = reqwest::get(api_url(path)).await.map_err(|e| network(&e))?;
    decode_gated(response, path).await
}

pub async fn save_profile(profile: &Profile) -> Result<Profile, ApiError> {
    let response = reqwest::Client::new()
        .put(api_url("/api/profile"))
        .json(&serde_json::json!({
            "visaType": profile.visa_type,
            "serviceCenter": profile.service_center,
            "country": profile.country,
            "embassy": profile.embassy,
        }))
        .send()
        .await
        .map_err(|e| network(&e))?;

    decode(response).await
}
