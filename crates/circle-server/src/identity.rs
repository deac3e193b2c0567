//! Sign-up, sign-in and the confirmation callback
//!
//! Every successful path ends the same way: the account row is created if
//! missing, the session cookie is set, and the response names the page the
//! member belongs on (dashboard when paid, checkout otherwise).

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};

use circle_core::{Account, Credentials, Identity, NewAccount, SignUp, UserId, CHECKOUT_PATH, DASHBOARD_PATH};

use crate::auth::{cleared_session_cookie, session_cookie, session_token, signed_in_user};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

impl CredentialsRequest {
    fn into_credentials(self) -> Result<Credentials, ApiError> {
        Ok(Credentials::new(&self.email, self.password)?)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackRequest {
    pub access_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user_id: UserId,
    pub email: String,
    pub has_paid: bool,
    /// Page the member belongs on
    pub next: &'static str,
}

impl From<Account> for SessionResponse {
    fn from(account: Account) -> Self {
        Self {
            next: if account.paid { DASHBOARD_PATH } else { CHECKOUT_PATH },
            user_id: account.id,
            email: account.email,
            has_paid: account.paid,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingConfirmation {
    pub confirmation_required: bool,
    pub email: String,
}

/// Ensure the account row exists, then set the session cookie
async fn open_session(
    state: &AppState,
    jar: CookieJar,
    identity: Identity,
) -> Result<(CookieJar, Json<SessionResponse>), ApiError> {
    let account = state
        .accounts
        .create(NewAccount::new(identity.user_id, identity.email)?)
        .await?;
    let jar = jar.add(session_cookie(&identity.access_token, state.secure_cookies));

    tracing::info!(user_id = %account.id, paid = account.paid, "Session opened");
    Ok((jar, Json(account.into())))
}

/// Register; signs in straight away unless the provider mails a confirmation link
pub async fn sign_up(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload?;
    let credentials = payload.into_credentials()?;

    match state.identity.sign_up(&credentials, &state.confirm_url).await? {
        SignUp::Session(identity) => {
            let (jar, body) = open_session(&state, jar, identity).await?;
            Ok((StatusCode::CREATED, jar, body).into_response())
        }
        SignUp::ConfirmationSent => Ok((
            StatusCode::ACCEPTED,
            Json(PendingConfirmation {
                confirmation_required: true,
                email: credentials.email,
            }),
        )
            .into_response()),
    }
}

pub async fn sign_in(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<SessionResponse>), ApiError> {
    let Json(payload) = payload?;
    let credentials = payload.into_credentials()?;

    let identity = state
        .identity
        .sign_in(&credentials)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    open_session(&state, jar, identity).await
}

/// Confirmation callback: the browser hands over the token from the link
pub async fn auth_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<CallbackRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<SessionResponse>), ApiError> {
    let Json(payload) = payload?;

    let identity = state
        .identity
        .identity(payload.access_token.trim())
        .await?
        .ok_or(ApiError::Unauthorized)?;

    open_session(&state, jar, identity).await
}

pub async fn sign_out(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<(CookieJar, StatusCode), ApiError> {
    if let Some(token) = session_token(&headers) {
        state.identity.sign_out(&token).await?;
    }
    Ok((jar.remove(cleared_session_cookie()), StatusCode::NO_CONTENT))
}

/// The signed-in member, paid or not
pub async fn current_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SessionResponse>, ApiError> {
    let user_id = signed_in_user(&state, &headers).await?;
    let account = state
        .accounts
        .get(&user_id)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    Ok(Json(account.into()))
}
