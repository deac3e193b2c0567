//! HTTP Handlers

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use circle_core::{Account, NewAccount, PaymentStatus, UserId};
use circle_payments::{CheckoutRequest, Environment, PaymentError, SIGNATURE_HEADER};

use crate::auth::{signed_in_user, PaidMember};
use crate::error::ApiError;
use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub stripe_configured: bool,
    pub environment: Option<Environment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdRequest {
    pub user_id: UserId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub url: String,
    pub session_id: String,
    pub environment: Environment,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub email: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        stripe_configured: state.payments.is_some(),
        environment: state.payments.as_ref().map(|p| p.checkout.environment()),
    })
}

/// Create Stripe checkout session
pub async fn create_checkout(
    State(state): State<AppState>,
    payload: Result<Json<UserIdRequest>, JsonRejection>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let Json(payload) = payload?;
    let payments = state.payments()?;
    let user_id = payload.user_id;

    let account = state
        .accounts
        .get(&user_id)
        .await?
        .ok_or_else(|| PaymentError::AccountNotFound(user_id.to_string()))?;

    if account.paid {
        tracing::info!(user_id = %user_id, "Checkout requested for paid account");
        return Err(ApiError::AlreadyPaid);
    }

    let session = payments
        .checkout
        .create_checkout_session(CheckoutRequest { user_id })
        .await?;

    Ok(Json(CheckoutResponse {
        url: session.redirect_url,
        session_id: session.session_id,
        environment: session.environment,
    }))
}

/// Stripe webhook handler
///
/// Takes the body as raw bytes; the signature covers them exactly.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let payments = state.payments()?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| PaymentError::WebhookSignature("missing Stripe-Signature header".into()))?;

    payments.webhooks.handle(&body, signature).await?;

    Ok(Json(WebhookAck { received: true }))
}

/// Status Read for the confirmation page
pub async fn payment_status(
    State(state): State<AppState>,
    payload: Result<Json<UserIdRequest>, JsonRejection>,
) -> Result<Json<PaymentStatus>, ApiError> {
    let Json(payload) = payload?;

    let status = state
        .accounts
        .payment_status(&payload.user_id)
        .await?
        .ok_or_else(|| PaymentError::AccountNotFound(payload.user_id.to_string()))?;

    Ok(Json(status))
}

/// Create the account row for the signed-in identity (idempotent)
pub async fn create_account(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CreateAccountRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Account>), ApiError> {
    let Json(payload) = payload?;
    let user_id = signed_in_user(&state, &headers).await?;

    if let Some(existing) = state.accounts.get(&user_id).await? {
        return Ok((StatusCode::OK, Json(existing)));
    }

    let account = state
        .accounts
        .create(NewAccount::new(user_id, payload.email)?)
        .await?;

    tracing::info!(user_id = %account.id, "Account created");
    Ok((StatusCode::CREATED, Json(account)))
}

/// The signed-in paid member
pub async fn current_member(Extension(PaidMember(account)): Extension<PaidMember>) -> Json<Account> {
    Json(account)
}
