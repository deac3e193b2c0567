//! Development-only routes
//!
//! Compiled only with the `dev-tools` feature. Synthetic webhook deliveries
//! are signed with the configured endpoint secret and go through the normal
//! receiver.

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use circle_core::UserId;
use circle_payments::testing::SyntheticDelivery;
use circle_payments::WebhookOutcome;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestWebhookRequest {
    pub user_id: UserId,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestWebhookResponse {
    pub user_id: UserId,
    pub session_id: String,
    pub changed: bool,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/dev/test-webhook", post(test_webhook))
}

/// Deliver a signed `checkout.session.completed` for a member
pub async fn test_webhook(
    State(state): State<AppState>,
    payload: Result<Json<TestWebhookRequest>, JsonRejection>,
) -> Result<Json<TestWebhookResponse>, ApiError> {
    let Json(payload) = payload?;
    let payments = state.payments()?;

    let delivery = SyntheticDelivery::completed(
        payload.user_id.as_str(),
        payload.session_id.as_deref(),
        &payments.checkout.config().webhook_secret,
    )?;

    tracing::warn!(user_id = %payload.user_id, "Delivering synthetic webhook");

    match payments.webhooks.handle(&delivery.body, &delivery.signature).await? {
        WebhookOutcome::Applied {
            user_id,
            session_id,
            changed,
        } => Ok(Json(TestWebhookResponse {
            user_id,
            session_id,
            changed,
        })),
        WebhookOutcome::Ignored { event_type } => Err(ApiError::BadRequest(format!(
            "synthetic event was ignored: {event_type}"
        ))),
    }
}
