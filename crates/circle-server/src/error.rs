//! API Errors

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use circle_core::CoreError;
use circle_payments::PaymentError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Everything a handler can fail with
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Payments not configured")]
    PaymentsDisabled,

    #[error("Account has already paid")]
    AlreadyPaid,

    #[error("Not signed in")]
    Unauthorized,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::PaymentsDisabled => StatusCode::SERVICE_UNAVAILABLE,
            Self::AlreadyPaid => StatusCode::CONFLICT,
            Self::Unauthorized | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Payment(e) => match e {
                PaymentError::WebhookSignature(_)
                | PaymentError::WebhookParse(_)
                | PaymentError::MissingUserId { .. } => StatusCode::BAD_REQUEST,
                PaymentError::AccountNotFound(_) => StatusCode::NOT_FOUND,
                PaymentError::Config(_) | PaymentError::Upstream(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                PaymentError::Store(core) => core_status(core),
            },
            Self::Core(e) => core_status(e),
        }
    }

    pub const fn code(&self) -> &'static str {
        match self {
            Self::PaymentsDisabled => "PAYMENTS_DISABLED",
            Self::AlreadyPaid => "ALREADY_PAID",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Payment(e) => match e {
                PaymentError::Config(_) => "CONFIG_ERROR",
                PaymentError::Upstream(_) => "CHECKOUT_ERROR",
                PaymentError::WebhookSignature(_) => "INVALID_SIGNATURE",
                PaymentError::WebhookParse(_) => "INVALID_PAYLOAD",
                PaymentError::MissingUserId { .. } => "MISSING_USER_ID",
                PaymentError::AccountNotFound(_) => "USER_NOT_FOUND",
                PaymentError::Store(core) => core_code(core),
            },
            Self::Core(e) => core_code(e),
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Payment(e) => e.user_message().to_string(),
            Self::Core(e) => e.user_message(),
            Self::BadRequest(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

const fn core_status(error: &CoreError) -> StatusCode {
    match error {
        CoreError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        CoreError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

const fn core_code(error: &CoreError) -> &'static str {
    match error {
        CoreError::InvalidInput(_) => "INVALID_INPUT",
        CoreError::NotFound(_) => "NOT_FOUND",
        CoreError::Storage(_) | CoreError::Unavailable(_) => "STORAGE_ERROR",
        CoreError::Config(_) => "CONFIG_ERROR",
        _ => "INTERNAL_ERROR",
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.code(), "Request failed");
        } else {
            tracing::debug!(error = %self, code = self.code(), "Request rejected");
        }

        (
            status,
            Json(ErrorResponse {
                error: self.message(),
                code: self.code().into(),
            }),
        )
            .into_response()
    }
}
