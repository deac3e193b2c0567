//! Payment Error Types

use circle_core::CoreError;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Missing or unusable processor configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Processor call failed
    #[error("Stripe error: {0}")]
    Upstream(String),

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    WebhookSignature(String),

    /// Webhook payload parsing failed
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    /// Completed checkout session carried no `userId` metadata
    #[error("Checkout session {session_id} has no userId metadata")]
    MissingUserId { session_id: String },

    /// Account referenced by a session or request does not exist
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Account store failure
    #[error(transparent)]
    Store(#[from] CoreError),
}

impl PaymentError {
    /// Whether the processor should redeliver (webhook answers 5xx)
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Store(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> &str {
        match self {
            Self::Upstream(_) => "Payment processing failed. Please try again.",
            Self::Config(_) => "Service configuration error.",
            Self::WebhookSignature(_) => "Invalid signature.",
            Self::WebhookParse(_) => "Malformed event payload.",
            Self::MissingUserId { .. } => "No userId found.",
            Self::AccountNotFound(_) => "User not found.",
            Self::Store(_) => "An error occurred processing your request.",
        }
    }
}
