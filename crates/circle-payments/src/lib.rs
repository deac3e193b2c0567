//! # circle-payments
//!
//! Payment initiation and confirmation for visa-circle.
//!
//! ## Flow
//!
//! ```text
//! ┌─────────────┐  create   ┌─────────────────┐  redirect  ┌──────────────┐
//! │  /checkout  │──────────▶│  Stripe Hosted  │───────────▶│   /success   │
//! │   (member)  │           │  Checkout Page  │            │   (poller)   │
//! └─────────────┘           └────────┬────────┘            └──────┬───────┘
//!                                    │ checkout.session.completed │ status reads
//!                                    ▼                            ▼
//!                           ┌─────────────────┐  mark_paid  ┌──────────────┐
//!                           │ WebhookReceiver │────────────▶│ AccountStore │
//!                           └─────────────────┘             └──────────────┘
//! ```
//!
//! The checkout session carries the member's id in `metadata.userId`; the
//! webhook reads it back to know which account to mark paid. The browser
//! returns to `/success?success=true&userId=...` and polls the same flag.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use circle_payments::{CheckoutRequest, CheckoutService, StripeConfig, WebhookReceiver};
//!
//! let config = StripeConfig::from_env()?;
//! let checkout = CheckoutService::stripe(config.clone());
//! let session = checkout.create_checkout_session(CheckoutRequest { user_id }).await?;
//! // Redirect the browser to session.redirect_url
//!
//! let receiver = WebhookReceiver::new(accounts, config.webhook_secret);
//! receiver.handle(&raw_body, &signature_header).await?;
//! ```

mod checkout;
mod config;
mod error;
pub mod signature;
mod webhook;

#[cfg(any(test, feature = "dev-tools"))]
pub mod testing;

pub use checkout::{
    CheckoutProvider, CheckoutRequest, CheckoutService, CheckoutSession, CreatedSession, Product,
    SessionParams, StripeProvider, ENVIRONMENT_METADATA_KEY, USER_ID_METADATA_KEY,
};
pub use config::{Environment, StripeConfig, DEFAULT_AMOUNT_CENTS};
pub use error::{PaymentError, Result};
pub use signature::SIGNATURE_HEADER;
pub use webhook::{
    CompletedSession, EventData, WebhookEvent, WebhookOutcome, WebhookReceiver, CHECKOUT_COMPLETED,
};
