//! Stripe Checkout Integration
//!
//! Creates a hosted Checkout Session for the one-time access fee and returns
//! the URL the browser must be sent to.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use stripe::{
    CheckoutSession as StripeCheckoutSession, CheckoutSessionMode, Client,
    CreateCheckoutSession, CreateCheckoutSessionLineItems,
    CreateCheckoutSessionLineItemsPriceData,
    CreateCheckoutSessionLineItemsPriceDataProductData,
    CreateCheckoutSessionPaymentMethodTypes, Currency,
};

use circle_core::UserId;

use crate::config::{Environment, StripeConfig};
use crate::error::{PaymentError, Result};

/// Metadata key linking a session to its account
pub const USER_ID_METADATA_KEY: &str = "userId";

/// Metadata key carrying the processor environment
pub const ENVIRONMENT_METADATA_KEY: &str = "environment";

/// Product shown on the hosted checkout page
#[derive(Clone, Debug)]
pub struct Product {
    pub name: String,
    pub description: String,
    pub amount_cents: i64,
}

impl Product {
    pub fn lifetime_access(amount_cents: i64) -> Self {
        Self {
            name: "Visa Circle Access".into(),
            description: "One-time payment for lifetime access to Visa Circle dashboard".into(),
            amount_cents,
        }
    }
}

/// Processor-agnostic session parameters
#[derive(Clone, Debug)]
pub struct SessionParams {
    pub product: Product,
    pub success_url: String,
    pub cancel_url: String,
    pub client_reference_id: String,
    pub metadata: HashMap<String, String>,
}

/// What the processor hands back
#[derive(Clone, Debug)]
pub struct CreatedSession {
    pub id: String,
    pub url: String,
}

/// Seam in front of the payment processor
#[async_trait]
pub trait CheckoutProvider: Send + Sync {
    async fn create_session(&self, params: &SessionParams) -> Result<CreatedSession>;
}

/// Stripe client wrapper
pub struct StripeProvider {
    client: Client,
}

impl StripeProvider {
    pub fn new(secret_key: &str) -> Self {
        Self {
            client: Client::new(secret_key),
        }
    }
}

#[async_trait]
impl CheckoutProvider for StripeProvider {
    async fn create_session(&self, request: &SessionParams) -> Result<CreatedSession> {
        let mut params = CreateCheckoutSession::new();
        params.success_url = Some(&request.success_url);
        params.cancel_url = Some(&request.cancel_url);
        params.client_reference_id = Some(&request.client_reference_id);
        params.mode = Some(CheckoutSessionMode::Payment);
        params.payment_method_types = Some(vec![CreateCheckoutSessionPaymentMethodTypes::Card]);
        params.metadata = Some(request.metadata.clone());

        params.line_items = Some(vec![CreateCheckoutSessionLineItems {
            quantity: Some(1),
            price_data: Some(CreateCheckoutSessionLineItemsPriceData {
                currency: Currency::USD,
                unit_amount: Some(request.product.amount_cents),
                product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                    name: request.product.name.clone(),
                    description: Some(request.product.description.clone()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }]);

        let session = StripeCheckoutSession::create(&self.client, params)
            .await
            .map_err(|e| PaymentError::Upstream(e.to_string()))?;

        let url = session
            .url
            .ok_or_else(|| PaymentError::Upstream("No checkout URL returned".into()))?;

        Ok(CreatedSession {
            id: session.id.to_string(),
            url,
        })
    }
}

/// Request to create a checkout session
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub user_id: UserId,
}

/// Result of creating a checkout session
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    pub session_id: String,
    /// Where to send the browser
    pub redirect_url: String,
    pub environment: Environment,
    pub success_url: String,
    pub cancel_url: String,
}

/// Payment Initiation
///
/// Never retries: a failed call is surfaced so the member can try again.
pub struct CheckoutService {
    provider: Arc<dyn CheckoutProvider>,
    config: StripeConfig,
}

impl CheckoutService {
    pub fn new(provider: Arc<dyn CheckoutProvider>, config: StripeConfig) -> Self {
        Self { provider, config }
    }

    /// Stripe-backed service
    pub fn stripe(config: StripeConfig) -> Self {
        let provider = Arc::new(StripeProvider::new(&config.secret_key));
        Self::new(provider, config)
    }

    pub fn environment(&self) -> Environment {
        self.config.environment()
    }

    pub const fn config(&self) -> &StripeConfig {
        &self.config
    }

    /// Create a session tagged with the member's id.
    ///
    /// The caller checks that the account exists and is unpaid.
    pub async fn create_checkout_session(&self, request: CheckoutRequest) -> Result<CheckoutSession> {
        self.config.validate()?;

        let environment = self.environment();
        let user_id = request.user_id;

        let mut metadata = HashMap::new();
        metadata.insert(USER_ID_METADATA_KEY.to_string(), user_id.to_string());
        metadata.insert(ENVIRONMENT_METADATA_KEY.to_string(), environment.to_string());

        let params = SessionParams {
            product: Product::lifetime_access(self.config.amount_cents),
            success_url: self.config.success_url(&user_id),
            cancel_url: self.config.cancel_url(),
            client_reference_id: user_id.to_string(),
            metadata,
        };

        let created = self.provider.create_session(&params).await.map_err(|e| {
            tracing::error!(user_id = %user_id, error = %e, "Checkout session creation failed");
            e
        })?;

        tracing::info!(
            user_id = %user_id,
            session_id = %created.id,
            environment = %environment,
            "Checkout session created"
        );

        Ok(CheckoutSession {
            session_id: created.id,
            redirect_url: created.url,
            environment,
            success_url: params.success_url,
            cancel_url: params.cancel_url,
        })
    }
}
