//! Stripe Configuration

use serde::{Deserialize, Serialize};

use circle_core::UserId;

use crate::error::{PaymentError, Result};

/// One-time access fee in cents ($1.00)
pub const DEFAULT_AMOUNT_CENTS: i64 = 100;

/// Sandbox or production, derived from the secret key
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Test,
    Live,
}

impl Environment {
    pub fn from_secret_key(key: &str) -> Self {
        if key.starts_with("sk_test_") || key.starts_with("rk_test_") {
            Self::Test
        } else {
            Self::Live
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Test => "test",
            Self::Live => "live",
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Processor credentials and callback settings
#[derive(Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
    /// Public origin of the site, without trailing slash
    pub base_url: String,
    pub amount_cents: i64,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("environment", &self.environment())
            .field("base_url", &self.base_url)
            .field("amount_cents", &self.amount_cents)
            .finish_non_exhaustive()
    }
}

impl StripeConfig {
    pub fn new(secret_key: &str, webhook_secret: &str, base_url: &str) -> Self {
        Self {
            secret_key: secret_key.to_string(),
            webhook_secret: webhook_secret.to_string(),
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            amount_cents: DEFAULT_AMOUNT_CENTS,
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let secret_key = require_env("STRIPE_SECRET_KEY")?;
        let webhook_secret = require_env("STRIPE_WEBHOOK_SECRET")?;
        let base_url = require_env("PUBLIC_BASE_URL")
            .or_else(|_| require_env("NEXT_PUBLIC_BASE_URL"))
            .map_err(|_| PaymentError::Config("PUBLIC_BASE_URL not set".into()))?;

        let mut config = Self::new(&secret_key, &webhook_secret, &base_url);
        if let Ok(amount) = std::env::var("CHECKOUT_AMOUNT_CENTS") {
            config.amount_cents = amount
                .parse()
                .map_err(|_| PaymentError::Config(format!("invalid CHECKOUT_AMOUNT_CENTS: {amount}")))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot produce a working checkout
    pub fn validate(&self) -> Result<()> {
        if self.secret_key.trim().is_empty() {
            return Err(PaymentError::Config("STRIPE_SECRET_KEY is empty".into()));
        }
        if self.webhook_secret.trim().is_empty() {
            return Err(PaymentError::Config("STRIPE_WEBHOOK_SECRET is empty".into()));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(PaymentError::Config(format!(
                "base URL must be absolute, got {:?}",
                self.base_url
            )));
        }
        if self.amount_cents <= 0 {
            return Err(PaymentError::Config("checkout amount must be positive".into()));
        }
        Ok(())
    }

    pub fn environment(&self) -> Environment {
        Environment::from_secret_key(&self.secret_key)
    }

    /// Where the processor sends the browser after payment
    pub fn success_url(&self, user_id: &UserId) -> String {
        format!(
            "{}/success?success=true&userId={}",
            self.base_url,
            urlencoding::encode(user_id.as_str())
        )
    }

    /// Where the processor sends the browser on cancel
    pub fn cancel_url(&self) -> String {
        format!("{}/checkout?canceled=true", self.base_url)
    }

    /// Endpoint to register with the processor
    pub fn webhook_url(&self) -> String {
        format!("{}/api/stripe/webhook", self.base_url)
    }
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| PaymentError::Config(format!("{name} not set")))
}
