//! Application State

use std::sync::Arc;

use circle_core::{
    AccessGate, AccountStore, FeedStore, IdentityProvider, MemoryAccountStore, MemoryFeedStore,
    MemoryIdentityProvider, MemoryProfileStore, MemorySessionStore, ProfileStore, SessionResolver,
};
use circle_payments::{CheckoutService, WebhookReceiver};
use circle_runtime::{PostgrestAccountStore, PostgrestFeedStore, PostgrestProfileStore, SupabaseAuth};

use crate::config::{ServerConfig, DEFAULT_PUBLIC_BASE_URL};
use crate::error::ApiError;

/// Path of the page the sign-up confirmation link opens
pub const AUTH_CALLBACK_PATH: &str = "/auth/callback";

/// Checkout initiation and webhook receiver, present only when Stripe is configured
pub struct Payments {
    pub checkout: CheckoutService,
    pub webhooks: WebhookReceiver,
}

impl Payments {
    pub fn new(accounts: Arc<dyn AccountStore>, checkout: CheckoutService) -> Self {
        let webhooks = WebhookReceiver::new(accounts, checkout.config().webhook_secret.clone());
        Self { checkout, webhooks }
    }
}

/// Storage and identity services behind the handlers
pub struct Backend {
    pub accounts: Arc<dyn AccountStore>,
    pub sessions: Arc<dyn SessionResolver>,
    pub identity: Arc<dyn IdentityProvider>,
    pub feed: Arc<dyn FeedStore>,
    pub profiles: Arc<dyn ProfileStore>,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Account records and the paid flag
    pub accounts: Arc<dyn AccountStore>,

    /// Bearer token → account id
    pub sessions: Arc<dyn SessionResolver>,

    /// Email/password sign-up and sign-in
    pub identity: Arc<dyn IdentityProvider>,

    /// Guard for paid-only routes
    pub gate: AccessGate,

    /// Milestone feed
    pub feed: Arc<dyn FeedStore>,

    /// Member profiles
    pub profiles: Arc<dyn ProfileStore>,

    /// Stripe (optional - None if not configured)
    pub payments: Option<Arc<Payments>>,

    /// Absolute URL of the confirmation callback page
    pub confirm_url: String,

    /// Mark the session cookie `Secure` (https deployments)
    pub secure_cookies: bool,

    /// Locally issued sessions; only set when running on in-memory stores
    #[cfg(test)]
    pub local_sessions: Option<Arc<MemorySessionStore>>,
}

impl AppState {
    pub fn new(backend: Backend, checkout: Option<CheckoutService>, public_base_url: &str) -> Self {
        let Backend {
            accounts,
            sessions,
            identity,
            feed,
            profiles,
        } = backend;

        let gate = AccessGate::new(sessions.clone(), accounts.clone());
        let payments = checkout.map(|checkout| Arc::new(Payments::new(accounts.clone(), checkout)));
        let base = public_base_url.trim().trim_end_matches('/');

        Self {
            accounts,
            sessions,
            identity,
            gate,
            feed,
            profiles,
            payments,
            confirm_url: format!("{base}{AUTH_CALLBACK_PATH}"),
            secure_cookies: base.starts_with("https://"),
            #[cfg(test)]
            local_sessions: None,
        }
    }

    /// Everything in process memory
    pub fn in_memory(checkout: Option<CheckoutService>) -> Self {
        Self::in_memory_at(checkout, DEFAULT_PUBLIC_BASE_URL)
    }

    fn in_memory_at(checkout: Option<CheckoutService>, public_base_url: &str) -> Self {
        let sessions = Arc::new(MemorySessionStore::new());

        let backend = Backend {
            accounts: Arc::new(MemoryAccountStore::new()),
            sessions: sessions.clone(),
            identity: Arc::new(MemoryIdentityProvider::new(sessions.clone())),
            feed: Arc::new(MemoryFeedStore::new()),
            profiles: Arc::new(MemoryProfileStore::new()),
        };

        #[cfg_attr(not(test), allow(unused_mut))]
        let mut state = Self::new(backend, checkout, public_base_url);

        #[cfg(test)]
        {
            state.local_sessions = Some(sessions);
        }

        state
    }

    pub fn from_config(config: &ServerConfig) -> anyhow::Result<Self> {
        let checkout = config.stripe.clone().map(CheckoutService::stripe);

        let Some(supabase) = config.supabase.clone() else {
            return Ok(Self::in_memory_at(checkout, &config.public_base_url));
        };

        let auth = Arc::new(SupabaseAuth::new(supabase.clone())?);
        let backend = Backend {
            accounts: Arc::new(PostgrestAccountStore::new(supabase.clone())?),
            sessions: auth.clone(),
            identity: auth,
            feed: Arc::new(PostgrestFeedStore::new(supabase.clone())?),
            profiles: Arc::new(PostgrestProfileStore::new(supabase)?),
        };

        Ok(Self::new(backend, checkout, &config.public_base_url))
    }

    pub fn payments(&self) -> Result<&Payments, ApiError> {
        self.payments.as_deref().ok_or(ApiError::PaymentsDisabled)
    }
}
