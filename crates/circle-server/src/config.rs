//! Server Configuration

use circle_payments::StripeConfig;
use circle_runtime::SupabaseConfig;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_STATIC_DIR: &str = "static";
pub const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:3000";

/// Settings read once at startup
#[derive(Debug)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Built WASM frontend
    pub static_dir: String,
    /// Origin the browser sees; sign-up confirmation links land under it
    pub public_base_url: String,
    /// `None` disables checkout and the webhook
    pub stripe: Option<StripeConfig>,
    /// `None` falls back to in-memory stores
    pub supabase: Option<SupabaseConfig>,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.into());
        let static_dir = std::env::var("STATIC_DIR").unwrap_or_else(|_| DEFAULT_STATIC_DIR.into());
        let public_base_url = std::env::var("PUBLIC_BASE_URL")
            .or_else(|_| std::env::var("NEXT_PUBLIC_BASE_URL"))
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .unwrap_or_else(|_| DEFAULT_PUBLIC_BASE_URL.into());

        let stripe = match StripeConfig::from_env() {
            Ok(config) => {
                tracing::info!(environment = %config.environment(), "✓ Stripe configured");
                Some(config)
            }
            Err(e) => {
                tracing::warn!(error = %e, "⚠ Stripe not configured - payments disabled");
                tracing::warn!("  Set STRIPE_SECRET_KEY, STRIPE_WEBHOOK_SECRET and PUBLIC_BASE_URL in .env");
                None
            }
        };

        let supabase = SupabaseConfig::from_env();
        if supabase.is_none() {
            tracing::warn!("⚠ Supabase not configured - using in-memory stores and local sign-in");
        }

        Self {
            bind_addr,
            static_dir,
            public_base_url,
            stripe,
            supabase,
        }
    }
}
