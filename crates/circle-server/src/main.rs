//! visa-circle HTTP Server
//!
//! Axum-based server for sign-in, checkout initiation, the Stripe webhook,
//! the payment-status read and the paid-only feed and profile.

mod auth;
mod config;
#[cfg(feature = "dev-tools")]
mod dev;
mod error;
mod feed;
mod handlers;
mod identity;
mod profile;
mod routes;
mod state;

use tower_http::services::{ServeDir, ServeFile};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ServerConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment before reading RUST_LOG
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();
    let state = AppState::from_config(&config)?;

    #[cfg(feature = "dev-tools")]
    tracing::warn!("⚠ dev-tools enabled - never deploy this build");

    // Static files (WASM frontend); unknown paths get the SPA shell
    let index = format!("{}/index.html", config.static_dir);
    let app = routes::router(state)
        .fallback_service(ServeDir::new(&config.static_dir).fallback(ServeFile::new(index)));

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("visa-circle server running on http://{}", config.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health              - Health check");
    tracing::info!("  POST /api/auth/signup     - Register (email/password)");
    tracing::info!("  POST /api/auth/login      - Sign in");
    tracing::info!("  POST /api/auth/callback   - Confirm sign-up link");
    tracing::info!("  GET  /api/session         - Signed-in member");
    tracing::info!("  POST /api/checkout        - Create Stripe checkout");
    tracing::info!("  POST /api/stripe/webhook  - Stripe webhook");
    tracing::info!("  POST /api/payment-status  - Read paid flag");
    tracing::info!("  POST /api/accounts        - Create account row");
    tracing::info!("  GET  /api/updates         - Milestone feed (paid)");
    tracing::info!("  GET  /api/profile         - Member profile (paid)");

    axum::serve(listener, app).await?;

    Ok(())
}
