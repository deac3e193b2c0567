//! Router

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::auth::require_paid;
use crate::feed::{create_update, list_updates, react};
use crate::handlers::{
    create_account, create_checkout, current_member, health_check, payment_status, stripe_webhook,
};
use crate::identity::{auth_callback, current_session, sign_in, sign_out, sign_up};
use crate::profile::{get_profile, save_profile};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    // Paid area: the gate runs before every handler in here
    let paid = Router::new()
        .route("/api/me", get(current_member))
        .route("/api/updates", get(list_updates).post(create_update))
        .route("/api/updates/{id}/reactions", post(react))
        .route("/api/profile", get(get_profile).put(save_profile))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_paid));

    let app = Router::new()
        // Health & info
        .route("/health", get(health_check))
        // Sign-in
        .route("/api/auth/signup", post(sign_up))
        .route("/api/auth/login", post(sign_in))
        .route("/api/auth/logout", post(sign_out))
        .route("/api/auth/callback", post(auth_callback))
        .route("/api/session", get(current_session))
        // Accounts
        .route("/api/accounts", post(create_account))
        .route("/api/payment-status", post(payment_status))
        // Payments
        .route("/api/checkout", post(create_checkout))
        .route("/api/stripe/webhook", post(stripe_webhook))
        .merge(paid);

    #[cfg(feature = "dev-tools")]
    let app = app.merge(crate::dev::routes());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    app.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors),
    )
    .with_state(state)
}
