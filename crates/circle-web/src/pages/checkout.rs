//! Checkout Page
//!
//! The member is taken from the signed-in session; anonymous visitors are
//! sent to sign in and paid members straight to the dashboard.

use leptos::prelude::*;
use leptos_router::hooks::use_query_map;

use circle_core::{UserId, DASHBOARD_PATH, LOGIN_PATH};

use crate::api;
use crate::components::Banner;
use crate::nav::navigate;

#[component]
pub fn CheckoutPage() -> impl IntoView {
    let query = use_query_map();
    let canceled = query.with_untracked(|q| q.get("canceled").as_deref() == Some("true"));

    let (member, set_member) = signal(None::<UserId>);
    let (loading, set_loading) = signal(false);
    let (error, set_error) = signal(None::<String>);

    leptos::task::spawn_local(async move {
        match api::current_session().await {
            Ok(Some(session)) if session.has_paid => navigate(DASHBOARD_PATH),
            Ok(Some(session)) => set_member.set(Some(session.user_id)),
            Ok(None) => navigate(LOGIN_PATH),
            Err(e) => set_error.set(Some(e.to_string())),
        }
    });

    let checkout = move |_| {
        let Some(user_id) = member.get() else {
            return;
        };
        set_loading.set(true);
        set_error.set(None);

        leptos::task::spawn_local(async move {
            match api::create_checkout(user_id.as_str()).await {
                Ok(link) => navigate(&link.url),
                Err(e) if e.code() == Some("ALREADY_PAID") => navigate(DASHBOARD_PATH),
                Err(e) => {
                    set_error.set(Some(e.to_string()));
                    set_loading.set(false);
                }
            }
        });
    };

    view! {
        <div class="checkout">
            <h1>"Unlock Visa Circle"</h1>

            <Show when=move || canceled>
                <Banner kind="info" message="Checkout was canceled. You have not been charged.".to_string() />
            </Show>
            {move || error.get().map(|message| view! { <Banner kind="error" message=message /> })}

            <div class="plan featured">
                <h2>"Lifetime access"</h2>
                <div class="price">"$1"<span>" one-time"</span></div>
                <ul>
                    <li>"Full milestone feed"</li>
                    <li>"Post and vote on updates"</li>
                </ul>
                <button
                    class="btn btn-primary"
                    disabled=move || loading.get() || member.get().is_none()
                    on:click=checkout
                >
                    {move || if loading.get() { "Redirecting…" } else { "Pay with Stripe" }}
                </button>
            </div>
        </div>
    }
}
