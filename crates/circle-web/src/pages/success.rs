//! Payment confirmation page
//!
//! Reached from Stripe with `?success=true&userId=...`. The user id comes
//! from the URL only.

use leptos::prelude::*;
use leptos_router::hooks::use_query_map;

use circle_core::PollPhase;

use crate::confirm::ConfirmationDriver;

#[component]
pub fn SuccessPage() -> impl IntoView {
    let query = use_query_map();
    let user_id = query.with_untracked(|q| q.get("userId"));

    let driver = ConfirmationDriver::start(user_id.as_deref());
    let view_state = driver.view();

    view! {
        <div class="confirm">
            <h1>{move || view_state.get().headline()}</h1>
            <p class="detail">{move || view_state.get().detail()}</p>

            <Show when=move || !view_state.get().phase.is_terminal()>
                <div class="spinner"></div>
            </Show>

            <Show when=move || view_state.get().phase == PollPhase::Confirmed>
                <button class="btn btn-primary" on:click=move |_| driver.go_now()>
                    "Go to dashboard now"
                </button>
            </Show>

            <Show when=move || view_state.get().phase == PollPhase::Failed>
                <button class="btn btn-primary" on:click=move |_| driver.recheck()>
                    "Check again"
                </button>
            </Show>

            <Show when=move || view_state.get().phase == PollPhase::Error>
                <a href="/checkout" class="btn">"Back to checkout"</a>
            </Show>
        </div>
    }
}
