//! Sign-up confirmation landing page
//!
//! The provider's confirmation link ends here with the access token in the
//! URL fragment. The server turns it into a session cookie, creates the
//! account row if needed and names the next page.

use leptos::prelude::*;

use crate::api;
use crate::components::Banner;
use crate::nav::{fragment_param, navigate};

#[component]
pub fn AuthCallbackPage() -> impl IntoView {
    let (error, set_error) = signal(None::<String>);

    let fragment = web_sys::window()
        .and_then(|w| w.location().hash().ok())
        .unwrap_or_default();

    match fragment_param(&fragment, "access_token") {
        Some(token) => leptos::task::spawn_local(async move {
            match api::complete_sign_in(&token).await {
                Ok(session) => navigate(&session.next),
                Err(e) => {
                    leptos::logging::warn!("sign-in callback failed: {e}");
                    set_error.set(Some(e.to_string()));
                }
            }
        }),
        None => {
            let reason = fragment_param(&fragment, "error_description")
                .unwrap_or_else(|| "The sign-in link is missing its token.".into());
            set_error.set(Some(reason));
        }
    }

    view! {
        <div class="callback">
            {move || match error.get() {
                Some(message) => view! {
                    <Banner kind="error" message=message />
                    <a href="/login" class="btn">"Back to sign in"</a>
                }
                .into_any(),
                None => view! { <p>"Signing you in…"</p> }.into_any(),
            }}
        </div>
    }
}
