//! Sign-in Page
//!
//! Email and password, checked by the identity provider behind the server.
//! The server sets the `session` cookie; this page only follows the `next`
//! path it answers with.

use leptos::prelude::*;

use circle_core::identity::MIN_PASSWORD_LEN;

use crate::api::{self, SignUpOutcome};
use crate::components::Banner;
use crate::nav::navigate;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    SignIn,
    SignUp,
}

#[component]
pub fn LoginPage() -> impl IntoView {
    let (mode, set_mode) = signal(Mode::SignIn);
    let (email, set_email) = signal(String::new());
    let (password, set_password) = signal(String::new());
    let (busy, set_busy) = signal(false);
    let (error, set_error) = signal(None::<String>);
    let (notice, set_notice) = signal(None::<String>);

    // Already signed in: go where the server says
    leptos::task::spawn_local(async move {
        if let Ok(Some(session)) = api::current_session().await {
            navigate(&session.next);
        }
    });

    let submit = move |_| {
        let (email, password, mode) = (email.get(), password.get(), mode.get());
        if email.trim().is_empty() || password.is_empty() {
            set_error.set(Some("Email and password are required.".into()));
            return;
        }
        if mode == Mode::SignUp && password.chars().count() < MIN_PASSWORD_LEN {
            set_error.set(Some(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters long."
            )));
            return;
        }
        set_error.set(None);
        set_notice.set(None);
        set_busy.set(true);

        leptos::task::spawn_local(async move {
            let outcome = match mode {
                Mode::SignIn => api::sign_in(&email, &password)
                    .await
                    .map(SignUpOutcome::SignedIn),
                Mode::SignUp => api::sign_up(&email, &password).await,
            };

            match outcome {
                Ok(SignUpOutcome::SignedIn(session)) => navigate(&session.next),
                Ok(SignUpOutcome::ConfirmationRequired) => {
                    set_notice.set(Some(format!(
                        "Check {email} for a confirmation link to finish signing up."
                    )));
                    set_busy.set(false);
                }
                Err(e) => {
                    let message = if e.code() == Some("INVALID_CREDENTIALS") {
                        "Incorrect email or password.".to_string()
                    } else {
                        e.to_string()
                    };
                    set_error.set(Some(message));
                    set_busy.set(false);
                }
            }
        });
    };

    let toggle = move |_| {
        set_error.set(None);
        set_notice.set(None);
        set_mode.update(|m| {
            *m = match m {
                Mode::SignIn => Mode::SignUp,
                Mode::SignUp => Mode::SignIn,
            }
        });
    };

    view! {
        <div class="login">
            <h1>{move || match mode.get() {
                Mode::SignIn => "Sign in",
                Mode::SignUp => "Create an account",
            }}</h1>
            {move || error.get().map(|message| view! { <Banner kind="error" message=message /> })}
            {move || notice.get().map(|message| view! { <Banner kind="info" message=message /> })}
            <div class="field">
                <label>"Email"</label>
                <input
                    type="email"
                    placeholder="you@example.com"
                    prop:value=move || email.get()
                    on:input=move |ev| set_email.set(event_target_value(&ev))
                />
            </div>
            <div class="field">
                <label>"Password"</label>
                <input
                    type="password"
                    prop:value=move || password.get()
                    on:input=move |ev| set_password.set(event_target_value(&ev))
                />
            </div>
            <button class="btn btn-primary" disabled=move || busy.get() on:click=submit>
                {move || match (mode.get(), busy.get()) {
                    (_, true) => "Please wait…",
                    (Mode::SignIn, false) => "Sign in",
                    (Mode::SignUp, false) => "Sign up",
                }}
            </button>
            <button class="btn btn-link" on:click=toggle>
                {move || match mode.get() {
                    Mode::SignIn => "New here? Create an account",
                    Mode::SignUp => "Already registered? Sign in",
                }}
            </button>
        </div>
    }
}
