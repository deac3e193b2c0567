//! Member profile (paid area)

use leptos::prelude::*;

use circle_core::Profile;

use crate::api::{self, Gated};
use crate::components::Banner;
use crate::nav::navigate;

fn blank_to_none(value: String) -> Option<String> {
    Some(value.trim().to_string()).filter(|v| !v.is_empty())
}

#[component]
pub fn ProfilePage() -> impl IntoView {
    let profile = RwSignal::new(None::<Profile>);
    let (error, set_error) = signal(None::<String>);
    let (saved, set_saved) = signal(false);

    leptos::task::spawn_local(async move {
        match api::get_profile().await {
            Ok(Gated::Allowed(loaded)) => profile.set(Some(loaded)),
            Ok(Gated::Redirect(path)) => navigate(&path),
            Err(e) => set_error.set(Some(e.to_string())),
        }
    });

    let field = move |read: fn(&Profile) -> Option<String>| {
        move || profile.get().as_ref().and_then(read).unwrap_or_default()
    };
    let edit = move |write: fn(&mut Profile, Option<String>), ev: leptos::ev::Event| {
        let value = blank_to_none(event_target_value(&ev));
        profile.update(|p| {
            if let Some(p) = p {
                write(p, value);
            }
        });
        set_saved.set(false);
    };

    let save = move |_| {
        let Some(current) = profile.get_untracked() else {
            return;
        };
        set_error.set(None);
        leptos::task::spawn_local(async move {
            match api::save_profile(&current).await {
                Ok(stored) => {
                    profile.set(Some(stored));
                    set_saved.set(true);
                }
                Err(e) => set_error.set(Some(e.to_string())),
            }
        });
    };

    view! {
        <div class="profile">
            <h1>"Your case"</h1>
            {move || error.get().map(|message| view! { <Banner kind="error" message=message /> })}
            <Show when=move || saved.get()>
                <Banner kind="info" message="Profile saved.".to_string() />
            </Show>

            <div class="field">
                <label>"Visa type"</label>
                <input
                    type="text"
                    prop:value=field(|p| p.visa_type.clone())
                    on:change=move |ev| edit(|p, v| p.visa_type = v, ev)
                />
            </div>
            <div class="field">
                <label>"Service center"</label>
                <input
                    type="text"
                    prop:value=field(|p| p.service_center.clone())
                    on:change=move |ev| edit(|p, v| p.service_center = v, ev)
                />
            </div>
            <div class="field">
                <label>"Country"</label>
                <input
                    type="text"
                    prop:value=field(|p| p.country.clone())
                    on:change=move |ev| edit(|p, v| p.country = v, ev)
                />
            </div>
            <div class="field">
                <label>"Embassy"</label>
                <input
                    type="text"
                    prop:value=field(|p| p.embassy.clone())
                    on:change=move |ev| edit(|p, v| p.embassy = v, ev)
                />
            </div>

            <button class="btn btn-primary" disabled=move || profile.get().is_none() on:click=save>
                "Save"
            </button>
            <a href="/dashboard" class="btn btn-link">"Back to the feed"</a>
        </div>
    }
}
