//! Dashboard (paid area)

use leptos::prelude::*;

use circle_core::{Account, FeedEntry, Milestone, LOGIN_PATH};

use crate::api::{self, Draft, FeedFilter, Gated};
use crate::components::{Banner, UpdateCard};
use crate::nav::navigate;

#[component]
pub fn DashboardPage() -> impl IntoView {
    let (member, set_member) = signal(None::<Account>);
    let (entries, set_entries) = signal(Vec::<FeedEntry>::new());
    let (error, set_error) = signal(None::<String>);

    let (corridor, set_corridor) = signal(String::new());
    let (visa_type, set_visa_type) = signal(String::new());
    let (milestone, set_milestone) = signal(Milestone::Applied.label().to_string());
    let (date, set_date) = signal(String::new());
    let (note, set_note) = signal(String::new());

    let filter = RwSignal::new(FeedFilter::default());

    // The server gate decides; a redirect here means no access
    leptos::task::spawn_local(async move {
        match api::current_member().await {
            Ok(Gated::Allowed(account)) => set_member.set(Some(account)),
            Ok(Gated::Redirect(path)) => navigate(&path),
            Err(e) => set_error.set(Some(e.to_string())),
        }
    });

    // Composer defaults come from the member's profile
    leptos::task::spawn_local(async move {
        match api::get_profile().await {
            Ok(Gated::Allowed(profile)) => {
                if let Some(country) = profile.country {
                    set_corridor.set(country);
                }
                if let Some(visa) = profile.visa_type {
                    set_visa_type.set(visa);
                }
            }
            Ok(Gated::Redirect(_)) => {}
            Err(e) => leptos::logging::warn!("profile unavailable: {e}"),
        }
    });

    let load = move || {
        let current = filter.get_untracked();
        leptos::task::spawn_local(async move {
            match api::list_updates(&current).await {
                Ok(Gated::Allowed(list)) => set_entries.set(list),
                Ok(Gated::Redirect(path)) => navigate(&path),
                Err(e) => set_error.set(Some(e.to_string())),
            }
        });
    };
    load();

    let submit = move |_| {
        let draft = Draft {
            corridor: corridor.get(),
            visa_type: visa_type.get(),
            milestone: milestone.get(),
            date_of_event: date.get(),
            note: note.get(),
        };
        if draft.corridor.trim().is_empty() || draft.date_of_event.is_empty() {
            set_error.set(Some("Corridor and date are required.".into()));
            return;
        }
        set_error.set(None);

        leptos::task::spawn_local(async move {
            match api::post_update(&draft).await {
                Ok(()) => {
                    set_note.set(String::new());
                    load();
                }
                Err(e) => set_error.set(Some(e.to_string())),
            }
        });
    };

    let sign_out = move |_| {
        leptos::task::spawn_local(async move {
            if let Err(e) = api::sign_out().await {
                leptos::logging::warn!("sign-out failed: {e}");
            }
            navigate(LOGIN_PATH);
        });
    };

    view! {
        <div class="dashboard">
            <header>
                <h1>"Milestone feed"</h1>
                {move || member.get().map(|m| view! { <span class="member">{m.email}</span> })}
                <a href="/profile" class="btn btn-link">"Profile"</a>
                <button class="btn btn-link" on:click=sign_out>"Sign out"</button>
            </header>

            {move || error.get().map(|message| view! { <Banner kind="error" message=message /> })}

            <section class="composer">
                <input
                    type="text"
                    placeholder="Corridor, e.g. India → Canada"
                    prop:value=move || corridor.get()
                    on:input=move |ev| set_corridor.set(event_target_value(&ev))
                />
                <input
                    type="text"
                    placeholder="Visa type, e.g. H1B"
                    prop:value=move || visa_type.get()
                    on:input=move |ev| set_visa_type.set(event_target_value(&ev))
                />
                <select on:change=move |ev| set_milestone.set(event_target_value(&ev))>
                    {Milestone::ALL
                        .iter()
                        .map(|m| view! { <option value=m.label()>{m.label()}</option> })
                        .collect_view()}
                </select>
                <input
                    type="date"
                    prop:value=move || date.get()
                    on:input=move |ev| set_date.set(event_target_value(&ev))
                />
                <textarea
                    placeholder="Anything others should know"
                    prop:value=move || note.get()
                    on:input=move |ev| set_note.set(event_target_value(&ev))
                ></textarea>
                <button class="btn btn-primary" on:click=submit>"Share"</button>
            </section>

            <section class="filters">
                <input
                    type="text"
                    placeholder="Filter by corridor"
                    prop:value=move || filter.get().corridor
                    on:change=move |ev| {
                        filter.update(|f| f.corridor = event_target_value(&ev));
                        load();
                    }
                />
                <input
                    type="text"
                    placeholder="Filter by visa type"
                    prop:value=move || filter.get().visa_type
                    on:change=move |ev| {
                        filter.update(|f| f.visa_type = event_target_value(&ev));
                        load();
                    }
                />
                <select on:change=move |ev| {
                    filter.update(|f| f.milestone = event_target_value(&ev));
                    load();
                }>
                    <option value="">"All milestones"</option>
                    {Milestone::ALL
                        .iter()
                        .map(|m| view! { <option value=m.label()>{m.label()}</option> })
                        .collect_view()}
                </select>
            </section>

            <section class="feed">
                <For
                    each=move || entries.get()
                    key=|entry| (entry.update.id, entry.reactions.likes, entry.reactions.dislikes)
                    children=move |entry| view! { <UpdateCard entry=entry /> }
                />
            </section>
        </div>
    }
}
