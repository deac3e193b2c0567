//! UI Components

use leptos::prelude::*;

use circle_core::{FeedEntry, ReactionKind};

use crate::api;

/// Inline notice
#[component]
pub fn Banner(kind: &'static str, message: String) -> impl IntoView {
    let class = format!("banner banner-{kind}");

    view! {
        <div class=class role="status">{message}</div>
    }
}

/// One milestone update with its reaction buttons
#[component]
pub fn UpdateCard(entry: FeedEntry) -> impl IntoView {
    let update = entry.update;
    let id = update.id.to_string();
    let counts = RwSignal::new(entry.reactions);

    let react = move |kind: ReactionKind| {
        let id = id.clone();
        leptos::task::spawn_local(async move {
            match api::react(&id, kind).await {
                Ok(next) => counts.set(next),
                Err(e) => leptos::logging::warn!("reaction failed: {e}"),
            }
        });
    };
    let like = react.clone();
    let dislike = react;

    let chosen = move |kind: ReactionKind| counts.get().user_reaction == Some(kind);

    view! {
        <article class="update">
            <header>
                <span class="milestone">{update.milestone.label()}</span>
                <span class="corridor">{update.corridor}</span>
                {update.visa_type.map(|v| view! { <span class="visa-type">{v}</span> })}
                <time>{update.date_of_event.to_string()}</time>
            </header>
            {update.note.map(|n| view! { <p class="note">{n}</p> })}
            <footer>
                <button
                    class="reaction"
                    class:active=move || chosen(ReactionKind::Like)
                    on:click=move |_| like(ReactionKind::Like)
                >
                    "👍 " {move || counts.get().likes}
                </button>
                <button
                    class="reaction"
                    class:active=move || chosen(ReactionKind::Dislike)
                    on:click=move |_| dislike(ReactionKind::Dislike)
                >
                    "👎 " {move || counts.get().dislikes}
                </button>
            </footer>
        </article>
    }
}
