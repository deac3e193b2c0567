//! Home Page

use leptos::prelude::*;

#[component]
pub fn HomePage() -> impl IntoView {
    view! {
        <div class="home">
            <header class="hero">
                <h1>"Visa Circle"</h1>
                <p class="tagline">"Real visa timelines, shared by people going through them"</p>
                <div class="cta">
                    <a href="/dashboard" class="btn btn-primary">"Open Dashboard"</a>
                    <a href="/login" class="btn">"Sign In"</a>
                </div>
            </header>

            <section class="features">
                <div class="feature">
                    <h3>"📅 Milestones"</h3>
                    <p>"Biometrics, interviews, approvals. See how long each step takes on your corridor."</p>
                </div>
                <div class="feature">
                    <h3>"👍 Signal"</h3>
                    <p>"Members vote on updates so the most useful ones rise to the top."</p>
                </div>
                <div class="feature">
                    <h3>"💳 One payment"</h3>
                    <p>"A single one-time fee for lifetime access."</p>
                </div>
            </section>
        </div>
    }
}
