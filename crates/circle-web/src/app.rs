//! Main App Component

use leptos::prelude::*;
use leptos_router::{components::*, path};

use crate::pages::{
    AuthCallbackPage, CheckoutPage, DashboardPage, HomePage, LoginPage, ProfilePage, SuccessPage,
};

/// Root application component
#[component]
pub fn App() -> impl IntoView {
    view! {
        <Router>
            <main class="app">
                <Routes fallback=|| view! { <p>"Page not found"</p> }>
                    <Route path=path!("/") view=HomePage />
                    <Route path=path!("/login") view=LoginPage />
                    <Route path=path!("/auth/callback") view=AuthCallbackPage />
                    <Route path=path!("/checkout") view=CheckoutPage />
                    <Route path=path!("/success") view=SuccessPage />
                    <Route path=path!("/dashboard") view=DashboardPage />
                    <Route path=path!("/profile") view=ProfilePage />
                </Routes>
            </main>
        </Router>
    }
}
