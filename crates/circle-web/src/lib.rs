//! visa-circle Web Frontend
//!
//! Leptos-based WASM frontend: sign-in, checkout, payment confirmation,
//! the milestone feed and the member profile.

mod api;
mod app;
mod components;
mod confirm;
mod nav;
mod pages;

pub use app::App;

use wasm_bindgen::prelude::*;

/// WASM entry point
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    leptos::mount::mount_to_body(App);
}
