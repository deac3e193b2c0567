//! Browser navigation helpers

use std::borrow::Cow;

/// Full-page navigation; failures are logged, there is nothing else to do
pub fn navigate(path: &str) {
    if let Some(window) = web_sys::window() {
        if let Err(e) = window.location().set_href(path) {
            leptos::logging::warn!("navigation to {path} failed: {e:?}");
        }
    }
}

/// Value of `name` in a `#a=1&b=2` fragment, percent-decoded
pub fn fragment_param(fragment: &str, name: &str) -> Option<String> {
    fragment
        .trim_start_matches('#')
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .and_then(|(_, value)| {
            urlencoding::decode(&value.replace('+', " "))
                .ok()
                .map(Cow::into_owned)
        })
        .filter(|value| !value.is_empty())
}

/// `path?k=v&...` with every value percent-encoded; empty values are dropped
pub fn with_query(path: &str, params: &[(&str, &str)]) -> String {
    let query: Vec<String> = params
        .iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .map(|(key, value)| format!("{key}={}", urlencoding::encode(value.trim())))
        .collect();

    if query.is_empty() {
        path.to_string()
    } else {
        format!("{path}?{}", query.join("&"))
    }
}
