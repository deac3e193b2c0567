//! Session extraction and the paid-area middleware

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::{
    extract::cookie::{Cookie, CookieJar, SameSite},
    headers::{authorization::Bearer, Authorization, HeaderMapExt},
};

use circle_core::{Account, Decision, SessionToken, UserId};

use crate::error::ApiError;
use crate::state::AppState;

/// Cookie carrying the session token for browser navigation
pub const SESSION_COOKIE: &str = "session";

/// Token from `Authorization: Bearer ...`, falling back to the session cookie
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().trim().to_string())
        .filter(|t| !t.is_empty());

    bearer.or_else(|| {
        CookieJar::from_headers(headers)
            .get(SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .filter(|v| !v.is_empty())
    })
}

/// HttpOnly session cookie for the whole site
pub fn session_cookie(token: &SessionToken, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

/// Removal cookie matching [`session_cookie`]
pub fn cleared_session_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE).path("/").build()
}

/// Resolve the caller's account id without requiring payment
pub async fn signed_in_user(state: &AppState, headers: &HeaderMap) -> Result<UserId, ApiError> {
    let token = session_token(headers).ok_or(ApiError::Unauthorized)?;
    state
        .sessions
        .resolve(&token)
        .await?
        .ok_or(ApiError::Unauthorized)
}

/// Paid account attached to requests that passed the gate
#[derive(Clone, Debug)]
pub struct PaidMember(pub Account);

/// Access Gate as route middleware.
///
/// Re-evaluated on every request; nothing is cached between calls.
pub async fn require_paid(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let token = session_token(request.headers());

    match state.gate.authorize(token.as_deref()).await {
        Ok(Decision::Allow(account)) => {
            request.extensions_mut().insert(PaidMember(account));
            next.run(request).await
        }
        Ok(Decision::RedirectTo(path)) => Redirect::to(path).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, HeaderValue};

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(session_token(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_cookie_token() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session=tok42; other=1"),
        );
        assert_eq!(session_token(&headers).as_deref(), Some("tok42"));
    }

    #[test]
    fn test_bearer_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        headers.insert(header::COOKIE, HeaderValue::from_static("session=from-cookie"));
        assert_eq!(session_token(&headers).as_deref(), Some("from-header"));
    }

    #[test]
    fn test_no_token() {
        let mut headers = HeaderMap::new();
        assert!(session_token(&headers).is_none());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        headers.insert(header::COOKIE, HeaderValue::from_static("session="));
        assert!(session_token(&headers).is_none());
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie(&SessionToken::from_string("tok42"), true);
        assert_eq!(cookie.value(), "tok42");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.secure(), Some(true));

        let header = cookie.to_string();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(header.split(';').next().unwrap()).unwrap(),
        );
        assert_eq!(session_token(&headers).as_deref(), Some("tok42"));
    }
}
