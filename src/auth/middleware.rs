// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication middleware for Axum.
//!
//! Verifies the bearer token on every request to a protected route group and
//! stores the resulting [`Identity`] in the request extensions, where the
//! Role Gate and the [`Auth`](super::Auth) extractor pick it up. On failure
//! the request is answered immediately and the handler never runs.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};

use super::error::{AuthError, TokenRejection};
use super::Identity;
use crate::state::AppState;

/// Pull the bearer token out of the `Authorization` header.
///
/// - no header, or `Bearer` with nothing after it: `MissingToken`
/// - non-UTF-8 value or another scheme: `InvalidToken`
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::InvalidToken(TokenRejection::BadHeader))?
        .trim();

    let (scheme, token) = value.split_once(' ').unwrap_or((value, ""));
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::InvalidToken(TokenRejection::BadHeader));
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }
    Ok(token)
}

/// Verify the request's token against the server's codec.
pub fn authenticate(headers: &HeaderMap, state: &AppState) -> Result<Identity, AuthError> {
    let token = bearer_token(headers)?;
    state.codec.verify(token)
}

/// Authentication middleware function.
///
/// ```rust,ignore
/// let app = Router::new()
///     .route("/me", get(me))
///     .layer(axum::middleware::from_fn_with_state(state.clone(), require_auth));
/// ```
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let identity = authenticate(request.headers(), &state)?;
    tracing::debug!(user_id = identity.user_id, role = %identity.role, "request authenticated");

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::state::AppState;
    use axum::{
        body::Body,
        http::{HeaderValue, Request as HttpRequest, StatusCode},
        middleware::from_fn_with_state,
        routing::get,
        Extension, Router,
    };
    use tower::ServiceExt;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn bearer_token_extracts_token() {
        assert_eq!(bearer_token(&headers("Bearer abc.def.ghi")).unwrap(), "abc.def.ghi");
        assert_eq!(bearer_token(&headers("bearer   abc")).unwrap(), "abc");
    }

    #[test]
    fn bearer_token_missing_header() {
        assert!(matches!(bearer_token(&HeaderMap::new()), Err(AuthError::MissingToken)));
        assert!(matches!(bearer_token(&headers("Bearer ")), Err(AuthError::MissingToken)));
        assert!(matches!(bearer_token(&headers("Bearer")), Err(AuthError::MissingToken)));
    }

    #[test]
    fn bearer_token_wrong_scheme() {
        assert!(matches!(
            bearer_token(&headers("Basic dXNlcjpwYXNz")),
            Err(AuthError::InvalidToken(TokenRejection::BadHeader))
        ));
    }

    async fn echo(Extension(identity): Extension<Identity>) -> String {
        identity.email
    }

    fn app(state: AppState) -> Router {
        Router::new()
            .route("/echo", get(echo))
            .layer(from_fn_with_state(state.clone(), require_auth))
            .with_state(state)
    }

    #[tokio::test]
    async fn passes_identity_to_handler() {
        let state = AppState::for_tests();
        let token = state
            .codec
            .issue(&Identity::new(8, "f@saop.edu", Role::Faculty))
            .unwrap();

        let response = app(state)
            .oneshot(
                HttpRequest::builder()
                    .uri("/echo")
                    .header(AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"f@saop.edu");
    }

    #[tokio::test]
    async fn short_circuits_without_token() {
        let response = app(AppState::for_tests())
            .oneshot(HttpRequest::builder().uri("/echo").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn short_circuits_with_bad_token() {
        let response = app(AppState::for_tests())
            .oneshot(
                HttpRequest::builder()
                    .uri("/echo")
                    .header(AUTHORIZATION, "Bearer forged.token.value")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
