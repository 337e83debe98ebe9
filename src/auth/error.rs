// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use std::time::Duration;

use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Why a token failed verification.
///
/// Only ever logged; clients see a single `invalid_token` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRejection {
    /// Signature does not verify against the server secret
    BadSignature,
    /// `exp` has passed
    Expired,
    /// Not a JWT, undecodable claims, or unexpected algorithm
    Malformed,
    /// Authorization header uses another scheme or is not valid UTF-8
    BadHeader,
}

/// Authentication and authorization error type.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No bearer credential on a protected request
    #[error("Authentication token is required")]
    MissingToken,
    /// Token failed signature, structure or expiry checks
    #[error("Invalid or expired token")]
    InvalidToken(TokenRejection),
    /// Role Gate ran without Auth Middleware in front of it
    #[error("Authentication token is required")]
    NoIdentity,
    /// Valid identity, role outside the route group's policy
    #[error("Insufficient permissions for this operation")]
    RoleMismatch,
    /// Unknown (email, role) or wrong password; indistinguishable
    #[error("Invalid credentials")]
    InvalidCredentials,
    /// Login body lacks email, password or role
    #[error("Email, password, and role are required")]
    MissingFields,
    /// Login role is not one of the portal roles
    #[error("Unknown role")]
    UnknownRole,
    /// Too many consecutive failed logins for this email
    #[error("Too many failed login attempts, try again later")]
    TooManyAttempts { retry_after: Duration },
    /// Store, hashing or signing failure; detail is logged, never returned
    #[error("Internal server error")]
    Internal(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing_token",
            AuthError::InvalidToken(_) => "invalid_token",
            AuthError::NoIdentity => "missing_token",
            AuthError::RoleMismatch => "forbidden",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::MissingFields => "missing_fields",
            AuthError::UnknownRole => "unknown_role",
            AuthError::TooManyAttempts { .. } => "too_many_attempts",
            AuthError::Internal(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingToken
            | AuthError::InvalidToken(_)
            | AuthError::NoIdentity
            | AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::RoleMismatch => StatusCode::FORBIDDEN,
            AuthError::MissingFields | AuthError::UnknownRole => StatusCode::BAD_REQUEST,
            AuthError::TooManyAttempts { .. } => StatusCode::TOO_MANY_REQUESTS,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match &self {
            AuthError::Internal(detail) => {
                tracing::error!(detail = %detail, "authentication failed internally");
            }
            AuthError::NoIdentity => {
                tracing::error!("role gate reached without an authenticated identity");
            }
            AuthError::InvalidToken(reason) => {
                tracing::debug!(reason = ?reason, "token rejected");
            }
            _ => {}
        }

        let status = self.status_code();
        let retry_after = match &self {
            AuthError::TooManyAttempts { retry_after } => Some(retry_after.as_secs().max(1)),
            _ => None,
        };
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });

        let mut response = (status, body).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn missing_token_returns_401() {
        let response = AuthError::MissingToken.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = body_json(response).await;
        assert_eq!(body["error_code"], "missing_token");
    }

    #[tokio::test]
    async fn invalid_token_hides_the_reason() {
        let expired = body_json(AuthError::InvalidToken(TokenRejection::Expired).into_response()).await;
        let forged =
            body_json(AuthError::InvalidToken(TokenRejection::BadSignature).into_response()).await;
        assert_eq!(expired, forged);
    }

    #[tokio::test]
    async fn role_mismatch_returns_403() {
        let response = AuthError::RoleMismatch.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn no_identity_fails_closed() {
        let response = AuthError::NoIdentity.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn internal_error_does_not_leak_detail() {
        let response = AuthError::Internal("connection refused to db:3306".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["error"], "Internal server error");
    }

    #[tokio::test]
    async fn too_many_attempts_sets_retry_after() {
        let response = AuthError::TooManyAttempts {
            retry_after: Duration::from_secs(42),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[RETRY_AFTER], "42");
    }
}
