// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Login and token verification endpoints.

use axum::{extract::rejection::JsonRejection, extract::State, Json};

use crate::auth::{Auth, AuthError, LoginAttempt};
use crate::models::{AuthResponse, LoginRequest, VerifyResponse};
use crate::state::AppState;

/// Exchange credentials for a token.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login succeeded", body = AuthResponse),
        (status = 400, description = "Email, password or role missing"),
        (status = 401, description = "Invalid credentials"),
        (status = 429, description = "Too many failed attempts for this email"),
    )
)]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, AuthError> {
    let Json(request) = payload.map_err(|_| AuthError::MissingFields)?;
    let attempt = LoginAttempt::parse(
        request.email.as_deref(),
        request.password.as_deref(),
        request.role.as_deref(),
    )?;

    let result = state.verifier.login(attempt).await?;
    Ok(Json(result.into()))
}

/// Decode the caller's token.
#[utoipa::path(
    get,
    path = "/api/auth/verify",
    tag = "Auth",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Token is valid", body = VerifyResponse),
        (status = 401, description = "Missing, invalid or expired token"),
    )
)]
pub async fn verify(Auth(identity): Auth) -> Json<VerifyResponse> {
    Json(VerifyResponse {
        success: true,
        user: identity,
    })
}
