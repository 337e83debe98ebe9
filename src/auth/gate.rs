// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Role Gate: restricts a route group to a fixed set of roles.
//!
//! A group declares its policy once through [`protect`]; every route nested
//! in the group inherits both the token check and the role check.

use axum::{
    extract::{Request, State},
    middleware::{from_fn_with_state, Next},
    response::Response,
    Router,
};

use super::middleware::require_auth;
use super::{AuthError, Identity, RolePolicy};
use crate::state::AppState;

/// Role check middleware. Must run after [`require_auth`].
///
/// Fails closed with `NoIdentity` if no identity was attached.
pub async fn role_gate(
    State(policy): State<RolePolicy>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let identity = request
        .extensions()
        .get::<Identity>()
        .ok_or(AuthError::NoIdentity)?;

    if !policy.allows(identity.role) {
        tracing::info!(
            user_id = identity.user_id,
            role = %identity.role,
            path = %request.uri().path(),
            "role gate denied request"
        );
        return Err(AuthError::RoleMismatch);
    }

    Ok(next.run(request).await)
}

/// Put a whole route group behind Auth Middleware and a Role Gate.
pub fn protect(router: Router<AppState>, state: &AppState, policy: RolePolicy) -> Router<AppState> {
    // Later layers wrap earlier ones, so authentication runs first.
    router
        .layer(from_fn_with_state(policy, role_gate))
        .layer(from_fn_with_state(state.clone(), require_auth))
}
