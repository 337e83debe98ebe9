// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for the authenticated identity.
//!
//! Use the `Auth` extractor in handlers to require authentication:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(identity): Auth) -> impl IntoResponse {
//!     // identity is Identity
//! }
//! ```

use axum::{extract::FromRequestParts, http::request::Parts};

use super::middleware::authenticate;
use super::{AuthError, Identity};
use crate::state::AppState;

/// Extractor for the authenticated identity.
///
/// Inside a protected group the middleware has already verified the token
/// and this just reads the identity back. Outside a group (for example
/// `GET /api/auth/verify`) it verifies the bearer token itself.
pub struct Auth(pub Identity);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // First check if middleware already set the identity
        if let Some(identity) = parts.extensions.get::<Identity>().cloned() {
            return Ok(Auth(identity));
        }

        let identity = authenticate(&parts.headers, state)?;
        Ok(Auth(identity))
    }
}
