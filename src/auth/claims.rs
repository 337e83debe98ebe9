// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWT claims and the authenticated identity.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::roles::Role;

/// Claims carried inside a portal token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Numeric user ID from the `users` table
    #[serde(rename = "userId")]
    pub user_id: i64,

    pub email: String,

    pub role: Role,

    /// Issued at (Unix seconds)
    pub iat: i64,

    /// Expiration (Unix seconds)
    pub exp: i64,

    /// Token ID. Unused today; the key a revocation denylist would use.
    pub jti: String,
}

/// The authenticated principal.
///
/// Reconstructed from the token on every request and never stored
/// server-side. This is the type handlers receive from the `Auth` extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: i64,
    pub email: String,
    pub role: Role,
}

impl Identity {
    pub fn new(user_id: i64, email: impl Into<String>, role: Role) -> Self {
        Self {
            user_id,
            email: email.into(),
            role,
        }
    }
}

impl From<TokenClaims> for Identity {
    fn from(claims: TokenClaims) -> Self {
        Self {
            user_id: claims.user_id,
            email: claims.email,
            role: claims.role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_from_claims_drops_timestamps() {
        let claims = TokenClaims {
            user_id: 7,
            email: "demo@saop.edu".to_string(),
            role: Role::Student,
            iat: 1_700_000_000,
            exp: 1_700_086_400,
            jti: "b1".to_string(),
        };

        let identity = Identity::from(claims);
        assert_eq!(identity, Identity::new(7, "demo@saop.edu", Role::Student));
    }

    #[test]
    fn identity_serializes_camel_case() {
        let identity = Identity::new(3, "a@saop.edu", Role::Admin);
        let json = serde_json::to_value(&identity).unwrap();
        assert_eq!(json["userId"], 3);
        assert_eq!(json["role"], "admin");
    }

    #[test]
    fn claims_use_user_id_wire_name() {
        let json = serde_json::json!({
            "userId": 12, "email": "f@saop.edu", "role": "faculty",
            "iat": 1, "exp": 2, "jti": "x"
        });
        let claims: TokenClaims = serde_json::from_value(json).unwrap();
        assert_eq!(claims.user_id, 12);
        assert_eq!(claims.role, Role::Faculty);
    }
}
