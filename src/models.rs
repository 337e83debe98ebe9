// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wire types shared by the server handlers and the client library.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::{Identity, Role};

/// `POST /api/auth/login` body.
///
/// Fields are optional so that a missing field is reported as 400 by the
/// handler rather than as a deserialisation failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

impl LoginRequest {
    pub fn new(email: impl Into<String>, password: impl Into<String>, role: Role) -> Self {
        Self {
            email: Some(email.into()),
            password: Some(password.into()),
            role: Some(role.to_string()),
        }
    }
}

/// Public user profile. Never carries password material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    #[serde(default)]
    pub profile_image: Option<String>,
}

impl UserProfile {
    pub fn identity(&self) -> Identity {
        Identity::new(self.id, self.email.clone(), self.role)
    }
}

/// Successful login response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub success: bool,
    pub token: String,
    pub user: UserProfile,
}

/// `GET /api/auth/verify` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct VerifyResponse {
    pub success: bool,
    pub user: Identity,
}

/// `POST /api/admin/users` body.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<String>,
}

/// `POST /api/admin/users` response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserResponse {
    pub success: bool,
    pub message: String,
    pub user_id: i64,
}

/// Error body as sent by the API (`error_code` only on auth failures).
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error_code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_uses_portal_field_names() {
        let profile = UserProfile {
            id: 4,
            email: "demo@saop.edu".into(),
            first_name: "Demo".into(),
            last_name: "Student".into(),
            role: Role::Student,
            profile_image: None,
        };
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["firstName"], "Demo");
        assert_eq!(json["lastName"], "Student");
        assert!(json.get("password_hash").is_none());
        assert!(json.get("passwordHash").is_none());
    }

    #[test]
    fn login_request_tolerates_missing_fields() {
        let req: LoginRequest = serde_json::from_str(r#"{"email":"a@saop.edu"}"#).unwrap();
        assert!(req.password.is_none());
        assert!(req.role.is_none());
    }
}
