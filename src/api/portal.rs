// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Endpoints inside the protected admin/faculty/student groups.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};

use crate::auth::{password::hash_password, Auth, Identity, Role};
use crate::error::ApiError;
use crate::models::{CreateUserRequest, CreateUserResponse};
use crate::state::AppState;
use crate::store::NewUser;

/// The caller's identity, as seen by its role group.
#[utoipa::path(
    get,
    path = "/api/{group}/me",
    tag = "Portal",
    params(("group" = String, Path, description = "admin, faculty or student")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Caller identity", body = Identity),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Role not admitted to this group"),
    )
)]
pub async fn me(Auth(identity): Auth) -> Json<Identity> {
    Json(identity)
}

fn required(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Create a portal account (admin only).
#[utoipa::path(
    post,
    path = "/api/admin/users",
    tag = "Portal",
    request_body = CreateUserRequest,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "User created", body = CreateUserResponse),
        (status = 400, description = "Missing fields or unknown role"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Caller is not an admin"),
        (status = 409, description = "Email already registered"),
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    Auth(admin): Auth,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateUserResponse>), ApiError> {
    let Json(request) = payload.map_err(|_| ApiError::bad_request("All fields are required"))?;

    let (Some(email), Some(first_name), Some(last_name), Some(role)) = (
        required(request.email),
        required(request.first_name),
        required(request.last_name),
        required(request.role),
    ) else {
        return Err(ApiError::bad_request("All fields are required"));
    };
    let Some(password) = request.password.filter(|p| !p.is_empty()) else {
        return Err(ApiError::bad_request("All fields are required"));
    };
    let role: Role = role
        .parse()
        .map_err(|_| ApiError::bad_request("Unknown role"))?;

    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(ApiError::internal)?
        .map_err(ApiError::internal)?;

    let record = state
        .store
        .insert_user(NewUser {
            email: email.to_lowercase(),
            password_hash,
            first_name,
            last_name,
            role,
        })
        .await?;

    tracing::info!(
        admin_id = admin.user_id,
        user_id = record.id,
        role = %record.role,
        "user created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateUserResponse {
            success: true,
            message: "User created successfully".to_string(),
            user_id: record.id,
        }),
    ))
}
