// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{protect, Identity, Role, POLICY_GROUPS},
    models::{
        AuthResponse, CreateUserRequest, CreateUserResponse, ErrorResponse, LoginRequest,
        UserProfile, VerifyResponse,
    },
    state::AppState,
};

pub mod auth;
pub mod health;
pub mod portal;

/// Routes inside one policy group, before the group's guard is applied.
fn group_routes(prefix: &str) -> Router<AppState> {
    let routes = Router::new().route("/me", get(portal::me));
    match prefix {
        "/admin" => routes.route("/users", post(portal::create_user)),
        _ => routes,
    }
}

pub fn router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/verify", get(auth::verify));

    let mut api_routes = Router::new().nest("/auth", auth_routes);
    for (prefix, policy) in POLICY_GROUPS {
        api_routes = api_routes.nest(prefix, protect(group_routes(prefix), &state, policy));
    }

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(state.cors_origins.iter().cloned()))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION]);

    Router::new()
        .route("/health", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .nest("/api", api_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(cors)
}

struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::login,
        auth::verify,
        portal::me,
        portal::create_user,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            LoginRequest,
            AuthResponse,
            VerifyResponse,
            UserProfile,
            Identity,
            Role,
            CreateUserRequest,
            CreateUserResponse,
            ErrorResponse
        )
    ),
    modifiers(&BearerSecurity),
    tags(
        (name = "Auth", description = "Login and token verification"),
        (name = "Portal", description = "Role-scoped portal endpoints"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
struct ApiDoc;
