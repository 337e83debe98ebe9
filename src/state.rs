// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use axum::http::HeaderValue;

use crate::auth::{CredentialVerifier, LoginThrottle, TokenCodec};
use crate::config::ServerConfig;
use crate::store::UserStore;

/// Shared, read-only server state. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub codec: Arc<TokenCodec>,
    pub store: Arc<dyn UserStore>,
    pub verifier: Arc<CredentialVerifier>,
    pub cors_origins: Arc<[HeaderValue]>,
}

impl AppState {
    pub fn new(config: &ServerConfig, store: Arc<dyn UserStore>) -> Self {
        let codec = Arc::new(TokenCodec::new(&config.jwt_secret, config.token_ttl));
        let verifier = CredentialVerifier::new(
            store.clone(),
            codec.clone(),
            LoginThrottle::new(config.throttle),
        );

        #[cfg(feature = "dev")]
        let verifier = match &config.demo_password {
            Some(password) => {
                tracing::warn!("DEMO_PASSWORD is set: demo logins are enabled (dev build)");
                verifier.with_demo_password(password.clone())
            }
            None => verifier,
        };
        #[cfg(not(feature = "dev"))]
        if config.demo_password.is_some() {
            tracing::warn!("DEMO_PASSWORD is ignored: this build does not include the dev feature");
        }

        Self {
            codec,
            store,
            verifier: Arc::new(verifier),
            cors_origins: config.cors_origins.clone().into(),
        }
    }

    /// State over an empty in-memory store with a fixed test secret.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self::with_store_for_tests(Arc::new(crate::store::InMemoryStore::new()))
    }

    #[cfg(test)]
    pub fn with_store_for_tests(store: Arc<dyn UserStore>) -> Self {
        Self::new(&test_config(), store)
    }
}

#[cfg(test)]
fn test_config() -> ServerConfig {
    ServerConfig {
        bind: ([127, 0, 0, 1], 0).into(),
        jwt_secret: b"unit-test-secret-0123456789abcdef".to_vec(),
        token_ttl: crate::auth::token::DEFAULT_TOKEN_TTL,
        throttle: crate::auth::ThrottleConfig::default(),
        seed_demo_users: false,
        demo_password: None,
        cors_origins: vec![HeaderValue::from_static("http://localhost:8080")],
    }
}
