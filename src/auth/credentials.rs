// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Credential Verifier: turns an `(email, password, role)` login attempt into
//! a signed token.
//!
//! ## Login Flow
//!
//! 1. Refuse early if the email is currently locked out by the throttle
//! 2. Look up exactly one account for `(email, role)`
//! 3. Verify the password against the stored adaptive hash
//! 4. Issue a token for the account's identity
//!
//! Unknown accounts and wrong passwords produce the same `InvalidCredentials`
//! error, and the unknown-account path still spends one hash verification.

use std::sync::Arc;

use crate::models::{AuthResponse, UserProfile};
use crate::store::{StoreError, UserRecord, UserStore};

use super::password::{burn_verification, verify_password_blocking, PasswordError};
use super::throttle::LoginThrottle;
use super::{AuthError, Role, TokenCodec};

/// A validated login attempt.
#[derive(Debug, Clone)]
pub struct LoginAttempt {
    pub email: String,
    pub password: String,
    pub role: Role,
}

impl LoginAttempt {
    /// Validate raw request fields.
    ///
    /// Missing or blank fields are `MissingFields`; an unrecognised role is
    /// `UnknownRole`. The email is trimmed and lowercased.
    pub fn parse(
        email: Option<&str>,
        password: Option<&str>,
        role: Option<&str>,
    ) -> Result<Self, AuthError> {
        let email = email.map(str::trim).filter(|e| !e.is_empty());
        let password = password.filter(|p| !p.is_empty());
        let role = role.map(str::trim).filter(|r| !r.is_empty());

        let (Some(email), Some(password), Some(role)) = (email, password, role) else {
            return Err(AuthError::MissingFields);
        };
        let role = role.parse::<Role>().map_err(|_| AuthError::UnknownRole)?;

        Ok(Self {
            email: email.to_lowercase(),
            password: password.to_string(),
            role,
        })
    }
}

/// Successful login: the token plus the public profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResult {
    pub token: String,
    pub user: UserProfile,
}

impl From<AuthResult> for AuthResponse {
    fn from(result: AuthResult) -> Self {
        Self {
            success: true,
            token: result.token,
            user: result.user,
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        AuthError::Internal(e.to_string())
    }
}

/// Verifies passwords and issues tokens.
pub struct CredentialVerifier {
    store: Arc<dyn UserStore>,
    codec: Arc<TokenCodec>,
    throttle: LoginThrottle,
    demo_password: Option<String>,
}

impl CredentialVerifier {
    pub fn new(store: Arc<dyn UserStore>, codec: Arc<TokenCodec>, throttle: LoginThrottle) -> Self {
        Self {
            store,
            codec,
            throttle,
            demo_password: None,
        }
    }

    /// Accept `password` for every existing `(email, role)` account.
    ///
    /// Only compiled into `dev` builds.
    #[cfg(feature = "dev")]
    pub fn with_demo_password(mut self, password: impl Into<String>) -> Self {
        self.demo_password = Some(password.into());
        self
    }

    /// Check a login attempt and issue a token for the matching account.
    pub async fn login(&self, attempt: LoginAttempt) -> Result<AuthResult, AuthError> {
        if let Err(retry_after) = self.throttle.check(&attempt.email) {
            tracing::warn!(email = %attempt.email, "login refused, account locked out");
            return Err(AuthError::TooManyAttempts { retry_after });
        }

        let record = self
            .store
            .find_by_email_and_role(&attempt.email, attempt.role)
            .await?;

        let Some(record) = record else {
            burn_verification(attempt.password).await;
            self.throttle.record_failure(&attempt.email);
            tracing::info!(email = %attempt.email, role = %attempt.role, "login rejected");
            return Err(AuthError::InvalidCredentials);
        };

        if !self.password_matches(&attempt.password, &record).await? {
            self.throttle.record_failure(&attempt.email);
            tracing::info!(email = %attempt.email, role = %attempt.role, "login rejected");
            return Err(AuthError::InvalidCredentials);
        }

        self.throttle.record_success(&attempt.email);
        let user = record.profile();
        let token = self.codec.issue(&user.identity())?;
        tracing::info!(user_id = user.id, role = %user.role, "login succeeded");

        Ok(AuthResult { token, user })
    }

    async fn password_matches(&self, password: &str, record: &UserRecord) -> Result<bool, AuthError> {
        if let Some(demo) = &self.demo_password {
            if password == demo {
                tracing::warn!(user_id = record.id, "demo password used for login");
                return Ok(true);
            }
        }

        match verify_password_blocking(password.to_string(), record.password_hash.clone()).await {
            Ok(matches) => Ok(matches),
            Err(PasswordError::Join(e)) => Err(AuthError::Internal(e)),
            // A broken stored hash must answer like any other failed login.
            Err(e) => {
                tracing::error!(user_id = record.id, error = %e, "stored password hash is unusable");
                Ok(false)
            }
        }
    }
}
