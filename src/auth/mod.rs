// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Stateless token authentication and role authorization for the portal API.
//!
//! ## Auth Flow
//!
//! 1. Client posts `{email, password, role}` to `/api/auth/login`
//! 2. `CredentialVerifier` checks the password hash and issues a token
//! 3. Client sends `Authorization: Bearer <token>` on every call
//! 4. Server, per protected route group:
//!    - `require_auth` verifies signature and expiry, attaches the `Identity`
//!    - `role_gate` checks the identity's role against the group's policy
//!
//! ## Security
//!
//! - Tokens are HS256 JWTs; no server-side session table, no revocation
//! - Unknown account and wrong password are indistinguishable to clients
//! - Repeated failed logins lock the email out with exponential backoff
//! - No universal password outside `dev` builds

pub mod claims;
pub mod credentials;
pub mod error;
pub mod extractor;
pub mod gate;
pub mod middleware;
pub mod password;
pub mod roles;
pub mod throttle;
pub mod token;

pub use claims::{Identity, TokenClaims};
pub use credentials::{AuthResult, CredentialVerifier, LoginAttempt};
pub use error::{AuthError, TokenRejection};
pub use extractor::Auth;
pub use gate::{protect, role_gate};
pub use middleware::require_auth;
pub use roles::{Role, RolePolicy, POLICY_GROUPS};
pub use throttle::{LoginThrottle, ThrottleConfig};
pub use token::TokenCodec;
