// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! SAOP Auth - Academic Portal Authentication Service
//!
//! Stateless bearer-token authentication and role authorization for the
//! academic portal, plus the client-side session library used by portal
//! front ends.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Token codec, auth middleware, role gates, credential checks
//! - `client` - Session storage and the authorizing API client
//! - `store` - User account lookup behind a pluggable query executor

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod state;
pub mod store;
