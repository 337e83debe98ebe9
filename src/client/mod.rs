// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Client Library
//!
//! Session handling for portal front ends.
//!
//! - `storage` - durable key/value backends with change notifications
//! - `session` - the signed-in session, read from storage on demand
//! - `interceptor` - API client that attaches the token and ends the
//!   session on 401

pub mod interceptor;
pub mod session;
pub mod storage;

pub use interceptor::{authorize, ApiClient, ClientError, Navigator, LOGIN_PATH};
pub use session::{
    AuthChange, Session, SessionError, SessionStore, SessionWatch, AUTH_CHANGE_EVENT, TOKEN_KEY,
    USER_KEY,
};
pub use storage::{FileStorage, MemoryStorage, SessionStorage, StorageChange, StorageError, StorageOp};
