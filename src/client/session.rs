// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Client-side session: the token and profile of the signed-in user.
//!
//! Storage is the single source of truth. `SessionStore` never caches a
//! session; every read goes back to storage, and `SessionWatch` re-derives
//! its value from storage on each change notification.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{broadcast, watch};
use uuid::Uuid;

use super::storage::{SessionStorage, StorageChange, StorageError, StorageOp};
use crate::models::UserProfile;

pub const TOKEN_KEY: &str = "authToken";
pub const USER_KEY: &str = "user";

/// Name of the in-process event fired on every local save/clear.
pub const AUTH_CHANGE_EVENT: &str = "saop:auth-change";

const EVENT_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub user: UserProfile,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("failed to encode user profile: {0}")]
    Encode(#[from] serde_json::Error),
}

/// In-process session change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChange {
    pub name: &'static str,
    pub signed_in: bool,
}

/// Session handle for one client ("tab"). Clones are the same tab.
#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn SessionStorage>,
    origin: Uuid,
    events: broadcast::Sender<AuthChange>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            storage,
            origin: Uuid::new_v4(),
            events,
        }
    }

    /// Replace the stored session with `token` and `user` in one write.
    pub fn save(&self, token: &str, user: &UserProfile) -> Result<(), SessionError> {
        let user_json = serde_json::to_string(user)?;
        self.storage.apply(
            self.origin,
            &[
                StorageOp::set(TOKEN_KEY, token),
                StorageOp::set(USER_KEY, user_json),
            ],
        )?;
        self.notify(true);
        Ok(())
    }

    pub fn clear(&self) -> Result<(), SessionError> {
        self.storage.apply(
            self.origin,
            &[StorageOp::remove(TOKEN_KEY), StorageOp::remove(USER_KEY)],
        )?;
        self.notify(false);
        Ok(())
    }

    /// Current session, or `None` when absent, partial, corrupt or unreadable.
    pub fn read(&self) -> Option<Session> {
        read_session(self.storage.as_ref())
    }

    pub fn token(&self) -> Option<String> {
        match self.storage.get(TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read session token");
                None
            }
        }
    }

    /// Local `AUTH_CHANGE_EVENT` notifications from this tab.
    pub fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.events.subscribe()
    }

    /// Live view of the session, updated on local events and on storage
    /// changes written by other tabs. Must be called inside a Tokio runtime.
    pub fn watch(&self) -> SessionWatch {
        // Subscribe before the first read so no write can slip in between.
        let local = self.events.subscribe();
        let foreign = self.storage.subscribe();
        let (tx, rx) = watch::channel(self.read());
        let storage = self.storage.clone();
        let origin = self.origin;

        tokio::spawn(follow_session(storage, origin, local, foreign, tx));
        SessionWatch { rx }
    }

    fn notify(&self, signed_in: bool) {
        let _ = self.events.send(AuthChange {
            name: AUTH_CHANGE_EVENT,
            signed_in,
        });
    }
}

fn read_session(storage: &dyn SessionStorage) -> Option<Session> {
    let load = || -> Result<Option<Session>, StorageError> {
        let Some(token) = storage.get(TOKEN_KEY)?.filter(|t| !t.is_empty()) else {
            return Ok(None);
        };
        let Some(raw_user) = storage.get(USER_KEY)? else {
            return Ok(None);
        };
        match serde_json::from_str::<UserProfile>(&raw_user) {
            Ok(user) => Ok(Some(Session { token, user })),
            Err(e) => {
                tracing::warn!(error = %e, "stored user profile is corrupt");
                Ok(None)
            }
        }
    };
    load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to read session");
        None
    })
}

async fn follow_session(
    storage: Arc<dyn SessionStorage>,
    origin: Uuid,
    mut local: broadcast::Receiver<AuthChange>,
    mut foreign: broadcast::Receiver<StorageChange>,
    tx: watch::Sender<Option<Session>>,
) {
    let mut local_open = true;
    loop {
        let refresh = tokio::select! {
            _ = tx.closed() => return,
            event = local.recv(), if local_open => match event {
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => true,
                Err(broadcast::error::RecvError::Closed) => {
                    local_open = false;
                    false
                }
            },
            change = foreign.recv() => match change {
                Ok(change) => change.origin != origin,
                Err(broadcast::error::RecvError::Lagged(_)) => true,
                Err(broadcast::error::RecvError::Closed) => return,
            },
        };
        if refresh {
            let session = read_session(storage.as_ref());
            tx.send_if_modified(|current| {
                if *current == session {
                    false
                } else {
                    *current = session;
                    true
                }
            });
        }
    }
}

/// Receiver side of `SessionStore::watch`.
#[derive(Clone)]
pub struct SessionWatch {
    rx: watch::Receiver<Option<Session>>,
}

impl SessionWatch {
    pub fn current(&self) -> Option<Session> {
        self.rx.borrow().clone()
    }

    /// Wait for the next session change. Returns `None` once the watcher
    /// task has stopped.
    pub async fn changed(&mut self) -> Option<Option<Session>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}
