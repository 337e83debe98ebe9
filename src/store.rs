// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User credential store.
//!
//! The portal's data layer is an external relational database reached
//! through a single `query(sql, params) -> rows` style interface. This module
//! defines that seam ([`QueryExecutor`]), the SQL-backed [`SqlUserStore`]
//! that speaks it, and an [`InMemoryStore`] for development and tests. The
//! auth code only depends on the [`UserStore`] trait.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::auth::Role;
use crate::models::UserProfile;

/// Data-access failures. Always surfaced to clients as a generic 500.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database unavailable: {0}")]
    Unavailable(String),
    #[error("query failed: {0}")]
    Query(String),
    #[error("unexpected row shape: {0}")]
    Decode(String),
    #[error("{count} users match {email} as {role}")]
    Ambiguous { email: String, role: Role, count: usize },
    #[error("user already exists: {0}")]
    Duplicate(String),
}

/// A stored account, including its password hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub profile_image: Option<String>,
}

impl UserRecord {
    /// The record without its password hash.
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            role: self.role,
            profile_image: self.profile_image.clone(),
        }
    }
}

/// Account to insert; `password_hash` is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
}

/// Read/write access to accounts.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// The single account registered under `(email, role)`, if any.
    async fn find_by_email_and_role(
        &self,
        email: &str,
        role: Role,
    ) -> Result<Option<UserRecord>, StoreError>;

    /// Insert a new account. Emails are unique across roles.
    async fn insert_user(&self, user: NewUser) -> Result<UserRecord, StoreError>;

    /// Cheap connectivity probe for readiness checks.
    async fn ping(&self) -> Result<(), StoreError>;
}

// ============================================================================
// SQL-backed store
// ============================================================================

/// A bound SQL parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Int(i64),
    Text(String),
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

/// One result row, keyed by column name.
pub type Row = Map<String, Value>;

/// Outcome of a statement that returns no rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub rows_affected: u64,
    pub last_insert_id: Option<i64>,
}

/// The relational database, as seen by this crate.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, StoreError>;

    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<ExecResult, StoreError>;
}

const SELECT_BY_EMAIL_AND_ROLE: &str = "SELECT id, email, password_hash, first_name, last_name, role, profile_image \
     FROM users WHERE email = ? AND role = ?";
const SELECT_ID_BY_EMAIL: &str = "SELECT id FROM users WHERE email = ?";
const INSERT_USER: &str = "INSERT INTO users (email, password_hash, first_name, last_name, role) \
     VALUES (?, ?, ?, ?, ?)";

/// [`UserStore`] over the portal's `users` table.
pub struct SqlUserStore {
    db: Arc<dyn QueryExecutor>,
}

impl SqlUserStore {
    pub fn new(db: Arc<dyn QueryExecutor>) -> Self {
        Self { db }
    }
}

fn column_str(row: &Row, column: &str) -> Result<String, StoreError> {
    row.get(column)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| StoreError::Decode(format!("missing text column `{column}`")))
}

fn user_from_row(row: &Row) -> Result<UserRecord, StoreError> {
    let id = row
        .get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| StoreError::Decode("missing integer column `id`".to_string()))?;
    let role = column_str(row, "role")?
        .parse::<Role>()
        .map_err(|e| StoreError::Decode(e.to_string()))?;

    Ok(UserRecord {
        id,
        email: column_str(row, "email")?,
        password_hash: column_str(row, "password_hash")?,
        first_name: column_str(row, "first_name")?,
        last_name: column_str(row, "last_name")?,
        role,
        profile_image: row
            .get("profile_image")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

#[async_trait]
impl UserStore for SqlUserStore {
    async fn find_by_email_and_role(
        &self,
        email: &str,
        role: Role,
    ) -> Result<Option<UserRecord>, StoreError> {
        let rows = self
            .db
            .query(SELECT_BY_EMAIL_AND_ROLE, &[email.into(), role.as_str().into()])
            .await?;

        match rows.as_slice() {
            [] => Ok(None),
            [row] => user_from_row(row).map(Some),
            _ => Err(StoreError::Ambiguous {
                email: email.to_string(),
                role,
                count: rows.len(),
            }),
        }
    }

    async fn insert_user(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let existing = self
            .db
            .query(SELECT_ID_BY_EMAIL, &[user.email.as_str().into()])
            .await?;
        if !existing.is_empty() {
            return Err(StoreError::Duplicate(user.email));
        }

        let result = self
            .db
            .execute(
                INSERT_USER,
                &[
                    user.email.as_str().into(),
                    user.password_hash.as_str().into(),
                    user.first_name.as_str().into(),
                    user.last_name.as_str().into(),
                    user.role.as_str().into(),
                ],
            )
            .await?;
        if result.rows_affected != 1 {
            return Err(StoreError::Query(format!(
                "insert affected {} rows",
                result.rows_affected
            )));
        }
        let id = result
            .last_insert_id
            .ok_or_else(|| StoreError::Decode("insert returned no id".to_string()))?;

        Ok(UserRecord {
            id,
            email: user.email,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            role: user.role,
            profile_image: None,
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.db.query("SELECT 1", &[]).await.map(|_| ())
    }
}

// ============================================================================
// In-memory store
// ============================================================================

#[derive(Default)]
struct Users {
    next_id: i64,
    by_id: HashMap<i64, UserRecord>,
}

/// Process-local [`UserStore`] for development servers and tests.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    users: Arc<RwLock<Users>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.by_id.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn find_by_email_and_role(
        &self,
        email: &str,
        role: Role,
    ) -> Result<Option<UserRecord>, StoreError> {
        let users = self.users.read().await;
        Ok(users
            .by_id
            .values()
            .find(|u| u.role == role && u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn insert_user(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let mut users = self.users.write().await;
        if users
            .by_id
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(StoreError::Duplicate(user.email));
        }

        users.next_id += 1;
        let record = UserRecord {
            id: users.next_id,
            email: user.email,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            role: user.role,
            profile_image: None,
        };
        users.by_id.insert(record.id, record.clone());
        Ok(record)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
