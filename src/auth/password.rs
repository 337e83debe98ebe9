// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Password hashing.
//!
//! New hashes are Argon2id in PHC string form. Legacy accounts carry bcrypt
//! hashes (`$2a$`/`$2b$`/`$2y$`), which still verify. Both algorithms are
//! slow; callers on the async runtime should go through
//! [`verify_password_blocking`].

use std::sync::LazyLock;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Password hashing failures.
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("unrecognised password hash format")]
    UnknownFormat,
    #[error("hash verification task failed: {0}")]
    Join(String),
}

/// Hash `password` with Argon2id and a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::Hash(e.to_string()))
}

/// Check `password` against a stored hash, detecting the algorithm by prefix.
///
/// An empty stored hash never matches.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    if hash.is_empty() {
        return Ok(false);
    }

    if hash.starts_with("$argon2") {
        let parsed = PasswordHash::new(hash).map_err(|e| PasswordError::Hash(e.to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    } else if hash.starts_with("$2") {
        bcrypt::verify(password, hash).map_err(|e| PasswordError::Hash(e.to_string()))
    } else {
        Err(PasswordError::UnknownFormat)
    }
}

/// [`verify_password`] on the blocking thread pool.
pub async fn verify_password_blocking(
    password: String,
    hash: String,
) -> Result<bool, PasswordError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| PasswordError::Join(e.to_string()))?
}

/// Hash used to burn the same CPU time when no account matched.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("saop-timing-equaliser").ok());

/// Run one full verification whose result is discarded.
///
/// Called on the unknown-account path so that "no such user" and "wrong
/// password" take comparable time.
pub async fn burn_verification(password: String) {
    let Some(hash) = DUMMY_HASH.clone() else {
        return;
    };
    let _ = verify_password_blocking(password, hash).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify() {
        let hash = hash_password("demo123").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("demo123", &hash).unwrap());
        assert!(!verify_password("demo124", &hash).unwrap());
    }

    #[test]
    fn salts_differ_between_hashes() {
        assert_ne!(hash_password("same").unwrap(), hash_password("same").unwrap());
    }

    #[test]
    fn bcrypt_hashes_still_verify() {
        let hash = bcrypt::hash("demo123", 4).unwrap();
        assert!(verify_password("demo123", &hash).unwrap());
        assert!(!verify_password("demo", &hash).unwrap());
    }

    #[test]
    fn empty_hash_never_matches() {
        assert!(!verify_password("", "").unwrap());
        assert!(!verify_password("anything", "").unwrap());
    }

    #[test]
    fn unknown_format_is_an_error() {
        assert!(matches!(
            verify_password("demo123", "plaintext-demo123"),
            Err(PasswordError::UnknownFormat)
        ));
    }

    #[tokio::test]
    async fn blocking_verification_matches_sync() {
        let hash = hash_password("s3cret").unwrap();
        assert!(verify_password_blocking("s3cret".into(), hash.clone()).await.unwrap());
        assert!(!verify_password_blocking("nope".into(), hash).await.unwrap());
    }
}
