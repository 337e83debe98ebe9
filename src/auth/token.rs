// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token Codec: issues and verifies signed, expiring identity tokens.
//!
//! Tokens are HS256 JWTs signed with the server secret. Verification is pure
//! (no I/O, no lookups) so it can run on every request; the price is that a
//! token cannot be revoked before it expires.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use super::claims::{Identity, TokenClaims};
use super::error::{AuthError, TokenRejection};

/// Minimum accepted signing secret length in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Default token lifetime (24 hours).
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Signs and verifies portal tokens.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenCodec {
    /// Create a codec for `secret` issuing tokens valid for `ttl`.
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // No skew allowance: a token is dead the second `exp` passes.
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    /// Issue a token for `identity`, valid from now for the configured TTL.
    pub fn issue(&self, identity: &Identity) -> Result<String, AuthError> {
        self.issue_at(identity, Utc::now())
    }

    /// Issue a token as if it had been minted at `issued_at`.
    pub(crate) fn issue_at(
        &self,
        identity: &Identity,
        issued_at: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let iat = issued_at.timestamp();
        let ttl = i64::try_from(self.ttl.as_secs())
            .map_err(|_| AuthError::Internal("token TTL out of range".to_string()))?;

        let claims = TokenClaims {
            user_id: identity.user_id,
            email: identity.email.clone(),
            role: identity.role,
            iat,
            exp: iat.saturating_add(ttl),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("failed to sign token: {e}")))
    }

    /// Verify `token` and return the identity it carries.
    ///
    /// Fails with `InvalidToken` on a bad signature, a malformed payload or
    /// an elapsed expiry.
    pub fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let data = decode::<TokenClaims>(token, &self.decoding_key, &self.validation).map_err(
            |e| {
                let reason = match e.kind() {
                    ErrorKind::ExpiredSignature => TokenRejection::Expired,
                    ErrorKind::InvalidSignature => TokenRejection::BadSignature,
                    _ => TokenRejection::Malformed,
                };
                AuthError::InvalidToken(reason)
            },
        )?;

        Ok(data.claims.into())
    }
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &"HS256")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

    const SECRET: &[u8] = b"test-secret-that-is-at-least-32-bytes-long";

    fn codec() -> TokenCodec {
        TokenCodec::new(SECRET, DEFAULT_TOKEN_TTL)
    }

    fn identities() -> Vec<Identity> {
        vec![
            Identity::new(1, "admin@saop.edu", Role::Admin),
            Identity::new(42, "prof.lee@saop.edu", Role::Faculty),
            Identity::new(i64::MAX, "demo@saop.edu", Role::Student),
            Identity::new(0, "ünïcode+tag@saop.edu", Role::Student),
        ]
    }

    fn assert_invalid(result: Result<Identity, AuthError>) {
        assert!(
            matches!(result, Err(AuthError::InvalidToken(_))),
            "expected InvalidToken, got {result:?}"
        );
    }

    #[test]
    fn verify_returns_issued_identity() {
        let codec = codec();
        for identity in identities() {
            let token = codec.issue(&identity).unwrap();
            assert_eq!(codec.verify(&token).unwrap(), identity);
        }
    }

    #[test]
    fn tokens_are_unique_per_issue() {
        let codec = codec();
        let identity = Identity::new(1, "a@saop.edu", Role::Admin);
        assert_ne!(codec.issue(&identity).unwrap(), codec.issue(&identity).unwrap());
    }

    #[test]
    fn rejects_token_signed_with_another_secret() {
        let other = TokenCodec::new(b"another-secret-that-is-32-bytes-or-more", DEFAULT_TOKEN_TTL);
        let token = other.issue(&Identity::new(1, "a@saop.edu", Role::Admin)).unwrap();
        assert!(matches!(
            codec().verify(&token),
            Err(AuthError::InvalidToken(TokenRejection::BadSignature))
        ));
    }

    #[test]
    fn rejects_tampered_payload() {
        let codec = codec();
        let token = codec.issue(&Identity::new(9, "s@saop.edu", Role::Student)).unwrap();
        let parts: Vec<&str> = token.split('.').collect();

        // Escalate the role while keeping the original signature.
        let payload = URL_SAFE_NO_PAD.decode(parts[1]).unwrap();
        let mut claims: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        claims["role"] = "admin".into();
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        assert_invalid(codec.verify(&forged));
    }

    #[test]
    fn rejects_tampered_signature() {
        let codec = codec();
        let token = codec.issue(&Identity::new(9, "s@saop.edu", Role::Student)).unwrap();
        let (head, signature) = token.rsplit_once('.').unwrap();

        let mut sig_bytes = URL_SAFE_NO_PAD.decode(signature).unwrap();
        sig_bytes[0] ^= 0x01;
        let forged = format!("{head}.{}", URL_SAFE_NO_PAD.encode(sig_bytes));

        assert_invalid(codec.verify(&forged));
    }

    #[test]
    fn rejects_garbage() {
        let codec = codec();
        assert_invalid(codec.verify(""));
        assert_invalid(codec.verify("not-a-token"));
        assert_invalid(codec.verify("a.b.c"));
    }

    #[test]
    fn rejects_unsigned_token() {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let claims = URL_SAFE_NO_PAD.encode(
            br#"{"userId":1,"email":"a@saop.edu","role":"admin","iat":1,"exp":9999999999,"jti":"x"}"#,
        );
        assert_invalid(codec().verify(&format!("{header}.{claims}.")));
    }

    #[test]
    fn rejects_expired_token() {
        let codec = codec();
        let identity = Identity::new(5, "late@saop.edu", Role::Student);
        let issued_at = Utc::now() - chrono::Duration::hours(25);
        let token = codec.issue_at(&identity, issued_at).unwrap();

        assert!(matches!(
            codec.verify(&token),
            Err(AuthError::InvalidToken(TokenRejection::Expired))
        ));
    }

    #[test]
    fn expiry_applies_to_short_ttls() {
        let codec = TokenCodec::new(SECRET, Duration::from_secs(60));
        let identity = Identity::new(5, "late@saop.edu", Role::Faculty);

        let fresh = codec.issue_at(&identity, Utc::now() - chrono::Duration::seconds(30)).unwrap();
        assert!(codec.verify(&fresh).is_ok());

        let stale = codec.issue_at(&identity, Utc::now() - chrono::Duration::seconds(61)).unwrap();
        assert_invalid(codec.verify(&stale));
    }

    #[test]
    fn debug_does_not_print_keys() {
        let rendered = format!("{:?}", codec());
        assert!(!rendered.contains("test-secret"));
    }
}
