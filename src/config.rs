// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `3000` |
//! | `JWT_SECRET` | HMAC token signing secret (32+ bytes) | Required |
//! | `JWT_TTL_SECS` | Token lifetime in seconds | `86400` |
//! | `LOGIN_MAX_FAILURES` | Failed logins before lockout | `5` |
//! | `LOGIN_LOCKOUT_BASE_SECS` | First lockout length | `30` |
//! | `LOGIN_LOCKOUT_MAX_SECS` | Longest lockout | `900` |
//! | `SEED_DEMO_USERS` | Seed `admin@`, `faculty@` and `demo@saop.edu` (student) | `false` |
//! | `CORS_ALLOWED_ORIGINS` | Comma-separated browser origins allowed to call the API | `http://localhost:8080` |
//! | `DEMO_PASSWORD` | Demo login password (`dev` builds only) | Unset |
//! | `SAOP_API_URL` | Client API base URL | `http://localhost:3000/api` |
//! | `SAOP_API_TIMEOUT_SECS` | Client request timeout | `15` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use axum::http::HeaderValue;
use url::Url;

use crate::auth::throttle::ThrottleConfig;
use crate::auth::token::{DEFAULT_TOKEN_TTL, MIN_SECRET_LEN};

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";
pub const JWT_TTL_ENV: &str = "JWT_TTL_SECS";
pub const LOGIN_MAX_FAILURES_ENV: &str = "LOGIN_MAX_FAILURES";
pub const LOGIN_LOCKOUT_BASE_ENV: &str = "LOGIN_LOCKOUT_BASE_SECS";
pub const LOGIN_LOCKOUT_MAX_ENV: &str = "LOGIN_LOCKOUT_MAX_SECS";
pub const SEED_DEMO_USERS_ENV: &str = "SEED_DEMO_USERS";
pub const DEMO_PASSWORD_ENV: &str = "DEMO_PASSWORD";
pub const API_URL_ENV: &str = "SAOP_API_URL";
pub const API_TIMEOUT_ENV: &str = "SAOP_API_TIMEOUT_SECS";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";
pub const CORS_ORIGINS_ENV: &str = "CORS_ALLOWED_ORIGINS";

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";
pub const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_CORS_ORIGINS: &str = "http://localhost:8080";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
    }
}

fn parse_flag(lookup: &impl Fn(&str) -> Option<String>, name: &'static str) -> Result<bool, ConfigError> {
    match lookup(name).as_deref().map(str::trim) {
        None | Some("") => Ok(false),
        Some(v) if v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes") => Ok(true),
        Some(v) if v == "0" || v.eq_ignore_ascii_case("false") || v.eq_ignore_ascii_case("no") => Ok(false),
        Some(v) => Err(ConfigError::Invalid {
            name,
            reason: format!("expected a boolean, got {v:?}"),
        }),
    }
}

/// Parse a comma-separated origin list into `scheme://host[:port]` values.
fn parse_origins(raw: &str) -> Result<Vec<HeaderValue>, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        name: CORS_ORIGINS_ENV,
        reason,
    };
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let url = Url::parse(entry).map_err(|e| invalid(format!("{entry:?}: {e}")))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(invalid(format!("{entry:?} is not an http(s) origin")));
            }
            HeaderValue::from_str(&url.origin().ascii_serialization())
                .map_err(|e| invalid(format!("{entry:?}: {e}")))
        })
        .collect()
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    pub fn from_env() -> Self {
        match std::env::var(LOG_FORMAT_ENV) {
            Ok(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Server settings.
#[derive(Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub jwt_secret: Vec<u8>,
    pub token_ttl: Duration,
    pub throttle: ThrottleConfig,
    pub seed_demo_users: bool,
    pub demo_password: Option<String>,
    /// Browser origins admitted by CORS.
    pub cors_origins: Vec<HeaderValue>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind", &self.bind)
            .field("token_ttl", &self.token_ttl)
            .field("throttle", &self.throttle)
            .field("seed_demo_users", &self.seed_demo_users)
            .field("cors_origins", &self.cors_origins)
            .field("demo_password", &self.demo_password.as_ref().map(|_| "<set>"))
            .finish_non_exhaustive()
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host: IpAddr = parse_var(&lookup, HOST_ENV, IpAddr::from([0, 0, 0, 0]))?;
        let port: u16 = parse_var(&lookup, PORT_ENV, DEFAULT_PORT)?;

        let jwt_secret = lookup(JWT_SECRET_ENV)
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing(JWT_SECRET_ENV))?
            .into_bytes();
        if jwt_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Invalid {
                name: JWT_SECRET_ENV,
                reason: format!("must be at least {MIN_SECRET_LEN} bytes"),
            });
        }

        let ttl_secs: u64 = parse_var(&lookup, JWT_TTL_ENV, DEFAULT_TOKEN_TTL.as_secs())?;
        if ttl_secs == 0 {
            return Err(ConfigError::Invalid {
                name: JWT_TTL_ENV,
                reason: "must be positive".to_string(),
            });
        }

        let defaults = ThrottleConfig::default();
        let throttle = ThrottleConfig {
            max_failures: parse_var(&lookup, LOGIN_MAX_FAILURES_ENV, defaults.max_failures)?.max(1),
            base_lockout: Duration::from_secs(parse_var(
                &lookup,
                LOGIN_LOCKOUT_BASE_ENV,
                defaults.base_lockout.as_secs(),
            )?),
            max_lockout: Duration::from_secs(parse_var(
                &lookup,
                LOGIN_LOCKOUT_MAX_ENV,
                defaults.max_lockout.as_secs(),
            )?),
        };

        Ok(Self {
            bind: SocketAddr::new(host, port),
            jwt_secret,
            token_ttl: Duration::from_secs(ttl_secs),
            throttle,
            seed_demo_users: parse_flag(&lookup, SEED_DEMO_USERS_ENV)?,
            demo_password: lookup(DEMO_PASSWORD_ENV).filter(|p| !p.is_empty()),
            cors_origins: parse_origins(
                &lookup(CORS_ORIGINS_ENV).unwrap_or_else(|| DEFAULT_CORS_ORIGINS.to_string()),
            )?,
        })
    }
}

/// Client library settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root, always ending in `/` so relative paths join beneath it
    pub base_url: Url,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let base_url = Url::parse(&format!("{trimmed}/")).map_err(|e| ConfigError::Invalid {
            name: API_URL_ENV,
            reason: e.to_string(),
        })?;
        Ok(Self { base_url, timeout })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let url = lookup(API_URL_ENV).unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let timeout_secs: u64 = parse_var(&lookup, API_TIMEOUT_ENV, DEFAULT_API_TIMEOUT.as_secs())?;
        Self::new(&url, Duration::from_secs(timeout_secs.max(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn server_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[(JWT_SECRET_ENV, SECRET)])).unwrap();
        assert_eq!(config.bind, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(config.token_ttl, Duration::from_secs(86_400));
        assert_eq!(config.throttle, ThrottleConfig::default());
        assert!(!config.seed_demo_users);
        assert!(config.demo_password.is_none());
    }

    #[test]
    fn secret_is_required() {
        let err = ServerConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(JWT_SECRET_ENV)));
    }

    #[test]
    fn short_secret_is_rejected() {
        let err = ServerConfig::from_lookup(lookup(&[(JWT_SECRET_ENV, "change-me")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: JWT_SECRET_ENV, .. }));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = ServerConfig::from_lookup(lookup(&[
            (JWT_SECRET_ENV, SECRET),
            (HOST_ENV, "127.0.0.1"),
            (PORT_ENV, "8081"),
            (JWT_TTL_ENV, "3600"),
            (LOGIN_MAX_FAILURES_ENV, "3"),
            (SEED_DEMO_USERS_ENV, "true"),
        ]))
        .unwrap();
        assert_eq!(config.bind, "127.0.0.1:8081".parse().unwrap());
        assert_eq!(config.token_ttl, Duration::from_secs(3600));
        assert_eq!(config.throttle.max_failures, 3);
        assert!(config.seed_demo_users);
    }

    #[test]
    fn bad_numbers_are_errors() {
        let err = ServerConfig::from_lookup(lookup(&[(JWT_SECRET_ENV, SECRET), (PORT_ENV, "http")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: PORT_ENV, .. }));

        let err = ServerConfig::from_lookup(lookup(&[(JWT_SECRET_ENV, SECRET), (JWT_TTL_ENV, "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: JWT_TTL_ENV, .. }));
    }

    #[test]
    fn cors_origins_default_to_local_frontend() {
        let config = ServerConfig::from_lookup(lookup(&[(JWT_SECRET_ENV, SECRET)])).unwrap();
        assert_eq!(config.cors_origins, vec![HeaderValue::from_static("http://localhost:8080")]);
    }

    #[test]
    fn cors_origins_are_normalised() {
        let config = ServerConfig::from_lookup(lookup(&[
            (JWT_SECRET_ENV, SECRET),
            (CORS_ORIGINS_ENV, "https://portal.saop.edu/, http://localhost:5173 ,"),
        ]))
        .unwrap();
        assert_eq!(
            config.cors_origins,
            vec![
                HeaderValue::from_static("https://portal.saop.edu"),
                HeaderValue::from_static("http://localhost:5173"),
            ]
        );
    }

    #[test]
    fn cors_origins_reject_non_http_entries() {
        for bad in ["*", "portal.saop.edu", "file:///tmp/index.html"] {
            let err = ServerConfig::from_lookup(lookup(&[(JWT_SECRET_ENV, SECRET), (CORS_ORIGINS_ENV, bad)]))
                .unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { name: CORS_ORIGINS_ENV, .. }), "{bad}");
        }
    }

    #[test]
    fn debug_hides_secrets() {
        let config = ServerConfig::from_lookup(lookup(&[
            (JWT_SECRET_ENV, SECRET),
            (DEMO_PASSWORD_ENV, "open-sesame"),
        ]))
        .unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains(SECRET));
        assert!(!rendered.contains("open-sesame"));
    }

    #[test]
    fn client_base_url_gets_trailing_slash() {
        let config = ClientConfig::from_lookup(lookup(&[(API_URL_ENV, "https://portal.saop.edu/api")])).unwrap();
        assert_eq!(config.base_url.as_str(), "https://portal.saop.edu/api/");
        assert_eq!(
            config.base_url.join("auth/login").unwrap().as_str(),
            "https://portal.saop.edu/api/auth/login"
        );
    }

    #[test]
    fn client_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.base_url.as_str(), "http://localhost:3000/api/");
        assert_eq!(config.timeout, DEFAULT_API_TIMEOUT);
    }

    #[test]
    fn client_rejects_bad_url() {
        assert!(ClientConfig::new("not a url", DEFAULT_API_TIMEOUT).is_err());
    }
}
