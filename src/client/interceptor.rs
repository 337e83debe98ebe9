// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP client for the portal API.
//!
//! Every request built through [`ApiClient::request`] carries the current
//! session token, and every response passes through [`ApiClient::send`]:
//! a 401 clears the session and sends the user to the login page before the
//! caller sees [`ClientError::Unauthorized`] with the server's message.

use std::sync::Arc;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use super::session::{SessionError, SessionStore};
use crate::auth::{Identity, Role};
use crate::config::ClientConfig;
use crate::models::{AuthResponse, ErrorResponse, LoginRequest, VerifyResponse};

/// Client route of the login page.
pub const LOGIN_PATH: &str = "/login";

/// Where the client sends the user after a session ends.
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}

impl<F> Navigator for F
where
    F: Fn(&str) + Send + Sync,
{
    fn navigate(&self, path: &str) {
        self(path)
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    /// The server rejected the session; it has already been cleared.
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },
    #[error("request failed ({status}): {message}")]
    Status { status: StatusCode, message: String },
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),
    #[error("unexpected response body: {0}")]
    Decode(#[source] reqwest::Error),
    #[error("invalid request path: {0}")]
    Path(#[from] url::ParseError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Attach `token` as a bearer credential, if there is one.
pub fn authorize(builder: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => builder.bearer_auth(token),
        None => builder,
    }
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    session: SessionStore,
    navigator: Arc<dyn Navigator>,
}

impl ApiClient {
    pub fn new(
        config: &ClientConfig,
        session: SessionStore,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ClientError::Network)?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            session,
            navigator,
        })
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    /// Start a request to `path` (relative to the API root) with the
    /// current session token attached.
    pub fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let url = self.url(path)?;
        let token = self.session.token();
        Ok(authorize(self.http.request(method, url), token.as_deref()))
    }

    pub async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let response = request.send().await.map_err(ClientError::Network)?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            let message = error_message(response).await;
            self.end_session();
            return Err(ClientError::Unauthorized { message });
        }
        if !status.is_success() {
            let message = error_message(response).await;
            return Err(ClientError::Status { status, message });
        }
        Ok(response)
    }

    fn end_session(&self) {
        if let Err(e) = self.session.clear() {
            tracing::warn!(error = %e, "failed to clear session after 401");
        }
        self.navigator.navigate(LOGIN_PATH);
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self.send(self.request(Method::GET, path)?).await?;
        response.json().await.map_err(ClientError::Decode)
    }

    /// Log in and store the resulting session.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<AuthResponse, ClientError> {
        let request = self
            .request(Method::POST, "auth/login")?
            .json(&LoginRequest::new(email, password, role));
        let auth: AuthResponse = self
            .send(request)
            .await?
            .json()
            .await
            .map_err(ClientError::Decode)?;

        self.session.save(&auth.token, &auth.user)?;
        tracing::debug!(user_id = auth.user.id, role = %auth.user.role, "signed in");
        Ok(auth)
    }

    pub async fn verify(&self) -> Result<Identity, ClientError> {
        let response: VerifyResponse = self.get_json("auth/verify").await?;
        Ok(response.user)
    }

    /// Drop the local session. Tokens are stateless, so the server is not told.
    pub fn logout(&self) -> Result<(), ClientError> {
        self.session.clear()?;
        self.navigator.navigate(LOGIN_PATH);
        Ok(())
    }
}

async fn error_message(response: Response) -> String {
    let status = response.status();
    let fallback = || {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    };
    match response.json::<ErrorResponse>().await {
        Ok(body) => body.message.or(body.error).unwrap_or_else(fallback),
        Err(_) => fallback(),
    }
}
