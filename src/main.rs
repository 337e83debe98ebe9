// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use axum::Router;
use saop_auth::{
    api::router,
    auth::{password::hash_password, Role},
    config::{LogFormat, ServerConfig},
    state::AppState,
    store::{InMemoryStore, NewUser, UserStore},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{prelude::*, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let registry = tracing_subscriber::registry().with(env_filter);
    match LogFormat::from_env() {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Demo accounts, one per role. All share the password `demo123`.
const DEMO_ACCOUNTS: [(&str, &str, Role); 3] = [
    ("admin@saop.edu", "Ada", Role::Admin),
    ("faculty@saop.edu", "Fabian", Role::Faculty),
    ("demo@saop.edu", "Dana", Role::Student),
];

async fn seed_demo_users(store: &dyn UserStore) -> Result<(), Box<dyn std::error::Error>> {
    let password_hash = tokio::task::spawn_blocking(|| hash_password("demo123")).await??;
    for (email, first_name, role) in DEMO_ACCOUNTS {
        let record = store
            .insert_user(NewUser {
                email: email.to_string(),
                password_hash: password_hash.clone(),
                first_name: first_name.to_string(),
                last_name: "Demo".to_string(),
                role,
            })
            .await?;
        tracing::info!(user_id = record.id, email, %role, "seeded demo user");
    }
    tracing::warn!("demo users are seeded with a shared password; do not enable in production");
    Ok(())
}

/// Cancel `token` on ctrl-c or SIGTERM.
async fn cancel_on_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = token.cancelled() => return,
    }
    tracing::info!("shutdown signal received, draining connections");
    token.cancel();
}

/// Serve `app` until `shutdown` is cancelled, then drain open connections.
async fn serve(listener: TcpListener, app: Router, shutdown: CancellationToken) -> std::io::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = ServerConfig::from_env()?;
    tracing::debug!(?config, "configuration loaded");

    let store = Arc::new(InMemoryStore::new());
    if config.seed_demo_users {
        seed_demo_users(store.as_ref()).await?;
    }
    tracing::info!(users = store.len().await, "user store ready");

    let state = AppState::new(&config, store);
    let app = router(state);

    let listener = TcpListener::bind(config.bind).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        "SAOP auth server listening (docs at /docs)"
    );

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));
    let result = serve(listener, app, shutdown.clone()).await;
    // Stops the signal listener when the server exits on its own.
    shutdown.cancel();
    result?;

    tracing::info!("server stopped");
    Ok(())
}
