// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Smart Media Choices server
//!
//! Serves the personal media tracker and the shared suggestion feed, backed
//! by Firestore (or an in-memory store for local development).

use smart_media_choices::{build_identity, build_store, config::Config, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        app_id = %config.app_id,
        backend = ?config.store_backend,
        "Starting Smart Media Choices"
    );
    if config.firebase.is_none() {
        tracing::warn!("FIREBASE_CONFIG not set; sign-in and Firestore are disabled");
    }

    let store = build_store(&config).await;
    let identity = build_identity(&config);

    // Build shared state
    let state = Arc::new(AppState::new(config.clone(), store, identity)?);

    // Tear down client sessions nobody has used for a while
    let _sweeper = state.sessions.spawn_sweeper(config.session_idle_timeout);

    // Build router
    let app = smart_media_choices::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("smart_media_choices=debug,info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .init();
}
