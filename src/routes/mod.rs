// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP route handlers.

pub mod api;
pub mod feed;
pub mod session;
pub mod tracker;

use crate::middleware::attach_session;
use crate::AppState;
use axum::{middleware, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// How long a request waits for session bootstrap before answering with the
/// "connecting" placeholder (pages) or `503` (API).
pub const READY_WAIT: Duration = Duration::from_millis(750);

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(feature = "binding-generation", ts(export, export_to = "bindings/"))]
pub struct HealthResponse {
    pub status: String,
    pub build_id: String,
    pub store_enabled: bool,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub client_sessions: usize,
}

/// Health check response
async fn health_check(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
) -> Json<HealthResponse> {
    let build_id = option_env!("BUILD_ID").unwrap_or("unknown").to_string();
    Json(HealthResponse {
        status: "ok".to_string(),
        build_id,
        store_enabled: state.store.is_some(),
        client_sessions: state.sessions.len(),
    })
}

/// Build the complete router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    // Everything except the health check runs inside a client session
    let session_routes = Router::new()
        .merge(tracker::routes())
        .merge(feed::routes())
        .merge(session::routes())
        .merge(api::routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), attach_session));

    Router::new()
        .route("/health", get(health_check))
        .merge(session_routes)
        .layer(middleware::from_fn(
            crate::middleware::security::add_security_headers,
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
