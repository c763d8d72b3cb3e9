// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tracker page and its form actions.

use crate::error::{AppError, Result};
use crate::middleware::CurrentClient;
use crate::models::media::UnknownCategory;
use crate::models::MediaCategory;
use crate::views::{self, tracker::is_trigger_delta};
use crate::AppState;
use axum::{
    extract::State,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Extension, Form, Router,
};
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(show_tracker))
        .route("/tracker/adjust", post(adjust_score))
        .route("/tracker/reset", post(reset_scores))
}

/// Validate an adjustment request: a known category and a trigger delta.
pub(crate) fn parse_adjustment(category: &str, delta: i64) -> Result<MediaCategory> {
    let category: MediaCategory = category
        .parse()
        .map_err(|e: UnknownCategory| AppError::BadRequest(e.to_string()))?;
    if !is_trigger_delta(delta) {
        return Err(AppError::BadRequest(format!(
            "delta must be one of +5, +1 or -1, got {delta}"
        )));
    }
    Ok(category)
}

async fn show_tracker(
    State(state): State<Arc<AppState>>,
    Extension(CurrentClient(client)): Extension<CurrentClient>,
) -> Result<Response> {
    let auth = client.wait_ready(super::READY_WAIT).await;
    if !auth.ready {
        return Ok(Html(state.templates.connecting()?).into_response());
    }

    let page = views::tracker_page(&client.tracker().snapshot(), &auth);
    Ok(Html(state.templates.tracker(&page)?).into_response())
}

#[derive(Debug, Deserialize)]
struct AdjustForm {
    category: String,
    delta: i64,
}

async fn adjust_score(
    Extension(CurrentClient(client)): Extension<CurrentClient>,
    Form(form): Form<AdjustForm>,
) -> Result<Redirect> {
    let category = parse_adjustment(&form.category, form.delta)?;
    client.wait_ready(super::READY_WAIT).await;

    // Failures are reported through the page's status line.
    if let Err(e) = client.tracker().adjust_score(category, form.delta).await {
        tracing::debug!(client_id = %client.id(), error = %e, "Adjustment not saved");
    }
    Ok(Redirect::to("/"))
}

async fn reset_scores(Extension(CurrentClient(client)): Extension<CurrentClient>) -> Redirect {
    client.wait_ready(super::READY_WAIT).await;
    if let Err(e) = client.tracker().reset().await {
        tracing::debug!(client_id = %client.id(), error = %e, "Reset not saved");
    }
    Redirect::to("/")
}
