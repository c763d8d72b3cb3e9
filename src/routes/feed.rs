// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Suggestion feed page and its submit action.

use crate::error::Result;
use crate::middleware::CurrentClient;
use crate::views;
use crate::AppState;
use axum::{
    extract::State,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Extension, Form, Router,
};
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/feed", get(show_feed).post(submit_suggestion))
}

async fn show_feed(
    State(state): State<Arc<AppState>>,
    Extension(CurrentClient(client)): Extension<CurrentClient>,
) -> Result<Response> {
    let auth = client.wait_ready(super::READY_WAIT).await;
    if !auth.ready {
        return Ok(Html(state.templates.connecting()?).into_response());
    }

    client.ensure_feed_identity().await;

    let feed = client.feed();
    let page = views::feed_page(
        &feed.state(),
        &feed.status(),
        &client.auth(),
        chrono::Utc::now(),
    );
    Ok(Html(state.templates.feed(&page)?).into_response())
}

#[derive(Debug, Deserialize)]
struct SuggestionForm {
    #[serde(default)]
    text: String,
}

async fn submit_suggestion(
    Extension(CurrentClient(client)): Extension<CurrentClient>,
    Form(form): Form<SuggestionForm>,
) -> Redirect {
    client.wait_ready(super::READY_WAIT).await;
    client.ensure_feed_identity().await;

    match client.feed().submit(&form.text).await {
        Ok(outcome) => {
            tracing::debug!(client_id = %client.id(), ?outcome, "Suggestion form handled")
        }
        Err(e) => {
            tracing::debug!(client_id = %client.id(), error = %e, "Suggestion not saved")
        }
    }
    Redirect::to("/feed")
}
