// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JSON API over the caller's client session.
//!
//! Unlike the HTML forms, failed operations surface as error responses; the
//! status line is still updated as it would be for the page.

use crate::error::{AppError, Result};
use crate::middleware::CurrentClient;
use crate::routes::tracker::parse_adjustment;
use crate::services::{ClientSession, SubmitOutcome, SubmitRejection};
use crate::time_utils::format_utc_rfc3339;
use crate::views::{icon_for, FeedIcon};
use crate::AppState;
use axum::{
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/tracker", get(get_tracker))
        .route("/api/tracker/adjust", post(adjust_score))
        .route("/api/tracker/reset", post(reset_scores))
        .route("/api/feed", get(get_feed).post(submit_suggestion))
}

// ─── Tracker ─────────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(feature = "binding-generation", ts(export, export_to = "bindings/"))]
pub struct CategoryScoreResponse {
    pub category: String,
    pub score: u32,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(feature = "binding-generation", ts(export, export_to = "bindings/"))]
pub struct LogEntryResponse {
    pub message: String,
    /// Epoch millis
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub timestamp: i64,
}

/// Tracker state of the calling client session.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(feature = "binding-generation", ts(export, export_to = "bindings/"))]
pub struct TrackerResponse {
    pub user_id: Option<String>,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_score: u64,
    pub scores: Vec<CategoryScoreResponse>,
    /// Oldest first
    pub logs: Vec<LogEntryResponse>,
    /// Empty when there is nothing to report
    pub status: String,
}

#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(feature = "binding-generation", ts(export, export_to = "bindings/"))]
pub struct AdjustRequest {
    pub category: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub delta: i64,
}

async fn ready_client(client: &ClientSession) -> Result<()> {
    let auth = client.wait_ready(super::READY_WAIT).await;
    if auth.ready {
        Ok(())
    } else {
        Err(AppError::NotReady)
    }
}

fn tracker_response(client: &ClientSession) -> TrackerResponse {
    let snapshot = client.tracker().snapshot();
    let record = snapshot.record;
    TrackerResponse {
        user_id: client.auth().user_id().map(str::to_string),
        total_score: record.total_score(),
        scores: record
            .choices
            .iter()
            .map(|(category, choice)| CategoryScoreResponse {
                category: category.to_string(),
                score: choice.score,
            })
            .collect(),
        logs: record
            .logs
            .into_iter()
            .map(|entry| LogEntryResponse {
                message: entry.message,
                timestamp: entry.timestamp,
            })
            .collect(),
        status: snapshot.status,
    }
}

async fn get_tracker(
    Extension(CurrentClient(client)): Extension<CurrentClient>,
) -> Result<Json<TrackerResponse>> {
    ready_client(&client).await?;
    Ok(Json(tracker_response(&client)))
}

async fn adjust_score(
    Extension(CurrentClient(client)): Extension<CurrentClient>,
    Json(request): Json<AdjustRequest>,
) -> Result<Json<TrackerResponse>> {
    let category = parse_adjustment(&request.category, request.delta)?;
    ready_client(&client).await?;

    client.tracker().adjust_score(category, request.delta).await?;
    Ok(Json(tracker_response(&client)))
}

async fn reset_scores(
    Extension(CurrentClient(client)): Extension<CurrentClient>,
) -> Result<Json<TrackerResponse>> {
    ready_client(&client).await?;

    client.tracker().reset().await?;
    Ok(Json(tracker_response(&client)))
}

// ─── Feed ────────────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(feature = "binding-generation", ts(export, export_to = "bindings/"))]
#[serde(rename_all = "camelCase")]
pub struct SuggestionResponse {
    pub id: String,
    pub text: String,
    pub user_id: String,
    /// RFC3339; `None` while the store has not assigned it yet
    pub timestamp: Option<String>,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub icon: FeedIcon,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(feature = "binding-generation", ts(export, export_to = "bindings/"))]
#[serde(rename_all = "camelCase")]
pub struct FeedResponse {
    /// Service-issued identity, if any
    pub user_id: Option<String>,
    pub can_submit: bool,
    /// Newest first
    pub items: Vec<SuggestionResponse>,
    pub status: String,
}

#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(feature = "binding-generation", ts(export, export_to = "bindings/"))]
pub struct SubmitRequest {
    pub text: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(feature = "binding-generation", ts(export, export_to = "bindings/"))]
pub struct SubmitResponse {
    pub id: String,
}

async fn get_feed(
    Extension(CurrentClient(client)): Extension<CurrentClient>,
) -> Result<Json<FeedResponse>> {
    ready_client(&client).await?;
    client.ensure_feed_identity().await;

    let feed = client.feed();
    let state = feed.state();
    Ok(Json(FeedResponse {
        user_id: client.auth().remote_user_id().map(str::to_string),
        can_submit: state.can_submit(),
        items: state
            .items
            .into_iter()
            .map(|item| SuggestionResponse {
                icon: icon_for(&item.text),
                timestamp: item.timestamp.map(format_utc_rfc3339),
                id: item.id,
                text: item.text,
                user_id: item.user_id,
            })
            .collect(),
        status: feed.status(),
    }))
}

async fn submit_suggestion(
    Extension(CurrentClient(client)): Extension<CurrentClient>,
    Json(request): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>)> {
    ready_client(&client).await?;
    client.ensure_feed_identity().await;

    match client.feed().submit(&request.text).await? {
        SubmitOutcome::Submitted(id) => Ok((StatusCode::CREATED, Json(SubmitResponse { id }))),
        SubmitOutcome::Rejected(SubmitRejection::EmptyText) => Err(AppError::BadRequest(
            "suggestion text must not be empty".to_string(),
        )),
        SubmitOutcome::Rejected(SubmitRejection::NoIdentity) => Err(AppError::NotReady),
        SubmitOutcome::Rejected(SubmitRejection::InFlight) => Err(AppError::BadRequest(
            "a submission is already in flight".to_string(),
        )),
    }
}
