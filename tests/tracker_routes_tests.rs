// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tracker page, form actions and JSON API, driven through the router
//! over the in-memory store.

use axum::http::{header, StatusCode};
use serde_json::json;
use smart_media_choices::db::{collections, CollectionPath, DocumentPath};
use std::time::Duration;
use tower::ServiceExt;

mod common;
use common::{body_json, body_string, create_test_app, get, post_form, post_json};

fn user_path(uid: &str) -> DocumentPath {
    CollectionPath::new("test-app", collections::MEDIA_CHOICES)
        .unwrap()
        .doc(uid)
        .unwrap()
}

/// Start a client session; returns its cookie and tracker uid.
///
/// The first, cookieless call only issues the cookie. Sign-in starts when
/// the cookie comes back.
async fn start_session(app: &axum::Router) -> (String, String) {
    let response = app.clone().oneshot(get("/api/tracker", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let cookie = common::session_cookie_pair(&response);

    let response = app
        .clone()
        .oneshot(get("/api/tracker", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let uid = body["user_id"].as_str().expect("tracker identity").to_string();
    (cookie, uid)
}

/// Poll the tracker API until `check` holds.
async fn tracker_eventually(
    app: &axum::Router,
    cookie: &str,
    check: impl Fn(&serde_json::Value) -> bool,
) -> serde_json::Value {
    let mut last = serde_json::Value::Null;
    for _ in 0..200 {
        let response = app
            .clone()
            .oneshot(get("/api/tracker", Some(cookie)))
            .await
            .unwrap();
        last = body_json(response).await;
        if check(&last) {
            return last;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("tracker never reached the expected state: {last}");
}

fn score(body: &serde_json::Value, category: &str) -> u64 {
    body["scores"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["category"] == category)
        .and_then(|s| s["score"].as_u64())
        .unwrap_or_else(|| panic!("no score for {category}: {body}"))
}

#[tokio::test]
async fn test_health_check_does_not_start_a_session() {
    let (app, state, _) = create_test_app();

    let response = app.oneshot(get("/health", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store_enabled"], true);
    assert_eq!(body["client_sessions"], 0);
    assert!(state.sessions.is_empty());
}

#[tokio::test]
async fn test_first_visit_renders_tracker_page() {
    let (app, state, _) = create_test_app();

    let response = app.clone().oneshot(get("/", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = common::session_cookie_pair(&response);
    let html = body_string(response).await;
    assert!(html.contains("Connecting to the cloud..."));
    assert!(html.contains("http-equiv=\"refresh\""));

    // The refresh carries the cookie back, which signs the session in.
    let response = app.oneshot(get("/", Some(&cookie))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
    let html = body_string(response).await;
    assert!(html.contains("Total Affinity"));
    assert!(html.contains("How to Use Smart Media Choices"));
    assert!(html.contains("No activity yet. Start scoring your media!"));
    for category in ["books", "movies", "music", "podcasts"] {
        assert!(html.contains(&format!("id=\"card-{category}\"")), "{category}");
    }
    assert_eq!(state.sessions.len(), 1);
}

#[tokio::test]
async fn test_cookie_reuses_the_client_session() {
    let (app, state, _) = create_test_app();
    let (cookie, uid) = start_session(&app).await;

    let response = app
        .clone()
        .oneshot(get("/api/tracker", Some(&cookie)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
    let body = body_json(response).await;
    assert_eq!(body["user_id"], uid.as_str());
    assert_eq!(state.sessions.len(), 1);
}

#[tokio::test]
async fn test_adjust_form_redirects_and_persists() {
    let (app, _, store) = create_test_app();
    let (cookie, uid) = start_session(&app).await;

    let response = app
        .clone()
        .oneshot(post_form(
            "/tracker/adjust",
            "category=books&delta=5",
            Some(&cookie),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");

    let body = tracker_eventually(&app, &cookie, |b| score(b, "books") == 5).await;
    assert_eq!(body["total_score"], 5);

    let stored = store.user_doc(&user_path(&uid)).expect("stored record");
    let choices = stored.choices.expect("stored choices");
    assert_eq!(choices.books.map(|c| c.score), Some(5));

    let html = body_string(app.oneshot(get("/", Some(&cookie))).await.unwrap()).await;
    assert!(html.contains("+5 books"));
}

#[tokio::test]
async fn test_adjust_rejects_unknown_category_and_delta() {
    let (app, _, _) = create_test_app();
    let (cookie, _) = start_session(&app).await;

    for body in ["category=games&delta=1", "category=books&delta=3"] {
        let response = app
            .clone()
            .oneshot(post_form("/tracker/adjust", body, Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
    }

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/tracker/adjust",
            json!({ "category": "movies", "delta": 10 }),
            Some(&cookie),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "bad_request");
}

#[tokio::test]
async fn test_api_score_never_goes_below_zero() {
    let (app, _, _) = create_test_app();
    let (cookie, _) = start_session(&app).await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/tracker/adjust",
            json!({ "category": "music", "delta": -1 }),
            Some(&cookie),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = tracker_eventually(&app, &cookie, |b| {
        b["logs"].as_array().is_some_and(|l| !l.is_empty())
    })
    .await;
    assert_eq!(score(&body, "music"), 0);
    assert_eq!(body["logs"][0]["message"], "-1 music");
}

#[tokio::test]
async fn test_api_log_keeps_last_ten_entries() {
    let (app, _, _) = create_test_app();
    let (cookie, _) = start_session(&app).await;

    for _ in 0..12 {
        let response = app
            .clone()
            .oneshot(post_json(
                "/api/tracker/adjust",
                json!({ "category": "podcasts", "delta": 1 }),
                Some(&cookie),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let body = tracker_eventually(&app, &cookie, |b| score(b, "podcasts") == 12).await;
    let logs = body["logs"].as_array().unwrap();
    assert_eq!(logs.len(), 10);
    assert!(logs.iter().all(|l| l["message"] == "+1 podcasts"));
    assert_eq!(body["status"], "Saved!");
}

#[tokio::test]
async fn test_reset_clears_scores_and_log() {
    let (app, _, store) = create_test_app();
    let (cookie, uid) = start_session(&app).await;

    app.clone()
        .oneshot(post_json(
            "/api/tracker/adjust",
            json!({ "category": "movies", "delta": 5 }),
            Some(&cookie),
        ))
        .await
        .unwrap();
    tracker_eventually(&app, &cookie, |b| score(b, "movies") == 5).await;

    let response = app
        .clone()
        .oneshot(post_form("/tracker/reset", "", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let body = tracker_eventually(&app, &cookie, |b| b["total_score"] == 0).await;
    assert!(body["logs"].as_array().unwrap().is_empty());

    let stored = store.user_doc(&user_path(&uid)).expect("stored record");
    assert_eq!(stored.logs, Some(Vec::new()));
    assert_eq!(stored.id.as_deref(), Some(uid.as_str()));
}
