// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::{
    body::Body,
    http::{header, Request},
    response::Response,
};
use smart_media_choices::config::Config;
use smart_media_choices::db::{FirestoreDb, MediaStore, MemoryStore};
use smart_media_choices::error::AppError;
use smart_media_choices::routes::create_router;
use smart_media_choices::services::{Identity, IdentityProvider, LocalIdentityProvider};
use smart_media_choices::AppState;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Identity service that is always down.
#[allow(dead_code)]
pub struct UnreachableIdentityProvider;

#[async_trait::async_trait]
impl IdentityProvider for UnreachableIdentityProvider {
    async fn exchange_token(&self, _token: &str) -> Result<Identity, AppError> {
        Err(AppError::Auth("identity service unreachable".to_string()))
    }

    async fn sign_in_anonymous(&self) -> Result<Identity, AppError> {
        Err(AppError::Auth("identity service unreachable".to_string()))
    }
}

/// Local identities, counting every sign-in attempt.
#[allow(dead_code)]
#[derive(Default)]
pub struct CountingIdentityProvider {
    sign_ins: AtomicUsize,
}

#[allow(dead_code)]
impl CountingIdentityProvider {
    pub fn sign_ins(&self) -> usize {
        self.sign_ins.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IdentityProvider for CountingIdentityProvider {
    async fn exchange_token(&self, token: &str) -> Result<Identity, AppError> {
        self.sign_ins.fetch_add(1, Ordering::SeqCst);
        LocalIdentityProvider.exchange_token(token).await
    }

    async fn sign_in_anonymous(&self) -> Result<Identity, AppError> {
        self.sign_ins.fetch_add(1, Ordering::SeqCst);
        LocalIdentityProvider.sign_in_anonymous().await
    }
}

/// Create a test app over an in-memory store with local identities.
/// Returns the router, the shared state and the store.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let (app, state) = create_test_app_with(
        Some(store.clone()),
        Some(Arc::new(LocalIdentityProvider)),
    );
    (app, state, store)
}

/// Create a test app from explicit adapters; `None` leaves them unconfigured.
#[allow(dead_code)]
pub fn create_test_app_with(
    store: Option<Arc<MemoryStore>>,
    identity: Option<Arc<dyn IdentityProvider>>,
) -> (axum::Router, Arc<AppState>) {
    let store = store.map(|s| s as Arc<dyn MediaStore>);
    let state = Arc::new(
        AppState::new(Config::default(), store, identity).expect("Failed to build app state"),
    );
    (create_router(state.clone()), state)
}

#[allow(dead_code)]
pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

#[allow(dead_code)]
pub fn post_form(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[allow(dead_code)]
pub fn post_json(uri: &str, body: serde_json::Value, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[allow(dead_code)]
pub fn set_cookie_headers(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .collect()
}

/// `name=value` pair of the session cookie set by a response, ready to be
/// sent back in a `Cookie` header.
#[allow(dead_code)]
pub fn session_cookie_pair(response: &Response) -> String {
    set_cookie_headers(response)
        .into_iter()
        .find(|value| value.starts_with("smc_session="))
        .and_then(|value| value.split(';').next().map(str::to_string))
        .unwrap_or_else(|| panic!("missing session cookie: {:?}", response.headers()))
}

#[allow(dead_code)]
pub async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[allow(dead_code)]
pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}
