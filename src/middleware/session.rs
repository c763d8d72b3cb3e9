// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client session cookie middleware.
//!
//! The cookie holds an HS256 JWT whose subject is the client session id.
//! Requests without a valid cookie, or whose session is gone, get a fresh
//! client session and a new cookie. The session only signs in once a request
//! comes back carrying that cookie.

use crate::services::ClientSession;
use crate::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const SESSION_COOKIE: &str = "smc_session";

/// Cookie lifetime; the client session itself may be swept much earlier.
const SESSION_TOKEN_TTL_SECS: usize = 7 * 24 * 60 * 60;

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (client session id)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Client session attached to the current request.
#[derive(Clone)]
pub struct CurrentClient(pub Arc<ClientSession>);

/// Create a session token for a client session id.
pub fn create_session_token(client_id: &str, signing_key: &[u8]) -> anyhow::Result<String> {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as usize;

    let claims = Claims {
        sub: client_id.to_string(),
        iat: now,
        exp: now + SESSION_TOKEN_TTL_SECS,
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}

/// Client session id carried by a valid token.
pub fn verify_session_token(token: &str, signing_key: &[u8]) -> Option<String> {
    let key = DecodingKey::from_secret(signing_key);
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(token, &key, &validation)
        .ok()
        .map(|data| data.claims.sub)
}

/// Build the session cookie.
pub fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// Middleware that attaches (or starts) the caller's client session.
pub async fn attach_session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let known_id = jar
        .get(SESSION_COOKIE)
        .and_then(|cookie| verify_session_token(cookie.value(), &state.config.session_signing_key));

    let client = state.sessions.get_or_create(known_id.as_deref());
    let reissue = known_id.as_deref() != Some(client.id());
    if !reissue {
        client.start();
    }
    request
        .extensions_mut()
        .insert(CurrentClient(client.clone()));

    let response = next.run(request).await;
    if !reissue {
        return response;
    }

    match create_session_token(client.id(), &state.config.session_signing_key) {
        Ok(token) => (jar.add(session_cookie(token)), response).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to sign session cookie");
            response
        }
    }
}
