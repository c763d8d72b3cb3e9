// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Explicit end of a client session.

use crate::middleware::session::SESSION_COOKIE;
use crate::middleware::CurrentClient;
use crate::AppState;
use axum::{extract::State, response::Redirect, routing::post, Extension, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/session/end", post(end_session))
}

/// Tear the client session down (releasing its listeners) and drop the cookie.
async fn end_session(
    State(state): State<Arc<AppState>>,
    Extension(CurrentClient(client)): Extension<CurrentClient>,
    jar: CookieJar,
) -> (CookieJar, Redirect) {
    state.sessions.remove(client.id());
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, Redirect::to("/"))
}
