// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client sessions: one per browser, each owning a session bootstrap plus a
//! tracker and a feed view.
//!
//! Bootstrap is deferred until the browser proves it keeps the session
//! cookie, so cookieless traffic never signs in. From then on a background
//! task follows the session identity and (re)binds both views whenever it
//! changes. Tearing a client session down aborts that task and releases
//! every listener the views hold.

use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::db::MediaStore;
use crate::services::feed::FeedView;
use crate::services::identity::IdentityProvider;
use crate::services::session::{AuthState, Session};
use crate::services::tracker::TrackerView;

/// What every new client session is built from.
#[derive(Clone)]
pub struct ClientDeps {
    pub store: Option<Arc<dyn MediaStore>>,
    pub identity: Option<Arc<dyn IdentityProvider>>,
    pub app_id: String,
    pub initial_auth_token: Option<String>,
}

enum Follow {
    /// Created, bootstrap not yet started.
    Idle,
    Running(JoinHandle<()>),
    Stopped,
}

pub struct ClientSession {
    id: String,
    session: Arc<Session>,
    tracker: TrackerView,
    feed: FeedView,
    follow: Mutex<Follow>,
    last_seen: Mutex<Instant>,
}

impl ClientSession {
    /// Create the views. Nothing signs in until [`ClientSession::start`].
    pub fn new(id: String, deps: &ClientDeps) -> Arc<Self> {
        let session = Arc::new(Session::new(
            deps.identity.clone(),
            deps.initial_auth_token.clone(),
        ));
        let tracker = TrackerView::new(deps.store.clone(), deps.app_id.clone());
        let feed = FeedView::new(deps.store.clone(), deps.app_id.clone());

        tracing::debug!(client_id = %id, "Client session created");
        Arc::new(Self {
            id,
            session,
            tracker,
            feed,
            follow: Mutex::new(Follow::Idle),
            last_seen: Mutex::new(Instant::now()),
        })
    }

    /// Start bootstrap and the identity follower. Only the first call on a
    /// fresh session has any effect.
    pub fn start(&self) {
        let Ok(mut follow) = self.follow.lock() else {
            return;
        };
        if !matches!(*follow, Follow::Idle) {
            return;
        }

        *follow = Follow::Running(tokio::spawn(follow_identity(
            self.id.clone(),
            self.session.clone(),
            self.tracker.clone(),
            self.feed.clone(),
        )));
        tracing::info!(client_id = %self.id, "Client session started");
    }

    /// Whether the identity follower is live.
    pub fn is_running(&self) -> bool {
        self.follow
            .lock()
            .map(|f| matches!(*f, Follow::Running(_)))
            .unwrap_or(false)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn auth(&self) -> AuthState {
        self.session.state()
    }

    pub fn tracker(&self) -> &TrackerView {
        &self.tracker
    }

    pub fn feed(&self) -> &FeedView {
        &self.feed
    }

    /// Wait up to `timeout` for bootstrap to finish. Returns at once when
    /// bootstrap is not running.
    ///
    /// Once ready, the tracker is bound to the current identity before
    /// returning, so a request never races the identity follower.
    pub async fn wait_ready(&self, timeout: Duration) -> AuthState {
        if !self.is_running() {
            return self.auth();
        }
        let mut rx = self.session.watch();
        let _ = tokio::time::timeout(timeout, rx.wait_for(|s| s.ready)).await;

        let auth = self.auth();
        if let Some(uid) = auth.user_id() {
            self.tracker.bind(uid).await;
        }
        auth
    }

    /// Make sure the feed has a service-issued identity, retrying anonymous
    /// sign-in if bootstrap left it unset.
    pub async fn ensure_feed_identity(&self) {
        let auth = self.auth();
        if !auth.ready {
            return;
        }
        if let Some(uid) = auth.remote_user_id() {
            self.feed.bind(uid).await;
            return;
        }

        match self.session.retry_anonymous().await {
            Ok(identity) => self.feed.bind(&identity.uid).await,
            Err(e) => {
                tracing::debug!(client_id = %self.id, error = %e, "Feed identity still unset")
            }
        }
    }

    pub fn touch(&self) {
        if let Ok(mut last_seen) = self.last_seen.lock() {
            *last_seen = Instant::now();
        }
    }

    pub fn idle_for(&self) -> Duration {
        self.last_seen
            .lock()
            .map(|t| t.elapsed())
            .unwrap_or_default()
    }

    /// Stop following the identity and release both views' listeners.
    /// Safe to call more than once.
    pub fn teardown(&self) {
        let previous = match self.follow.lock() {
            Ok(mut follow) => std::mem::replace(&mut *follow, Follow::Stopped),
            Err(_) => return,
        };
        if let Follow::Running(task) = previous {
            task.abort();
            self.tracker.unbind();
            self.feed.unbind();
            tracing::info!(client_id = %self.id, "Client session torn down");
        }
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Bootstrap, then rebind both views on every identity change.
async fn follow_identity(id: String, session: Arc<Session>, tracker: TrackerView, feed: FeedView) {
    let mut rx = session.watch();
    session.bootstrap().await;

    loop {
        let auth = rx.borrow_and_update().clone();
        match &auth.identity {
            Some(identity) => {
                tracker.bind(&identity.uid).await;
                if identity.is_remote() {
                    feed.bind(&identity.uid).await;
                } else {
                    feed.unbind();
                }
            }
            None => {
                tracker.unbind();
                feed.unbind();
            }
        }
        tracing::debug!(client_id = %id, uid = ?auth.user_id(), "Views follow identity");

        if rx.changed().await.is_err() {
            break;
        }
    }
}

/// Concurrent registry of live client sessions.
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<ClientSession>>,
    deps: ClientDeps,
}

impl SessionRegistry {
    pub fn new(deps: ClientDeps) -> Self {
        Self {
            sessions: DashMap::new(),
            deps,
        }
    }

    /// Look up a live session, or create a fresh, not yet started one under
    /// a new id.
    pub fn get_or_create(&self, id: Option<&str>) -> Arc<ClientSession> {
        if let Some(existing) = id.and_then(|id| self.sessions.get(id)) {
            existing.touch();
            return existing.clone();
        }

        let id = uuid::Uuid::new_v4().to_string();
        let client = ClientSession::new(id.clone(), &self.deps);
        self.sessions.insert(id, client.clone());
        client
    }

    pub fn get(&self, id: &str) -> Option<Arc<ClientSession>> {
        self.sessions.get(id).map(|c| c.clone())
    }

    /// Tear down and forget a session. Returns whether it existed.
    pub fn remove(&self, id: &str) -> bool {
        match self.sessions.remove(id) {
            Some((_, client)) => {
                client.teardown();
                true
            }
            None => false,
        }
    }

    /// Tear down every session idle longer than `max_idle`.
    pub fn sweep_idle(&self, max_idle: Duration) -> usize {
        let idle: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().idle_for() > max_idle)
            .map(|entry| entry.key().clone())
            .collect();

        let removed = idle.iter().filter(|id| self.remove(id)).count();
        if removed > 0 {
            tracing::info!(removed, remaining = self.len(), "Swept idle client sessions");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Periodically sweep idle sessions until the registry is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, max_idle: Duration) -> JoinHandle<()> {
        let registry = Arc::downgrade(self);
        let period = (max_idle / 4).max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                registry.sweep_idle(max_idle);
            }
        })
    }
}
