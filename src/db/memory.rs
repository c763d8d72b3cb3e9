//! Process-local document store.
//!
//! Backs `STORE_BACKEND=memory` and the test suite. Every document and
//! collection is a `watch` channel, so listeners always see the latest
//! snapshot and writes never block on slow readers.

use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::db::{
    CollectionPath, DocumentPath, MediaStore, Subscription, SuggestionsSnapshot, UserSnapshot,
};
use crate::error::AppError;
use crate::models::{MediaUser, NewSuggestion, RemoteUserDoc, Suggestion};

/// In-memory store with failure and latency injection and listener
/// accounting.
pub struct MemoryStore {
    users: DashMap<String, watch::Sender<UserSnapshot>>,
    suggestions: DashMap<String, watch::Sender<SuggestionsSnapshot>>,
    listeners: Arc<DashMap<String, usize>>,
    fail_writes: AtomicBool,
    fail_subscriptions: AtomicBool,
    writes_paused: watch::Sender<bool>,
    subscribe_delays: DashMap<String, Duration>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            users: DashMap::new(),
            suggestions: DashMap::new(),
            listeners: Arc::new(DashMap::new()),
            fail_writes: AtomicBool::new(false),
            fail_subscriptions: AtomicBool::new(false),
            writes_paused: watch::channel(false).0,
            subscribe_delays: DashMap::new(),
        }
    }
}

/// Keeps the listener count for a path while a listener task runs.
struct ListenerGuard {
    listeners: Arc<DashMap<String, usize>>,
    key: String,
}

impl ListenerGuard {
    fn register(listeners: &Arc<DashMap<String, usize>>, key: String) -> Self {
        *listeners.entry(key.clone()).or_insert(0) += 1;
        Self {
            listeners: listeners.clone(),
            key,
        }
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(mut count) = self.listeners.get_mut(&self.key) {
            *count = count.saturating_sub(1);
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent subscribe call fail.
    pub fn set_fail_subscriptions(&self, fail: bool) {
        self.fail_subscriptions.store(fail, Ordering::SeqCst);
    }

    /// Hold every write until [`MemoryStore::resume_writes`].
    pub fn pause_writes(&self) {
        self.writes_paused.send_replace(true);
    }

    pub fn resume_writes(&self) {
        self.writes_paused.send_replace(false);
    }

    /// Delay every subscribe call on a document or collection path.
    pub fn set_subscribe_delay(&self, path: &impl ToString, delay: Duration) {
        self.subscribe_delays.insert(path.to_string(), delay);
    }

    /// Store a raw (possibly partial) tracker document.
    pub fn seed_user_doc(&self, path: &DocumentPath, doc: RemoteUserDoc) {
        self.user_slot(path).send_replace(Some(doc));
    }

    /// Store a suggestion exactly as given, bypassing id/timestamp assignment.
    pub fn seed_suggestion(&self, path: &CollectionPath, suggestion: Suggestion) {
        self.suggestion_slot(path)
            .send_modify(|items| items.push(suggestion));
    }

    /// Current raw tracker document.
    pub fn user_doc(&self, path: &DocumentPath) -> UserSnapshot {
        self.users
            .get(&path.to_string())
            .and_then(|slot| slot.borrow().clone())
    }

    /// Current suggestions, in insertion order.
    pub fn suggestions(&self, path: &CollectionPath) -> SuggestionsSnapshot {
        self.suggestions
            .get(&path.to_string())
            .map(|slot| slot.borrow().clone())
            .unwrap_or_default()
    }

    /// Number of live listeners on a document or collection path.
    pub fn active_listeners(&self, path: &impl ToString) -> usize {
        self.listeners
            .get(&path.to_string())
            .map(|count| *count)
            .unwrap_or(0)
    }

    fn user_slot(
        &self,
        path: &DocumentPath,
    ) -> dashmap::mapref::one::RefMut<'_, String, watch::Sender<UserSnapshot>> {
        self.users
            .entry(path.to_string())
            .or_insert_with(|| watch::channel(None).0)
    }

    fn suggestion_slot(
        &self,
        path: &CollectionPath,
    ) -> dashmap::mapref::one::RefMut<'_, String, watch::Sender<SuggestionsSnapshot>> {
        self.suggestions
            .entry(path.to_string())
            .or_insert_with(|| watch::channel(Vec::new()).0)
    }

    async fn wait_for_writes(&self) {
        let mut paused = self.writes_paused.subscribe();
        let _ = paused.wait_for(|paused| !*paused).await;
    }

    async fn subscribe_delay(&self, key: &str) {
        let delay = self.subscribe_delays.get(key).map(|d| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn check_writable(&self) -> Result<(), AppError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Database("write rejected (injected failure)".into()));
        }
        Ok(())
    }

    fn check_listenable(&self) -> Result<(), AppError> {
        if self.fail_subscriptions.load(Ordering::SeqCst) {
            return Err(AppError::Database("listen rejected (injected failure)".into()));
        }
        Ok(())
    }

    /// Forward every change of a watch channel into a fresh subscription.
    fn forward<T>(&self, key: String, mut rx: watch::Receiver<T>) -> Subscription<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let (feed, subscription) = Subscription::channel();
        let guard = ListenerGuard::register(&self.listeners, key);

        tokio::spawn(async move {
            let _guard = guard;
            let events = feed.events;
            let mut stop = feed.stop;

            let initial = rx.borrow_and_update().clone();
            if events.send(Ok(initial)).is_err() {
                return;
            }

            loop {
                tokio::select! {
                    _ = &mut stop => break,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let snapshot = rx.borrow_and_update().clone();
                        if events.send(Ok(snapshot)).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        subscription
    }
}

#[async_trait::async_trait]
impl MediaStore for MemoryStore {
    async fn get_user(&self, path: &DocumentPath) -> Result<UserSnapshot, AppError> {
        Ok(self.user_doc(path))
    }

    async fn set_user(&self, path: &DocumentPath, user: &MediaUser) -> Result<(), AppError> {
        self.wait_for_writes().await;
        self.check_writable()?;
        let update = RemoteUserDoc::from(user);
        self.user_slot(path).send_modify(|doc| {
            if let Some(existing) = doc.as_mut() {
                existing.merge(update);
            } else {
                *doc = Some(update);
            }
        });
        tracing::debug!(path = %path, "Stored tracker document");
        Ok(())
    }

    async fn add_suggestion(
        &self,
        path: &CollectionPath,
        suggestion: &NewSuggestion,
    ) -> Result<String, AppError> {
        self.wait_for_writes().await;
        self.check_writable()?;
        let id = uuid::Uuid::new_v4().simple().to_string();
        // Stamped under the collection lock, so stamps follow insertion order.
        self.suggestion_slot(path).send_modify(|items| {
            items.push(Suggestion {
                id: id.clone(),
                text: suggestion.text.clone(),
                user_id: suggestion.user_id.clone(),
                timestamp: Some(Utc::now()),
            })
        });
        tracing::debug!(path = %path, id = %id, "Stored suggestion");
        Ok(id)
    }

    async fn subscribe_user(
        &self,
        path: &DocumentPath,
    ) -> Result<Subscription<UserSnapshot>, AppError> {
        self.subscribe_delay(&path.to_string()).await;
        self.check_listenable()?;
        let rx = self.user_slot(path).subscribe();
        Ok(self.forward(path.to_string(), rx))
    }

    async fn subscribe_suggestions(
        &self,
        path: &CollectionPath,
    ) -> Result<Subscription<SuggestionsSnapshot>, AppError> {
        self.subscribe_delay(&path.to_string()).await;
        self.check_listenable()?;
        let rx = self.suggestion_slot(path).subscribe();
        Ok(self.forward(path.to_string(), rx))
    }
}
