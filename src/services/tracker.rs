// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Personal tracker (scores per media category plus an activity log).
//!
//! Local state is updated optimistically and then persisted with a
//! merge-write; a live listener on the user's document reconciles local
//! state with whatever the store holds.

use std::sync::{Arc, Mutex};
use tokio::sync::watch;

use crate::db::{collections, CollectionPath, DocumentPath, MediaStore, UserSnapshot};
use crate::error::AppError;
use crate::models::{MediaCategory, MediaUser};
use crate::services::listener::ListenerHandle;
use crate::services::status::StatusLine;
use crate::time_utils::now_millis;

pub const STATUS_SAVED: &str = "Saved!";
pub const STATUS_SAVE_FAILED: &str = "Error saving data.";
pub const STATUS_NO_DATABASE: &str = "Error: Database not initialized.";
pub const STATUS_WAIT_FOR_AUTH: &str = "Please wait for user authentication.";
pub const STATUS_LISTEN_FAILED: &str = "Error listening to database.";

/// Local tracker state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerState {
    /// Identity the view is bound to
    pub user_id: Option<String>,
    /// Local record; `None` until bound
    pub record: Option<MediaUser>,
}

/// Everything a renderer needs, captured at one point in time.
#[derive(Debug, Clone)]
pub struct TrackerSnapshot {
    pub user_id: Option<String>,
    pub record: MediaUser,
    pub status: String,
}

struct TrackerShared {
    store: Option<Arc<dyn MediaStore>>,
    app_id: String,
    state: watch::Sender<TrackerState>,
    status: StatusLine,
}

impl TrackerShared {
    fn user_path(&self, user_id: &str) -> Result<DocumentPath, AppError> {
        CollectionPath::new(&self.app_id, collections::MEDIA_CHOICES)?.doc(user_id)
    }

    async fn apply_snapshot(&self, user_id: &str, snapshot: UserSnapshot) {
        match snapshot {
            Some(remote) => {
                self.state.send_if_modified(|state| {
                    // A listener being torn down may still deliver one event.
                    if state.user_id.as_deref() != Some(user_id) {
                        return false;
                    }
                    let current = state
                        .record
                        .take()
                        .unwrap_or_else(|| MediaUser::new_default(user_id, now_millis()));
                    state.record = Some(current.merged_with(remote));
                    true
                });
            }
            None => {
                // First visit: persist the local record, which is the
                // default unless an adjustment already raced ahead of us.
                let mut local = None;
                self.state.send_if_modified(|state| {
                    if state.user_id.as_deref() != Some(user_id) {
                        return false;
                    }
                    let record = state
                        .record
                        .get_or_insert_with(|| MediaUser::new_default(user_id, now_millis()));
                    local = Some(record.clone());
                    true
                });
                if let Some(local) = local {
                    let _ = self.save(user_id, &local).await;
                }
            }
        }
    }

    async fn save(&self, user_id: &str, user: &MediaUser) -> Result<(), AppError> {
        let Some(store) = &self.store else {
            self.status.set(STATUS_NO_DATABASE);
            return Err(AppError::NotInitialized);
        };

        let result = match self.user_path(user_id) {
            Ok(path) => store.set_user(&path, user).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                self.status.set(STATUS_SAVED);
                Ok(())
            }
            Err(e) => {
                tracing::error!(user_id, error = %e, "Error saving document");
                self.status.set(STATUS_SAVE_FAILED);
                Err(e)
            }
        }
    }
}

/// Tracker view state holder. Cheap to clone.
#[derive(Clone)]
pub struct TrackerView {
    shared: Arc<TrackerShared>,
    binding: Arc<Mutex<Option<ListenerHandle>>>,
    /// Held across a whole bind so overlapping binds run one at a time
    bind_lock: Arc<tokio::sync::Mutex<()>>,
}

impl TrackerView {
    pub fn new(store: Option<Arc<dyn MediaStore>>, app_id: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(TrackerShared {
                store,
                app_id: app_id.into(),
                state: watch::channel(TrackerState::default()).0,
                status: StatusLine::new(),
            }),
            binding: Arc::new(Mutex::new(None)),
            bind_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn state(&self) -> TrackerState {
        self.shared.state.borrow().clone()
    }

    /// Receiver notified on every local state change.
    pub fn watch(&self) -> watch::Receiver<TrackerState> {
        self.shared.state.subscribe()
    }

    pub fn status(&self) -> String {
        self.shared.status.get()
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        let state = self.state();
        let record = state.record.unwrap_or_else(|| {
            MediaUser::new_default(state.user_id.clone().unwrap_or_default(), now_millis())
        });
        TrackerSnapshot {
            user_id: state.user_id,
            record,
            status: self.status(),
        }
    }

    /// Whether a listener is currently attached.
    pub fn is_bound(&self) -> bool {
        self.binding
            .lock()
            .map(|b| b.is_some())
            .unwrap_or(false)
    }

    /// Attach to `user_id`'s document, replacing any previous binding.
    ///
    /// Binding to the identity already bound is a no-op, even if listening
    /// failed the first time. Binds are serialized; a subscription opened
    /// for an identity the view no longer holds is dropped.
    pub async fn bind(&self, user_id: &str) {
        let _bind = self.bind_lock.lock().await;
        if self.shared.state.borrow().user_id.as_deref() == Some(user_id) {
            return;
        }
        self.unbind();

        self.shared.state.send_replace(TrackerState {
            user_id: Some(user_id.to_string()),
            record: Some(MediaUser::new_default(user_id, now_millis())),
        });

        let Some(store) = self.shared.store.clone() else {
            return;
        };

        let path = match self.shared.user_path(user_id) {
            Ok(path) => path,
            Err(e) => {
                tracing::error!(user_id, error = %e, "Invalid tracker document path");
                self.shared.status.set(STATUS_LISTEN_FAILED);
                return;
            }
        };

        let mut subscription = match store.subscribe_user(&path).await {
            Ok(subscription) => subscription,
            Err(e) => {
                tracing::error!(path = %path, error = %e, "Firestore Listener Error");
                self.shared.status.set(STATUS_LISTEN_FAILED);
                return;
            }
        };

        let shared = self.shared.clone();
        let uid = user_id.to_string();
        let task = tokio::spawn(async move {
            while let Some(event) = subscription.next().await {
                match event {
                    Ok(snapshot) => shared.apply_snapshot(&uid, snapshot).await,
                    Err(e) => {
                        tracing::error!(user_id = %uid, error = %e, "Firestore Listener Error");
                        shared.status.set(STATUS_LISTEN_FAILED);
                    }
                }
            }
            tracing::debug!(user_id = %uid, "Tracker listener ended");
        });

        let handle = ListenerHandle::new(user_id, task);
        let Ok(mut binding) = self.binding.lock() else {
            return;
        };
        if self.shared.state.borrow().user_id.as_deref() != Some(user_id) {
            tracing::debug!(path = %path, "Tracker identity changed while binding");
            return;
        }
        *binding = Some(handle);
        tracing::debug!(path = %path, "Tracker bound");
    }

    /// Release the current listener, if any, and forget the identity.
    pub fn unbind(&self) {
        let previous = match self.binding.lock() {
            Ok(mut binding) => {
                let previous = binding.take();
                self.shared.state.send_modify(|state| state.user_id = None);
                previous
            }
            Err(_) => None,
        };
        if let Some(previous) = previous {
            tracing::debug!(user_id = %previous.key(), "Tracker unbound");
        }
    }

    fn current_user_id(&self) -> Option<String> {
        self.shared.state.borrow().user_id.clone()
    }

    /// Add `delta` to a category (floored at zero) and persist.
    ///
    /// The local record changes before the write is attempted and stays
    /// changed if the write fails.
    pub async fn adjust_score(&self, category: MediaCategory, delta: i64) -> Result<(), AppError> {
        let Some(user_id) = self.current_user_id() else {
            self.shared.status.set(STATUS_WAIT_FOR_AUTH);
            return Err(AppError::NotReady);
        };

        let mut updated = None;
        self.shared.state.send_modify(|state| {
            let record = state
                .record
                .get_or_insert_with(|| MediaUser::new_default(&user_id, now_millis()));
            record.apply_adjustment(category, delta, now_millis());
            updated = Some(record.clone());
        });
        let Some(updated) = updated else {
            return Err(AppError::NotReady);
        };

        tracing::debug!(user_id = %user_id, category = %category, delta, "Score adjusted");
        self.shared.save(&user_id, &updated).await
    }

    /// Zero every score, clear the log and persist.
    pub async fn reset(&self) -> Result<(), AppError> {
        let Some(user_id) = self.current_user_id() else {
            return Err(AppError::NotReady);
        };

        let fresh = MediaUser::new_default(&user_id, now_millis());
        self.shared.state.send_modify(|state| {
            state.record = Some(fresh.clone());
        });

        tracing::info!(user_id = %user_id, "Tracker reset");
        self.shared.save(&user_id, &fresh).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::{PartialChoices, RemoteUserDoc};
    use std::time::Duration;

    fn path(uid: &str) -> DocumentPath {
        CollectionPath::new("app", collections::MEDIA_CHOICES)
            .unwrap()
            .doc(uid)
            .unwrap()
    }

    async fn wait_until(view: &TrackerView, check: impl Fn(&TrackerState) -> bool) {
        let mut rx = view.watch();
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| check(s)))
            .await
            .expect("timed out waiting for tracker state")
            .expect("tracker state channel closed");
    }

    #[tokio::test]
    async fn test_adjust_without_identity_asks_to_wait() {
        let store = Arc::new(MemoryStore::new());
        let view = TrackerView::new(Some(store), "app");

        let err = view.adjust_score(MediaCategory::Books, 5).await.unwrap_err();
        assert!(matches!(err, AppError::NotReady));
        assert_eq!(view.status(), STATUS_WAIT_FOR_AUTH);
        assert!(matches!(view.reset().await, Err(AppError::NotReady)));
    }

    #[tokio::test]
    async fn test_missing_document_is_created_with_defaults() {
        let store = Arc::new(MemoryStore::new());
        let view = TrackerView::new(Some(store.clone()), "app");

        view.bind("u1").await;
        assert!(view.is_bound());

        for _ in 0..100 {
            if store.user_doc(&path("u1")).is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let stored = store.user_doc(&path("u1")).expect("default written");
        assert_eq!(stored.id.as_deref(), Some("u1"));
        assert_eq!(stored.logs, Some(vec![]));
        assert_eq!(stored.profile.unwrap().name, "Anonymous User");
    }

    /// Store holding a settled record for `uid`, and a view bound to it.
    async fn bound_view(uid: &str) -> (Arc<MemoryStore>, TrackerView) {
        let store = Arc::new(MemoryStore::new());
        store.seed_user_doc(&path(uid), RemoteUserDoc::from(&MediaUser::new_default(uid, 1)));
        let view = TrackerView::new(Some(store.clone()), "app");
        view.bind(uid).await;
        wait_until(&view, |s| s.record.as_ref().is_some_and(|r| r.last_activity == 1)).await;
        (store, view)
    }

    #[tokio::test]
    async fn test_adjust_is_persisted() {
        let (store, view) = bound_view("u1").await;

        view.adjust_score(MediaCategory::Books, 5).await.unwrap();
        view.adjust_score(MediaCategory::Books, 1).await.unwrap();

        assert_eq!(view.status(), STATUS_SAVED);
        let stored = store.user_doc(&path("u1")).unwrap();
        assert_eq!(stored.choices.unwrap().books.unwrap().score, 6);
        assert_eq!(stored.logs.unwrap().len(), 2);

        wait_until(&view, |s| {
            s.record
                .as_ref()
                .is_some_and(|r| r.choices.get(MediaCategory::Books).score == 6)
        })
        .await;
    }

    #[tokio::test]
    async fn test_failed_write_keeps_optimistic_state() {
        let (store, view) = bound_view("u1").await;

        store.set_fail_writes(true);
        let err = view.adjust_score(MediaCategory::Music, 5).await.unwrap_err();

        assert!(matches!(err, AppError::Database(_)));
        assert_eq!(view.status(), STATUS_SAVE_FAILED);
        assert_eq!(view.snapshot().record.choices.get(MediaCategory::Music).score, 5);
        let stored = store.user_doc(&path("u1")).unwrap();
        assert_eq!(stored.choices.unwrap().music.unwrap().score, 0);
    }

    #[tokio::test]
    async fn test_no_store_reports_database_not_initialized() {
        let view = TrackerView::new(None, "app");
        view.bind("u1").await;

        let err = view.adjust_score(MediaCategory::Podcasts, 1).await.unwrap_err();
        assert!(matches!(err, AppError::NotInitialized));
        assert_eq!(view.status(), STATUS_NO_DATABASE);
        assert_eq!(view.snapshot().record.choices.get(MediaCategory::Podcasts).score, 1);
    }

    #[tokio::test]
    async fn test_remote_partial_document_is_merged() {
        let store = Arc::new(MemoryStore::new());
        store.seed_user_doc(
            &path("u1"),
            RemoteUserDoc {
                choices: Some(PartialChoices {
                    movies: Some(crate::models::ChoiceScore { score: 7 }),
                    ..Default::default()
                }),
                ..Default::default()
            },
        );
        let view = TrackerView::new(Some(store.clone()), "app");
        view.bind("u1").await;

        wait_until(&view, |s| {
            s.record
                .as_ref()
                .is_some_and(|r| r.choices.get(MediaCategory::Movies).score == 7)
        })
        .await;

        let record = view.snapshot().record;
        assert_eq!(record.choices.get(MediaCategory::Books).score, 0);
        assert!(record.logs.is_empty());
        assert_eq!(record.id, "u1");
    }

    #[tokio::test]
    async fn test_listen_failure_sets_status() {
        let store = Arc::new(MemoryStore::new());
        store.set_fail_subscriptions(true);
        let view = TrackerView::new(Some(store), "app");

        view.bind("u1").await;
        assert!(!view.is_bound());
        assert_eq!(view.status(), STATUS_LISTEN_FAILED);
    }

    #[tokio::test]
    async fn test_reset_zeroes_scores() {
        let (store, view) = bound_view("u1").await;
        view.adjust_score(MediaCategory::Books, 5).await.unwrap();

        view.reset().await.unwrap();

        let stored = store.user_doc(&path("u1")).unwrap();
        assert_eq!(stored.logs, Some(vec![]));
        assert_eq!(stored.choices.unwrap().books.unwrap().score, 0);
        wait_until(&view, |s| {
            s.record
                .as_ref()
                .is_some_and(|r| r.total_score() == 0 && r.logs.is_empty())
        })
        .await;
    }

    #[tokio::test]
    async fn test_overlapping_binds_follow_the_latest_identity() {
        let store = Arc::new(MemoryStore::new());
        store.set_subscribe_delay(&path("old"), Duration::from_millis(100));
        store.seed_user_doc(&path("old"), {
            let mut old = MediaUser::new_default("old", 1);
            old.apply_adjustment(MediaCategory::Movies, 5, 2);
            RemoteUserDoc::from(&old)
        });
        store.seed_user_doc(&path("new"), RemoteUserDoc::from(&MediaUser::new_default("new", 1)));
        let view = TrackerView::new(Some(store.clone()), "app");

        let first = tokio::spawn({
            let view = view.clone();
            async move { view.bind("old").await }
        });
        wait_until(&view, |s| s.user_id.as_deref() == Some("old")).await;
        view.bind("new").await;
        first.await.unwrap();
        view.bind("new").await;

        assert_eq!(view.state().user_id.as_deref(), Some("new"));
        for _ in 0..100 {
            if store.active_listeners(&path("old")) == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(store.active_listeners(&path("old")), 0);
        assert_eq!(store.active_listeners(&path("new")), 1);

        // Nothing of the old identity's record leaks into the new one.
        view.adjust_score(MediaCategory::Books, 1).await.unwrap();
        let stored = store.user_doc(&path("new")).unwrap();
        let choices = stored.choices.unwrap();
        assert_eq!(choices.movies.map(|c| c.score), Some(0));
        assert_eq!(choices.books.map(|c| c.score), Some(1));
        assert_eq!(store.user_doc(&path("old")).unwrap().id.as_deref(), Some("old"));
    }

    #[tokio::test]
    async fn test_unbind_releases_listener() {
        let store = Arc::new(MemoryStore::new());
        let view = TrackerView::new(Some(store.clone()), "app");
        view.bind("u1").await;
        assert_eq!(store.active_listeners(&path("u1")), 1);

        view.bind("u2").await;
        for _ in 0..100 {
            if store.active_listeners(&path("u1")) == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(store.active_listeners(&path("u1")), 0);
        assert_eq!(store.active_listeners(&path("u2")), 1);

        view.unbind();
        for _ in 0..100 {
            if store.active_listeners(&path("u2")) == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(store.active_listeners(&path("u2")), 0);
    }
}
