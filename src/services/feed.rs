// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared suggestion feed.
//!
//! There is no optimistic insertion: a submitted suggestion shows up only
//! when the collection listener delivers it back.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

use crate::db::{collections, CollectionPath, MediaStore};
use crate::error::AppError;
use crate::models::suggestion::sort_newest_first;
use crate::models::{NewSuggestion, Suggestion};
use crate::services::listener::ListenerHandle;
use crate::services::status::StatusLine;

pub const STATUS_SUBMIT_FAILED: &str = "Error submitting suggestion.";
pub const STATUS_LISTEN_FAILED: &str = "Error listening to database.";

/// Local feed state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedState {
    /// Service-issued identity allowed to submit
    pub user_id: Option<String>,
    /// Newest first
    pub items: Vec<Suggestion>,
    /// Text typed but not yet accepted by the store
    pub draft: String,
    pub submitting: bool,
}

impl FeedState {
    /// Whether the submit control is enabled.
    pub fn can_submit(&self) -> bool {
        self.user_id.is_some() && !self.submitting
    }
}

/// Why a submission was not attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitRejection {
    NoIdentity,
    EmptyText,
    InFlight,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Written; carries the store-assigned id
    Submitted(String),
    Rejected(SubmitRejection),
}

struct FeedShared {
    store: Option<Arc<dyn MediaStore>>,
    app_id: String,
    state: watch::Sender<FeedState>,
    status: StatusLine,
    in_flight: AtomicBool,
}

impl FeedShared {
    fn collection(&self) -> Result<CollectionPath, AppError> {
        CollectionPath::new(&self.app_id, collections::SUGGESTIONS)
    }

    async fn write(&self, suggestion: &NewSuggestion) -> Result<String, AppError> {
        let store = self.store.as_ref().ok_or(AppError::NotInitialized)?;
        let path = self.collection()?;
        store.add_suggestion(&path, suggestion).await
    }
}

/// Clears the in-flight flag and the submitting indicator when dropped,
/// however the write ends.
struct InFlightGuard(Arc<FeedShared>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.in_flight.store(false, Ordering::SeqCst);
        self.0.state.send_modify(|state| state.submitting = false);
    }
}

/// Feed view state holder. Cheap to clone.
#[derive(Clone)]
pub struct FeedView {
    shared: Arc<FeedShared>,
    binding: Arc<Mutex<Option<ListenerHandle>>>,
    /// Held across a whole bind so overlapping binds run one at a time
    bind_lock: Arc<tokio::sync::Mutex<()>>,
}

impl FeedView {
    pub fn new(store: Option<Arc<dyn MediaStore>>, app_id: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(FeedShared {
                store,
                app_id: app_id.into(),
                state: watch::channel(FeedState::default()).0,
                status: StatusLine::new(),
                in_flight: AtomicBool::new(false),
            }),
            binding: Arc::new(Mutex::new(None)),
            bind_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn state(&self) -> FeedState {
        self.shared.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<FeedState> {
        self.shared.state.subscribe()
    }

    pub fn status(&self) -> String {
        self.shared.status.get()
    }

    pub fn is_bound(&self) -> bool {
        self.binding
            .lock()
            .map(|b| b.is_some())
            .unwrap_or(false)
    }

    /// Enable submissions for `user_id` and listen to the whole collection.
    ///
    /// Binds are serialized. If the view was unbound or rebound while the
    /// subscription was being opened, the new subscription is dropped.
    pub async fn bind(&self, user_id: &str) {
        let _bind = self.bind_lock.lock().await;
        if self.shared.state.borrow().user_id.as_deref() == Some(user_id) {
            return;
        }
        self.unbind();

        self.shared.state.send_modify(|state| {
            state.user_id = Some(user_id.to_string());
        });

        let Some(store) = self.shared.store.clone() else {
            return;
        };

        let path = match self.shared.collection() {
            Ok(path) => path,
            Err(e) => {
                tracing::error!(error = %e, "Invalid suggestions collection path");
                self.shared.status.set(STATUS_LISTEN_FAILED);
                return;
            }
        };

        let mut subscription = match store.subscribe_suggestions(&path).await {
            Ok(subscription) => subscription,
            Err(e) => {
                tracing::error!(path = %path, error = %e, "Firestore Listener Error");
                self.shared.status.set(STATUS_LISTEN_FAILED);
                return;
            }
        };

        let shared = self.shared.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = subscription.next().await {
                match event {
                    Ok(mut items) => {
                        sort_newest_first(&mut items);
                        shared.state.send_modify(|state| state.items = items);
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Firestore Listener Error");
                        shared.status.set(STATUS_LISTEN_FAILED);
                    }
                }
            }
        });

        let handle = ListenerHandle::new(user_id, task);
        let Ok(mut binding) = self.binding.lock() else {
            return;
        };
        if self.shared.state.borrow().user_id.as_deref() != Some(user_id) {
            tracing::debug!(path = %path, user_id, "Feed identity changed while binding");
            return;
        }
        *binding = Some(handle);
        tracing::debug!(path = %path, user_id, "Feed bound");
    }

    /// Release the listener and disable submissions.
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
            tracing::debug!(user_id = %previous.key(), "Feed unbound");
        }
    }

    /// Submit the given text as a new suggestion.
    ///
    /// The text becomes the draft. It is cleared only once the store
    /// accepted the write; rejections and failures keep it for a retry.
    pub async fn submit(&self, text: &str) -> Result<SubmitOutcome, AppError> {
        let mut user_id = None;
        self.shared.state.send_modify(|state| {
            state.draft = text.to_string();
            user_id = state.user_id.clone();
        });

        let Some(user_id) = user_id else {
            return Ok(SubmitOutcome::Rejected(SubmitRejection::NoIdentity));
        };
        let Some(suggestion) = NewSuggestion::new(text, user_id) else {
            return Ok(SubmitOutcome::Rejected(SubmitRejection::EmptyText));
        };

        if self
            .shared
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(SubmitOutcome::Rejected(SubmitRejection::InFlight));
        }
        self.shared.state.send_modify(|state| state.submitting = true);
        let guard = InFlightGuard(self.shared.clone());

        // The write runs on its own task: a caller that goes away (e.g. a
        // dropped request) neither cancels it nor leaves the flag set.
        let shared = self.shared.clone();
        let write = tokio::spawn(async move {
            let _guard = guard;
            match shared.write(&suggestion).await {
                Ok(id) => {
                    tracing::info!(id = %id, user_id = %suggestion.user_id, "Suggestion submitted");
                    shared.state.send_modify(|state| state.draft.clear());
                    Ok(id)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Error adding suggestion");
                    shared.status.set(STATUS_SUBMIT_FAILED);
                    Err(e)
                }
            }
        });

        match write.await {
            Ok(Ok(id)) => Ok(SubmitOutcome::Submitted(id)),
            Ok(Err(e)) => Err(e),
            Err(e) => Err(AppError::Internal(anyhow::anyhow!(
                "suggestion write task failed: {e}"
            ))),
        }
    }
}
