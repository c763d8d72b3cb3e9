// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Tracker documents (`mediaChoices/{uid}`, merge-written)
//! - Suggestions (`suggestions`, append-only)
//! - Real-time listeners for both, bridged into [`Subscription`]s

use chrono::{DateTime, Utc};
use firestore::{FirestoreListenEvent, FirestoreListenerTarget, FirestoreMemListenStateStorage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::db::{
    CollectionPath, DocumentPath, MediaStore, Subscription, SuggestionsSnapshot, UserSnapshot,
};
use crate::error::AppError;
use crate::models::{MediaCategory, MediaUser, NewSuggestion, RemoteUserDoc, Suggestion};

/// Update mask of a tracker merge-write. Choices are masked per category,
/// so keys of the stored map outside the known categories survive.
fn user_update_mask() -> Vec<String> {
    let mut fields = vec!["id".to_string(), "lastActivity".to_string()];
    fields.extend(
        MediaCategory::ALL
            .into_iter()
            .map(|category| format!("choices.{category}")),
    );
    fields.extend(["logs".to_string(), "profile".to_string()]);
    fields
}

/// Server-stamped field of a suggestion document.
const SUGGESTION_TIMESTAMP: &str = "timestamp";

const USER_TARGET: FirestoreListenerTarget = FirestoreListenerTarget::new(1);
const SUGGESTIONS_TARGET: FirestoreListenerTarget = FirestoreListenerTarget::new(2);

/// Suggestion as stored in Firestore. The id is the document name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SuggestionDoc {
    text: String,
    user_id: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "firestore::serialize_as_optional_timestamp"
    )]
    timestamp: Option<DateTime<Utc>>,
}

impl SuggestionDoc {
    /// Document body for a new suggestion. The timestamp is left out and
    /// set by the server through a request-time transform.
    fn for_write(suggestion: &NewSuggestion) -> Self {
        Self {
            text: suggestion.text.clone(),
            user_id: suggestion.user_id.clone(),
            timestamp: None,
        }
    }

    fn into_suggestion(self, id: String) -> Suggestion {
        Suggestion {
            id,
            text: self.text,
            user_id: self.user_id,
            timestamp: self.timestamp,
        }
    }
}

/// Last segment of a full document name.
fn document_id(name: &str) -> String {
    name.rsplit('/').next().unwrap_or(name).to_string()
}

fn db_error(e: impl std::fmt::Display) -> AppError {
    AppError::Database(e.to_string())
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // The emulator accepts any token; skip credential discovery entirely.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    /// Parent document of a collection: `artifacts/{appId}/public/data`.
    fn parent_path(
        client: &firestore::FirestoreDb,
        path: &CollectionPath,
    ) -> Result<firestore::ParentPathBuilder, AppError> {
        client
            .parent_path(super::paths::ROOT_COLLECTION, path.app_id())
            .and_then(|p| p.at(super::paths::PUBLIC_COLLECTION, super::paths::DATA_DOCUMENT))
            .map_err(db_error)
    }

    // ─── Suggestion Queries ──────────────────────────────────────

    /// Read every suggestion in a collection.
    async fn list_suggestions(
        &self,
        path: &CollectionPath,
    ) -> Result<BTreeMap<String, Suggestion>, AppError> {
        let client = self.get_client()?;
        let parent = Self::parent_path(client, path)?;

        let docs = client
            .fluent()
            .select()
            .from(path.collection())
            .parent(&parent)
            .query()
            .await
            .map_err(db_error)?;

        let mut items = BTreeMap::new();
        for doc in docs {
            let id = document_id(&doc.name);
            match firestore::FirestoreDb::deserialize_doc_to::<SuggestionDoc>(&doc) {
                Ok(parsed) => {
                    items.insert(id.clone(), parsed.into_suggestion(id));
                }
                Err(e) => {
                    tracing::warn!(id = %id, error = %e, "Skipping malformed suggestion");
                }
            }
        }
        Ok(items)
    }
}

#[async_trait::async_trait]
impl MediaStore for FirestoreDb {
    // ─── Tracker Documents ───────────────────────────────────────

    async fn get_user(&self, path: &DocumentPath) -> Result<UserSnapshot, AppError> {
        let client = self.get_client()?;
        let parent = Self::parent_path(client, path.collection())?;

        client
            .fluent()
            .select()
            .by_id_in(path.collection().collection())
            .parent(&parent)
            .obj()
            .one(path.doc_id())
            .await
            .map_err(db_error)
    }

    async fn set_user(&self, path: &DocumentPath, user: &MediaUser) -> Result<(), AppError> {
        let client = self.get_client()?;
        let parent = Self::parent_path(client, path.collection())?;

        let _: () = client
            .fluent()
            .update()
            .fields(user_update_mask())
            .in_col(path.collection().collection())
            .document_id(path.doc_id())
            .parent(&parent)
            .object(user)
            .execute()
            .await
            .map_err(db_error)?;

        tracing::debug!(path = %path, "Tracker document written");
        Ok(())
    }

    // ─── Suggestions ─────────────────────────────────────────────

    async fn add_suggestion(
        &self,
        path: &CollectionPath,
        suggestion: &NewSuggestion,
    ) -> Result<String, AppError> {
        let client = self.get_client()?;
        let parent = Self::parent_path(client, path)?;
        let id = uuid::Uuid::new_v4().simple().to_string();

        let doc = SuggestionDoc::for_write(suggestion);

        let _: () = client
            .fluent()
            .update()
            .in_col(path.collection())
            .document_id(&id)
            .parent(&parent)
            .object(&doc)
            .transforms(|t| {
                t.fields([t
                    .field(SUGGESTION_TIMESTAMP)
                    .server_value(firestore::FirestoreTransformServerValue::RequestTime)])
            })
            .execute()
            .await
            .map_err(db_error)?;

        tracing::info!(path = %path, id = %id, "Suggestion added");
        Ok(id)
    }

    // ─── Listeners ───────────────────────────────────────────────

    async fn subscribe_user(
        &self,
        path: &DocumentPath,
    ) -> Result<Subscription<UserSnapshot>, AppError> {
        let client = self.get_client()?.clone();
        let parent = Self::parent_path(&client, path.collection())?;

        // Listening to a missing document yields no events, so the current
        // state is read explicitly first.
        let initial = self.get_user(path).await?;

        let mut listener = client
            .create_listener(FirestoreMemListenStateStorage::new())
            .await
            .map_err(db_error)?;

        client
            .fluent()
            .select()
            .by_id_in(path.collection().collection())
            .parent(&parent)
            .batch_listen([path.doc_id().to_string()])
            .add_target(USER_TARGET, &mut listener)
            .map_err(db_error)?;

        let (feed, subscription) = Subscription::channel();
        let events = feed.events;
        let _ = events.send(Ok(initial));

        let tx = events.clone();
        listener
            .start(move |event| {
                let tx = tx.clone();
                async move {
                    match event {
                        FirestoreListenEvent::DocumentChange(ref change) => {
                            if let Some(doc) = &change.document {
                                let snapshot =
                                    firestore::FirestoreDb::deserialize_doc_to::<RemoteUserDoc>(
                                        doc,
                                    )
                                    .map(Some)
                                    .map_err(db_error);
                                let _ = tx.send(snapshot);
                            }
                        }
                        FirestoreListenEvent::DocumentDelete(_) => {
                            let _ = tx.send(Ok(None));
                        }
                        _ => {}
                    }
                    Ok(())
                }
            })
            .await
            .map_err(db_error)?;

        let doc_path = path.to_string();
        let stop = feed.stop;
        tokio::spawn(async move {
            let _ = stop.await;
            if let Err(e) = listener.shutdown().await {
                tracing::warn!(path = %doc_path, error = %e, "Failed to shut down listener");
            }
            tracing::debug!(path = %doc_path, "Tracker listener released");
        });

        tracing::debug!(path = %path, "Tracker listener started");
        Ok(subscription)
    }

    async fn subscribe_suggestions(
        &self,
        path: &CollectionPath,
    ) -> Result<Subscription<SuggestionsSnapshot>, AppError> {
        let client = self.get_client()?.clone();
        let parent = Self::parent_path(&client, path)?;

        let known = Arc::new(Mutex::new(self.list_suggestions(path).await?));

        let mut listener = client
            .create_listener(FirestoreMemListenStateStorage::new())
            .await
            .map_err(db_error)?;

        client
            .fluent()
            .select()
            .from(path.collection())
            .parent(&parent)
            .listen()
            .add_target(SUGGESTIONS_TARGET, &mut listener)
            .map_err(db_error)?;

        let (feed, subscription) = Subscription::channel();
        let events = feed.events;
        let initial: SuggestionsSnapshot = known
            .lock()
            .map(|items| items.values().cloned().collect())
            .unwrap_or_default();
        let _ = events.send(Ok(initial));

        let tx = events.clone();
        listener
            .start(move |event| {
                let tx = tx.clone();
                let known = known.clone();
                async move {
                    let changed = match event {
                        FirestoreListenEvent::DocumentChange(ref change) => {
                            match &change.document {
                                Some(doc) => {
                                    let id = document_id(&doc.name);
                                    match firestore::FirestoreDb::deserialize_doc_to::<
                                        SuggestionDoc,
                                    >(doc)
                                    {
                                        Ok(parsed) => {
                                            if let Ok(mut items) = known.lock() {
                                                items.insert(
                                                    id.clone(),
                                                    parsed.into_suggestion(id),
                                                );
                                            }
                                            true
                                        }
                                        Err(e) => {
                                            let _ = tx.send(Err(db_error(e)));
                                            false
                                        }
                                    }
                                }
                                None => false,
                            }
                        }
                        FirestoreListenEvent::DocumentDelete(ref deleted) => {
                            if let Ok(mut items) = known.lock() {
                                items.remove(&document_id(&deleted.document));
                            }
                            true
                        }
                        _ => false,
                    };

                    if changed {
                        let snapshot: SuggestionsSnapshot = known
                            .lock()
                            .map(|items| items.values().cloned().collect())
                            .unwrap_or_default();
                        let _ = tx.send(Ok(snapshot));
                    }
                    Ok(())
                }
            })
            .await
            .map_err(db_error)?;

        let collection_path = path.to_string();
        let stop = feed.stop;
        tokio::spawn(async move {
            let _ = stop.await;
            if let Err(e) = listener.shutdown().await {
                tracing::warn!(path = %collection_path, error = %e, "Failed to shut down listener");
            }
            tracing::debug!(path = %collection_path, "Suggestions listener released");
        });

        tracing::debug!(path = %path, "Suggestions listener started");
        Ok(subscription)
    }
}
