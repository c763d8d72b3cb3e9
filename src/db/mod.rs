//! Database layer: document paths, the store abstraction and its adapters.

pub mod firestore;
pub mod memory;
pub mod paths;
pub mod subscription;

pub use firestore::FirestoreDb;
pub use memory::MemoryStore;
pub use paths::{CollectionPath, DocumentPath};
pub use subscription::{Subscription, SubscriptionFeed};

use crate::error::AppError;
use crate::models::{MediaUser, NewSuggestion, RemoteUserDoc, Suggestion};

/// Collection names as constants.
pub mod collections {
    /// Per-user tracker documents (keyed by uid)
    pub const MEDIA_CHOICES: &str = "mediaChoices";
    /// Shared suggestion feed
    pub const SUGGESTIONS: &str = "suggestions";
}

/// Snapshot of a single tracker document; `None` when it does not exist.
pub type UserSnapshot = Option<RemoteUserDoc>;

/// Snapshot of the whole suggestion collection, in no particular order.
pub type SuggestionsSnapshot = Vec<Suggestion>;

/// Document store consumed by the views.
#[async_trait::async_trait]
pub trait MediaStore: Send + Sync {
    /// Read a tracker document.
    async fn get_user(&self, path: &DocumentPath) -> Result<UserSnapshot, AppError>;

    /// Merge-write a tracker record: the record's fields replace the stored
    /// ones, any other stored field is left untouched.
    async fn set_user(&self, path: &DocumentPath, user: &MediaUser) -> Result<(), AppError>;

    /// Append a suggestion; returns the id assigned by the store.
    async fn add_suggestion(
        &self,
        path: &CollectionPath,
        suggestion: &NewSuggestion,
    ) -> Result<String, AppError>;

    /// Listen to a tracker document. The current state is delivered first.
    async fn subscribe_user(
        &self,
        path: &DocumentPath,
    ) -> Result<Subscription<UserSnapshot>, AppError>;

    /// Listen to a whole suggestion collection. Every event is a full snapshot.
    async fn subscribe_suggestions(
        &self,
        path: &CollectionPath,
    ) -> Result<Subscription<SuggestionsSnapshot>, AppError>;
}
