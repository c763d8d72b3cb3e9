//! Shared suggestion feed entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A suggestion as delivered by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    /// Assigned by the store, never changes
    pub id: String,
    pub text: String,
    pub user_id: String,
    /// Assigned by the store; `None` while the write is still pending
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Suggestion {
    /// Sort key: a pending timestamp counts as the epoch.
    fn sort_millis(&self) -> i64 {
        self.timestamp.map(|t| t.timestamp_millis()).unwrap_or(0)
    }
}

/// What the feed writes; id and timestamp come from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSuggestion {
    pub text: String,
    pub user_id: String,
}

impl NewSuggestion {
    /// Trim the text and refuse empty submissions.
    pub fn new(text: &str, user_id: impl Into<String>) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        Some(Self {
            text: text.to_string(),
            user_id: user_id.into(),
        })
    }
}

/// Order a snapshot for display: newest first, pending entries last.
pub fn sort_newest_first(items: &mut [Suggestion]) {
    items.sort_by_key(|s| std::cmp::Reverse(s.sort_millis()));
}
