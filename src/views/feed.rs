//! Feed page view model.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::Suggestion;
use crate::services::{AuthState, FeedState};
use crate::time_utils::format_relative;

pub const EMPTY_FEED_TEXT: &str = "No suggestions yet. Be the first to share one!";

/// Decorative icon picked from a suggestion's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FeedIcon {
    #[serde(rename = "film")]
    Film,
    #[serde(rename = "book-open")]
    Book,
    #[serde(rename = "message-square")]
    Generic,
}

/// Case-insensitive substring match, film keywords first. Words are not
/// split, so "thread" contains "read" and gets the book icon.
pub fn icon_for(text: &str) -> FeedIcon {
    let text = text.to_lowercase();
    if text.contains("movie") || text.contains("film") {
        FeedIcon::Film
    } else if text.contains("book") || text.contains("read") {
        FeedIcon::Book
    } else {
        FeedIcon::Generic
    }
}

#[derive(Debug, Serialize)]
pub struct FeedItemView {
    pub id: String,
    pub text: String,
    pub user_id: String,
    pub icon: FeedIcon,
    pub when: String,
}

#[derive(Debug, Serialize)]
pub struct FeedPage {
    /// Service-issued identity, or `None` while unset
    pub identity: Option<String>,
    pub items: Vec<FeedItemView>,
    pub draft: String,
    pub can_submit: bool,
    pub submitting: bool,
    pub status: String,
    pub empty_text: &'static str,
}

fn item_view(item: &Suggestion, now: DateTime<Utc>) -> FeedItemView {
    FeedItemView {
        id: item.id.clone(),
        text: item.text.clone(),
        user_id: item.user_id.clone(),
        icon: icon_for(&item.text),
        when: format_relative(item.timestamp, now),
    }
}

pub fn feed_page(
    state: &FeedState,
    status: &str,
    auth: &AuthState,
    now: DateTime<Utc>,
) -> FeedPage {
    FeedPage {
        identity: auth.remote_user_id().map(str::to_string),
        items: state.items.iter().map(|item| item_view(item, now)).collect(),
        draft: state.draft.clone(),
        can_submit: state.can_submit(),
        submitting: state.submitting,
        status: status.to_string(),
        empty_text: EMPTY_FEED_TEXT,
    }
}
