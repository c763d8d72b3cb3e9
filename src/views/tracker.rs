//! Tracker page view model.

use serde::Serialize;

use crate::models::{MediaCategory, MediaUser};
use crate::services::{AuthState, TrackerSnapshot};
use crate::time_utils::format_clock;

pub const SYNCED_LABEL: &str = "Synced";
pub const LOADING_LABEL: &str = "Loading...";
pub const EMPTY_LOG_TEXT: &str = "No activity yet. Start scoring your media!";

/// The three adjustment triggers on every card.
pub const TRIGGERS: [(i64, &str); 3] = [(5, "+5 (Love It)"), (1, "+1"), (-1, "-1")];

/// Whether `delta` is one of the trigger magnitudes.
pub fn is_trigger_delta(delta: i64) -> bool {
    TRIGGERS.iter().any(|(d, _)| *d == delta)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreBand {
    Low,
    Medium,
    High,
}

pub fn score_band(score: u32) -> ScoreBand {
    if score > 15 {
        ScoreBand::High
    } else if score > 5 {
        ScoreBand::Medium
    } else {
        ScoreBand::Low
    }
}

pub fn category_icon(category: MediaCategory) -> &'static str {
    match category {
        MediaCategory::Books => "book-open",
        MediaCategory::Movies => "film",
        MediaCategory::Music => "music",
        MediaCategory::Podcasts => "mic",
    }
}

#[derive(Debug, Serialize)]
pub struct HeaderView {
    pub total_score: u64,
    /// Shown only once the auth gate is ready
    pub identity: Option<String>,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct TriggerView {
    pub delta: i64,
    pub label: &'static str,
}

#[derive(Debug, Serialize)]
pub struct CategoryCard {
    pub key: &'static str,
    pub icon: &'static str,
    pub score: u32,
    pub band: ScoreBand,
}

#[derive(Debug, Serialize)]
pub struct LogLine {
    pub message: String,
    pub time: String,
}

#[derive(Debug, Serialize)]
pub struct TrackerPage {
    pub header: HeaderView,
    pub cards: Vec<CategoryCard>,
    pub triggers: Vec<TriggerView>,
    /// Newest first
    pub logs: Vec<LogLine>,
    pub empty_log_text: &'static str,
}

fn status_label(status: &str) -> String {
    if status.is_empty() {
        SYNCED_LABEL.to_string()
    } else {
        status.to_string()
    }
}

fn identity_label(auth: &AuthState) -> Option<String> {
    auth.ready.then(|| {
        auth.user_id()
            .map(str::to_string)
            .unwrap_or_else(|| LOADING_LABEL.to_string())
    })
}

fn cards(record: &MediaUser) -> Vec<CategoryCard> {
    record
        .choices
        .iter()
        .map(|(category, choice)| CategoryCard {
            key: category.as_str(),
            icon: category_icon(category),
            score: choice.score,
            band: score_band(choice.score),
        })
        .collect()
}

pub fn tracker_page(snapshot: &TrackerSnapshot, auth: &AuthState) -> TrackerPage {
    let record = &snapshot.record;
    TrackerPage {
        header: HeaderView {
            total_score: record.total_score(),
            identity: identity_label(auth),
            status: status_label(&snapshot.status),
        },
        cards: cards(record),
        triggers: TRIGGERS
            .iter()
            .map(|&(delta, label)| TriggerView { delta, label })
            .collect(),
        logs: record
            .logs
            .iter()
            .rev()
            .map(|entry| LogLine {
                message: entry.message.clone(),
                time: format_clock(entry.timestamp),
            })
            .collect(),
        empty_log_text: EMPTY_LOG_TEXT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::Identity;

    fn snapshot(record: MediaUser, status: &str) -> TrackerSnapshot {
        TrackerSnapshot {
            user_id: Some(record.id.clone()),
            record,
            status: status.to_string(),
        }
    }

    #[test]
    fn test_score_bands() {
        assert_eq!(score_band(0), ScoreBand::Low);
        assert_eq!(score_band(5), ScoreBand::Low);
        assert_eq!(score_band(6), ScoreBand::Medium);
        assert_eq!(score_band(15), ScoreBand::Medium);
        assert_eq!(score_band(16), ScoreBand::High);
    }

    #[test]
    fn test_trigger_deltas() {
        assert!(is_trigger_delta(5));
        assert!(is_trigger_delta(1));
        assert!(is_trigger_delta(-1));
        assert!(!is_trigger_delta(2));
        assert!(!is_trigger_delta(-5));
    }

    #[test]
    fn test_page_reflects_record() {
        let mut record = MediaUser::new_default("u1", 0);
        record.apply_adjustment(MediaCategory::Movies, 5, 1_000);
        record.apply_adjustment(MediaCategory::Movies, 5, 2_000);
        record.apply_adjustment(MediaCategory::Books, 1, 3_000);
        let auth = AuthState {
            ready: true,
            identity: Some(Identity::local_fallback()),
        };

        let page = tracker_page(&snapshot(record, ""), &auth);

        assert_eq!(page.header.total_score, 11);
        assert_eq!(page.header.status, "Synced");
        assert_eq!(page.header.identity, auth.user_id().map(str::to_string));

        let movies = page.cards.iter().find(|c| c.key == "movies").unwrap();
        assert_eq!(movies.score, 10);
        assert_eq!(movies.band, ScoreBand::Medium);
        assert_eq!(movies.icon, "film");

        let messages: Vec<_> = page.logs.iter().map(|l| l.message.as_str()).collect();
        assert_eq!(messages, ["+1 books", "+5 movies", "+5 movies"]);
        assert_eq!(page.logs[0].time, "00:00:03");
    }

    #[test]
    fn test_header_without_identity() {
        let record = MediaUser::new_default("", 0);
        let ready = AuthState {
            ready: true,
            identity: None,
        };
        let page = tracker_page(&snapshot(record.clone(), "Saved!"), &ready);
        assert_eq!(page.header.identity.as_deref(), Some("Loading..."));
        assert_eq!(page.header.status, "Saved!");

        let page = tracker_page(&snapshot(record, ""), &AuthState::default());
        assert_eq!(page.header.identity, None);
    }
}
