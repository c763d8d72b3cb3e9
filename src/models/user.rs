//! Personal tracker record, as stored in Firestore and mirrored locally.

use serde::{Deserialize, Serialize};

use crate::models::MediaCategory;

/// Number of activity log entries kept (most recent win).
pub const MAX_LOG_ENTRIES: usize = 10;

pub const DEFAULT_PROFILE_NAME: &str = "Anonymous User";

/// Score for a single category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceScore {
    #[serde(default)]
    pub score: u32,
}

/// Scores for every category. All four keys always exist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choices {
    pub books: ChoiceScore,
    pub movies: ChoiceScore,
    pub music: ChoiceScore,
    pub podcasts: ChoiceScore,
}

impl Choices {
    pub fn get(&self, category: MediaCategory) -> ChoiceScore {
        match category {
            MediaCategory::Books => self.books,
            MediaCategory::Movies => self.movies,
            MediaCategory::Music => self.music,
            MediaCategory::Podcasts => self.podcasts,
        }
    }

    fn get_mut(&mut self, category: MediaCategory) -> &mut ChoiceScore {
        match category {
            MediaCategory::Books => &mut self.books,
            MediaCategory::Movies => &mut self.movies,
            MediaCategory::Music => &mut self.music,
            MediaCategory::Podcasts => &mut self.podcasts,
        }
    }

    /// Categories with their scores, in display order.
    pub fn iter(&self) -> impl Iterator<Item = (MediaCategory, ChoiceScore)> + '_ {
        MediaCategory::ALL.into_iter().map(|c| (c, self.get(c)))
    }

    pub fn total(&self) -> u64 {
        self.iter().map(|(_, c)| u64::from(c.score)).sum()
    }
}

/// Choices as they may appear in a remote document: any key can be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialChoices {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub books: Option<ChoiceScore>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub movies: Option<ChoiceScore>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub music: Option<ChoiceScore>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub podcasts: Option<ChoiceScore>,
}

impl PartialChoices {
    /// Overlay the present keys on the zeroed default set.
    pub fn over_defaults(&self) -> Choices {
        let defaults = Choices::default();
        Choices {
            books: self.books.unwrap_or(defaults.books),
            movies: self.movies.unwrap_or(defaults.movies),
            music: self.music.unwrap_or(defaults.music),
            podcasts: self.podcasts.unwrap_or(defaults.podcasts),
        }
    }

    /// Nested merge: only the categories present in `update` are replaced.
    pub fn merge(&mut self, update: PartialChoices) {
        for (slot, incoming) in [
            (&mut self.books, update.books),
            (&mut self.movies, update.movies),
            (&mut self.music, update.music),
            (&mut self.podcasts, update.podcasts),
        ] {
            if incoming.is_some() {
                *slot = incoming;
            }
        }
    }
}

impl From<&Choices> for PartialChoices {
    fn from(choices: &Choices) -> Self {
        Self {
            books: Some(choices.books),
            movies: Some(choices.movies),
            music: Some(choices.music),
            podcasts: Some(choices.podcasts),
        }
    }
}

/// One line of the activity log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub message: String,
    /// Epoch millis
    pub timestamp: i64,
}

impl LogEntry {
    /// Entry for a score adjustment, e.g. `+5 books` or `-1 music`.
    pub fn adjustment(category: MediaCategory, delta: i64, now_ms: i64) -> Self {
        let sign = if delta > 0 { "+" } else { "" };
        Self {
            message: format!("{sign}{delta} {category}"),
            timestamp: now_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            name: DEFAULT_PROFILE_NAME.to_string(),
        }
    }
}

/// Tracker record stored at `artifacts/{appId}/public/data/mediaChoices/{uid}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaUser {
    pub id: String,
    /// Epoch millis of the last adjustment or reset
    pub last_activity: i64,
    pub choices: Choices,
    /// Oldest first, at most [`MAX_LOG_ENTRIES`]
    pub logs: Vec<LogEntry>,
    pub profile: Profile,
}

impl MediaUser {
    /// Fresh record: zero scores, empty log.
    pub fn new_default(id: impl Into<String>, now_ms: i64) -> Self {
        Self {
            id: id.into(),
            last_activity: now_ms,
            choices: Choices::default(),
            logs: Vec::new(),
            profile: Profile::default(),
        }
    }

    /// Adopt a fetched record on top of the current local one.
    ///
    /// Scalar fields present remotely win. Choices always start from the
    /// zeroed default set, so categories missing remotely read as 0, and the
    /// log is the remote one or empty.
    pub fn merged_with(&self, remote: RemoteUserDoc) -> MediaUser {
        MediaUser {
            id: remote.id.unwrap_or_else(|| self.id.clone()),
            last_activity: remote.last_activity.unwrap_or(self.last_activity),
            choices: remote
                .choices
                .as_ref()
                .map(PartialChoices::over_defaults)
                .unwrap_or_default(),
            logs: remote.logs.unwrap_or_default(),
            profile: remote.profile.unwrap_or_else(|| self.profile.clone()),
        }
    }

    /// Apply a score delta, flooring at zero, and record it in the log.
    pub fn apply_adjustment(&mut self, category: MediaCategory, delta: i64, now_ms: i64) {
        let slot = self.choices.get_mut(category);
        let next = i64::from(slot.score).saturating_add(delta).max(0);
        slot.score = u32::try_from(next).unwrap_or(u32::MAX);

        self.logs.push(LogEntry::adjustment(category, delta, now_ms));
        if self.logs.len() > MAX_LOG_ENTRIES {
            let excess = self.logs.len() - MAX_LOG_ENTRIES;
            self.logs.drain(..excess);
        }
        self.last_activity = now_ms;
    }

    pub fn total_score(&self) -> u64 {
        self.choices.total()
    }
}

/// A tracker document as read from the store; every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteUserDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<PartialChoices>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs: Option<Vec<LogEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
}

impl RemoteUserDoc {
    /// Field-wise merge-write: present fields of `update` replace ours.
    pub fn merge(&mut self, update: RemoteUserDoc) {
        if update.id.is_some() {
            self.id = update.id;
        }
        if update.last_activity.is_some() {
            self.last_activity = update.last_activity;
        }
        if let Some(choices) = update.choices {
            self.choices.get_or_insert_with(PartialChoices::default).merge(choices);
        }
        if update.logs.is_some() {
            self.logs = update.logs;
        }
        if update.profile.is_some() {
            self.profile = update.profile;
        }
    }
}

impl From<&MediaUser> for RemoteUserDoc {
    fn from(user: &MediaUser) -> Self {
        Self {
            id: Some(user.id.clone()),
            last_activity: Some(user.last_activity),
            choices: Some(PartialChoices::from(&user.choices)),
            logs: Some(user.logs.clone()),
            profile: Some(user.profile.clone()),
        }
    }
}
