//! Media categories tracked by the personal scoring view.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of media categories.
///
/// Declaration order is display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaCategory {
    Books,
    Movies,
    Music,
    Podcasts,
}

impl MediaCategory {
    pub const ALL: [MediaCategory; 4] = [
        MediaCategory::Books,
        MediaCategory::Movies,
        MediaCategory::Music,
        MediaCategory::Podcasts,
    ];

    /// Key used in stored documents and log messages.
    pub fn as_str(self) -> &'static str {
        match self {
            MediaCategory::Books => "books",
            MediaCategory::Movies => "movies",
            MediaCategory::Music => "music",
            MediaCategory::Podcasts => "podcasts",
        }
    }
}

impl fmt::Display for MediaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown media category '{0}'")]
pub struct UnknownCategory(pub String);

impl FromStr for MediaCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MediaCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}
