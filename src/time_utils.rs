// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

/// Current time as epoch millis.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Wall-clock time of an epoch-millis timestamp, `HH:MM:SS` (UTC).
pub fn format_clock(epoch_ms: i64) -> String {
    match Utc.timestamp_millis_opt(epoch_ms).single() {
        Some(t) => t.format("%H:%M:%S").to_string(),
        None => "--:--:--".to_string(),
    }
}

/// Human-readable age of a feed entry relative to `now`.
pub fn format_relative(timestamp: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(timestamp) = timestamp else {
        return "pending".to_string();
    };

    let elapsed = now.signed_duration_since(timestamp);
    if elapsed.num_minutes() < 1 {
        "just now".to_string()
    } else if elapsed.num_hours() < 1 {
        format!("{} min ago", elapsed.num_minutes())
    } else if elapsed.num_hours() < 24 {
        format!("{} h ago", elapsed.num_hours())
    } else {
        timestamp.format("%Y-%m-%d %H:%M").to_string()
    }
}
