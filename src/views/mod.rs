//! Presentation: pure view-model builders and HTML templates.
//!
//! Templates are compiled into the binary and rendered with HTML
//! auto-escaping (every template name ends in `.html`).

pub mod feed;
pub mod tracker;

use minijinja::{context, Environment};
use serde::Serialize;

use crate::error::AppError;

pub use feed::{feed_page, icon_for, FeedIcon, FeedPage};
pub use tracker::{score_band, tracker_page, ScoreBand, TrackerPage};

/// Seconds between reloads of the "connecting" placeholder.
pub const CONNECTING_REFRESH_SECS: u32 = 1;

const TEMPLATES: [(&str, &str); 4] = [
    ("base.html", include_str!("../../templates/base.html")),
    ("connecting.html", include_str!("../../templates/connecting.html")),
    ("tracker.html", include_str!("../../templates/tracker.html")),
    ("feed.html", include_str!("../../templates/feed.html")),
];

pub struct Templates {
    env: Environment<'static>,
}

impl Templates {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        for (name, source) in TEMPLATES {
            env.add_template(name, source)?;
        }
        Ok(Self { env })
    }

    fn render<S: Serialize>(&self, name: &str, ctx: S) -> Result<String, AppError> {
        self.env
            .get_template(name)
            .and_then(|template| template.render(ctx))
            .map_err(|e| AppError::Internal(anyhow::anyhow!("rendering {name}: {e}")))
    }

    pub fn tracker(&self, page: &TrackerPage) -> Result<String, AppError> {
        self.render("tracker.html", context! { page })
    }

    pub fn feed(&self, page: &FeedPage) -> Result<String, AppError> {
        self.render("feed.html", context! { page })
    }

    pub fn connecting(&self) -> Result<String, AppError> {
        self.render(
            "connecting.html",
            context! { refresh_secs => CONNECTING_REFRESH_SECS },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MediaCategory, MediaUser, Suggestion};
    use crate::services::{AuthState, FeedState, Identity, TrackerSnapshot};
    use chrono::Utc;

    fn ready() -> AuthState {
        AuthState {
            ready: true,
            identity: Some(Identity::local_fallback()),
        }
    }

    #[test]
    fn test_templates_compile() {
        assert!(Templates::new().is_ok());
    }

    #[test]
    fn test_connecting_page_refreshes() {
        let html = Templates::new().unwrap().connecting().unwrap();
        assert!(html.contains("Connecting to the cloud..."));
        assert!(html.contains(r#"http-equiv="refresh""#));
    }

    #[test]
    fn test_tracker_page_renders() {
        let mut record = MediaUser::new_default("u1", 0);
        record.apply_adjustment(MediaCategory::Podcasts, 5, 0);
        let snapshot = TrackerSnapshot {
            user_id: Some("u1".into()),
            record,
            status: String::new(),
        };

        let html = Templates::new()
            .unwrap()
            .tracker(&tracker_page(&snapshot, &ready()))
            .unwrap();

        assert!(html.contains("Total Affinity"));
        assert!(html.contains("+5 (Love It)"));
        assert!(html.contains("Synced"));
        assert!(html.contains("+5 podcasts"));
        assert!(!html.contains("No activity yet"));
    }

    #[test]
    fn test_feed_page_escapes_user_text() {
        let state = FeedState {
            items: vec![Suggestion {
                id: "x".into(),
                text: "<script>alert(1)</script> film".into(),
                user_id: "u2".into(),
                timestamp: None,
            }],
            ..Default::default()
        };
        let page = feed_page(&state, "", &ready(), Utc::now());

        let html = Templates::new().unwrap().feed(&page).unwrap();

        assert!(!html.contains("<script>alert(1)</script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("Loading..."));
        assert!(html.contains("disabled"));
    }
}
