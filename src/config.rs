//! Application configuration loaded from environment variables.
//!
//! Everything the application needs is collected into one [`Config`] that is
//! passed explicitly to the entry point; nothing reads ambient globals later.

use serde::Deserialize;
use std::env;
use std::time::Duration;

/// App id used when `APP_ID` is not set.
pub const DEFAULT_APP_ID: &str = "default-app-id";

/// Client configuration for the Firebase project backing the store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirebaseConfig {
    /// Web API key (used for Identity Toolkit calls)
    pub api_key: String,
    /// GCP / Firebase project id
    pub project_id: String,
    #[serde(default)]
    pub auth_domain: Option<String>,
}

/// Which document store backs the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Firestore,
    /// Process-local store, for development without a Firebase project.
    Memory,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Store configuration; `None` disables persistence and sign-in.
    pub firebase: Option<FirebaseConfig>,
    /// Application id, the second segment of every document path
    pub app_id: String,
    /// Pre-issued custom token exchanged for a session at bootstrap
    pub initial_auth_token: Option<String>,
    pub store_backend: StoreBackend,
    /// Server port
    pub port: u16,
    /// HS256 key for session cookies (raw bytes)
    pub session_signing_key: Vec<u8>,
    /// Client sessions idle longer than this are torn down
    pub session_idle_timeout: Duration,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            firebase: None,
            app_id: "test-app".to_string(),
            initial_auth_token: None,
            store_backend: StoreBackend::Memory,
            port: 8080,
            session_signing_key: b"test_session_key_32_bytes_min!!!".to_vec(),
            session_idle_timeout: Duration::from_secs(30 * 60),
        }
    }
}

impl Config {
    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let firebase = lookup("FIREBASE_CONFIG")
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| {
                serde_json::from_str::<FirebaseConfig>(&raw)
                    .map_err(|e| ConfigError::Invalid("FIREBASE_CONFIG", e.to_string()))
            })
            .transpose()?;

        let app_id = lookup("APP_ID").unwrap_or_else(|| DEFAULT_APP_ID.to_string());
        if app_id.is_empty() || app_id.contains('/') {
            return Err(ConfigError::Invalid(
                "APP_ID",
                "must be non-empty and must not contain '/'".to_string(),
            ));
        }

        let store_backend = match lookup("STORE_BACKEND").as_deref() {
            None | Some("firestore") => StoreBackend::Firestore,
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid(
                    "STORE_BACKEND",
                    format!("unknown backend '{other}'"),
                ))
            }
        };

        let session_signing_key = match lookup("SESSION_SIGNING_KEY") {
            Some(key) => key.into_bytes(),
            None => {
                tracing::warn!(
                    "SESSION_SIGNING_KEY not set, generating an ephemeral key; sessions will not survive restarts"
                );
                format!(
                    "{}{}",
                    uuid::Uuid::new_v4().simple(),
                    uuid::Uuid::new_v4().simple()
                )
                .into_bytes()
            }
        };

        let idle_minutes: u64 = lookup("SESSION_IDLE_MINUTES")
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);

        Ok(Self {
            firebase,
            app_id,
            initial_auth_token: lookup("INITIAL_AUTH_TOKEN")
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            store_backend,
            port: lookup("PORT")
                .unwrap_or_else(|| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            session_signing_key,
            session_idle_timeout: Duration::from_secs(idle_minutes * 60),
        })
    }

    /// Whether store operations are available at all.
    pub fn store_enabled(&self) -> bool {
        self.firebase.is_some() || self.store_backend == StoreBackend::Memory
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
