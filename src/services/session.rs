//! Session bootstrap: obtain an identity before any data operation.
//!
//! The outcome is published on a `watch` channel so views can await the
//! "auth ready" gate and follow later identity changes.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

use crate::error::AppError;
use crate::services::identity::{Identity, IdentityProvider};

/// Auth gate plus the current identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuthState {
    /// Set once bootstrap finished, whatever the outcome
    pub ready: bool,
    pub identity: Option<Identity>,
}

impl AuthState {
    /// Any identity, including a local fallback.
    pub fn user_id(&self) -> Option<&str> {
        self.identity.as_ref().map(|i| i.uid.as_str())
    }

    /// Only identities issued by the identity service.
    pub fn remote_user_id(&self) -> Option<&str> {
        self.identity
            .as_ref()
            .filter(|i| i.is_remote())
            .map(|i| i.uid.as_str())
    }
}

pub struct Session {
    provider: Option<Arc<dyn IdentityProvider>>,
    initial_token: Option<String>,
    state: watch::Sender<AuthState>,
    /// Serializes sign-in attempts
    sign_in: Mutex<()>,
}

impl Session {
    /// `provider` is `None` when the store is not configured.
    pub fn new(provider: Option<Arc<dyn IdentityProvider>>, initial_token: Option<String>) -> Self {
        Self {
            provider,
            initial_token,
            state: watch::channel(AuthState::default()).0,
            sign_in: Mutex::new(()),
        }
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every gate or identity change.
    pub fn watch(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Sign in with the pre-issued token, or anonymously.
    ///
    /// Never fails: a failed sign-in yields a local fallback identity, and a
    /// missing configuration yields no identity. Either way the gate opens.
    pub async fn bootstrap(&self) -> AuthState {
        let _guard = self.sign_in.lock().await;

        let Some(provider) = &self.provider else {
            tracing::error!("Firebase configuration is missing.");
            self.state.send_replace(AuthState {
                ready: true,
                identity: None,
            });
            return self.state();
        };

        let result = match &self.initial_token {
            Some(token) => provider.exchange_token(token).await,
            None => provider.sign_in_anonymous().await,
        };

        let identity = match result {
            Ok(identity) => {
                tracing::info!(uid = %identity.uid, source = ?identity.source, "Signed in");
                identity
            }
            Err(e) => {
                let fallback = Identity::local_fallback();
                tracing::error!(
                    error = %e,
                    fallback_uid = %fallback.uid,
                    "Firebase Auth Error, using local fallback identity"
                );
                fallback
            }
        };

        self.state.send_replace(AuthState {
            ready: true,
            identity: Some(identity),
        });
        self.state()
    }

    /// Try an anonymous sign-in when no service-issued identity exists yet.
    ///
    /// On success the new identity replaces the current one and watchers are
    /// notified.
    pub async fn retry_anonymous(&self) -> Result<Identity, AppError> {
        let provider = self.provider.as_ref().ok_or(AppError::NotInitialized)?;
        let _guard = self.sign_in.lock().await;

        if let Some(identity) = self.state().identity.filter(|i| i.is_remote()) {
            return Ok(identity);
        }

        match provider.sign_in_anonymous().await {
            Ok(identity) => {
                tracing::info!(uid = %identity.uid, "Anonymous sign-in succeeded on retry");
                self.state.send_replace(AuthState {
                    ready: true,
                    identity: Some(identity.clone()),
                });
                Ok(identity)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Anonymous sign-in retry failed");
                Err(e)
            }
        }
    }
}
