// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity providers.
//!
//! The production provider talks to the Firebase Identity Toolkit REST API:
//! - `accounts:signInWithCustomToken` for pre-issued credentials
//! - `accounts:signUp` (no body credentials) for anonymous sessions

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::config::FirebaseConfig;
use crate::error::AppError;

const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";

/// Where an identity came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentitySource {
    CustomToken,
    Anonymous,
    /// Generated locally after sign-in failed; unknown to the identity service.
    LocalFallback,
}

/// A signed-in user (or a local stand-in).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub uid: String,
    pub source: IdentitySource,
}

impl Identity {
    /// Fresh random identity used when sign-in fails.
    pub fn local_fallback() -> Self {
        Self {
            uid: uuid::Uuid::new_v4().to_string(),
            source: IdentitySource::LocalFallback,
        }
    }

    /// Whether the identity service issued this identity.
    pub fn is_remote(&self) -> bool {
        self.source != IdentitySource::LocalFallback
    }
}

/// Identity capability consumed by the session bootstrap.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Exchange a pre-issued credential for a session.
    async fn exchange_token(&self, token: &str) -> Result<Identity, AppError>;

    /// Establish an anonymous session.
    async fn sign_in_anonymous(&self) -> Result<Identity, AppError>;
}

// ─── Firebase Identity Toolkit ───────────────────────────────

/// Successful sign-in response (fields we use).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    local_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Claims we read from a Firebase ID token.
#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    sub: Option<String>,
}

/// Read the uid out of an ID token without verifying it.
///
/// The token was just handed to us by the identity service over TLS; it is
/// never used to authorize anything locally.
fn uid_from_id_token(id_token: &str) -> Option<String> {
    let payload = id_token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: IdTokenClaims = serde_json::from_slice(&bytes).ok()?;
    claims.user_id.or(claims.sub)
}

/// Firebase Authentication REST client.
#[derive(Clone)]
pub struct FirebaseAuthClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl FirebaseAuthClient {
    /// Create a client for the configured project.
    ///
    /// Honors `FIREBASE_AUTH_EMULATOR_HOST` for local development.
    pub fn new(config: &FirebaseConfig) -> Self {
        let base_url = match std::env::var("FIREBASE_AUTH_EMULATOR_HOST") {
            Ok(host) => format!("http://{}/identitytoolkit.googleapis.com/v1", host),
            Err(_) => IDENTITY_TOOLKIT_URL.to_string(),
        };
        Self::with_base_url(config.api_key.clone(), base_url)
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }

    async fn post_sign_in(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<SignInResponse, AppError> {
        let url = format!("{}/accounts:{}", self.base_url, method);

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Auth(format!("{} request failed: {}", method, e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(AppError::Auth(format!("HTTP {}: {}", status, message)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Auth(format!("Invalid {} response: {}", method, e)))
    }

    fn identity_from(response: SignInResponse, source: IdentitySource) -> Result<Identity, AppError> {
        let uid = response
            .local_id
            .or_else(|| response.id_token.as_deref().and_then(uid_from_id_token))
            .ok_or_else(|| AppError::Auth("Sign-in response carried no uid".to_string()))?;
        Ok(Identity { uid, source })
    }
}

#[async_trait::async_trait]
impl IdentityProvider for FirebaseAuthClient {
    async fn exchange_token(&self, token: &str) -> Result<Identity, AppError> {
        let response = self
            .post_sign_in(
                "signInWithCustomToken",
                serde_json::json!({ "token": token, "returnSecureToken": true }),
            )
            .await?;
        Self::identity_from(response, IdentitySource::CustomToken)
    }

    async fn sign_in_anonymous(&self) -> Result<Identity, AppError> {
        let response = self
            .post_sign_in("signUp", serde_json::json!({ "returnSecureToken": true }))
            .await?;
        Self::identity_from(response, IdentitySource::Anonymous)
    }
}

// ─── Local Provider ──────────────────────────────────────────

/// Identity provider for the in-memory store mode.
///
/// Anonymous sign-in always succeeds with a fresh UUID; custom tokens are
/// rejected since nothing can vouch for them.
#[derive(Debug, Default, Clone)]
pub struct LocalIdentityProvider;

#[async_trait::async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn exchange_token(&self, _token: &str) -> Result<Identity, AppError> {
        Err(AppError::Auth(
            "custom tokens are not supported by the local identity provider".to_string(),
        ))
    }

    async fn sign_in_anonymous(&self) -> Result<Identity, AppError> {
        Ok(Identity {
            uid: format!("local-{}", uuid::Uuid::new_v4().simple()),
            source: IdentitySource::Anonymous,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_id_token(claims: serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{header}.{payload}.c2lnbmF0dXJl")
    }

    #[test]
    fn test_uid_from_id_token_prefers_user_id() {
        let token = fake_id_token(serde_json::json!({ "user_id": "abc", "sub": "xyz" }));
        assert_eq!(uid_from_id_token(&token).as_deref(), Some("abc"));

        let token = fake_id_token(serde_json::json!({ "sub": "xyz" }));
        assert_eq!(uid_from_id_token(&token).as_deref(), Some("xyz"));
    }

    #[test]
    fn test_uid_from_garbage_token() {
        assert_eq!(uid_from_id_token("not-a-jwt"), None);
        assert_eq!(uid_from_id_token("a.!!!.c"), None);
    }

    #[test]
    fn test_identity_prefers_local_id() {
        let response = SignInResponse {
            id_token: Some(fake_id_token(serde_json::json!({ "sub": "from-token" }))),
            local_id: Some("from-local-id".to_string()),
        };
        let identity =
            FirebaseAuthClient::identity_from(response, IdentitySource::CustomToken).unwrap();
        assert_eq!(identity.uid, "from-local-id");
        assert!(identity.is_remote());
    }

    #[test]
    fn test_fallback_identity_is_local() {
        let a = Identity::local_fallback();
        let b = Identity::local_fallback();
        assert!(!a.is_remote());
        assert_ne!(a.uid, b.uid);
    }

    #[tokio::test]
    async fn test_local_provider() {
        let provider = LocalIdentityProvider;
        assert!(provider.exchange_token("tok").await.is_err());
        let identity = provider.sign_in_anonymous().await.unwrap();
        assert!(identity.uid.starts_with("local-"));
        assert_eq!(identity.source, IdentitySource::Anonymous);
    }

    #[tokio::test]
    async fn test_unreachable_service_is_auth_error() {
        let client =
            FirebaseAuthClient::with_base_url("k".into(), "http://127.0.0.1:9".to_string());
        let err = client.sign_in_anonymous().await.unwrap_err();
        assert!(matches!(err, AppError::Auth(_)));
    }
}
