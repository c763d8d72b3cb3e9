// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Smart Media Choices: score your media diet and share suggestions.
//!
//! This crate serves two views over a remote document store: a personal
//! tracker (a score per media category plus an activity log) and a shared
//! suggestion feed. Each browser gets a client session that signs in,
//! listens to its documents and mirrors them into local view state.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;
pub mod views;

use config::{Config, StoreBackend};
use db::{FirestoreDb, MediaStore, MemoryStore};
use services::{
    ClientDeps, FirebaseAuthClient, IdentityProvider, LocalIdentityProvider, SessionRegistry,
};
use std::sync::Arc;
use views::Templates;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    /// `None` when no store is configured or reachable
    pub store: Option<Arc<dyn MediaStore>>,
    pub sessions: Arc<SessionRegistry>,
    pub templates: Templates,
}

impl AppState {
    /// Assemble the state from already-built store and identity adapters.
    pub fn new(
        config: Config,
        store: Option<Arc<dyn MediaStore>>,
        identity: Option<Arc<dyn IdentityProvider>>,
    ) -> anyhow::Result<Self> {
        let deps = ClientDeps {
            store: store.clone(),
            identity,
            app_id: config.app_id.clone(),
            initial_auth_token: config.initial_auth_token.clone(),
        };

        Ok(Self {
            config,
            store,
            sessions: Arc::new(SessionRegistry::new(deps)),
            templates: Templates::new()?,
        })
    }
}

/// Build the document store selected by the configuration.
///
/// A store that cannot be reached is logged and left out; the app keeps
/// serving with persistence disabled.
pub async fn build_store(config: &Config) -> Option<Arc<dyn MediaStore>> {
    match (config.store_backend, &config.firebase) {
        (StoreBackend::Memory, _) => {
            tracing::info!("Using in-memory document store");
            Some(Arc::new(MemoryStore::new()))
        }
        (StoreBackend::Firestore, Some(firebase)) => {
            match FirestoreDb::new(&firebase.project_id).await {
                Ok(db) => Some(Arc::new(db)),
                Err(e) => {
                    tracing::error!(error = %e, "Firestore unavailable, persistence disabled");
                    None
                }
            }
        }
        (StoreBackend::Firestore, None) => None,
    }
}

/// Build the identity provider matching the store backend.
pub fn build_identity(config: &Config) -> Option<Arc<dyn IdentityProvider>> {
    match (config.store_backend, &config.firebase) {
        (StoreBackend::Memory, _) => Some(Arc::new(LocalIdentityProvider)),
        (StoreBackend::Firestore, Some(firebase)) => {
            Some(Arc::new(FirebaseAuthClient::new(firebase)))
        }
        (StoreBackend::Firestore, None) => None,
    }
}
