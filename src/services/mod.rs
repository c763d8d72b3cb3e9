// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod client;
pub mod feed;
pub mod identity;
mod listener;
pub mod session;
pub mod status;
pub mod tracker;

pub use client::{ClientDeps, ClientSession, SessionRegistry};
pub use feed::{FeedState, FeedView, SubmitOutcome, SubmitRejection};
pub use identity::{
    FirebaseAuthClient, Identity, IdentityProvider, IdentitySource, LocalIdentityProvider,
};
pub use session::{AuthState, Session};
pub use status::StatusLine;
pub use tracker::{TrackerSnapshot, TrackerState, TrackerView};
