// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod media;
pub mod suggestion;
pub mod user;

pub use media::MediaCategory;
pub use suggestion::{NewSuggestion, Suggestion};
pub use user::{
    ChoiceScore, Choices, LogEntry, MediaUser, PartialChoices, Profile, RemoteUserDoc,
};
