// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Caller identity as handed over by the identity provider.
//!
//! The provider itself (sign-in, token refresh) lives outside this crate.
//! What reaches the sync layer is the subject id, the role, and whether the
//! provider is still resolving the session.

use serde::{Deserialize, Serialize};

use super::roles::Role;

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Stable subject identifier issued by the identity provider
    pub subject_id: String,
    /// Role used for partition routing
    pub role: Role,
}

impl Identity {
    pub fn new(subject_id: impl Into<String>, role: Role) -> Self {
        Self {
            subject_id: subject_id.into(),
            role,
        }
    }

    pub fn admin(subject_id: impl Into<String>) -> Self {
        Self::new(subject_id, Role::Admin)
    }

    pub fn employee(subject_id: impl Into<String>) -> Self {
        Self::new(subject_id, Role::Employee)
    }
}

/// Session state reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    /// The provider has not resolved the session yet
    #[default]
    Loading,
    /// No one is signed in
    Anonymous,
    /// A signed-in caller
    Authenticated(Identity),
}

impl AuthState {
    /// The signed-in identity, if any.
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            AuthState::Authenticated(identity) => Some(identity),
            AuthState::Loading | AuthState::Anonymous => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, AuthState::Loading)
    }
}

impl From<Identity> for AuthState {
    fn from(identity: Identity) -> Self {
        AuthState::Authenticated(identity)
    }
}

impl From<Option<Identity>> for AuthState {
    fn from(identity: Option<Identity>) -> Self {
        identity.map_or(AuthState::Anonymous, AuthState::Authenticated)
    }
}
