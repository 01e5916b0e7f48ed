// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Errors surfaced to callers of the live caches.
//!
//! Reads never produce these: a failing subscription degrades to an empty,
//! loaded state. Only writes (and preparing payloads for writes) fail, and
//! they fail to the immediate caller without retries.

use crate::auth::Role;
use crate::config::ConfigError;
use crate::storage::{EnvelopeError, SanitizeError};
use crate::sync::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Write attempted without a signed-in identity
    #[error("not authenticated")]
    NotAuthenticated,
    /// The caller's role has no partition for this collection
    #[error("collection `{collection}` has no partition for role {role}")]
    UnresolvablePath { collection: String, role: Role },
    /// `update` on an id that is not in the local mirror
    #[error("`{0}` is not in the local cache")]
    UnknownEntity(String),
    /// A payload that must be a JSON object was something else
    #[error("{0} is not a JSON object")]
    NotARecord(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
    #[error(transparent)]
    Sanitize(#[from] SanitizeError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for live cache writes.
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_problem() {
        let err = SyncError::UnresolvablePath {
            collection: "tickets".into(),
            role: Role::Employee,
        };
        assert_eq!(
            err.to_string(),
            "collection `tickets` has no partition for role employee"
        );

        let err = SyncError::from(StoreError::PermissionDenied {
            path: "data/admin".into(),
        });
        assert_eq!(err.to_string(), "permission denied at `data/admin`");
    }
}
