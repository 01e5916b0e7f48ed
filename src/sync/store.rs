// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Boundary to the external realtime tree store.
//!
//! The store is a remote JSON tree addressed by `/`-separated paths. The
//! sync layer needs five primitives from it: subscribe, write a whole
//! subtree, generate a child key, delete, and read once.

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Error type for store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Security rules rejected the read or write
    #[error("permission denied at `{path}`")]
    PermissionDenied { path: String },
    /// Path is empty or has an illegal segment
    #[error("invalid path `{0}`")]
    InvalidPath(String),
    /// Written value contains a key the store forbids
    #[error("invalid key `{key}` under `{path}`")]
    InvalidKey { path: String, key: String },
    /// Store is unreachable or in a broken state
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// No child key could be generated
    #[error("child key generation failed")]
    KeyGeneration,
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Value of a path at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub path: String,
    /// `Value::Null` when nothing is stored at `path`
    pub value: Value,
}

impl Snapshot {
    pub fn new(path: impl Into<String>, value: Value) -> Self {
        Self {
            path: path.into(),
            value,
        }
    }

    pub fn exists(&self) -> bool {
        !self.value.is_null()
    }
}

/// Called with every snapshot of a subscribed path.
pub type SnapshotCallback = Arc<dyn Fn(Snapshot) + Send + Sync>;

/// Called when the store cancels a subscription.
pub type ErrorCallback = Arc<dyn Fn(StoreError) + Send + Sync>;

/// Handle to a live listener. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    token: CancellationToken,
}

impl Subscription {
    /// Wrap the token the store watches for this listener.
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// A handle for a listener the store already dropped.
    pub fn closed() -> Self {
        let token = CancellationToken::new();
        token.cancel();
        Self { token }
    }

    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled()
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Primitives consumed from the realtime tree store.
///
/// Snapshot callbacks fire synchronously from the store's event delivery;
/// the first one carries the current value of the path.
pub trait RealtimeStore: Send + Sync + 'static {
    /// Listen to a path until the returned [`Subscription`] is dropped.
    fn subscribe(
        &self,
        path: &str,
        on_snapshot: SnapshotCallback,
        on_error: ErrorCallback,
    ) -> Subscription;

    /// A fresh, unique key for a new child of `path`.
    fn generate_child_key(&self, path: &str) -> StoreResult<String>;

    /// Replace the whole subtree at `path` with `value`.
    fn write_full(&self, path: &str, value: Value) -> impl Future<Output = StoreResult<()>> + Send;

    /// Remove the subtree at `path`.
    fn delete(&self, path: &str) -> impl Future<Output = StoreResult<()>> + Send;

    /// One-shot read of `path`.
    fn read_once(&self, path: &str) -> impl Future<Output = StoreResult<Value>> + Send;
}

/// Split a store path into its segments, ignoring leading, trailing and
/// doubled slashes.
pub fn path_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|segment| !segment.is_empty()).collect()
}
