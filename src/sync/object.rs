// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Live mirror of a single value, such as the caller's last-checked marker.
//!
//! Same binding rules as [`LiveCollection`](super::LiveCollection): resolved
//! per identity, empty (here: the initial value) when unresolvable, degraded
//! to the initial value on subscription errors.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::cell::CacheCell;
use super::collection::Record;
use super::store::{ErrorCallback, RealtimeStore, Snapshot, SnapshotCallback, StoreError, Subscription};
use crate::auth::AuthState;
use crate::error::{SyncError, SyncResult};
use crate::storage::{PartitionPath, PathResolver};

/// What observers of a live object see.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectState<T> {
    pub value: T,
    pub loading: bool,
}

/// Live cache of one value for one caller.
pub struct LiveObject<T, S> {
    store: Arc<S>,
    resolver: PathResolver,
    key: String,
    auth: AuthState,
    initial: T,
    path: Option<PartitionPath>,
    cell: Arc<CacheCell<ObjectState<T>>>,
    subscription: Option<Subscription>,
}

impl<T: Record, S: RealtimeStore> LiveObject<T, S> {
    /// Resolve `key` for `auth` and start mirroring it. `initial` is served
    /// while nothing is stored and whenever the value cannot be read.
    pub fn open(
        store: Arc<S>,
        resolver: PathResolver,
        auth: AuthState,
        key: impl Into<String>,
        initial: T,
    ) -> Self {
        let cell = Arc::new(CacheCell::new(ObjectState {
            value: initial.clone(),
            loading: true,
        }));
        let mut live = Self {
            store,
            resolver,
            key: key.into(),
            auth,
            initial,
            path: None,
            cell,
            subscription: None,
        };
        live.attach();
        live
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn path(&self) -> Option<&PartitionPath> {
        self.path.as_ref()
    }

    pub fn value(&self) -> T {
        self.cell.borrow().value.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.cell.borrow().loading
    }

    pub fn state(&self) -> ObjectState<T> {
        self.cell.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<ObjectState<T>> {
        self.cell.watch()
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription
            .as_ref()
            .is_some_and(Subscription::is_active)
    }

    /// Follow a new identity; a no-op if it did not change and the listener
    /// is still live. A closed or failed object subscribes again.
    pub fn rebind(&mut self, auth: AuthState) {
        if self.auth == auth && (self.is_subscribed() || self.path.is_none()) {
            return;
        }
        self.auth = auth;
        self.attach();
    }

    pub fn close(&mut self) {
        if self.subscription.take().is_some() {
            debug!(key = %self.key, "Listener released");
        }
    }

    /// Overwrite the stored value.
    pub async fn set(&self, value: &T) -> SyncResult<()> {
        let identity = self.auth.identity().ok_or(SyncError::NotAuthenticated)?;
        let path = self.path.as_ref().ok_or_else(|| SyncError::UnresolvablePath {
            collection: self.key.clone(),
            role: identity.role,
        })?;
        let payload = serde_json::to_value(value)?;
        self.store.write_full(path.as_str(), payload).await?;
        debug!(key = %self.key, "Value written");
        Ok(())
    }

    fn idle(&self, loading: bool) -> ObjectState<T> {
        ObjectState {
            value: self.initial.clone(),
            loading,
        }
    }

    fn attach(&mut self) {
        self.close();
        self.path = self
            .auth
            .identity()
            .and_then(|identity| self.resolver.resolve(&self.key, identity));

        if self.auth.is_loading() {
            self.cell.reset(self.idle(true));
            return;
        }
        let Some(path) = self.path.clone() else {
            self.cell.reset(self.idle(false));
            return;
        };

        let generation = self.cell.reset(self.idle(true));
        let on_snapshot: SnapshotCallback = {
            let cell = Arc::clone(&self.cell);
            let initial = self.initial.clone();
            let key = self.key.clone();
            Arc::new(move |snapshot: Snapshot| {
                let value = decode_value(&key, snapshot.value, &initial);
                cell.publish(generation, ObjectState { value, loading: false });
            })
        };
        let on_error: ErrorCallback = {
            let cell = Arc::clone(&self.cell);
            let initial = self.initial.clone();
            let key = self.key.clone();
            Arc::new(move |error: StoreError| {
                warn!(key = %key, error = %error, "Subscription failed; serving initial value");
                cell.publish(
                    generation,
                    ObjectState {
                        value: initial.clone(),
                        loading: false,
                    },
                );
            })
        };

        debug!(key = %self.key, path = %path, "Subscribing");
        self.subscription = Some(self.store.subscribe(path.as_str(), on_snapshot, on_error));
    }
}

impl<T, S> fmt::Debug for LiveObject<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveObject")
            .field("key", &self.key)
            .field("path", &self.path)
            .field("auth", &self.auth)
            .finish_non_exhaustive()
    }
}

fn decode_value<T: Record>(key: &str, value: Value, initial: &T) -> T {
    if value.is_null() {
        return initial.clone();
    }
    serde_json::from_value(value).unwrap_or_else(|error| {
        warn!(key, error = %error, "Stored value does not decode; serving initial value");
        initial.clone()
    })
}
