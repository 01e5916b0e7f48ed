// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process realtime tree store.
//!
//! Implements [`RealtimeStore`] with the semantics the live caches rely on:
//!
//! - Writing `null` deletes; empty objects are pruned
//! - Keys containing `. # $ [ ] /` are rejected
//! - A new listener receives the current value immediately
//! - Every mutation re-delivers the value of each listener whose path is an
//!   ancestor, equal or descendant of the mutated path, if it changed
//! - Deny rules reject reads and writes under a path prefix, like security
//!   rules on the real store
//!
//! Callbacks always run after the internal lock is released, so a callback
//! may call back into the store. Deliveries are queued under the lock in
//! mutation order and drained by one thread at a time, so every listener sees
//! snapshots in the order the writes were applied, even with concurrent
//! writers. Deliveries caused from inside a callback run after it returns.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::push_key::PushKeyGenerator;
use super::store::{
    path_segments, ErrorCallback, RealtimeStore, Snapshot, SnapshotCallback, StoreError,
    StoreResult, Subscription,
};
use crate::storage::sanitize::is_valid_key;

struct Listener {
    path: String,
    token: CancellationToken,
    on_snapshot: SnapshotCallback,
    on_error: ErrorCallback,
    last: Value,
}

enum Event {
    Snapshot(SnapshotCallback, Snapshot),
    Error(ErrorCallback, StoreError),
}

struct Delivery {
    /// Skipped once cancelled; `None` always runs
    token: Option<CancellationToken>,
    event: Event,
}

impl Delivery {
    fn run(self) {
        if self.token.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return;
        }
        match self.event {
            Event::Snapshot(on_snapshot, snapshot) => on_snapshot(snapshot),
            Event::Error(on_error, error) => on_error(error),
        }
    }
}

#[derive(Default)]
struct Tree {
    root: Value,
    listeners: Vec<Listener>,
    denied: Vec<String>,
    pending: VecDeque<Delivery>,
    dispatching: bool,
}

/// Realtime tree store held in memory.
#[derive(Default)]
pub struct MemoryStore {
    tree: Mutex<Tree>,
    keys: PushKeyGenerator,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing tree.
    pub fn with_data(root: Value) -> Self {
        let store = Self::new();
        if let Ok(mut tree) = store.tree.lock() {
            tree.root = normalize(root);
        }
        store
    }

    /// Reject every read and write at or below `prefix`.
    pub fn deny(&self, prefix: &str) {
        if let Ok(mut tree) = self.tree.lock() {
            tree.denied.push(path_segments(prefix).join("/"));
        }
    }

    /// Remove all deny rules.
    pub fn allow_all(&self) {
        if let Ok(mut tree) = self.tree.lock() {
            tree.denied.clear();
        }
    }

    /// Fail every live listener at or below `prefix`, then drop it.
    ///
    /// Mirrors the store revoking access while a client is listening.
    pub fn interrupt(&self, prefix: &str, error: StoreError) {
        let prefix = path_segments(prefix);
        let lead = match self.tree.lock() {
            Ok(mut tree) => {
                let mut failed = Vec::new();
                tree.listeners.retain(|listener| {
                    let hit = !listener.token.is_cancelled()
                        && is_prefix(&prefix, &path_segments(&listener.path));
                    if hit {
                        listener.token.cancel();
                        failed.push(listener.on_error.clone());
                    }
                    !hit
                });
                for on_error in failed {
                    tree.pending.push_back(Delivery {
                        token: None,
                        event: Event::Error(on_error, error.clone()),
                    });
                }
                tree.claim_dispatch()
            }
            Err(_) => false,
        };
        if lead {
            self.dispatch();
        }
    }

    /// Number of listeners that have not been released.
    pub fn active_listeners(&self) -> usize {
        self.tree
            .lock()
            .map(|tree| {
                tree.listeners
                    .iter()
                    .filter(|listener| !listener.token.is_cancelled())
                    .count()
            })
            .unwrap_or(0)
    }

    /// Copy of the whole tree.
    pub fn dump(&self) -> Value {
        self.tree
            .lock()
            .map(|tree| tree.root.clone())
            .unwrap_or(Value::Null)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Tree>> {
        self.tree
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }

    fn mutate(&self, path: &str, value: Value) -> StoreResult<()> {
        let segments = checked_segments(path)?;
        let lead = {
            let mut tree = self.lock()?;
            tree.check_access(path, &segments)?;
            set_at(&mut tree.root, &segments, normalize(value));
            tree.queue_changes(&segments);
            tree.claim_dispatch()
        };
        if lead {
            self.dispatch();
        }
        Ok(())
    }

    // Drain the queue until it is empty. Only the thread that claimed the
    // dispatch runs callbacks; others just enqueue.
    fn dispatch(&self) {
        let _guard = DispatchGuard(&self.tree);
        loop {
            let next = match self.tree.lock() {
                Ok(mut tree) => match tree.pending.pop_front() {
                    Some(delivery) => delivery,
                    None => {
                        tree.dispatching = false;
                        return;
                    }
                },
                Err(_) => return,
            };
            next.run();
        }
    }
}

// Hands the dispatch back if a callback panics.
struct DispatchGuard<'a>(&'a Mutex<Tree>);

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            if let Ok(mut tree) = self.0.lock() {
                tree.dispatching = false;
            }
        }
    }
}

impl Tree {
    fn check_access(&self, path: &str, segments: &[&str]) -> StoreResult<()> {
        let denied = self
            .denied
            .iter()
            .any(|rule| is_prefix(&path_segments(rule), segments));
        if denied {
            Err(StoreError::PermissionDenied {
                path: path.to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// Take over dispatching if nobody else is draining the queue.
    fn claim_dispatch(&mut self) -> bool {
        if self.dispatching || self.pending.is_empty() {
            return false;
        }
        self.dispatching = true;
        true
    }

    fn queue_changes(&mut self, changed: &[&str]) {
        self.listeners.retain(|listener| !listener.token.is_cancelled());

        let root = &self.root;
        let pending = &mut self.pending;
        for listener in &mut self.listeners {
            let watched = path_segments(&listener.path);
            if !is_prefix(&watched, changed) && !is_prefix(changed, &watched) {
                continue;
            }
            let current = get_at(root, &watched);
            if current == listener.last {
                continue;
            }
            listener.last = current.clone();
            pending.push_back(Delivery {
                token: Some(listener.token.clone()),
                event: Event::Snapshot(
                    listener.on_snapshot.clone(),
                    Snapshot::new(listener.path.clone(), current),
                ),
            });
        }
    }
}

impl RealtimeStore for MemoryStore {
    fn subscribe(
        &self,
        path: &str,
        on_snapshot: SnapshotCallback,
        on_error: ErrorCallback,
    ) -> Subscription {
        let registered = checked_segments(path).and_then(|segments| {
            let mut tree = self.lock()?;
            tree.check_access(path, &segments)?;
            tree.listeners.retain(|listener| !listener.token.is_cancelled());

            let token = CancellationToken::new();
            let current = get_at(&tree.root, &segments);
            tree.listeners.push(Listener {
                path: path.to_string(),
                token: token.clone(),
                on_snapshot: on_snapshot.clone(),
                on_error: on_error.clone(),
                last: current.clone(),
            });
            tree.pending.push_back(Delivery {
                token: Some(token.clone()),
                event: Event::Snapshot(on_snapshot.clone(), Snapshot::new(path, current)),
            });
            Ok((token, tree.claim_dispatch()))
        });

        match registered {
            Ok((token, lead)) => {
                debug!(path, "Listener registered");
                if lead {
                    self.dispatch();
                }
                Subscription::new(token)
            }
            Err(error) => {
                on_error(error);
                Subscription::closed()
            }
        }
    }

    fn generate_child_key(&self, path: &str) -> StoreResult<String> {
        checked_segments(path)?;
        self.keys.next_key()
    }

    async fn write_full(&self, path: &str, value: Value) -> StoreResult<()> {
        validate_keys(path, &value)?;
        self.mutate(path, value)
    }

    async fn delete(&self, path: &str) -> StoreResult<()> {
        self.mutate(path, Value::Null)
    }

    async fn read_once(&self, path: &str) -> StoreResult<Value> {
        let segments = checked_segments(path)?;
        let tree = self.lock()?;
        tree.check_access(path, &segments)?;
        Ok(get_at(&tree.root, &segments))
    }
}

fn checked_segments(path: &str) -> StoreResult<Vec<&str>> {
    let segments = path_segments(path);
    if segments.is_empty() || !segments.iter().all(|segment| is_valid_key(segment)) {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(segments)
}

fn validate_keys(path: &str, value: &Value) -> StoreResult<()> {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if !is_valid_key(key) {
                    return Err(StoreError::InvalidKey {
                        path: path.to_string(),
                        key: key.clone(),
                    });
                }
                validate_keys(&format!("{path}/{key}"), child)?;
            }
            Ok(())
        }
        Value::Array(items) => items.iter().try_for_each(|child| validate_keys(path, child)),
        _ => Ok(()),
    }
}

fn is_prefix(prefix: &[&str], path: &[&str]) -> bool {
    prefix.len() <= path.len() && prefix.iter().zip(path).all(|(a, b)| a == b)
}

fn get_at(root: &Value, segments: &[&str]) -> Value {
    segments
        .iter()
        .try_fold(root, |node, segment| node.get(*segment))
        .cloned()
        .unwrap_or(Value::Null)
}

fn set_at(node: &mut Value, segments: &[&str], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *node = value;
        return;
    };

    if !node.is_object() {
        if value.is_null() {
            return;
        }
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        let child = map.entry((*head).to_string()).or_insert(Value::Null);
        set_at(child, rest, value);
        if is_empty(child) {
            map.remove(*head);
        }
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

// Drop nulls and empty objects the way the store does on write.
fn normalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let map: Map<String, Value> = map
                .into_iter()
                .map(|(key, child)| (key, normalize(child)))
                .filter(|(_, child)| !is_empty(child))
                .collect();
            if map.is_empty() {
                Value::Null
            } else {
                Value::Object(map)
            }
        }
        Value::Array(items) => Value::Array(items.into_iter().map(normalize).collect()),
        other => other,
    }
}
