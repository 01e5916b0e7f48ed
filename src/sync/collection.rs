// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Live mirror of one collection partition.
//!
//! [`LiveCollection`] subscribes to the partition its collection resolves to
//! and replaces its local list with every snapshot the store delivers. The
//! list is never edited locally: `add`, `update` and `remove_by_id` write to
//! the store and the change shows up once the subscription echoes it.
//!
//! ## Consistency
//!
//! - Last snapshot wins, whoever caused it
//! - `update` merges into the *locally cached* record and overwrites the
//!   whole node, so concurrent updates from two sessions can lose fields
//! - Failed reads degrade to an empty, loaded list; failed writes are
//!   returned to the caller and never retried

use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::cell::CacheCell;
use super::store::{
    ErrorCallback, RealtimeStore, Snapshot, SnapshotCallback, StoreError, StoreResult,
    Subscription,
};
use crate::auth::AuthState;
use crate::error::{SyncError, SyncResult};
use crate::storage::{PartitionPath, PathResolver};

/// Anything a live cache can hold.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> Record for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// A record together with the push key it is stored under.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document<T> {
    pub id: String,
    #[serde(flatten)]
    pub data: T,
}

/// What observers of a collection see.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionState<T> {
    pub data: Vec<Document<T>>,
    pub loading: bool,
}

impl<T> CollectionState<T> {
    fn loading() -> Self {
        Self {
            data: Vec::new(),
            loading: true,
        }
    }

    fn empty() -> Self {
        Self {
            data: Vec::new(),
            loading: false,
        }
    }

    pub fn get(&self, id: &str) -> Option<&Document<T>> {
        self.data.iter().find(|doc| doc.id == id)
    }
}

/// Live cache of one collection for one caller.
pub struct LiveCollection<T, S> {
    store: Arc<S>,
    resolver: PathResolver,
    collection: String,
    auth: AuthState,
    path: Option<PartitionPath>,
    cell: Arc<CacheCell<CollectionState<T>>>,
    subscription: Option<Subscription>,
}

impl<T: Record, S: RealtimeStore> LiveCollection<T, S> {
    /// Resolve the collection for `auth` and start mirroring it.
    ///
    /// Without a usable partition the collection is empty and loaded at once
    /// and the store is never contacted. While the identity provider is still
    /// loading, the collection stays in the loading state until
    /// [`rebind`](Self::rebind) is called.
    pub fn open(
        store: Arc<S>,
        resolver: PathResolver,
        auth: AuthState,
        collection: impl Into<String>,
    ) -> Self {
        let mut live = Self {
            store,
            resolver,
            collection: collection.into(),
            auth,
            path: None,
            cell: Arc::new(CacheCell::new(CollectionState::loading())),
            subscription: None,
        };
        live.attach();
        live
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Partition currently mirrored, if any.
    pub fn path(&self) -> Option<&PartitionPath> {
        self.path.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.cell.borrow().loading
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription
            .as_ref()
            .is_some_and(Subscription::is_active)
    }

    /// Copy of the mirrored list.
    pub fn data(&self) -> Vec<Document<T>> {
        self.cell.borrow().data.clone()
    }

    pub fn state(&self) -> CollectionState<T> {
        self.cell.borrow().clone()
    }

    pub fn get(&self, id: &str) -> Option<Document<T>> {
        self.cell.borrow().get(id).cloned()
    }

    /// Receiver that is notified whenever a new snapshot lands.
    pub fn watch(&self) -> watch::Receiver<CollectionState<T>> {
        self.cell.watch()
    }

    /// Follow a new identity. Releases the current listener and
    /// re-resolves the partition.
    ///
    /// A no-op if the identity did not change and the cache is still
    /// listening. After [`close`](Self::close) or a store-side failure the
    /// same identity subscribes again.
    pub fn rebind(&mut self, auth: AuthState) {
        if self.auth == auth && (self.is_subscribed() || self.path.is_none()) {
            return;
        }
        self.auth = auth;
        self.attach();
    }

    /// Stop mirroring. The last state stays readable.
    pub fn close(&mut self) {
        if self.subscription.take().is_some() {
            debug!(collection = %self.collection, "Listener released");
        }
    }

    /// Create a record under a new push key.
    ///
    /// The key is generated locally, so the id is known before anything is
    /// written. Inside a Tokio runtime the write starts at once on its own
    /// task and lands even if the returned [`PendingAdd`] is dropped; awaiting
    /// it yields the id once the store accepted the write. Outside a runtime
    /// the write runs when the [`PendingAdd`] is awaited.
    pub fn add(&self, item: &T) -> SyncResult<PendingAdd> {
        let path = self.writable_path()?;
        let payload = serde_json::to_value(item)?;
        let id = self.store.generate_child_key(path.as_str())?;

        let store = Arc::clone(&self.store);
        let target = path.child(&id);
        let write: PendingWrite = Box::pin(async move {
            store.write_full(&target, payload).await?;
            debug!(path = %target, "Record added");
            Ok::<(), StoreError>(())
        });

        let write = match Handle::try_current() {
            Ok(runtime) => WriteTask::Spawned(runtime.spawn(write)),
            Err(_) => WriteTask::Deferred(write),
        };
        Ok(PendingAdd { id, write })
    }

    /// Shallow-merge `partial` over the cached record and overwrite the node.
    ///
    /// Fields that exist remotely but not in the local mirror are lost.
    pub async fn update<P>(&self, id: &str, partial: &P) -> SyncResult<()>
    where
        P: Serialize + ?Sized,
    {
        let path = self.writable_path()?;
        let Value::Object(mut patch) = serde_json::to_value(partial)? else {
            return Err(SyncError::NotARecord(format!("update for `{id}`")));
        };
        patch.remove("id");

        let cached = {
            let state = self.cell.borrow();
            let current = state
                .get(id)
                .ok_or_else(|| SyncError::UnknownEntity(id.to_string()))?;
            serde_json::to_value(&current.data)?
        };
        let Value::Object(mut merged) = cached else {
            return Err(SyncError::NotARecord(format!("cached record `{id}`")));
        };
        merged.extend(patch);

        self.store
            .write_full(&path.child(id), Value::Object(merged))
            .await?;
        debug!(collection = %self.collection, id, "Record updated");
        Ok(())
    }

    /// Delete the node for `id`.
    pub async fn remove_by_id(&self, id: &str) -> SyncResult<()> {
        let path = self.writable_path()?;
        self.store.delete(&path.child(id)).await?;
        debug!(collection = %self.collection, id, "Record removed");
        Ok(())
    }

    fn writable_path(&self) -> SyncResult<&PartitionPath> {
        let identity = self.auth.identity().ok_or(SyncError::NotAuthenticated)?;
        self.path
            .as_ref()
            .ok_or_else(|| SyncError::UnresolvablePath {
                collection: self.collection.clone(),
                role: identity.role,
            })
    }

    fn attach(&mut self) {
        self.close();
        self.path = self
            .auth
            .identity()
            .and_then(|identity| self.resolver.resolve(&self.collection, identity));

        if self.auth.is_loading() {
            self.cell.reset(CollectionState::loading());
            return;
        }
        let Some(path) = self.path.clone() else {
            debug!(collection = %self.collection, "No partition for caller; serving empty list");
            self.cell.reset(CollectionState::empty());
            return;
        };

        let generation = self.cell.reset(CollectionState::loading());
        let on_snapshot: SnapshotCallback = {
            let cell = Arc::clone(&self.cell);
            let collection = self.collection.clone();
            Arc::new(move |snapshot: Snapshot| {
                let data = decode_documents::<T>(&collection, &snapshot.value);
                cell.publish(generation, CollectionState { data, loading: false });
            })
        };
        let on_error: ErrorCallback = {
            let cell = Arc::clone(&self.cell);
            let collection = self.collection.clone();
            Arc::new(move |error: StoreError| {
                warn!(
                    collection = %collection,
                    error = %error,
                    "Subscription failed; serving empty list"
                );
                cell.publish(generation, CollectionState::empty());
            })
        };

        debug!(collection = %self.collection, path = %path, "Subscribing");
        self.subscription = Some(self.store.subscribe(path.as_str(), on_snapshot, on_error));
    }
}

impl<T, S> fmt::Debug for LiveCollection<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveCollection")
            .field("collection", &self.collection)
            .field("path", &self.path)
            .field("auth", &self.auth)
            .finish_non_exhaustive()
    }
}

type PendingWrite = Pin<Box<dyn Future<Output = StoreResult<()>> + Send>>;

enum WriteTask {
    Spawned(JoinHandle<StoreResult<()>>),
    Deferred(PendingWrite),
}

/// An `add` whose id is known but whose write may still be in flight.
///
/// Await it for the outcome; the result is the id again, or the store error.
#[must_use = "await the pending add to learn whether the write succeeded"]
pub struct PendingAdd {
    id: String,
    write: WriteTask,
}

impl PendingAdd {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Debug for PendingAdd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingAdd").field("id", &self.id).finish_non_exhaustive()
    }
}

impl IntoFuture for PendingAdd {
    type Output = SyncResult<String>;
    type IntoFuture = Pin<Box<dyn Future<Output = SyncResult<String>> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        let PendingAdd { id, write } = self;
        Box::pin(async move {
            match write {
                WriteTask::Spawned(task) => task
                    .await
                    .map_err(|e| StoreError::Unavailable(format!("write task failed: {e}")))??,
                WriteTask::Deferred(write) => write.await?,
            }
            Ok::<_, SyncError>(id)
        })
    }
}

// Each child key becomes the record's id. Children that do not decode are
// skipped.
fn decode_documents<T: DeserializeOwned>(collection: &str, value: &Value) -> Vec<Document<T>> {
    match value {
        Value::Null => Vec::new(),
        Value::Object(children) => children
            .iter()
            .filter_map(|(key, child)| match serde_json::from_value::<T>(child.clone()) {
                Ok(data) => Some(Document {
                    id: key.clone(),
                    data,
                }),
                Err(error) => {
                    warn!(collection, id = %key, error = %error, "Skipping undecodable record");
                    None
                }
            })
            .collect(),
        _ => {
            warn!(collection, "Partition holds a non-record value; ignoring");
            Vec::new()
        }
    }
}
