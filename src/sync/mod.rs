// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Live Sync Module
//!
//! Local mirrors of partitions in the realtime tree store.
//!
//! - **Store boundary** ([`store`]) - the primitives consumed from the store
//! - **Collections** ([`collection`]) - keyed record lists with
//!   add / update / remove
//! - **Objects** ([`object`]) - a single mirrored value
//! - **In-memory store** ([`memory`]) - a complete [`RealtimeStore`] kept in
//!   process, used by tests and as a local backend for single-process use
//!
//! ## Lifecycle
//!
//! 1. A cache is opened with the caller's [`AuthState`](crate::auth::AuthState)
//! 2. The collection resolves to a partition, or to nothing
//! 3. One listener is held per cache; each snapshot replaces the local state
//! 4. Re-binding or dropping the cache releases the listener

pub(crate) mod cell;
pub mod collection;
pub mod memory;
pub mod object;
pub mod push_key;
pub mod store;

pub use collection::{CollectionState, Document, LiveCollection, PendingAdd, Record};
pub use memory::MemoryStore;
pub use object::{LiveObject, ObjectState};
pub use push_key::{PushKeyGenerator, PUSH_KEY_LEN};
pub use store::{
    ErrorCallback, RealtimeStore, Snapshot, SnapshotCallback, StoreError, StoreResult,
    Subscription,
};
