// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Single-writer cache cell shared by the live caches.
//!
//! Only the subscription callback of the current binding publishes into the
//! cell. Every re-bind bumps the generation, so a late callback from a
//! released subscription cannot overwrite the new state.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;

pub(crate) struct CacheCell<V> {
    tx: watch::Sender<V>,
    generation: AtomicU64,
}

impl<V> CacheCell<V> {
    pub(crate) fn new(initial: V) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self {
            tx,
            generation: AtomicU64::new(0),
        }
    }

    /// Start a new binding with `state`; returns its generation.
    pub(crate) fn reset(&self, state: V) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.tx.send_replace(state);
        generation
    }

    /// Publish `state` if `generation` is still the current binding.
    pub(crate) fn publish(&self, generation: u64, state: V) -> bool {
        if self.generation.load(Ordering::SeqCst) != generation {
            return false;
        }
        self.tx.send_replace(state);
        true
    }

    pub(crate) fn borrow(&self) -> watch::Ref<'_, V> {
        self.tx.borrow()
    }

    pub(crate) fn watch(&self) -> watch::Receiver<V> {
        self.tx.subscribe()
    }
}
