// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Everything a live cache needs, bundled once per session.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::auth::AuthState;
use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::storage::{EnvelopeCodec, PartitionPath, PathResolver, SensitiveFields};
use crate::sync::{LiveCollection, LiveObject, RealtimeStore, Record};

pub struct AppState<S> {
    pub store: Arc<S>,
    pub resolver: PathResolver,
    pub codec: Arc<EnvelopeCodec>,
    pub sensitive: Arc<SensitiveFields>,
    auth: AuthState,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            resolver: self.resolver.clone(),
            codec: Arc::clone(&self.codec),
            sensitive: Arc::clone(&self.sensitive),
            auth: self.auth.clone(),
        }
    }
}

impl<S> std::fmt::Debug for AppState<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("resolver", &self.resolver)
            .field("codec", &self.codec)
            .field("sensitive", &self.sensitive)
            .field("auth", &self.auth)
            .finish_non_exhaustive()
    }
}

impl<S: RealtimeStore> AppState<S> {
    /// Default routing and field policy; identity still loading.
    pub fn new(store: Arc<S>, codec: EnvelopeCodec) -> Self {
        Self {
            store,
            resolver: PathResolver::default(),
            codec: Arc::new(codec),
            sensitive: Arc::new(SensitiveFields::default()),
            auth: AuthState::Loading,
        }
    }

    pub fn from_config(store: Arc<S>, config: &SyncConfig) -> SyncResult<Self> {
        let codec = EnvelopeCodec::from_passphrase(config.passphrase()?)?
            .with_decrypt_cache(config.decrypt_cache_capacity);
        info!(
            data_root = %config.data_root,
            admin_partition = %config.admin_partition,
            key_fingerprint = codec.fingerprint(),
            "Sync state initialized"
        );
        Ok(Self::new(store, codec).with_resolver(config.resolver()))
    }

    pub fn with_resolver(mut self, resolver: PathResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_sensitive_fields(mut self, sensitive: SensitiveFields) -> Self {
        self.sensitive = Arc::new(sensitive);
        self
    }

    pub fn with_auth(mut self, auth: impl Into<AuthState>) -> Self {
        self.auth = auth.into();
        self
    }

    pub fn auth(&self) -> &AuthState {
        &self.auth
    }

    /// Replace the identity. Caches opened earlier keep theirs until
    /// re-bound.
    pub fn set_auth(&mut self, auth: impl Into<AuthState>) {
        self.auth = auth.into();
    }

    pub fn resolve(&self, collection: &str) -> Option<PartitionPath> {
        self.auth
            .identity()
            .and_then(|identity| self.resolver.resolve(collection, identity))
    }

    pub fn collection<T: Record>(&self, name: &str) -> LiveCollection<T, S> {
        LiveCollection::open(
            Arc::clone(&self.store),
            self.resolver.clone(),
            self.auth.clone(),
            name,
        )
    }

    pub fn object<T: Record>(&self, key: &str, initial: T) -> LiveObject<T, S> {
        LiveObject::open(
            Arc::clone(&self.store),
            self.resolver.clone(),
            self.auth.clone(),
            key,
            initial,
        )
    }

    /// Sanitize and encrypt a record bound for `collection`.
    pub fn seal<R>(&self, collection: &str, record: &R) -> SyncResult<Value>
    where
        R: Serialize + ?Sized,
    {
        let value = serde_json::to_value(record)?;
        Ok(self.sensitive.seal(&self.codec, collection, &value)?)
    }

    /// Decrypt a record read from the store and decode it.
    pub fn unseal<T, R>(&self, record: &R) -> SyncResult<T>
    where
        T: DeserializeOwned,
        R: Serialize + ?Sized,
    {
        let value = serde_json::to_value(record)?;
        let plain = self.sensitive.unseal(&self.codec, &value);
        Ok(serde_json::from_value(plain)?)
    }
}
