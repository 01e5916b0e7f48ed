// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! LRU cache for decrypted envelope values.
//!
//! Live caches replace their whole list on every snapshot, so the same
//! envelopes come back again and again. Every envelope carries its own nonce,
//! which makes the envelope string itself a safe cache key.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

/// In-process LRU cache of envelope -> plaintext.
pub struct DecryptCache {
    cache: Mutex<LruCache<String, String>>,
}

impl DecryptCache {
    /// Create a new cache holding at most `capacity` entries.
    ///
    /// Returns `None` for a zero capacity (caching disabled).
    pub fn new(capacity: usize) -> Option<Self> {
        let capacity = NonZeroUsize::new(capacity)?;
        Some(Self {
            cache: Mutex::new(LruCache::new(capacity)),
        })
    }

    pub fn capacity(&self) -> usize {
        self.cache
            .lock()
            .map(|cache| cache.cap().get())
            .unwrap_or(0)
    }

    /// Get the plaintext for an envelope, if cached.
    pub fn get(&self, envelope: &str) -> Option<String> {
        let mut cache = self.cache.lock().ok()?;
        cache.get(envelope).cloned()
    }

    /// Remember a successful decryption.
    pub fn put(&self, envelope: &str, plaintext: &str) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(envelope.to_string(), plaintext.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.cache.lock().map(|cache| cache.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry (e.g. after a key rotation).
    pub fn clear(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }
}

impl std::fmt::Debug for DecryptCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecryptCache")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacity_disables_cache() {
        assert!(DecryptCache::new(0).is_none());
    }

    #[test]
    fn cache_put_and_get() {
        let cache = DecryptCache::new(4).unwrap();
        assert!(cache.get("enc:v1:abc").is_none());

        cache.put("enc:v1:abc", "hello");
        assert_eq!(cache.get("enc:v1:abc").as_deref(), Some("hello"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn least_recently_used_entry_is_evicted() {
        let cache = DecryptCache::new(2).unwrap();
        cache.put("a", "1");
        cache.put("b", "2");
        // touch "a" so "b" becomes the eviction candidate
        assert!(cache.get("a").is_some());
        cache.put("c", "3");

        assert!(cache.get("b").is_none());
        assert_eq!(cache.get("a").as_deref(), Some("1"));
        assert_eq!(cache.get("c").as_deref(), Some("3"));
        assert_eq!(cache.capacity(), 2);
    }

    #[test]
    fn clear_empties_cache() {
        let cache = DecryptCache::new(2).unwrap();
        cache.put("a", "1");
        cache.clear();
        assert!(cache.is_empty());
    }
}
