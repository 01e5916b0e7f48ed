// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Partition routing for the realtime tree store.
//!
//! ## Layout
//!
//! ```text
//! data/
//!   {ADMIN_ID}/
//!     tickets/{push_key}       # shared by every admin
//!     renewals/{push_key}
//!     ...
//!   {subject_id}/
//!     notifications/{push_key} # private to the subject
//!     {collection}/...         # admin-private collections
//! ```

use std::collections::BTreeSet;
use std::fmt;

use tracing::warn;

use super::sanitize::is_valid_key;
use crate::auth::{Identity, Role};

/// First path segment of every partition.
pub const DATA_ROOT: &str = "data";

/// Partition id shared by all admins for shared collections.
pub const DEFAULT_ADMIN_PARTITION: &str = "admin";

// ========== Collection Names ==========

pub const TICKETS: &str = "tickets";
pub const RENEWALS: &str = "renewals";
pub const ASSETS: &str = "assets";
pub const VENDORS: &str = "vendors";
pub const LICENSES: &str = "licenses";
pub const EMPLOYEES: &str = "employees";
pub const NOTIFICATIONS: &str = "notifications";
pub const LAST_CHECKED: &str = "lastChecked";

/// Collections that every admin reads and writes in the same partition.
pub const SHARED_ADMIN_COLLECTIONS: &[&str] =
    &[TICKETS, RENEWALS, ASSETS, VENDORS, LICENSES, EMPLOYEES];

/// A concrete store path a collection resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionPath(String);

impl PartitionPath {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path of a child node (`{path}/{key}`).
    pub fn child(&self, key: &str) -> String {
        format!("{}/{key}", self.0)
    }
}

impl fmt::Display for PartitionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PartitionPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Maps `(collection, identity)` to a partition path.
///
/// Pure: the same inputs always produce the same path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolver {
    root: String,
    admin_partition: String,
    shared: BTreeSet<String>,
}

impl Default for PathResolver {
    fn default() -> Self {
        Self::new(DATA_ROOT, DEFAULT_ADMIN_PARTITION)
    }
}

impl PathResolver {
    /// Create a resolver with the default shared-admin collection set.
    pub fn new(root: impl Into<String>, admin_partition: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            admin_partition: admin_partition.into(),
            shared: SHARED_ADMIN_COLLECTIONS
                .iter()
                .map(|name| (*name).to_string())
                .collect(),
        }
    }

    /// Replace the shared-admin collection set.
    pub fn with_shared_collections<I, C>(mut self, collections: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        self.shared = collections.into_iter().map(Into::into).collect();
        self
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn admin_partition(&self) -> &str {
        &self.admin_partition
    }

    /// Whether admins share one partition for this collection.
    pub fn is_shared(&self, collection: &str) -> bool {
        self.shared.contains(collection)
    }

    /// Resolve the partition for a collection, or `None` when the caller has
    /// no business touching it.
    pub fn resolve(&self, collection: &str, identity: &Identity) -> Option<PartitionPath> {
        if !is_valid_key(collection) {
            warn!(collection, "Collection name is not a valid store key");
            return None;
        }
        if !is_valid_key(&identity.subject_id) {
            warn!(
                subject_id = %identity.subject_id,
                "Subject id is not a valid store key; no partition"
            );
            return None;
        }

        match identity.role {
            Role::Admin if self.is_shared(collection) => {
                Some(self.partition(&self.admin_partition, collection))
            }
            Role::Admin => Some(self.partition(&identity.subject_id, collection)),
            Role::Employee if collection == NOTIFICATIONS => {
                Some(self.partition(&identity.subject_id, collection))
            }
            Role::Employee => None,
        }
    }

    fn partition(&self, owner: &str, collection: &str) -> PartitionPath {
        PartitionPath(format!("{}/{owner}/{collection}", self.root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admins_share_partition_for_shared_collections() {
        let resolver = PathResolver::default();
        let a = resolver.resolve(TICKETS, &Identity::admin("alice")).unwrap();
        let b = resolver.resolve(TICKETS, &Identity::admin("bob")).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "data/admin/tickets");
    }

    #[test]
    fn admin_private_collection_uses_subject_partition() {
        let resolver = PathResolver::default();
        let path = resolver.resolve(LAST_CHECKED, &Identity::admin("alice")).unwrap();
        assert_eq!(path.as_str(), "data/alice/lastChecked");

        let notes = resolver.resolve(NOTIFICATIONS, &Identity::admin("alice")).unwrap();
        assert_eq!(notes.as_str(), "data/alice/notifications");
    }

    #[test]
    fn employees_only_reach_their_notifications() {
        let resolver = PathResolver::default();
        let e1 = resolver.resolve(NOTIFICATIONS, &Identity::employee("e1")).unwrap();
        let e2 = resolver.resolve(NOTIFICATIONS, &Identity::employee("e2")).unwrap();
        assert_eq!(e1.as_str(), "data/e1/notifications");
        assert_ne!(e1, e2);

        for collection in [TICKETS, RENEWALS, LAST_CHECKED, "anything"] {
            assert!(resolver.resolve(collection, &Identity::employee("e1")).is_none());
        }
    }

    #[test]
    fn resolution_is_deterministic() {
        let resolver = PathResolver::default();
        let identity = Identity::admin("alice");
        for collection in [TICKETS, NOTIFICATIONS, "custom"] {
            assert_eq!(
                resolver.resolve(collection, &identity),
                resolver.resolve(collection, &identity)
            );
        }
    }

    #[test]
    fn custom_root_and_shared_set() {
        let resolver = PathResolver::new("tenant-a", "ops").with_shared_collections(["custom"]);
        assert_eq!(resolver.root(), "tenant-a");
        assert_eq!(resolver.admin_partition(), "ops");
        assert_eq!(
            resolver.resolve("custom", &Identity::admin("x")).unwrap().as_str(),
            "tenant-a/ops/custom"
        );
        assert_eq!(
            resolver.resolve(TICKETS, &Identity::admin("x")).unwrap().as_str(),
            "tenant-a/x/tickets"
        );
    }

    #[test]
    fn unsafe_subject_ids_resolve_to_nothing() {
        let resolver = PathResolver::default();
        assert!(resolver.resolve(TICKETS, &Identity::admin("a/b")).is_none());
        assert!(resolver.resolve(NOTIFICATIONS, &Identity::employee("")).is_none());
        assert!(resolver.resolve("bad.name", &Identity::admin("a")).is_none());
    }

    #[test]
    fn child_paths_append_key() {
        let resolver = PathResolver::default();
        let path = resolver.resolve(TICKETS, &Identity::admin("a")).unwrap();
        assert_eq!(path.child("-Nabc"), "data/admin/tickets/-Nabc");
        assert_eq!(path.to_string(), "data/admin/tickets");
    }
}
