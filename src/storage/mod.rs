// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Store-Boundary Storage Module
//!
//! Everything applied to data on its way into or out of the realtime tree
//! store:
//!
//! - **Routing** ([`paths`]) - which partition a collection lives in
//! - **Envelopes** ([`envelope`]) - field-level encryption with a
//!   recognizable prefix
//! - **Sanitization** ([`sanitize`]) - rewriting keys the store forbids
//! - **Policy** ([`fields`]) - which fields of which collection are sealed
//!
//! ## Important Notes
//!
//! - The store treats envelope strings as opaque values
//! - Sanitization is lossy; see [`sanitize::find_collisions`]
//! - Decryption is fail-open and never blocks a read

pub mod decrypt_cache;
pub mod envelope;
pub mod fields;
pub mod paths;
pub mod sanitize;

pub use decrypt_cache::DecryptCache;
pub use envelope::{DecodeError, EnvelopeCodec, EnvelopeError, ENVELOPE_PREFIX};
pub use fields::SensitiveFields;
pub use paths::{PartitionPath, PathResolver};
pub use sanitize::{
    find_collisions, sanitize_deep, sanitize_deep_strict, sanitize_key, KeyCollision,
    SanitizeError, SanitizedKey,
};
