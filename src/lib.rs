// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Helpdesk Sync - realtime data sync and field encryption
//!
//! Client-side core of the ticketing and asset-tracking app. Collections are
//! routed to per-role partitions of a realtime tree store, mirrored into
//! live caches, and written back with sensitive fields sealed.
//!
//! ## Modules
//!
//! - `auth` - Caller identity and roles
//! - `storage` - Partition routing, field envelopes, key sanitization
//! - `sync` - Store boundary and live caches
//! - `state` - Per-session bundle of store, codec and identity
//! - `models` - Typed application records

pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod state;
pub mod storage;
pub mod sync;

pub use error::{SyncError, SyncResult};
pub use state::AppState;
