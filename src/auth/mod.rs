// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Identity Module
//!
//! Caller identity and roles, as consumed by partition routing.
//!
//! ## Flow
//!
//! 1. The identity provider signs the user in (outside this crate)
//! 2. The app turns the session into an [`AuthState`]
//! 3. The [`AuthState`] is handed to [`crate::state::AppState`] and from there
//!    into every live cache at construction time
//!
//! Nothing in the sync layer looks up the current user from ambient state.

pub mod identity;
pub mod roles;

pub use identity::{AuthState, Identity};
pub use roles::Role;
