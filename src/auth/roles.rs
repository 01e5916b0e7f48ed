// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User roles for partition routing.

use serde::{Deserialize, Serialize};

/// Roles known to the helpdesk app.
///
/// ## Routing
///
/// - `Admin` - Reads and writes the shared admin partition for shared
///   collections, and a private partition for everything else
/// - `Employee` - Only reaches their own `notifications` partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Helpdesk staff with access to tickets, renewals and assets
    Admin,
    /// Regular employee (receives notifications only)
    Employee,
}

impl Role {
    /// Whether this role routes shared collections to the admin partition.
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Parse role from string (case-insensitive).
    /// Used when reading the role claim handed over by the identity provider.
    pub fn from_str(s: &str) -> Option<Role> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "employee" => Some(Role::Employee),
            _ => None,
        }
    }
}

impl Default for Role {
    /// Default role is Employee (least privilege for authenticated users).
    fn default() -> Self {
        Role::Employee
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Employee => write!(f, "employee"),
        }
    }
}
