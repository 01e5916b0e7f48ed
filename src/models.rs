// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Application Records
//!
//! Typed shapes of the records stored in each collection. Field names are
//! camelCase on the wire to match what the app clients already write.
//!
//! Records carry no `id`: a record's id is the push key it is stored under,
//! and [`Document`](crate::sync::Document) pairs the two when reading.
//!
//! ## Model Categories
//!
//! - **Tickets**: support requests raised by employees
//! - **Renewals**: subscriptions and licenses coming up for renewal
//! - **Notifications**: per-user messages

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Attachments
// =============================================================================

/// A file attached to a record. `url` points at blob storage and is never
/// sealed; `name` is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attachment {
    pub url: String,
    pub name: String,
}

// =============================================================================
// Ticket Models
// =============================================================================

/// Lifecycle of a ticket.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    #[default]
    Open,
    InProgress,
    Resolved,
    Closed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

/// A support ticket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub summary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: TicketStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requester_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requester_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    pub created_at: DateTime<Utc>,
}

/// Partial update of a ticket's workflow fields.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TicketUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TicketStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
}

// =============================================================================
// Renewal Models
// =============================================================================

/// A subscription or license that has to be renewed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Renewal {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    pub renews_on: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_cents: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl Renewal {
    /// Days from `today` until renewal; negative once overdue.
    pub fn days_until(&self, today: NaiveDate) -> i64 {
        (self.renews_on - today).num_days()
    }
}

// =============================================================================
// Notification Models
// =============================================================================

/// A message addressed to one user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Whether this arrived after the user's last-checked marker.
    pub fn is_newer_than(&self, last_checked_millis: i64) -> bool {
        self.created_at.timestamp_millis() > last_checked_millis
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ticket_uses_camel_case_and_defaults() {
        let ticket: Ticket = serde_json::from_value(json!({
            "summary": "Printer jam",
            "requesterEmail": "a@example.com",
            "createdAt": "2026-01-02T03:04:05Z",
        }))
        .unwrap();
        assert_eq!(ticket.status, TicketStatus::Open);
        assert_eq!(ticket.priority, Priority::Normal);
        assert_eq!(ticket.requester_email.as_deref(), Some("a@example.com"));
        assert!(ticket.attachments.is_empty());

        let value = serde_json::to_value(&ticket).unwrap();
        assert!(value.get("requesterPhone").is_none());
        assert!(value.get("id").is_none());
    }

    #[test]
    fn status_wire_names() {
        assert_eq!(serde_json::to_value(TicketStatus::InProgress).unwrap(), json!("in_progress"));
        assert_eq!(serde_json::to_value(Priority::Urgent).unwrap(), json!("urgent"));
    }

    #[test]
    fn ticket_update_only_carries_set_fields() {
        let update = TicketUpdate {
            status: Some(TicketStatus::Resolved),
            ..TicketUpdate::default()
        };
        assert_eq!(serde_json::to_value(&update).unwrap(), json!({ "status": "resolved" }));
    }

    #[test]
    fn renewal_days_until() {
        let renewal = Renewal {
            name: "Office suite".into(),
            vendor: None,
            renews_on: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            cost_cents: Some(12_000),
            license_key: None,
            notes: None,
            attachments: Vec::new(),
        };
        let today = NaiveDate::from_ymd_opt(2026, 2, 20).unwrap();
        assert_eq!(renewal.days_until(today), 9);
    }

    #[test]
    fn notification_newer_than_marker() {
        let notification: Notification = serde_json::from_value(json!({
            "title": "Ticket closed",
            "createdAt": "2026-01-01T00:00:01Z",
        }))
        .unwrap();
        let marker = notification.created_at.timestamp_millis();
        assert!(notification.is_newer_than(marker - 1));
        assert!(!notification.is_newer_than(marker));
    }
}
