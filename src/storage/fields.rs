// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Which fields of which collection get sealed before writing.
//!
//! The live caches store whatever they are given. Callers run outbound
//! payloads through [`SensitiveFields::seal`] and inbound records through
//! [`SensitiveFields::unseal`].

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use super::envelope::{EnvelopeCodec, EnvelopeError};
use super::paths::{ASSETS, LICENSES, NOTIFICATIONS, RENEWALS, TICKETS, VENDORS};
use super::sanitize::sanitize_deep;

/// Per-collection set of top-level fields to encrypt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensitiveFields {
    by_collection: BTreeMap<String, BTreeSet<String>>,
}

impl Default for SensitiveFields {
    fn default() -> Self {
        Self::empty()
            .with(TICKETS, ["description", "requesterEmail", "requesterPhone", "attachments"])
            .with(RENEWALS, ["licenseKey", "notes", "attachments"])
            .with(ASSETS, ["serialNumber", "notes"])
            .with(VENDORS, ["contactEmail", "contactPhone"])
            .with(LICENSES, ["licenseKey"])
            .with(NOTIFICATIONS, ["body"])
    }
}

impl SensitiveFields {
    /// No field of any collection is sealed.
    pub fn empty() -> Self {
        Self {
            by_collection: BTreeMap::new(),
        }
    }

    /// Add sensitive fields for a collection.
    pub fn with<I, F>(mut self, collection: &str, fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<String>,
    {
        self.by_collection
            .entry(collection.to_string())
            .or_default()
            .extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn is_sensitive(&self, collection: &str, field: &str) -> bool {
        self.by_collection
            .get(collection)
            .is_some_and(|fields| fields.contains(field))
    }

    pub fn fields_for(&self, collection: &str) -> impl Iterator<Item = &str> {
        self.by_collection
            .get(collection)
            .into_iter()
            .flat_map(|fields| fields.iter().map(String::as_str))
    }

    /// Prepare a record for writing: sanitize every key, then encrypt the
    /// sensitive fields of `collection`.
    pub fn seal(
        &self,
        codec: &EnvelopeCodec,
        collection: &str,
        record: &Value,
    ) -> Result<Value, EnvelopeError> {
        let mut sanitized = sanitize_deep(record);
        if let Value::Object(map) = &mut sanitized {
            for (field, value) in map.iter_mut() {
                if self.is_sensitive(collection, field) {
                    *value = codec.encrypt_deep(value)?;
                }
            }
        }
        Ok(sanitized)
    }

    /// Decrypt a record read from the store.
    pub fn unseal(&self, codec: &EnvelopeCodec, record: &Value) -> Value {
        codec.decrypt_deep(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn codec() -> EnvelopeCodec {
        EnvelopeCodec::from_key(&[3u8; 32]).unwrap()
    }

    #[test]
    fn default_policy_covers_ticket_fields() {
        let policy = SensitiveFields::default();
        assert!(policy.is_sensitive(TICKETS, "description"));
        assert!(!policy.is_sensitive(TICKETS, "summary"));
        assert!(!policy.is_sensitive("unknown", "description"));
        assert!(policy.fields_for(RENEWALS).any(|f| f == "licenseKey"));
        assert_eq!(policy.fields_for("unknown").count(), 0);
    }

    #[test]
    fn seal_encrypts_only_listed_fields() {
        let codec = codec();
        let policy = SensitiveFields::empty().with("tickets", ["description"]);
        let sealed = policy
            .seal(
                &codec,
                "tickets",
                &json!({ "summary": "Laptop", "description": "fan noise", "priority": 1 }),
            )
            .unwrap();

        assert_eq!(sealed["summary"], json!("Laptop"));
        assert_eq!(sealed["priority"], json!(1));
        assert!(EnvelopeCodec::is_envelope_value(&sealed["description"]));

        let opened = policy.unseal(&codec, &sealed);
        assert_eq!(opened["description"], json!("fan noise"));
    }

    #[test]
    fn seal_sanitizes_before_matching_fields() {
        let codec = codec();
        let policy = SensitiveFields::empty().with("assets", ["serial_no"]);
        let sealed = policy
            .seal(&codec, "assets", &json!({ "serial.no": "SN-1", "room#": "B2" }))
            .unwrap();

        let map = sealed.as_object().unwrap();
        assert!(map.contains_key("room_"));
        assert!(EnvelopeCodec::is_envelope_value(&map["serial_no"]));
    }

    #[test]
    fn sealed_attachments_keep_urls() {
        let codec = codec();
        let policy = SensitiveFields::default();
        let sealed = policy
            .seal(
                &codec,
                TICKETS,
                &json!({ "attachments": [{ "url": "https://f/1", "name": "scan.png" }] }),
            )
            .unwrap();

        assert_eq!(sealed["attachments"][0]["url"], json!("https://f/1"));
        assert!(EnvelopeCodec::is_envelope_value(&sealed["attachments"][0]["name"]));
    }

    #[test]
    fn non_object_records_are_only_sanitized() {
        let codec = codec();
        let policy = SensitiveFields::default();
        assert_eq!(policy.seal(&codec, TICKETS, &json!("x")).unwrap(), json!("x"));
    }
}
