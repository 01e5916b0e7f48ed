// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Key sanitization for structured payloads.
//!
//! The realtime store rejects object keys containing `.`, `#`, `$`, `[`, `]`
//! or `/`. User-authored structures (custom form fields, imported spreadsheet
//! columns) are run through [`sanitize_deep`] before they are written.
//!
//! ## Lossy transform
//!
//! Sanitization is not reversible: `"a.b"` and `"a_b"` both become `"a_b"`.
//! [`SanitizedKey`] marks keys that went through the transform so raw field
//! names and store keys are not confused; [`find_collisions`] and
//! [`sanitize_deep_strict`] let callers detect the collapse before writing.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

/// Characters the store forbids in keys.
pub const RESERVED_KEY_CHARS: [char; 6] = ['.', '#', '$', '[', ']', '/'];

/// Replacement for every reserved character.
pub const KEY_SUBSTITUTE: char = '_';

/// A key with every reserved character replaced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SanitizedKey(String);

impl SanitizedKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SanitizedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SanitizedKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Whether a key can be stored as-is.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && !key.contains(RESERVED_KEY_CHARS)
}

/// Replace each reserved character in a field name.
pub fn sanitize_key(name: &str) -> SanitizedKey {
    SanitizedKey(name.replace(RESERVED_KEY_CHARS, &KEY_SUBSTITUTE.to_string()))
}

/// Sanitize every object key in a structure. Arrays are walked element-wise,
/// scalars are left alone. On collision the key that sorts last wins.
pub fn sanitize_deep(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, child) in map {
                let sanitized = sanitize_key(key).into_string();
                if out.contains_key(&sanitized) {
                    warn!(
                        key = %key,
                        sanitized = %sanitized,
                        "Field names collide after sanitization; keeping the later one"
                    );
                }
                out.insert(sanitized, sanitize_deep(child));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sanitize_deep).collect()),
        scalar => scalar.clone(),
    }
}

/// Two or more raw keys of one object that map to the same store key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCollision {
    /// JSON pointer of the object holding the keys (`""` for the root)
    pub pointer: String,
    pub sanitized: SanitizedKey,
    pub originals: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SanitizeError {
    #[error("field names collide after sanitization: {}", describe(.0))]
    Collision(Vec<KeyCollision>),
}

fn describe(collisions: &[KeyCollision]) -> String {
    collisions
        .iter()
        .map(|c| format!("{:?} -> `{}` at `{}`", c.originals, c.sanitized, c.pointer))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Report every object whose keys collapse onto the same store key.
pub fn find_collisions(value: &Value) -> Vec<KeyCollision> {
    let mut found = Vec::new();
    collect_collisions(value, String::new(), &mut found);
    found
}

fn collect_collisions(value: &Value, pointer: String, found: &mut Vec<KeyCollision>) {
    match value {
        Value::Object(map) => {
            let mut groups: BTreeMap<SanitizedKey, Vec<String>> = BTreeMap::new();
            for key in map.keys() {
                groups.entry(sanitize_key(key)).or_default().push(key.clone());
            }
            for (sanitized, originals) in groups {
                if originals.len() > 1 {
                    found.push(KeyCollision {
                        pointer: pointer.clone(),
                        sanitized,
                        originals,
                    });
                }
            }
            for (key, child) in map {
                collect_collisions(child, format!("{pointer}/{}", escape_pointer(key)), found);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                collect_collisions(child, format!("{pointer}/{index}"), found);
            }
        }
        _ => {}
    }
}

// RFC 6901 escaping
fn escape_pointer(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

/// Like [`sanitize_deep`], but refuses payloads where keys would collide.
pub fn sanitize_deep_strict(value: &Value) -> Result<Value, SanitizeError> {
    let collisions = find_collisions(value);
    if collisions.is_empty() {
        Ok(sanitize_deep(value))
    } else {
        Err(SanitizeError::Collision(collisions))
    }
}
