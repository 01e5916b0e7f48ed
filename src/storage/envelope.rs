// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Field-level encryption envelopes.
//!
//! Sensitive field values are stored as self-describing strings:
//!
//! ```text
//! enc:v1:<base64( nonce[12] || ciphertext || tag[16] )>
//! ```
//!
//! The cipher is AES-256-GCM with one application-wide key derived from a
//! passphrase (PBKDF2-HMAC-SHA256). A fresh random nonce per call means the
//! same plaintext never produces the same envelope twice.
//!
//! ## Fail-open reads
//!
//! [`EnvelopeCodec::decrypt`] never fails: anything that is not an envelope,
//! or an envelope that does not open under the current key, is returned
//! unchanged. [`EnvelopeCodec::try_decrypt`] exposes the underlying error for
//! diagnostics.

use std::num::NonZeroU32;

use base64ct::{Base64, Encoding};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::decrypt_cache::DecryptCache;

/// Marks a string as ciphertext.
pub const ENVELOPE_PREFIX: &str = "enc:v1:";

/// Domain salt for deriving the field key from the passphrase.
const KDF_SALT: &[u8] = b"helpdesk-sync/field-envelope/v1";

const KDF_ROUNDS: u32 = 100_000;

const KEY_LEN: usize = 32;

const TAG_LEN: usize = 16;

/// Errors raised while producing envelopes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    #[error("field key derivation failed")]
    KeyDerivation,
    #[error("field key material is invalid")]
    InvalidKey,
    #[error("system random source is unavailable")]
    Random,
    #[error("encryption failed")]
    Seal,
}

/// Reasons an envelope did not open.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("value does not carry the envelope prefix")]
    NotEnvelope,
    #[error("envelope body is not valid base64")]
    Base64,
    #[error("envelope body is too short")]
    Truncated,
    #[error("envelope failed authentication (wrong key or tampered)")]
    Authentication,
    #[error("decrypted bytes are not UTF-8")]
    Utf8,
    #[error("envelope decrypted to an empty string")]
    Empty,
}

/// Encrypts and decrypts field envelopes with the application key.
pub struct EnvelopeCodec {
    key: LessSafeKey,
    rng: SystemRandom,
    fingerprint: String,
    cache: Option<DecryptCache>,
}

impl EnvelopeCodec {
    /// Derive the field key from the application passphrase.
    pub fn from_passphrase(passphrase: &str) -> Result<Self, EnvelopeError> {
        let rounds = NonZeroU32::new(KDF_ROUNDS).ok_or(EnvelopeError::KeyDerivation)?;
        let mut key = [0u8; KEY_LEN];
        pbkdf2::derive(
            pbkdf2::PBKDF2_HMAC_SHA256,
            rounds,
            KDF_SALT,
            passphrase.as_bytes(),
            &mut key,
        );
        Self::from_key(&key)
    }

    /// Use raw key bytes.
    pub fn from_key(key: &[u8; KEY_LEN]) -> Result<Self, EnvelopeError> {
        let unbound = UnboundKey::new(&AES_256_GCM, key).map_err(|_| EnvelopeError::InvalidKey)?;
        Ok(Self {
            key: LessSafeKey::new(unbound),
            rng: SystemRandom::new(),
            fingerprint: fingerprint(key),
            cache: None,
        })
    }

    /// Memoize successful decryptions in an LRU of `capacity` entries.
    pub fn with_decrypt_cache(mut self, capacity: usize) -> Self {
        self.cache = DecryptCache::new(capacity);
        self
    }

    /// Short, non-reversible identifier of the key, safe for logs.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Whether `value` is in envelope form.
    pub fn is_envelope(value: &str) -> bool {
        value.starts_with(ENVELOPE_PREFIX)
    }

    /// Whether a JSON value is an envelope string.
    pub fn is_envelope_value(value: &Value) -> bool {
        value.as_str().is_some_and(Self::is_envelope)
    }

    /// Seal a plaintext into a fresh envelope. The empty string is returned
    /// unchanged.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, EnvelopeError> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }

        let mut nonce = [0u8; NONCE_LEN];
        self.rng.fill(&mut nonce).map_err(|_| EnvelopeError::Random)?;

        let mut in_out = plaintext.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce),
                Aad::empty(),
                &mut in_out,
            )
            .map_err(|_| EnvelopeError::Seal)?;

        let mut body = Vec::with_capacity(NONCE_LEN + in_out.len());
        body.extend_from_slice(&nonce);
        body.extend_from_slice(&in_out);
        Ok(format!("{ENVELOPE_PREFIX}{}", Base64::encode_string(&body)))
    }

    /// Open an envelope, reporting why it failed.
    pub fn try_decrypt(&self, value: &str) -> Result<String, DecodeError> {
        let encoded = value
            .strip_prefix(ENVELOPE_PREFIX)
            .ok_or(DecodeError::NotEnvelope)?;
        let body = Base64::decode_vec(encoded).map_err(|_| DecodeError::Base64)?;
        if body.len() < NONCE_LEN + TAG_LEN {
            return Err(DecodeError::Truncated);
        }

        let (nonce, sealed) = body.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce).map_err(|_| DecodeError::Truncated)?;
        let mut in_out = sealed.to_vec();
        let plain = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| DecodeError::Authentication)?;

        let text = std::str::from_utf8(plain).map_err(|_| DecodeError::Utf8)?;
        if text.is_empty() {
            return Err(DecodeError::Empty);
        }
        Ok(text.to_string())
    }

    /// Open an envelope, or hand back `value` unchanged.
    pub fn decrypt(&self, value: &str) -> String {
        if !Self::is_envelope(value) {
            return value.to_string();
        }
        if let Some(plain) = self.cache.as_ref().and_then(|cache| cache.get(value)) {
            return plain;
        }

        match self.try_decrypt(value) {
            Ok(plain) => {
                if let Some(cache) = &self.cache {
                    cache.put(value, &plain);
                }
                plain
            }
            Err(error) => {
                debug!(error = %error, "Envelope did not open; keeping stored value");
                value.to_string()
            }
        }
    }

    /// Decrypt every string in a structure.
    ///
    /// Attachments (objects with both `url` and `name`) keep their `url`
    /// untouched.
    pub fn decrypt_deep(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.decrypt(s)),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.decrypt_deep(v)).collect()),
            Value::Object(map) => {
                let attachment = is_attachment(map);
                let out = map
                    .iter()
                    .map(|(key, child)| {
                        let child = if attachment && key == "url" {
                            child.clone()
                        } else {
                            self.decrypt_deep(child)
                        };
                        (key.clone(), child)
                    })
                    .collect();
                Value::Object(out)
            }
            scalar => scalar.clone(),
        }
    }

    /// Encrypt every string in a structure that is not already an envelope.
    ///
    /// Attachment `url`s stay in clear so links keep working.
    pub fn encrypt_deep(&self, value: &Value) -> Result<Value, EnvelopeError> {
        match value {
            Value::String(s) if Self::is_envelope(s) => Ok(value.clone()),
            Value::String(s) => Ok(Value::String(self.encrypt(s)?)),
            Value::Array(items) => items
                .iter()
                .map(|v| self.encrypt_deep(v))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Value::Object(map) => {
                let attachment = is_attachment(map);
                let mut out = Map::with_capacity(map.len());
                for (key, child) in map {
                    let child = if attachment && key == "url" {
                        child.clone()
                    } else {
                        self.encrypt_deep(child)?
                    };
                    out.insert(key.clone(), child);
                }
                Ok(Value::Object(out))
            }
            scalar => Ok(scalar.clone()),
        }
    }
}

impl std::fmt::Debug for EnvelopeCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvelopeCodec")
            .field("fingerprint", &self.fingerprint)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

fn is_attachment(map: &Map<String, Value>) -> bool {
    map.contains_key("url") && map.contains_key("name")
}

fn fingerprint(key: &[u8]) -> String {
    Sha256::digest(key)
        .iter()
        .take(4)
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn codec() -> EnvelopeCodec {
        EnvelopeCodec::from_key(&[7u8; KEY_LEN]).unwrap()
    }

    #[test]
    fn envelope_detection() {
        assert!(EnvelopeCodec::is_envelope("enc:v1:AAAA"));
        assert!(!EnvelopeCodec::is_envelope("hello"));
        assert!(!EnvelopeCodec::is_envelope(""));
        assert!(EnvelopeCodec::is_envelope_value(&json!("enc:v1:x")));
        assert!(!EnvelopeCodec::is_envelope_value(&json!(42)));
    }

    #[test]
    fn round_trip_restores_plaintext() {
        let codec = codec();
        let long = "x".repeat(4096);
        for plain in ["a", "file.pdf", "Ünïcödé ✓", "line\nbreak", long.as_str()] {
            let sealed = codec.encrypt(plain).unwrap();
            assert!(EnvelopeCodec::is_envelope(&sealed));
            assert_ne!(sealed, plain);
            assert_eq!(codec.decrypt(&sealed), plain);
        }
    }

    #[test]
    fn encrypt_is_not_deterministic() {
        let codec = codec();
        let a = codec.encrypt("same").unwrap();
        let b = codec.encrypt("same").unwrap();
        assert_ne!(a, b);
        assert_eq!(codec.decrypt(&a), codec.decrypt(&b));
    }

    #[test]
    fn empty_plaintext_is_left_alone() {
        assert_eq!(codec().encrypt("").unwrap(), "");
    }

    #[test]
    fn decrypt_is_identity_on_plain_strings() {
        let codec = codec();
        for plain in ["", "hello", "enc:v0:old", "ENC:V1:upper"] {
            assert_eq!(codec.decrypt(plain), plain);
        }
    }

    #[test]
    fn decrypt_fails_open() {
        let codec = codec();
        let other = EnvelopeCodec::from_key(&[9u8; KEY_LEN]).unwrap();
        let foreign = other.encrypt("secret").unwrap();

        assert_eq!(codec.decrypt(&foreign), foreign);
        assert_eq!(codec.try_decrypt(&foreign), Err(DecodeError::Authentication));

        assert_eq!(codec.decrypt("enc:v1:!!!"), "enc:v1:!!!");
        assert_eq!(codec.try_decrypt("enc:v1:!!!"), Err(DecodeError::Base64));
        assert_eq!(codec.try_decrypt("enc:v1:AAAA"), Err(DecodeError::Truncated));
        assert_eq!(codec.try_decrypt("plain"), Err(DecodeError::NotEnvelope));
    }

    #[test]
    fn tampered_envelope_is_rejected() {
        let codec = codec();
        let sealed = codec.encrypt("secret").unwrap();
        let mut body = Base64::decode_vec(&sealed[ENVELOPE_PREFIX.len()..]).unwrap();
        let last = body.len() - 1;
        body[last] ^= 0x01;
        let tampered = format!("{ENVELOPE_PREFIX}{}", Base64::encode_string(&body));

        assert_eq!(codec.try_decrypt(&tampered), Err(DecodeError::Authentication));
        assert_eq!(codec.decrypt(&tampered), tampered);
    }

    #[test]
    fn passphrase_derivation_is_stable() {
        let a = EnvelopeCodec::from_passphrase("correct horse").unwrap();
        let b = EnvelopeCodec::from_passphrase("correct horse").unwrap();
        let c = EnvelopeCodec::from_passphrase("battery staple").unwrap();

        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint().len(), 8);

        let sealed = a.encrypt("shared").unwrap();
        assert_eq!(b.decrypt(&sealed), "shared");
        assert_eq!(c.decrypt(&sealed), sealed);
    }

    #[test]
    fn decrypt_deep_handles_attachment_shape() {
        let codec = codec();
        let input = json!({ "url": "http://x", "name": codec.encrypt("file.pdf").unwrap() });
        assert_eq!(
            codec.decrypt_deep(&input),
            json!({ "url": "http://x", "name": "file.pdf" })
        );
    }

    #[test]
    fn decrypt_deep_leaves_attachment_url_even_if_enveloped() {
        let codec = codec();
        let url = codec.encrypt("http://x").unwrap();
        let input = json!({ "url": url.clone(), "name": "plain.txt" });
        let out = codec.decrypt_deep(&input);
        assert_eq!(out["url"], json!(url));
        assert_eq!(out["name"], json!("plain.txt"));
    }

    #[test]
    fn decrypt_deep_walks_nested_structures() {
        let codec = codec();
        let input = json!({
            "summary": codec.encrypt("printer on fire").unwrap(),
            "priority": 2,
            "done": false,
            "tags": [codec.encrypt("hw").unwrap(), "ops"],
            "contact": { "email": codec.encrypt("a@b.c").unwrap() },
            "attachments": [{ "url": "https://files/1", "name": codec.encrypt("log.txt").unwrap() }]
        });
        assert_eq!(
            codec.decrypt_deep(&input),
            json!({
                "summary": "printer on fire",
                "priority": 2,
                "done": false,
                "tags": ["hw", "ops"],
                "contact": { "email": "a@b.c" },
                "attachments": [{ "url": "https://files/1", "name": "log.txt" }]
            })
        );
    }

    #[test]
    fn encrypt_deep_then_decrypt_deep_round_trips() {
        let codec = codec();
        let input = json!({
            "notes": "vendor contact",
            "count": 3,
            "attachments": [{ "url": "https://files/2", "name": "quote.pdf" }]
        });
        let sealed = codec.encrypt_deep(&input).unwrap();

        assert!(EnvelopeCodec::is_envelope_value(&sealed["notes"]));
        assert_eq!(sealed["count"], json!(3));
        assert_eq!(sealed["attachments"][0]["url"], json!("https://files/2"));
        assert!(EnvelopeCodec::is_envelope_value(&sealed["attachments"][0]["name"]));

        assert_eq!(codec.decrypt_deep(&sealed), input);
    }

    #[test]
    fn encrypt_deep_does_not_double_seal() {
        let codec = codec();
        let once = codec.encrypt_deep(&json!({ "a": "secret" })).unwrap();
        let twice = codec.encrypt_deep(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn decrypt_cache_serves_repeated_envelopes() {
        let codec = codec().with_decrypt_cache(8);
        let sealed = codec.encrypt("cached").unwrap();

        assert_eq!(codec.decrypt(&sealed), "cached");
        assert_eq!(codec.decrypt(&sealed), "cached");
        assert_eq!(codec.cache.as_ref().map(DecryptCache::len), Some(1));

        // failures are not remembered
        codec.decrypt("enc:v1:AAAA");
        assert_eq!(codec.cache.as_ref().map(DecryptCache::len), Some(1));
    }
}
