// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Chronologically sortable child keys.
//!
//! A key is 20 characters: 8 encode the millisecond timestamp, 12 are random.
//! The alphabet is in ASCII order, so plain string comparison sorts keys by
//! creation time. Keys generated in the same millisecond reuse the previous
//! random tail incremented by one, keeping them strictly increasing.

use std::sync::Mutex;

use chrono::Utc;
use ring::rand::{SecureRandom, SystemRandom};

use super::store::{StoreError, StoreResult};

const PUSH_CHARS: &[u8; 64] = b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

const TIME_CHARS: usize = 8;
const RANDOM_CHARS: usize = 12;

/// Length of every generated key.
pub const PUSH_KEY_LEN: usize = TIME_CHARS + RANDOM_CHARS;

#[derive(Default)]
struct LastKey {
    millis: i64,
    random: [u8; RANDOM_CHARS],
}

/// Generates push keys for new children.
pub struct PushKeyGenerator {
    rng: SystemRandom,
    last: Mutex<LastKey>,
}

impl Default for PushKeyGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl PushKeyGenerator {
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
            last: Mutex::new(LastKey::default()),
        }
    }

    /// Next key for the current wall-clock time.
    pub fn next_key(&self) -> StoreResult<String> {
        self.next_key_at(Utc::now().timestamp_millis())
    }

    /// Next key for a given millisecond timestamp.
    pub fn next_key_at(&self, millis: i64) -> StoreResult<String> {
        let mut last = self
            .last
            .lock()
            .map_err(|_| StoreError::Unavailable("push key state poisoned".to_string()))?;

        if millis == last.millis {
            increment(&mut last.random);
        } else {
            let mut bytes = [0u8; RANDOM_CHARS];
            self.rng
                .fill(&mut bytes)
                .map_err(|_| StoreError::KeyGeneration)?;
            for (slot, byte) in last.random.iter_mut().zip(bytes) {
                *slot = byte & 0x3f;
            }
            last.millis = millis;
        }

        let mut key = String::with_capacity(PUSH_KEY_LEN);
        let mut time = millis.max(0);
        let mut time_chars = [0u8; TIME_CHARS];
        for slot in time_chars.iter_mut().rev() {
            *slot = PUSH_CHARS[(time % 64) as usize];
            time /= 64;
        }
        key.extend(time_chars.iter().map(|&c| char::from(c)));
        key.extend(last.random.iter().map(|&i| char::from(PUSH_CHARS[usize::from(i)])));
        Ok(key)
    }
}

// Add one to the base-64 random tail, carrying from the last position.
fn increment(random: &mut [u8; RANDOM_CHARS]) {
    for digit in random.iter_mut().rev() {
        if *digit == 63 {
            *digit = 0;
        } else {
            *digit += 1;
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_have_fixed_length_and_alphabet() {
        let generator = PushKeyGenerator::new();
        let key = generator.next_key().unwrap();
        assert_eq!(key.len(), PUSH_KEY_LEN);
        assert!(key.bytes().all(|b| PUSH_CHARS.contains(&b)));
    }

    #[test]
    fn keys_within_one_millisecond_are_strictly_increasing() {
        let generator = PushKeyGenerator::new();
        let keys: Vec<String> = (0..500)
            .map(|_| generator.next_key_at(1_700_000_000_000).unwrap())
            .collect();

        for pair in keys.windows(2) {
            assert!(pair[0] < pair[1], "{} !< {}", pair[0], pair[1]);
        }
        assert!(keys.iter().all(|k| k[..TIME_CHARS] == keys[0][..TIME_CHARS]));
    }

    #[test]
    fn later_timestamps_sort_after_earlier_ones() {
        let generator = PushKeyGenerator::new();
        let early = generator.next_key_at(1_000).unwrap();
        let late = generator.next_key_at(1_001).unwrap();
        let much_later = generator.next_key_at(64_i64.pow(5)).unwrap();
        assert!(early < late);
        assert!(late < much_later);
    }

    #[test]
    fn alphabet_is_ascii_ordered() {
        assert!(PUSH_CHARS.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn increment_carries() {
        let mut random = [0u8; RANDOM_CHARS];
        random[RANDOM_CHARS - 1] = 63;
        increment(&mut random);
        assert_eq!(random[RANDOM_CHARS - 1], 0);
        assert_eq!(random[RANDOM_CHARS - 2], 1);
    }
}
