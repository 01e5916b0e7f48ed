// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults, and the [`SyncConfig`] loaded from
//! them at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `SYNC_DATA_ROOT` | First path segment of every partition | `data` |
//! | `SYNC_ADMIN_PARTITION` | Partition shared by all admins | `admin` |
//! | `FIELD_ENCRYPTION_PASSPHRASE` | Passphrase the envelope key is derived from | Required to seal or open fields |
//! | `DECRYPT_CACHE_CAPACITY` | Decrypted envelopes kept in memory (`0` disables) | `4096` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::fmt;

use crate::storage::paths::{DATA_ROOT, DEFAULT_ADMIN_PARTITION};
use crate::storage::PathResolver;

/// Environment variable name for the partition root segment.
pub const DATA_ROOT_ENV: &str = "SYNC_DATA_ROOT";

/// Environment variable name for the shared admin partition.
pub const ADMIN_PARTITION_ENV: &str = "SYNC_ADMIN_PARTITION";

/// Environment variable name for the envelope passphrase.
///
/// Every client derives the same key from it, so it must be identical
/// across the deployment.
pub const PASSPHRASE_ENV: &str = "FIELD_ENCRYPTION_PASSPHRASE";

/// Environment variable name for the decrypt cache size.
pub const DECRYPT_CACHE_CAPACITY_ENV: &str = "DECRYPT_CACHE_CAPACITY";

/// Environment variable name for the log output format.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_DECRYPT_CACHE_CAPACITY: usize = 4096;

/// Errors while reading configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{name} has invalid value `{value}`")]
    Invalid { name: &'static str, value: String },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(ConfigError::Invalid {
                name: LOG_FORMAT_ENV,
                value: s.to_string(),
            }),
        }
    }
}

/// Settings for the sync layer.
#[derive(Clone)]
pub struct SyncConfig {
    pub data_root: String,
    pub admin_partition: String,
    /// Only needed by the envelope codec; see [`SyncConfig::passphrase`].
    pub passphrase: Option<String>,
    pub decrypt_cache_capacity: usize,
    pub log_format: LogFormat,
}

impl SyncConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using `lookup` to read variables.
    ///
    /// A missing passphrase is not an error here, so routing and logging can
    /// be configured without it.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let passphrase = lookup(PASSPHRASE_ENV).filter(|value| !value.is_empty());

        let decrypt_cache_capacity = match lookup(DECRYPT_CACHE_CAPACITY_ENV) {
            Some(raw) => raw.trim().parse::<usize>().map_err(|_| ConfigError::Invalid {
                name: DECRYPT_CACHE_CAPACITY_ENV,
                value: raw.clone(),
            })?,
            None => DEFAULT_DECRYPT_CACHE_CAPACITY,
        };

        let log_format = match lookup(LOG_FORMAT_ENV) {
            Some(raw) => raw.parse()?,
            None => LogFormat::default(),
        };

        Ok(Self {
            data_root: lookup(DATA_ROOT_ENV).unwrap_or_else(|| DATA_ROOT.to_string()),
            admin_partition: lookup(ADMIN_PARTITION_ENV)
                .unwrap_or_else(|| DEFAULT_ADMIN_PARTITION.to_string()),
            passphrase,
            decrypt_cache_capacity,
            log_format,
        })
    }

    /// The envelope passphrase, or [`ConfigError::Missing`] when unset.
    pub fn passphrase(&self) -> Result<&str, ConfigError> {
        self.passphrase
            .as_deref()
            .ok_or(ConfigError::Missing(PASSPHRASE_ENV))
    }

    /// Resolver for the configured data root and admin partition.
    pub fn resolver(&self) -> PathResolver {
        PathResolver::new(&self.data_root, &self.admin_partition)
    }
}

impl fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncConfig")
            .field("data_root", &self.data_root)
            .field("admin_partition", &self.admin_partition)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "[REDACTED]"))
            .field("decrypt_cache_capacity", &self.decrypt_cache_capacity)
            .field("log_format", &self.log_format)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn defaults_apply_to_an_empty_environment() {
        let config = SyncConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.data_root, "data");
        assert_eq!(config.admin_partition, "admin");
        assert_eq!(config.passphrase, None);
        assert_eq!(config.decrypt_cache_capacity, DEFAULT_DECRYPT_CACHE_CAPACITY);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.resolver(), PathResolver::default());
    }

    #[test]
    fn passphrase_is_required_only_when_asked_for() {
        let config = SyncConfig::from_lookup(lookup(&[(LOG_FORMAT_ENV, "json")])).unwrap();
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.passphrase(), Err(ConfigError::Missing(PASSPHRASE_ENV)));

        let config = SyncConfig::from_lookup(lookup(&[(PASSPHRASE_ENV, "")])).unwrap();
        assert!(config.passphrase().is_err());

        let config = SyncConfig::from_lookup(lookup(&[(PASSPHRASE_ENV, "secret")])).unwrap();
        assert_eq!(config.passphrase(), Ok("secret"));
    }

    #[test]
    fn overrides_are_read() {
        let config = SyncConfig::from_lookup(lookup(&[
            (PASSPHRASE_ENV, "secret"),
            (DATA_ROOT_ENV, "root"),
            (ADMIN_PARTITION_ENV, "ops"),
            (DECRYPT_CACHE_CAPACITY_ENV, "0"),
            (LOG_FORMAT_ENV, "JSON"),
        ]))
        .unwrap();
        assert_eq!(config.data_root, "root");
        assert_eq!(config.admin_partition, "ops");
        assert_eq!(config.decrypt_cache_capacity, 0);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.resolver(), PathResolver::new("root", "ops"));
    }

    #[test]
    fn malformed_values_are_rejected() {
        let err = SyncConfig::from_lookup(lookup(&[
            (PASSPHRASE_ENV, "secret"),
            (DECRYPT_CACHE_CAPACITY_ENV, "lots"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name, .. } if name == DECRYPT_CACHE_CAPACITY_ENV));

        let err = SyncConfig::from_lookup(lookup(&[
            (PASSPHRASE_ENV, "secret"),
            (LOG_FORMAT_ENV, "xml"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name, .. } if name == LOG_FORMAT_ENV));
    }

    #[test]
    fn debug_redacts_passphrase() {
        let config = SyncConfig::from_lookup(lookup(&[(PASSPHRASE_ENV, "hunter2")])).unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
